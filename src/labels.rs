//! Label renaming, extraction to YOLO rows, and replication.

use log::{debug, info};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{sign_name, LABEL_EXTENSION, REAL_SEQUENCE_TYPE, SIGN_NAMES};
use crate::error::{PrepError, Result};
use crate::geometry::{CornerBox, ImageDims, NormBox};
use crate::layout::DatasetLayout;
use crate::types::{FrameKey, StageReport, SummaryRow};
use crate::utils::{copy_verified, create_progress_bar, list_files, stem_str, FileOp};

/// One sign annotation of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelRecord {
    pub key: FrameKey,
    pub class: usize,
    pub bbox: NormBox,
}

impl LabelRecord {
    /// Parse `frame_signType_llx_lly_lrx_lry_ulx_uly_urx_ury`.
    pub fn parse_line(sequence: u32, line: &str, dims: ImageDims) -> std::result::Result<Self, String> {
        let fields: Vec<&str> = line.trim().split('_').collect();
        if fields.len() != 10 {
            return Err(format!("expected 10 fields, found {}", fields.len()));
        }

        let frame: u32 = fields[0]
            .parse()
            .map_err(|_| format!("invalid frame number {:?}", fields[0]))?;
        let sign: usize = fields[1]
            .parse()
            .map_err(|_| format!("invalid sign type {:?}", fields[1]))?;
        if sign == 0 || sign > SIGN_NAMES.len() {
            return Err(format!("sign type {} is outside 1-{}", sign, SIGN_NAMES.len()));
        }

        let mut coords = [0i32; 8];
        for (slot, field) in coords.iter_mut().zip(&fields[2..]) {
            *slot = field
                .parse()
                .map_err(|_| format!("invalid coordinate {:?}", field))?;
        }
        let corners = CornerBox::from_coords(coords);
        if let Some(reason) = corners.ordering_error() {
            return Err(reason);
        }

        let bbox = corners.to_norm_box(dims);
        if !bbox.is_normalized() {
            return Err(format!("box {:?} is outside the image", bbox));
        }

        Ok(Self {
            key: FrameKey::new(sequence, frame),
            // class numbers are zero-indexed
            class: sign - 1,
            bbox,
        })
    }

    /// `class x_center y_center width height`
    pub fn to_yolo_row(&self) -> String {
        format!(
            "{} {:.6} {:.6} {:.6} {:.6}\n",
            self.class, self.bbox.x_center, self.bbox.y_center, self.bbox.width, self.bbox.height
        )
    }

    pub fn to_summary_row(&self) -> SummaryRow {
        SummaryRow {
            label_file: self.key.label_file(),
            image_file: self.key.image_file(),
            sequence: self.key.sequence_code(),
            frame: self.key.frame_code(),
            sign: sign_name(self.class).unwrap_or_default().to_string(),
            width: self.bbox.width,
            height: self.bbox.height,
            area: self.bbox.area(),
        }
    }
}

/// Parse a whole sequence label file; the first line is a header.
///
/// Returns the valid records and one `Data` error per rejected row.
pub fn parse_sequence_labels(
    path: &Path,
    sequence: u32,
    content: &str,
    dims: ImageDims,
) -> (Vec<LabelRecord>, Vec<PrepError>) {
    let mut records = Vec::new();
    let mut errors = Vec::new();
    for (idx, line) in content.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        match LabelRecord::parse_line(sequence, line, dims) {
            Ok(record) => records.push(record),
            Err(reason) => errors.push(PrepError::Data {
                path: path.to_path_buf(),
                line: idx + 1,
                reason,
            }),
        }
    }
    (records, errors)
}

/// Plan for a raw `sequenceType_sequenceNumber.txt` label file. `None` when
/// the file does not follow that pattern and must be left alone.
pub fn plan_label_rename(path: &Path) -> Option<FileOp> {
    let (sequence_type, sequence_number) = stem_str(path)?.split_once('_')?;
    let is_code = |s: &str| s.len() == 2 && s.bytes().all(|b| b.is_ascii_digit());
    if !is_code(sequence_type) || !is_code(sequence_number) {
        return None;
    }
    if sequence_type == REAL_SEQUENCE_TYPE {
        let to = path.with_file_name(format!("{}.{}", sequence_number, LABEL_EXTENSION));
        Some(FileOp::Move {
            from: path.to_path_buf(),
            to,
        })
    } else {
        Some(FileOp::Remove(path.to_path_buf()))
    }
}

/// Rename real-data label files to `{sequenceNumber}.txt` and delete the rest.
pub fn rename_labels(layout: &DatasetLayout) -> Result<StageReport> {
    let mut report = StageReport::new("rename-labels");
    let files = list_files(&layout.labels_dir(), LABEL_EXTENSION);

    for file in &files {
        let Some(op) = plan_label_rename(file) else {
            report.skip(file, "not a raw sequence label file");
            continue;
        };
        match &op {
            FileOp::Move { to, .. } => info!("Renaming {} to {}", file.display(), to.display()),
            FileOp::Remove(_) => debug!("Removing synthetic labels {}", file.display()),
        }
        match op.apply() {
            Ok(()) => report.increment_processed(),
            Err(e) => report.fail(file, &e),
        }
    }

    Ok(report)
}

// Sequence label files are named by the bare sequence number
fn sequence_of(path: &Path) -> Option<u32> {
    let stem = stem_str(path)?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// Write the per-frame label files of one sequence and delete its source.
fn extract_sequence(
    path: &Path,
    sequence: u32,
    labels_dir: &Path,
    dims: ImageDims,
    report: &mut StageReport,
) -> Result<Vec<SummaryRow>> {
    let content = fs::read_to_string(path)?;
    let (records, errors) = parse_sequence_labels(path, sequence, &content, dims);
    for error in &errors {
        report.fail(path, error);
    }

    let mut frames: BTreeMap<FrameKey, String> = BTreeMap::new();
    for record in &records {
        frames
            .entry(record.key)
            .or_default()
            .push_str(&record.to_yolo_row());
    }
    // whole files, so a re-run after a crash cannot duplicate rows
    for (key, rows) in &frames {
        fs::write(labels_dir.join(key.label_file()), rows)?;
    }
    fs::remove_file(path)?;

    Ok(records.iter().map(LabelRecord::to_summary_row).collect())
}

/// Convert every sequence label file into per-frame YOLO label files and
/// write the tabular summary.
pub fn extract_labels(layout: &DatasetLayout, dims: ImageDims) -> Result<StageReport> {
    let mut report = StageReport::new("extract-labels");
    let labels_dir = layout.labels_dir();
    let summary_path = layout.summary_csv();

    let sources: Vec<(PathBuf, u32)> = list_files(&labels_dir, LABEL_EXTENSION)
        .into_iter()
        .filter_map(|path| sequence_of(&path).map(|seq| (path, seq)))
        .collect();
    info!("Found {} sequence label files.", sources.len());

    let mut rows = Vec::new();
    let mut extracted: HashSet<String> = HashSet::new();
    let pb = create_progress_bar(sources.len() as u64, "Labels");
    for (path, sequence) in &sources {
        info!("Processing {}...", path.display());
        match extract_sequence(path, *sequence, &labels_dir, dims, &mut report) {
            Ok(sequence_rows) => {
                extracted.insert(format!("{:02}", sequence));
                rows.extend(sequence_rows);
                report.increment_processed();
            }
            Err(e) => report.fail(path, &e),
        }
        pb.inc(1);
    }
    pb.finish_with_message("Label extraction complete");

    // keep rows of sequences extracted by an earlier run
    if summary_path.exists() {
        let previous = read_summary(&summary_path)?;
        rows.extend(
            previous
                .into_iter()
                .filter(|row| !extracted.contains(&row.sequence)),
        );
    }
    write_summary(&summary_path, rows)?;
    info!("Wrote {}", summary_path.display());

    Ok(report)
}

pub fn read_summary(path: &Path) -> Result<Vec<SummaryRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<std::result::Result<Vec<SummaryRow>, _>>()?;
    Ok(rows)
}

/// Write rows sorted by `(sequence, frame)`, keeping the order within a frame.
pub fn write_summary(path: &Path, mut rows: Vec<SummaryRow>) -> Result<()> {
    // numeric order, so sequence 100 follows 99
    rows.sort_by_key(SummaryRow::key);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in &rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

// Copy one canonical label file everywhere, then drop the canonical copy
fn replicate_file(file: &Path, targets: &[PathBuf]) -> Result<()> {
    let name = file
        .file_name()
        .ok_or_else(|| PrepError::config(file, "label file has no name"))?;
    for dir in targets {
        copy_verified(file, &dir.join(name))?;
    }
    fs::remove_file(file)?;
    Ok(())
}

/// Copy the per-frame label files into `labels/` of every dataset directory.
pub fn replicate_labels(layout: &DatasetLayout) -> Result<StageReport> {
    let mut report = StageReport::new("replicate-labels");

    let targets: Vec<PathBuf> = layout
        .dataset_dirs()
        .iter()
        .map(|dir| DatasetLayout::frame_labels_dir(dir))
        .collect();
    for dir in &targets {
        fs::create_dir_all(dir)?;
    }

    let files: Vec<PathBuf> = list_files(&layout.labels_dir(), LABEL_EXTENSION)
        .into_iter()
        .filter(|path| FrameKey::from_path(path).is_some())
        .collect();
    info!(
        "Copying {} label files into {} dataset directories.",
        files.len(),
        targets.len()
    );

    let pb = create_progress_bar(files.len() as u64, "Replicate");
    let results: Vec<(PathBuf, Result<()>)> = files
        .into_par_iter()
        .map(|file| {
            let result = replicate_file(&file, &targets);
            pb.inc(1);
            (file, result)
        })
        .collect();
    pb.finish_with_message("Label replication complete");

    for (file, result) in results {
        match result {
            Ok(()) => report.increment_processed(),
            Err(e) => report.fail(&file, &e),
        }
    }

    Ok(report)
}
