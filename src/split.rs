//! Train/validation split shared by every dataset directory.
//!
//! The unit of splitting is the frame. Frames are stratified by their rarest
//! sign class; frames without labels form one extra background stratum. The
//! same validation fraction and seed apply to every stratum, so labeled and
//! background frames follow one policy.

use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::config::{SplitArgs, IMAGE_EXTENSION, LABEL_EXTENSION, SIGN_NAMES};
use crate::error::Result;
use crate::labels::{read_summary, write_summary};
use crate::layout::DatasetLayout;
use crate::types::{FrameKey, Split, StageReport, SummaryRow};
use crate::utils::{list_files, FileOp};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitPolicy {
    /// Fraction of every stratum that goes to validation, rounded to the
    /// nearest frame.
    pub val_fraction: f64,
    pub seed: u64,
}

impl From<SplitArgs> for SplitPolicy {
    fn from(args: SplitArgs) -> Self {
        Self {
            val_fraction: args.val_size as f64,
            seed: args.seed,
        }
    }
}

impl Default for SplitPolicy {
    fn default() -> Self {
        SplitArgs::default().into()
    }
}

// Known signs sort by class index, anything else after them by name
fn sign_rank(sign: &str) -> (usize, &str) {
    let index = SIGN_NAMES.iter().position(|s| *s == sign).unwrap_or(SIGN_NAMES.len());
    (index, sign)
}

/// Group frames into strata: the rarest sign of a labeled frame, or `None`
/// for frames without labels.
pub fn stratify(
    rows: &[SummaryRow],
    frames: &BTreeSet<FrameKey>,
) -> BTreeMap<Option<String>, Vec<FrameKey>> {
    let mut frequency: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        *frequency.entry(row.sign.as_str()).or_default() += 1;
    }

    let mut rarest: BTreeMap<FrameKey, &str> = BTreeMap::new();
    for row in rows {
        let Some(key) = row.key() else { continue };
        let sign = row.sign.as_str();
        let candidate = (frequency[sign], sign_rank(sign));
        rarest
            .entry(key)
            .and_modify(|current| {
                if candidate < (frequency[*current], sign_rank(current)) {
                    *current = sign;
                }
            })
            .or_insert(sign);
    }

    let mut strata: BTreeMap<Option<String>, Vec<FrameKey>> = BTreeMap::new();
    for (key, sign) in &rarest {
        strata.entry(Some(sign.to_string())).or_default().push(*key);
    }
    for key in frames {
        if !rarest.contains_key(key) {
            strata.entry(None).or_default().push(*key);
        }
    }
    strata
}

// Seed of one stratum, mixed from the policy seed and the stratum name
// (FNV-1a), so strata shuffle independently of each other.
fn stratum_seed(seed: u64, stratum: Option<&str>) -> u64 {
    let name = stratum.unwrap_or("");
    let mut hash = 0xcbf2_9ce4_8422_2325u64 ^ seed;
    for byte in [stratum.is_some() as u8].iter().chain(name.as_bytes()) {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Assign every labeled frame and every frame in `frames` to exactly one split.
///
/// A stratum's assignment depends only on its own members and the seed.
pub fn assign_splits(
    rows: &[SummaryRow],
    frames: &BTreeSet<FrameKey>,
    policy: SplitPolicy,
) -> BTreeMap<FrameKey, Split> {
    let mut assignment = BTreeMap::new();

    for (stratum, mut keys) in stratify(rows, frames) {
        let mut rng = StdRng::seed_from_u64(stratum_seed(policy.seed, stratum.as_deref()));
        keys.shuffle(&mut rng);
        let val_size = (keys.len() as f64 * policy.val_fraction).round() as usize;
        log::debug!(
            "stratum {:?}: {} frames, {} to val",
            stratum.as_deref().unwrap_or("background"),
            keys.len(),
            val_size
        );
        for (i, key) in keys.into_iter().enumerate() {
            let split = if i < val_size { Split::Val } else { Split::Train };
            assignment.insert(key, split);
        }
    }
    assignment
}

/// Summary rows of one split, one row per frame.
pub fn split_rows(rows: &[SummaryRow], assignment: &BTreeMap<FrameKey, Split>, split: Split) -> Vec<SummaryRow> {
    let mut seen = BTreeSet::new();
    rows.iter()
        .filter(|row| {
            row.key()
                .is_some_and(|key| assignment.get(&key) == Some(&split) && seen.insert(key))
        })
        .cloned()
        .collect()
}

/// Moves that place the frames of one dataset directory into `train`/`val`.
pub fn plan_directory(
    dataset_dir: &Path,
    assignment: &BTreeMap<FrameKey, Split>,
) -> (Vec<FileOp>, Vec<PathBuf>) {
    let mut ops = Vec::new();
    let mut unassigned = Vec::new();

    let sources = [
        (DatasetLayout::images_dir(dataset_dir), IMAGE_EXTENSION),
        (DatasetLayout::frame_labels_dir(dataset_dir), LABEL_EXTENSION),
    ];
    for (dir, extension) in sources {
        for file in list_files(&dir, extension) {
            let split = FrameKey::from_path(&file).and_then(|key| assignment.get(&key));
            let name = file.file_name().map(|n| n.to_owned());
            match (split, name) {
                (Some(split), Some(name)) => {
                    let to = dir.join(split.as_str()).join(name);
                    ops.push(FileOp::Move { from: file, to });
                }
                _ => unassigned.push(file),
            }
        }
    }
    (ops, unassigned)
}

fn apply_directory(dataset_dir: &Path, assignment: &BTreeMap<FrameKey, Split>) -> StageReport {
    let mut report = StageReport::new("split");
    let (ops, unassigned) = plan_directory(dataset_dir, assignment);
    for file in unassigned {
        report.skip(file, "no split assigned to this frame");
    }
    for op in ops {
        match op.apply() {
            Ok(()) => report.increment_processed(),
            Err(e) => report.fail(op.source(), &e),
        }
    }
    report
}

/// Frame keys of the images still waiting to be split.
fn pending_frames(layout: &DatasetLayout) -> BTreeSet<FrameKey> {
    layout
        .dataset_dirs()
        .iter()
        .flat_map(|dir| list_files(&DatasetLayout::images_dir(dir), IMAGE_EXTENSION))
        .filter_map(|path| FrameKey::from_path(&path))
        .collect()
}

/// Frames an earlier run already moved into a split subdirectory.
pub fn placed_frames(layout: &DatasetLayout) -> BTreeMap<FrameKey, Split> {
    let mut placed = BTreeMap::new();
    for dir in layout.dataset_dirs() {
        let sources = [
            (DatasetLayout::images_dir(&dir), IMAGE_EXTENSION),
            (DatasetLayout::frame_labels_dir(&dir), LABEL_EXTENSION),
        ];
        for (base, extension) in &sources {
            for split in [Split::Train, Split::Val] {
                for file in list_files(&base.join(split.as_str()), extension) {
                    let Some(key) = FrameKey::from_path(&file) else { continue };
                    if let Some(first) = placed.insert(key, split) {
                        if first != split {
                            warn!("{} is placed in both train and val", key);
                            placed.insert(key, first);
                        }
                    }
                }
            }
        }
    }
    placed
}

/// Split all frames, write `train.csv`/`val.csv`, and move the image and
/// label files of every dataset directory into their split subdirectories.
///
/// Frames already placed by an earlier run keep their split, so the stage
/// can be resumed or repeated.
pub fn split_dataset(layout: &DatasetLayout, policy: SplitPolicy) -> Result<StageReport> {
    let rows = read_summary(&layout.summary_csv())?;
    let placed = placed_frames(layout);
    let mut frames = pending_frames(layout);
    info!(
        "Splitting {} label rows and {} frame images ({} frames already placed).",
        rows.len(),
        frames.len(),
        placed.len()
    );
    frames.extend(placed.keys().copied());

    let mut assignment = assign_splits(&rows, &frames, policy);
    for (key, split) in &placed {
        if assignment.insert(*key, *split) != Some(*split) {
            warn!("{} stays in {} from an earlier split", key, split.as_str());
        }
    }
    let val_count = assignment.values().filter(|s| **s == Split::Val).count();
    info!(
        "{} frames to train, {} to val.",
        assignment.len() - val_count,
        val_count
    );

    for split in [Split::Train, Split::Val] {
        write_summary(&layout.split_csv(split), split_rows(&rows, &assignment, split))?;
    }

    let reports: Vec<StageReport> = layout
        .dataset_dirs()
        .par_iter()
        .map(|dir| apply_directory(dir, &assignment))
        .collect();

    let mut report = StageReport::new("split");
    for r in reports {
        report.merge(r);
    }
    Ok(report)
}
