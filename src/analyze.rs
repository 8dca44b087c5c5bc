//! Descriptive statistics over the label summary.

use prettytable::{row, Table};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::IMAGE_EXTENSION;
use crate::error::Result;
use crate::labels::read_summary;
use crate::layout::DatasetLayout;
use crate::types::{Split, SummaryRow};
use crate::utils::walk_files;

/// count / mean / std / min / quartiles / max, as pandas `describe` does.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Describe {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    pub max: f64,
}

impl Describe {
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;
        // sample standard deviation
        let std = if n > 1 {
            (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
        } else {
            f64::NAN
        };

        Self {
            count: n,
            mean,
            std,
            min: sorted[0],
            q25: quantile(&sorted, 0.25),
            q50: quantile(&sorted, 0.5),
            q75: quantile(&sorted, 0.75),
            max: sorted[n - 1],
        }
    }
}

// Linear interpolation between closest ranks; `sorted` must be non-empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMeanMax {
    pub min: usize,
    pub mean: f64,
    pub max: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelStats {
    /// Sign frequencies, most frequent first.
    pub sign_counts: Vec<(String, usize)>,
    /// Signs per labeled frame.
    pub signs_per_frame: Option<MinMeanMax>,
    /// Number of labeled frames in each sequence.
    pub frames_per_sequence: BTreeMap<String, usize>,
    /// Box area in percent of the image.
    pub area_percent: Describe,
}

/// Sign frequencies, most frequent first, ties by name.
pub fn sign_counts(rows: &[SummaryRow]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        *counts.entry(row.sign.as_str()).or_default() += 1;
    }
    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(sign, count)| (sign.to_string(), count))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

pub fn compute_stats(rows: &[SummaryRow]) -> LabelStats {
    let mut per_frame: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    let mut frames: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for row in rows {
        *per_frame.entry((row.sequence.as_str(), row.frame.as_str())).or_default() += 1;
        frames.entry(row.sequence.as_str()).or_default().insert(row.frame.as_str());
    }

    let signs_per_frame = if per_frame.is_empty() {
        None
    } else {
        let counts: Vec<usize> = per_frame.values().copied().collect();
        Some(MinMeanMax {
            min: counts.iter().copied().min().unwrap_or(0),
            mean: counts.iter().sum::<usize>() as f64 / counts.len() as f64,
            max: counts.iter().copied().max().unwrap_or(0),
        })
    };

    let areas: Vec<f64> = rows.iter().map(|row| row.area * 100.0).collect();

    LabelStats {
        sign_counts: sign_counts(rows),
        signs_per_frame,
        frames_per_sequence: frames
            .into_iter()
            .map(|(seq, frames)| (seq.to_string(), frames.len()))
            .collect(),
        area_percent: Describe::of(&areas),
    }
}

fn counts_table(title: &str, counts: &[(String, usize)]) -> Table {
    let mut table = Table::new();
    table.set_titles(row![title, "count"]);
    for (sign, count) in counts {
        table.add_row(row![sign, r->count]);
    }
    table
}

pub fn print_stats(stats: &LabelStats) {
    counts_table("sign", &stats.sign_counts).printstd();

    if let Some(spf) = stats.signs_per_frame {
        let mut table = Table::new();
        table.set_titles(row!["signs per frame", "min", "mean", "max"]);
        table.add_row(row!["", r->spf.min, r->format!("{:.2}", spf.mean), r->spf.max]);
        table.printstd();
    }

    let mut table = Table::new();
    table.set_titles(row!["sequence", "labeled frames"]);
    for (seq, count) in &stats.frames_per_sequence {
        table.add_row(row![seq, r->count]);
    }
    table.printstd();

    let a = stats.area_percent;
    let mut table = Table::new();
    table.set_titles(row!["area %", "value"]);
    table.add_row(row!["count", r->a.count]);
    for (name, value) in [
        ("mean", a.mean),
        ("std", a.std),
        ("min", a.min),
        ("25%", a.q25),
        ("50%", a.q50),
        ("75%", a.q75),
        ("max", a.max),
    ] {
        table.add_row(row![name, r->format!("{:.2}", value)]);
    }
    table.printstd();
}

/// Frame images of one dataset directory by split.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageCounts {
    pub dir: String,
    pub train: usize,
    pub val: usize,
    pub unsplit: usize,
}

/// Count the frame images below every dataset directory.
pub fn image_counts(layout: &DatasetLayout) -> Vec<ImageCounts> {
    layout
        .dataset_dirs()
        .iter()
        .map(|dir| {
            let mut counts = ImageCounts {
                dir: dir
                    .strip_prefix(&layout.root)
                    .unwrap_or(dir)
                    .display()
                    .to_string(),
                ..Default::default()
            };
            for image in walk_files(&DatasetLayout::images_dir(dir), IMAGE_EXTENSION) {
                let parent = image.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str());
                match parent {
                    Some(name) if name == Split::Train.as_str() => counts.train += 1,
                    Some(name) if name == Split::Val.as_str() => counts.val += 1,
                    _ => counts.unsplit += 1,
                }
            }
            counts
        })
        .collect()
}

pub fn print_image_counts(counts: &[ImageCounts]) {
    let mut table = Table::new();
    table.set_titles(row!["directory", "train", "val", "unsplit"]);
    for c in counts {
        table.add_row(row![c.dir, r->c.train, r->c.val, r->c.unsplit]);
    }
    table.printstd();
}

/// Print statistics of the summary and, if present, of the train/val splits.
pub fn analyze_labels(layout: &DatasetLayout) -> Result<LabelStats> {
    let rows = read_summary(&layout.summary_csv())?;
    log::info!("Loaded {} label rows.", rows.len());
    let stats = compute_stats(&rows);
    print_stats(&stats);

    for split in [Split::Train, Split::Val] {
        let path = layout.split_csv(split);
        if path.exists() {
            let rows = read_summary(&path)?;
            counts_table(&format!("{} sign", split.as_str()), &sign_counts(&rows)).printstd();
        }
    }
    print_image_counts(&image_counts(layout));

    Ok(stats)
}
