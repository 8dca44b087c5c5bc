use log::{error, info};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::config::{Command, SplitArgs, IMAGE_HEIGHT, IMAGE_WIDTH};
use crate::error::{PrepError, Result};
use crate::frames::{default_backend, extract_frames, pending_videos, VideoBackend};
use crate::geometry::ImageDims;
use crate::labels::{extract_labels, rename_labels, replicate_labels};
use crate::layout::DatasetLayout;
use crate::manifest::create_manifests;
use crate::reorganize::reorganize_videos;
use crate::split::split_dataset;
use crate::types::StageReport;

/// The preparation stages in dependency order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stage {
    Reorganize,
    Frames,
    RenameLabels,
    ExtractLabels,
    ReplicateLabels,
    Split(SplitArgs),
    Manifest,
}

impl Stage {
    pub fn all(split: SplitArgs) -> [Stage; 7] {
        [
            Stage::Reorganize,
            Stage::Frames,
            Stage::RenameLabels,
            Stage::ExtractLabels,
            Stage::ReplicateLabels,
            Stage::Split(split),
            Stage::Manifest,
        ]
    }

    /// Stage for a CLI command; `None` for commands that are not batch stages.
    pub fn from_command(command: &Command) -> Option<Stage> {
        match command {
            Command::Reorganize => Some(Stage::Reorganize),
            Command::Frames => Some(Stage::Frames),
            Command::RenameLabels => Some(Stage::RenameLabels),
            Command::ExtractLabels => Some(Stage::ExtractLabels),
            Command::ReplicateLabels => Some(Stage::ReplicateLabels),
            Command::Split(args) => Some(Stage::Split(*args)),
            Command::Manifest => Some(Stage::Manifest),
            Command::Analyze | Command::Visualize(_) | Command::All(_) => None,
        }
    }
}

/// Run one stage. The video backend is only needed by `Stage::Frames`.
pub fn run_stage(
    layout: &DatasetLayout,
    stage: Stage,
    backend: Option<&dyn VideoBackend>,
) -> Result<StageReport> {
    let dims = ImageDims::new(IMAGE_WIDTH, IMAGE_HEIGHT);
    let report = match stage {
        Stage::Reorganize => reorganize_videos(layout)?,
        Stage::Frames => match backend {
            Some(backend) => extract_frames(layout, backend)?,
            None => match default_backend() {
                Ok(backend) => extract_frames(layout, backend.as_ref())?,
                // nothing left to decode, so no decoder is needed
                Err(e) if pending_videos(layout).is_empty() => {
                    info!("No videos to decode ({})", e);
                    StageReport::new("frames")
                }
                Err(e) => return Err(e),
            },
        },
        Stage::RenameLabels => rename_labels(layout)?,
        Stage::ExtractLabels => extract_labels(layout, dims)?,
        Stage::ReplicateLabels => replicate_labels(layout)?,
        Stage::Split(args) => split_dataset(layout, args.into())?,
        Stage::Manifest => create_manifests(layout)?,
    };
    report.print_summary();
    Ok(report)
}

/// Run the given stages in order, stopping at the first one that aborts.
///
/// Item failures inside a stage do not stop the run; they are in the reports.
pub fn run_stages(
    layout: &DatasetLayout,
    stages: &[Stage],
    backend: Option<&dyn VideoBackend>,
) -> (Vec<StageReport>, Option<PrepError>) {
    let mut reports = Vec::new();
    for stage in stages {
        info!("Running stage {:?}...", stage);
        match run_stage(layout, *stage, backend) {
            Ok(report) => reports.push(report),
            Err(e) => {
                error!("Stage {:?} aborted: {}", stage, e);
                return (reports, Some(e));
            }
        }
    }
    (reports, None)
}

pub fn write_reports(path: &Path, reports: &[StageReport]) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, reports)?;
    Ok(())
}
