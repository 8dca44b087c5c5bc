use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::config::{REAL_SEQUENCE_TYPE, VIDEO_EXTENSION};
use crate::error::Result;
use crate::layout::DatasetLayout;
use crate::types::{Challenge, StageReport, VideoName};
use crate::utils::{create_progress_bar, list_files, FileOp};

/// Where a raw video goes, or why it stays put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Move(FileOp),
    Skip(String),
}

/// Decide the destination of one raw video without touching the disk.
pub fn plan_video(layout: &DatasetLayout, video: &Path) -> Result<Placement> {
    let name = VideoName::parse(video)?;

    // only real recordings are used
    if name.sequence_type != REAL_SEQUENCE_TYPE {
        return Ok(Placement::Skip(format!(
            "sequence type {} is synthetic",
            name.sequence_type
        )));
    }
    if !layout
        .challenges
        .iter()
        .any(|c| c.challenge_type == name.challenge_type)
    {
        return Ok(Placement::Skip(format!(
            "challenge type {} is not used",
            name.challenge_type
        )));
    }

    let challenge = Challenge::from_codes(video, &name.challenge_type, &name.challenge_level)?;
    let to = layout
        .dataset_dir(&challenge)
        .join(format!("{}.{}", name.sequence_number, VIDEO_EXTENSION));

    Ok(Placement::Move(FileOp::Move {
        from: video.to_path_buf(),
        to,
    }))
}

/// Move every real-data video from `data/` into its challenge directory,
/// renamed to `{sequence_number}.mp4`.
pub fn reorganize_videos(layout: &DatasetLayout) -> Result<StageReport> {
    let mut report = StageReport::new("reorganize");
    layout.create_dataset_dirs()?;

    let videos: Vec<PathBuf> = list_files(&layout.raw_videos_dir(), VIDEO_EXTENSION);
    info!("Found {} raw videos.", videos.len());

    let pb = create_progress_bar(videos.len() as u64, "Reorganize");
    for video in &videos {
        match plan_video(layout, video) {
            Ok(Placement::Move(op)) => {
                if let FileOp::Move { to, .. } = &op {
                    info!("Moving {} to {}", video.display(), to.display());
                }
                match op.apply() {
                    Ok(()) => report.increment_processed(),
                    Err(e) => report.fail(video, &e),
                }
            }
            Ok(Placement::Skip(reason)) => {
                log::debug!("Leaving {} in place: {}", video.display(), reason);
                report.skip(video, reason);
            }
            Err(e) => {
                warn!("Cannot place {}", video.display());
                report.fail(video, &e);
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("Reorganize complete");

    Ok(report)
}
