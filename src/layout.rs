//! Paths of the dataset tree.
//!
//! ```text
//! CURE-TSD/
//!   data/                      raw videos
//!   labels/                    raw, then per-frame labels and the summary CSVs
//!   00/                        baseline dataset directory
//!   09/01 .. 12/05             challenge dataset directories
//!     {seq}.mp4                until frame extraction
//!     images/{train,val}/
//!     labels/{train,val}/
//!     dataset.yaml
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{MANIFEST_FILE, SUMMARY_FILE, TRAIN_FILE, VAL_FILE};
use crate::types::{Challenge, Split};

/// Explicit description of the dataset tree handed to every stage.
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    pub root: PathBuf,
    pub challenges: Vec<Challenge>,
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            challenges: Challenge::all(),
        }
    }

    pub fn raw_videos_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn labels_dir(&self) -> PathBuf {
        self.root.join("labels")
    }

    pub fn summary_csv(&self) -> PathBuf {
        self.labels_dir().join(SUMMARY_FILE)
    }

    pub fn split_csv(&self, split: Split) -> PathBuf {
        match split {
            Split::Train => self.labels_dir().join(TRAIN_FILE),
            Split::Val => self.labels_dir().join(VAL_FILE),
        }
    }

    pub fn dataset_dir(&self, challenge: &Challenge) -> PathBuf {
        self.root.join(challenge.relative_dir())
    }

    pub fn dataset_dirs(&self) -> Vec<PathBuf> {
        self.challenges.iter().map(|c| self.dataset_dir(c)).collect()
    }

    pub fn images_dir(dataset_dir: &Path) -> PathBuf {
        dataset_dir.join("images")
    }

    pub fn frame_labels_dir(dataset_dir: &Path) -> PathBuf {
        dataset_dir.join("labels")
    }

    pub fn manifest_path(dataset_dir: &Path) -> PathBuf {
        dataset_dir.join(MANIFEST_FILE)
    }

    /// Create every dataset directory that does not exist yet.
    pub fn create_dataset_dirs(&self) -> std::io::Result<()> {
        for dir in self.dataset_dirs() {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
