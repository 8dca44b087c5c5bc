use log::info;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use crate::config::SIGN_NAMES;
use crate::error::Result;
use crate::layout::DatasetLayout;
use crate::types::{Split, StageReport};

/// The `dataset.yaml` read by the YOLO trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub nc: usize,
    pub names: Vec<String>,
    pub train: String,
    pub val: String,
}

impl DatasetDescriptor {
    pub fn for_directory(dataset_dir: &Path) -> Self {
        let images = DatasetLayout::images_dir(dataset_dir);
        Self {
            nc: SIGN_NAMES.len(),
            names: class_names(),
            train: images.join(Split::Train.as_str()).to_string_lossy().into_owned(),
            val: images.join(Split::Val.as_str()).to_string_lossy().into_owned(),
        }
    }
}

/// Class names as `{index}-{sign}`, e.g. `5-stop`.
pub fn class_names() -> Vec<String> {
    SIGN_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{}-{}", i, name))
        .collect()
}

pub fn write_descriptor(path: &Path, descriptor: &DatasetDescriptor) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_yaml::to_writer(writer, descriptor)?;
    Ok(())
}

/// Write `dataset.yaml` into every dataset directory.
pub fn create_manifests(layout: &DatasetLayout) -> Result<StageReport> {
    let mut report = StageReport::new("manifest");

    for dir in layout.dataset_dirs() {
        let path = DatasetLayout::manifest_path(&dir);
        let result = fs::create_dir_all(&dir)
            .map_err(Into::into)
            .and_then(|_| write_descriptor(&path, &DatasetDescriptor::for_directory(&dir)));
        match result {
            Ok(()) => {
                info!("Wrote {}", path.display());
                report.increment_processed();
            }
            Err(e) => report.fail(&path, &e),
        }
    }

    Ok(report)
}
