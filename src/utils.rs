use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use jwalk::WalkDir;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PrepError, Result};

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::with_template(&format!(
        "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
        label
    ))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Files directly inside `dir` with the given extension, sorted.
pub fn list_files(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let Some(dir_str) = dir.to_str() else {
        warn!("Skipping non UTF-8 directory {}", dir.display());
        return Vec::new();
    };
    let pattern = format!("{}/*.{}", glob::Pattern::escape(dir_str), extension);
    let mut files: Vec<PathBuf> = match glob(&pattern) {
        Ok(paths) => paths.filter_map(|entry| entry.ok()).filter(|p| p.is_file()).collect(),
        Err(e) => {
            warn!("Invalid glob pattern {}: {}", pattern, e);
            Vec::new()
        }
    };
    files.sort();
    files
}

/// Files anywhere below `dir` with the given extension, sorted.
pub fn walk_files(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .skip_hidden(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == extension))
        .collect();
    files.sort();
    files
}

/// A file-system change planned by a stage before anything is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOp {
    Move { from: PathBuf, to: PathBuf },
    Remove(PathBuf),
}

impl FileOp {
    pub fn source(&self) -> &Path {
        match self {
            FileOp::Move { from, .. } => from,
            FileOp::Remove(path) => path,
        }
    }

    pub fn apply(&self) -> Result<()> {
        match self {
            FileOp::Move { from, to } => move_file(from, to),
            FileOp::Remove(path) => Ok(fs::remove_file(path)?),
        }
    }
}

/// Move a file without ever overwriting the destination.
///
/// Falls back to copy, size check and delete when a rename is not possible
/// (e.g. across file systems), so the source is only removed once the
/// destination is complete.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        return Err(PrepError::Conflict(to.to_path_buf()));
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    debug!("rename failed, copying {} to {}", from.display(), to.display());
    copy_verified(from, to)?;
    fs::remove_file(from)?;
    Ok(())
}

/// Copy a file and confirm the destination has the source's length.
pub fn copy_verified(from: &Path, to: &Path) -> Result<()> {
    let written = fs::copy(from, to)?;
    let expected = fs::metadata(from)?.len();
    if written != expected || fs::metadata(to)?.len() != expected {
        let _ = fs::remove_file(to);
        return Err(PrepError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("incomplete copy of {} to {}", from.display(), to.display()),
        )));
    }
    Ok(())
}

/// File stem as UTF-8, if it has one.
pub fn stem_str(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str())
}

/// Round to `digits` decimal places.
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}
