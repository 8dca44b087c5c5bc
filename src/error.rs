use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while preparing the dataset.
///
/// Per-item variants (`Config`, `Decode`, `Data`, `Conflict`) are recorded in a
/// [`StageReport`](crate::types::StageReport) and the stage moves on; the
/// remaining variants abort the running stage.
#[derive(Debug, Error)]
pub enum PrepError {
    #[error("configuration error for {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("bad label row {line} in {path}: {reason}")]
    Data {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("destination already exists: {0}")]
    Conflict(PathBuf),

    #[error("no video backend available: {0}")]
    Backend(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl PrepError {
    pub fn config(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PrepError::Config {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn decode(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PrepError::Decode {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable name of the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            PrepError::Config { .. } => "config",
            PrepError::Decode { .. } => "decode",
            PrepError::Data { .. } => "data",
            PrepError::Conflict(_) => "conflict",
            PrepError::Backend(_) => "backend",
            PrepError::Io(_) => "io",
            PrepError::Csv(_) => "csv",
            PrepError::Yaml(_) => "yaml",
            PrepError::Json(_) => "json",
            PrepError::Image(_) => "image",
        }
    }
}

pub type Result<T> = std::result::Result<T, PrepError>;
