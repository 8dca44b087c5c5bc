use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{BASELINE_CHALLENGE, CHALLENGE_LEVELS, CHALLENGE_TYPES, IMAGE_EXTENSION, LABEL_EXTENSION};
use crate::error::PrepError;

/// Identifies one frame of one sequence, e.g. `01_003`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameKey {
    pub sequence: u32,
    pub frame: u32,
}

impl FrameKey {
    pub fn new(sequence: u32, frame: u32) -> Self {
        Self { sequence, frame }
    }

    /// Parse a `{sequence}_{frame}` file stem.
    pub fn from_stem(stem: &str) -> Option<Self> {
        let (sequence, frame) = stem.split_once('_')?;
        if frame.contains('_') {
            return None;
        }
        Some(Self {
            sequence: parse_code(sequence)?,
            frame: parse_code(frame)?,
        })
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        Self::from_stem(path.file_stem()?.to_str()?)
    }

    pub fn sequence_code(&self) -> String {
        format!("{:02}", self.sequence)
    }

    pub fn frame_code(&self) -> String {
        format!("{:03}", self.frame)
    }

    pub fn stem(&self) -> String {
        format!("{:02}_{:03}", self.sequence, self.frame)
    }

    pub fn image_file(&self) -> String {
        format!("{}.{}", self.stem(), IMAGE_EXTENSION)
    }

    pub fn label_file(&self) -> String {
        format!("{}.{}", self.stem(), LABEL_EXTENSION)
    }
}

impl fmt::Display for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stem())
    }
}

// Numeric code made of ASCII digits only
fn parse_code(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Metadata encoded in a raw video file name:
/// `sequenceType_sequenceNumber_sourceType_challengeType_challengeLevel`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoName {
    pub sequence_type: String,
    pub sequence_number: String,
    pub source_type: String,
    pub challenge_type: String,
    pub challenge_level: String,
}

impl VideoName {
    pub fn parse(path: &Path) -> Result<Self, PrepError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| PrepError::config(path, "file name is not valid UTF-8"))?;
        let fields: Vec<&str> = stem.split('_').collect();
        let [sequence_type, sequence_number, source_type, challenge_type, challenge_level] =
            fields.as_slice()
        else {
            return Err(PrepError::config(
                path,
                format!("expected 5 underscore-separated fields, found {}", fields.len()),
            ));
        };
        if fields.iter().any(|field| parse_code(field).is_none()) {
            return Err(PrepError::config(path, "fields must be numeric codes"));
        }
        Ok(Self {
            sequence_type: sequence_type.to_string(),
            sequence_number: sequence_number.to_string(),
            source_type: source_type.to_string(),
            challenge_type: challenge_type.to_string(),
            challenge_level: challenge_level.to_string(),
        })
    }
}

/// A challenge type/level pair naming one dataset directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Challenge {
    pub challenge_type: String,
    /// `None` for the baseline condition.
    pub level: Option<String>,
}

impl Challenge {
    pub fn new(challenge_type: &str, level: Option<&str>) -> Self {
        Self {
            challenge_type: challenge_type.to_string(),
            level: level.map(str::to_string),
        }
    }

    /// Validate a type/level pair taken from a file name.
    pub fn from_codes(path: &Path, challenge_type: &str, level: &str) -> Result<Self, PrepError> {
        if !CHALLENGE_TYPES.contains(&challenge_type) {
            return Err(PrepError::config(
                path,
                format!("unsupported challenge type {}", challenge_type),
            ));
        }
        if challenge_type == BASELINE_CHALLENGE {
            return Ok(Self::new(challenge_type, None));
        }
        if !CHALLENGE_LEVELS.contains(&level) {
            return Err(PrepError::config(
                path,
                format!("challenge level {} is outside 01-05", level),
            ));
        }
        Ok(Self::new(challenge_type, Some(level)))
    }

    /// Every challenge directory of the dataset: the baseline plus 3x5 levels.
    pub fn all() -> Vec<Challenge> {
        CHALLENGE_TYPES
            .iter()
            .flat_map(|ct| {
                if *ct == BASELINE_CHALLENGE {
                    vec![Challenge::new(ct, None)]
                } else {
                    CHALLENGE_LEVELS
                        .iter()
                        .map(|level| Challenge::new(ct, Some(level)))
                        .collect()
                }
            })
            .collect()
    }

    pub fn relative_dir(&self) -> PathBuf {
        match &self.level {
            Some(level) => Path::new(&self.challenge_type).join(level),
            None => PathBuf::from(&self.challenge_type),
        }
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.level {
            Some(level) => write!(f, "{}>{}", self.challenge_type, level),
            None => f.write_str(&self.challenge_type),
        }
    }
}

/// One row of the tabular label summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub label_file: String,
    pub image_file: String,
    pub sequence: String,
    pub frame: String,
    pub sign: String,
    pub width: f64,
    pub height: f64,
    pub area: f64,
}

impl SummaryRow {
    pub fn key(&self) -> Option<FrameKey> {
        Some(FrameKey::new(parse_code(&self.sequence)?, parse_code(&self.frame)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
        }
    }
}

/// A single failed or skipped item of a stage.
#[derive(Debug, Clone, Serialize)]
pub struct ItemIssue {
    pub path: PathBuf,
    pub kind: String,
    pub message: String,
}

/// Outcome of one batch stage
#[derive(Debug, Default, Clone, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub processed: usize,
    pub skipped: Vec<ItemIssue>,
    pub failed: Vec<ItemIssue>,
}

impl StageReport {
    pub fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            ..Default::default()
        }
    }

    pub fn increment_processed(&mut self) {
        self.processed += 1;
    }

    pub fn skip(&mut self, path: impl Into<PathBuf>, reason: impl Into<String>) {
        self.skipped.push(ItemIssue {
            path: path.into(),
            kind: "skipped".to_string(),
            message: reason.into(),
        });
    }

    pub fn fail(&mut self, path: impl Into<PathBuf>, error: &PrepError) {
        let path = path.into();
        log::error!("{}: {}", path.display(), error);
        self.failed.push(ItemIssue {
            path,
            kind: error.kind().to_string(),
            message: error.to_string(),
        });
    }

    pub fn merge(&mut self, other: StageReport) {
        self.processed += other.processed;
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of failures of the given kind, e.g. `"data"`.
    pub fn failures_of(&self, kind: &str) -> usize {
        self.failed.iter().filter(|issue| issue.kind == kind).count()
    }

    pub fn print_summary(&self) {
        log::info!("=== {} summary ===", self.stage);
        log::info!("Processed: {}", self.processed);
        log::info!("Skipped: {}", self.skipped.len());
        log::info!("Failed: {}", self.failed.len());

        if !self.failed.is_empty() {
            let mut kinds: Vec<&str> = self.failed.iter().map(|i| i.kind.as_str()).collect();
            kinds.sort_unstable();
            kinds.dedup();
            for kind in kinds {
                log::warn!("  {} failure(s): {}", kind, self.failures_of(kind));
            }
        }
    }
}
