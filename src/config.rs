use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

/// Fixed frame size of every CURE-TSD video.
pub const IMAGE_WIDTH: u32 = 1628;
pub const IMAGE_HEIGHT: u32 = 1236;

/// Number of frames each sequence is expected to decode into.
pub const FRAMES_PER_SEQUENCE: u32 = 300;

/// Sequence type code of real (not synthesized) recordings.
pub const REAL_SEQUENCE_TYPE: &str = "01";

/// Challenge type without any applied condition; it has no level directories.
pub const BASELINE_CHALLENGE: &str = "00";

// {"00": "No-challenge", "09": "Rain", "11": "Snow", "12": "Haze"}
pub const CHALLENGE_TYPES: &[&str] = &["00", "09", "11", "12"];
pub const CHALLENGE_LEVELS: &[&str] = &["01", "02", "03", "04", "05"];

/// Sign names indexed by zero-based class number (raw sign code minus one).
pub const SIGN_NAMES: &[&str] = &[
    "speed_limit",
    "goods_vehicles",
    "no_overtaking",
    "no_stopping",
    "no_parking",
    "stop",
    "bicycle",
    "hump",
    "no_left",
    "no_right",
    "priority_to",
    "no_entry",
    "yield",
    "parking",
];

pub const VIDEO_EXTENSION: &str = "mp4";
pub const IMAGE_EXTENSION: &str = "jpg";
pub const LABEL_EXTENSION: &str = "txt";

pub const SUMMARY_FILE: &str = "labels.csv";
pub const TRAIN_FILE: &str = "train.csv";
pub const VAL_FILE: &str = "val.csv";
pub const MANIFEST_FILE: &str = "dataset.yaml";

/// Prepare the CURE-TSD video dataset for YOLO training.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// Root directory of the dataset
    #[arg(short = 'r', long = "root", default_value = "CURE-TSD")]
    pub root: PathBuf,

    /// Write the stage report(s) as JSON to this file
    #[arg(long = "report_json")]
    pub report_json: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Move raw videos into challenge type/level directories
    Reorganize,
    /// Decode every video into one JPEG per frame
    Frames,
    /// Strip the sequence type prefix from label files
    RenameLabels,
    /// Convert sequence label files into per-frame YOLO label files
    ExtractLabels,
    /// Copy the per-frame label files into every dataset directory
    ReplicateLabels,
    /// Split frames into train and validation sets
    Split(SplitArgs),
    /// Write dataset.yaml into every dataset directory
    Manifest,
    /// Print label statistics
    Analyze,
    /// Draw the labels of one frame onto its image
    Visualize(VisualizeArgs),
    /// Run every preparation stage in order
    All(SplitArgs),
}

#[derive(clap::Args, Debug, Clone, Copy, PartialEq)]
pub struct SplitArgs {
    /// Proportion of frames to use for validation
    #[arg(long = "val_size", default_value_t = 0.2, value_parser = validate_size)]
    pub val_size: f32,

    /// Seed for random shuffling
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,
}

impl Default for SplitArgs {
    fn default() -> Self {
        Self {
            val_size: 0.2,
            seed: 42,
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct VisualizeArgs {
    /// Image to draw on
    #[arg(long = "image")]
    pub image: PathBuf,

    /// YOLO label file of the image
    #[arg(long = "labels")]
    pub labels: PathBuf,

    /// Where to write the annotated image
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// TrueType font used for class labels; labels are omitted without it
    #[arg(long = "font")]
    pub font: Option<PathBuf>,

    /// Outline thickness in pixels
    #[arg(long = "thickness", default_value_t = 3)]
    pub thickness: u32,

    /// Resize the output so its longest edge has this many pixels
    #[arg(long = "max_edge")]
    pub max_edge: Option<u32>,
}

// Validate that the size is between 0.0 and 1.0
pub fn validate_size(s: &str) -> Result<f32, String> {
    match f32::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("SIZE must be between 0.0 and 1.0".to_string()),
    }
}

/// Name of a zero-based class, e.g. `stop` for class 5.
pub fn sign_name(class: usize) -> Option<&'static str> {
    SIGN_NAMES.get(class).copied()
}
