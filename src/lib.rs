//! CURE-TSD to YOLO dataset preparation
//!
//! This library turns the CURE-TSD traffic-sign video dataset into per-frame
//! images and YOLO label files, organized by challenge type and level and
//! split into train and validation sets.

pub mod analyze;
pub mod config;
pub mod error;
pub mod frames;
pub mod geometry;
pub mod labels;
pub mod layout;
pub mod manifest;
pub mod pipeline;
pub mod reorganize;
pub mod split;
pub mod types;
pub mod utils;
pub mod visualize;

// Re-export commonly used types and functions
pub use config::{Args, Command, SplitArgs, VisualizeArgs};
pub use error::{PrepError, Result};
pub use frames::{default_backend, FrameSource, VideoBackend};
pub use layout::DatasetLayout;
pub use pipeline::{run_stage, run_stages, write_reports, Stage};
pub use split::SplitPolicy;
pub use types::{Challenge, FrameKey, Split, StageReport, SummaryRow};
