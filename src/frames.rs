//! Video to frame extraction.

use image::RgbImage;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{FRAMES_PER_SEQUENCE, IMAGE_EXTENSION, VIDEO_EXTENSION};
use crate::error::{PrepError, Result};
use crate::layout::DatasetLayout;
use crate::types::StageReport;
use crate::utils::{create_progress_bar, list_files, stem_str};

/// A stream of decoded frames. Dropping it releases the decoder.
pub trait FrameSource {
    /// The next frame, or `None` once the video is exhausted.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

/// Opens videos for decoding.
pub trait VideoBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>>;
}

/// Backend compiled into this build.
#[cfg(feature = "opencv")]
pub fn default_backend() -> Result<Box<dyn VideoBackend>> {
    Ok(Box::new(opencv_backend::OpenCvBackend))
}

#[cfg(not(feature = "opencv"))]
pub fn default_backend() -> Result<Box<dyn VideoBackend>> {
    Err(PrepError::Backend(
        "built without video decoding, rebuild with `--features opencv`".to_string(),
    ))
}

/// Decode one video into `{images_dir}/{stem}_{frame:03}.jpg`, frames
/// counted from 1. Returns the number of frames written.
///
/// On error the frames written so far are removed again, so a failed
/// sequence leaves nothing behind for later stages to pick up.
pub fn extract_video(backend: &dyn VideoBackend, video: &Path, images_dir: &Path) -> Result<u32> {
    let stem = stem_str(video)
        .ok_or_else(|| PrepError::config(video, "file name is not valid UTF-8"))?
        .to_string();
    fs::create_dir_all(images_dir)?;

    let mut written = Vec::new();
    let outcome = backend
        .open(video)
        .and_then(|mut source| write_frames(&mut *source, &stem, images_dir, &mut written));
    if let Err(e) = outcome {
        discard_frames(&written);
        return Err(e);
    }

    if written.is_empty() {
        return Err(PrepError::decode(video, "video yielded no frames"));
    }
    Ok(written.len() as u32)
}

fn write_frames(
    source: &mut dyn FrameSource,
    stem: &str,
    images_dir: &Path,
    written: &mut Vec<PathBuf>,
) -> Result<()> {
    while let Some(frame) = source.next_frame()? {
        let frame_no = written.len() + 1;
        let dst = images_dir.join(format!("{}_{:03}.{}", stem, frame_no, IMAGE_EXTENSION));
        log::debug!("Saving image: {}", dst.display());
        written.push(dst.clone());
        frame.save(&dst)?;
    }
    Ok(())
}

fn discard_frames(written: &[PathBuf]) {
    for path in written.iter().filter(|p| p.exists()) {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove partial frame {}: {}", path.display(), e);
        }
    }
}

/// Videos in the dataset directories that still need decoding.
pub fn pending_videos(layout: &DatasetLayout) -> Vec<PathBuf> {
    layout
        .dataset_dirs()
        .iter()
        .flat_map(|dir| list_files(dir, VIDEO_EXTENSION))
        .collect()
}

/// Extract the frames of every video in every dataset directory.
///
/// A video is deleted only after all of its frames were written; videos that
/// fail to decode stay in place and are reported.
pub fn extract_frames(layout: &DatasetLayout, backend: &dyn VideoBackend) -> Result<StageReport> {
    let mut report = StageReport::new("frames");

    let videos = pending_videos(layout);
    info!("Found {} videos to decode.", videos.len());

    let pb = create_progress_bar(videos.len() as u64, "Frames");
    for video in &videos {
        let images_dir = match video.parent() {
            Some(dir) => DatasetLayout::images_dir(dir),
            None => {
                report.skip(video, "video has no parent directory");
                continue;
            }
        };
        match extract_video(backend, video, &images_dir) {
            Ok(count) => {
                if count != FRAMES_PER_SEQUENCE {
                    warn!(
                        "{} decoded into {} frames, expected {}",
                        video.display(),
                        count,
                        FRAMES_PER_SEQUENCE
                    );
                }
                match fs::remove_file(video) {
                    Ok(()) => report.increment_processed(),
                    Err(e) => report.fail(video, &PrepError::from(e)),
                }
            }
            Err(e) => report.fail(video, &e),
        }
        pb.inc(1);
    }
    pb.finish_with_message("Frame extraction complete");

    Ok(report)
}

#[cfg(feature = "opencv")]
mod opencv_backend {
    use super::*;
    use opencv::{
        core::{AlgorithmHint, Mat},
        imgproc,
        prelude::*,
        videoio::{self, VideoCapture},
    };

    pub struct OpenCvBackend;

    struct OpenCvSource {
        path: PathBuf,
        cap: VideoCapture,
    }

    fn cv_error(path: &Path, e: opencv::Error) -> PrepError {
        PrepError::decode(path, e.to_string())
    }

    impl VideoBackend for OpenCvBackend {
        fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
            let name = path
                .to_str()
                .ok_or_else(|| PrepError::config(path, "path is not valid UTF-8"))?;
            let cap = VideoCapture::from_file(name, videoio::CAP_ANY).map_err(|e| cv_error(path, e))?;
            if !cap.is_opened().map_err(|e| cv_error(path, e))? {
                return Err(PrepError::decode(path, "failed to open video file"));
            }
            Ok(Box::new(OpenCvSource {
                path: path.to_path_buf(),
                cap,
            }))
        }
    }

    impl FrameSource for OpenCvSource {
        fn next_frame(&mut self) -> Result<Option<RgbImage>> {
            let mut mat = Mat::default();
            let grabbed = self.cap.read(&mut mat).map_err(|e| cv_error(&self.path, e))?;
            if !grabbed || mat.empty() {
                return Ok(None);
            }

            // Convert BGR to RGB
            let mut rgb = Mat::default();
            imgproc::cvt_color(
                &mat,
                &mut rgb,
                imgproc::COLOR_BGR2RGB,
                0,
                AlgorithmHint::ALGO_HINT_DEFAULT,
            )
            .map_err(|e| cv_error(&self.path, e))?;

            let width = rgb.cols() as u32;
            let height = rgb.rows() as u32;
            let data = rgb.data_bytes().map_err(|e| cv_error(&self.path, e))?.to_vec();
            RgbImage::from_raw(width, height, data)
                .map(Some)
                .ok_or_else(|| PrepError::decode(&self.path, "frame buffer has unexpected size"))
        }
    }

    impl Drop for OpenCvSource {
        fn drop(&mut self) {
            let _ = self.cap.release();
        }
    }
}
