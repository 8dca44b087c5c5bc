//! Draw the labels of one frame onto its image for manual inspection.

use ab_glyph::{FontVec, PxScale};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut};
use log::info;
use std::fs;
use std::path::Path;

use crate::config::{sign_name, VisualizeArgs};
use crate::error::{PrepError, Result};
use crate::geometry::{polys_norm_to_abs, sort_vertices, to_vertices, Direction, ImageDims, NormBox};

pub const OUTLINE_COLOR: Rgb<u8> = Rgb([0, 180, 0]);
const LABEL_FONT_PX: f32 = 28.0;

/// A row of a YOLO label file.
#[derive(Debug, Clone, PartialEq)]
pub struct YoloLabel {
    pub class: usize,
    pub bbox: NormBox,
}

pub fn parse_yolo_labels(path: &Path, content: &str) -> Result<Vec<YoloLabel>> {
    let mut labels = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let data_error = |reason: &str| PrepError::Data {
            path: path.to_path_buf(),
            line: idx + 1,
            reason: reason.to_string(),
        };
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(data_error("expected `class x_center y_center width height`"));
        }
        let class = fields[0].parse().map_err(|_| data_error("invalid class"))?;
        let mut values = [0f64; 4];
        for (slot, field) in values.iter_mut().zip(&fields[1..]) {
            *slot = field.parse().map_err(|_| data_error("invalid coordinate"))?;
        }
        labels.push(YoloLabel {
            class,
            bbox: NormBox {
                x_center: values[0],
                y_center: values[1],
                width: values[2],
                height: values[3],
            },
        });
    }
    Ok(labels)
}

/// Absolute polygons of the labels, vertices sorted clockwise from the
/// top-left one.
pub fn label_polygons(labels: &[YoloLabel], dims: ImageDims) -> Vec<Vec<[f64; 2]>> {
    let norm: Vec<Vec<f64>> = labels.iter().map(|l| l.bbox.to_corner_poly()).collect();
    polys_norm_to_abs(&norm, dims)
        .iter()
        .map(|poly| sort_vertices(&to_vertices(poly), Direction::Clockwise))
        .collect()
}

/// Draw closed polygons, and their labels when a font is given.
pub fn draw_polygons(
    img: &mut RgbImage,
    polys: &[Vec<[f64; 2]>],
    thickness: u32,
    color: Rgb<u8>,
    labels: &[String],
    font: Option<&FontVec>,
) {
    let half = (thickness.max(1) as i32 - 1) / 2;
    let extra = (thickness.max(1) as i32 - 1) - half;

    for (i, poly) in polys.iter().enumerate() {
        if poly.is_empty() {
            continue;
        }
        for (j, a) in poly.iter().enumerate() {
            let b = poly[(j + 1) % poly.len()];
            for dx in -half..=extra {
                for dy in -half..=extra {
                    draw_line_segment_mut(
                        img,
                        (a[0] as f32 + dx as f32, a[1] as f32 + dy as f32),
                        (b[0] as f32 + dx as f32, b[1] as f32 + dy as f32),
                        color,
                    );
                }
            }
        }

        if let (Some(font), Some(label)) = (font, labels.get(i)) {
            let x = poly[0][0] as i32;
            let y = (poly[0][1] as i32 - LABEL_FONT_PX as i32 - 3).max(0);
            draw_text_mut(img, color, x, y, PxScale::from(LABEL_FONT_PX), font, label);
        }
    }
}

fn scale_by(img: &RgbImage, factor: f64) -> RgbImage {
    let width = ((img.width() as f64 * factor).round() as u32).max(1);
    let height = ((img.height() as f64 * factor).round() as u32).max(1);
    // smooth when shrinking, cubic when enlarging
    let filter = if factor < 1.0 {
        FilterType::Triangle
    } else {
        FilterType::CatmullRom
    };
    imageops::resize(img, width, height, filter)
}

/// Resize keeping the aspect ratio so the longest edge is `length` pixels,
/// with the scale factor clamped to `[min_factor, max_factor]`.
pub fn resize_longest_edge(img: &RgbImage, length: u32, min_factor: f64, max_factor: f64) -> RgbImage {
    let longest = img.width().max(img.height()).max(1);
    let factor = (length as f64 / longest as f64).min(max_factor).max(min_factor);
    scale_by(img, factor)
}

/// Resize keeping the aspect ratio so the area is close to `area` pixels,
/// with the scale factor clamped to `[min_factor, max_factor]`.
pub fn resize_to_area(img: &RgbImage, area: u64, min_factor: f64, max_factor: f64) -> RgbImage {
    let original = (img.width() as u64 * img.height() as u64).max(1);
    let factor = (area as f64 / original as f64).sqrt().min(max_factor).max(min_factor);
    scale_by(img, factor)
}

pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = fs::read(path)?;
    FontVec::try_from_vec(bytes).map_err(|e| PrepError::config(path, e.to_string()))
}

/// Render one frame with its labels and write the result to `args.output`.
pub fn visualize(args: &VisualizeArgs) -> Result<()> {
    let mut img = image::open(&args.image)?.to_rgb8();
    info!(
        "Image shape: {}H x {}W x 3C",
        img.height(),
        img.width()
    );

    let content = fs::read_to_string(&args.labels)?;
    let labels = parse_yolo_labels(&args.labels, &content)?;
    let polys = label_polygons(&labels, ImageDims::new(img.width(), img.height()));
    let names: Vec<String> = labels
        .iter()
        .map(|l| match sign_name(l.class) {
            Some(name) => format!("{}-{}", l.class, name),
            None => l.class.to_string(),
        })
        .collect();

    let font = args.font.as_deref().map(load_font).transpose()?;
    if font.is_none() {
        log::warn!("No font given, drawing outlines without labels");
    }
    draw_polygons(&mut img, &polys, args.thickness, OUTLINE_COLOR, &names, font.as_ref());

    let img = match args.max_edge {
        Some(length) => resize_longest_edge(&img, length, 0.0, 1.0),
        None => img,
    };
    img.save(&args.output)?;
    info!("Wrote {}", args.output.display());
    Ok(())
}
