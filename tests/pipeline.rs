use image::RgbImage;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use curetsd2yolo::labels::{extract_labels, read_summary};
use curetsd2yolo::geometry::ImageDims;
use curetsd2yolo::{
    run_stages, write_reports, DatasetLayout, FrameSource, Result, SplitArgs, Stage, VideoBackend,
};

const HEADER: &str = "frameNumber_signType_llx_lly_lrx_lry_ulx_uly_urx_ury\n";

struct FakeSource {
    remaining: u32,
}

impl FrameSource for FakeSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(RgbImage::new(8, 6)))
    }
}

/// Every video decodes into four frames.
struct FakeBackend;

impl VideoBackend for FakeBackend {
    fn open(&self, _path: &Path) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(FakeSource { remaining: 4 }))
    }
}

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"raw").unwrap();
}

fn names_in(dir: &Path) -> BTreeSet<String> {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => BTreeSet::new(),
    }
}

fn setup_raw_dataset(root: &Path) {
    let data = root.join("data");
    touch(&data.join("01_01_00_00_00.mp4"));
    touch(&data.join("01_01_00_09_02.mp4"));
    // synthetic, unused challenge type, invalid level
    touch(&data.join("02_01_00_00_00.mp4"));
    touch(&data.join("01_01_00_05_01.mp4"));
    touch(&data.join("01_01_00_12_07.mp4"));

    let labels = root.join("labels");
    fs::create_dir_all(&labels).unwrap();
    fs::write(
        labels.join("01_01.txt"),
        format!(
            "{}001_06_100_300_200_300_100_150_200_150\n003_13_10_20_30_20_10_5_30_5\n003_99_10_20_30_20_10_5_30_5\n",
            HEADER
        ),
    )
    .unwrap();
    fs::write(labels.join("02_01.txt"), format!("{}001_01_1_2_3_2_1_1_3_1\n", HEADER)).unwrap();
}

#[test]
fn test_full_pipeline() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    setup_raw_dataset(root);
    let layout = DatasetLayout::new(root);

    let stages = Stage::all(SplitArgs {
        val_size: 0.5,
        seed: 7,
    });
    let (reports, aborted) = run_stages(&layout, &stages, Some(&FakeBackend));
    assert!(aborted.is_none());
    assert_eq!(reports.len(), 7);

    let reorganize = &reports[0];
    assert_eq!(reorganize.processed, 2);
    assert_eq!(reorganize.skipped.len(), 2);
    assert_eq!(reorganize.failures_of("config"), 1);
    assert!(root.join("data").join("01_01_00_12_07.mp4").exists());

    let frames = &reports[1];
    assert_eq!(frames.processed, 2);
    assert!(!root.join("00").join("01.mp4").exists());
    assert!(!root.join("09").join("02").join("01.mp4").exists());

    // synthetic labels removed, bad sign row reported
    assert!(!root.join("labels").join("02_01.txt").exists());
    assert_eq!(reports[3].failures_of("data"), 1);

    let summary = read_summary(&layout.summary_csv()).unwrap();
    assert_eq!(summary.len(), 2);
    assert_eq!(summary[0].sign, "stop");
    assert_eq!(summary[0].image_file, "01_001.jpg");
    assert_eq!(summary[1].sign, "yield");

    // every dataset directory, with or without images, sees the same split
    let mut seen_split: Option<(BTreeSet<String>, BTreeSet<String>)> = None;
    for dir in layout.dataset_dirs() {
        let labels = DatasetLayout::frame_labels_dir(&dir);
        assert!(names_in(&labels).is_empty(), "unsplit labels left in {}", labels.display());
        let train = names_in(&labels.join("train"));
        let val = names_in(&labels.join("val"));
        assert!(train.is_disjoint(&val));
        let all: BTreeSet<String> = train.union(&val).cloned().collect();
        assert_eq!(
            all,
            ["01_001.txt", "01_003.txt"].iter().map(|s| s.to_string()).collect()
        );
        match &seen_split {
            Some(expected) => assert_eq!(expected, &(train, val)),
            None => seen_split = Some((train, val)),
        }
        assert!(DatasetLayout::manifest_path(&dir).exists());
    }

    let images = DatasetLayout::images_dir(&root.join("00"));
    let train_images = names_in(&images.join("train"));
    let val_images = names_in(&images.join("val"));
    assert!(names_in(&images).is_empty());
    assert_eq!(train_images.len() + val_images.len(), 4);
    assert!(train_images.is_disjoint(&val_images));

    let (train_labels, _) = seen_split.unwrap();
    for label in &train_labels {
        let image = label.replace(".txt", ".jpg");
        assert!(train_images.contains(&image), "{} not in train", image);
    }

    // one csv row per labeled frame across both splits
    let train_rows = read_summary(&layout.labels_dir().join("train.csv")).unwrap();
    let val_rows = read_summary(&layout.labels_dir().join("val.csv")).unwrap();
    assert_eq!(train_rows.len() + val_rows.len(), 2);

    let report_path = root.join("report.json");
    write_reports(&report_path, &reports).unwrap();
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 7);
    assert_eq!(json[0]["stage"], "reorganize");
}

#[test]
fn test_extract_labels_keeps_previous_sequences() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = DatasetLayout::new(tmp.path());
    let labels = layout.labels_dir();
    fs::create_dir_all(&labels).unwrap();
    let dims = ImageDims::new(1628, 1236);

    fs::write(
        labels.join("01.txt"),
        format!("{}003_06_100_300_200_300_100_150_200_150\n", HEADER),
    )
    .unwrap();
    let report = extract_labels(&layout, dims).unwrap();
    assert_eq!(report.processed, 1);
    assert!(!labels.join("01.txt").exists());
    assert_eq!(
        fs::read_to_string(labels.join("01_003.txt")).unwrap(),
        "5 0.092138 0.182039 0.061425 0.121359\n"
    );

    fs::write(
        labels.join("02.txt"),
        format!("{}010_01_100_300_200_300_100_150_200_150\n", HEADER),
    )
    .unwrap();
    extract_labels(&layout, dims).unwrap();

    let rows = read_summary(&layout.summary_csv()).unwrap();
    let keys: Vec<(String, String)> = rows
        .iter()
        .map(|r| (r.sequence.clone(), r.frame.clone()))
        .collect();
    assert_eq!(
        keys,
        vec![
            ("01".to_string(), "003".to_string()),
            ("02".to_string(), "010".to_string())
        ]
    );
    assert_eq!(rows[1].sign, "speed_limit");
}

#[test]
fn test_missing_summary_aborts_split() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = DatasetLayout::new(tmp.path());
    let stages = [Stage::Split(SplitArgs::default()), Stage::Manifest];

    let (reports, aborted) = run_stages(&layout, &stages, Some(&FakeBackend));
    assert!(reports.is_empty());
    assert!(aborted.is_some());
    assert!(!PathBuf::from(tmp.path()).join("00").join("dataset.yaml").exists());
}
