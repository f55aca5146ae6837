#![allow(dead_code)]

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::tiff::TiffEncoder;
use image::{ExtendedColorType, ImageEncoder};
use serde_json::{Map, Value, json};
use tempfile::TempDir;

pub const WIDTH: u32 = 5;
pub const HEIGHT: u32 = 3;

pub fn init_logging() {
    env_logger::try_init().ok();
}

/// Pixel value at (y, x) of the plane at (p, t, c, z).
pub fn pixel(p: u64, t: u64, c: u64, z: u64, y: u32, x: u32) -> u16 {
    (p * 10000 + t * 1000 + c * 100 + z * 10) as u16 + (y * WIDTH + x) as u16
}

pub fn write_plane(path: &Path, p: u64, t: u64, c: u64, z: u64) {
    let mut bytes = Vec::with_capacity((WIDTH * HEIGHT * 2) as usize);
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            bytes.extend_from_slice(&pixel(p, t, c, z, y, x).to_ne_bytes());
        }
    }
    encode_tiff(path, &bytes, ExtendedColorType::L16);
}

/// An 8-bit plane holding `values` in row-major order.
pub fn write_plane_u8(path: &Path, values: &[u8]) {
    assert_eq!(values.len(), (WIDTH * HEIGHT) as usize);
    encode_tiff(path, values, ExtendedColorType::L8);
}

fn encode_tiff(path: &Path, bytes: &[u8], color: ExtendedColorType) {
    let writer = BufWriter::new(File::create(path).expect("create plane file"));
    TiffEncoder::new(writer)
        .write_image(bytes, WIDTH, HEIGHT, color)
        .expect("encode plane");
}

/// File name of a plane written with `FrameKey-*` entries, relative to its position dir.
pub fn frame_key_file_name(t: u64, c: u64, z: u64) -> String {
    format!("img_{t:09}_ch{c}_{z:03}.tif")
}

pub fn write_metadata(dir: &Path, document: &Value) {
    std::fs::write(
        dir.join("metadata.txt"),
        serde_json::to_vec_pretty(document).expect("serialize metadata"),
    )
    .expect("write metadata");
}

/// Planes actually recorded: `frames` may fall short of what the summary declares.
#[derive(Debug, Clone, Copy)]
pub struct Acquisition {
    pub positions: u64,
    pub frames: u64,
    pub channels: u64,
    pub slices: u64,
    pub declared_frames: u64,
}

impl Acquisition {
    pub fn new(positions: u64, frames: u64, channels: u64, slices: u64) -> Self {
        Self {
            positions,
            frames,
            channels,
            slices,
            declared_frames: frames,
        }
    }

    pub fn declaring_frames(mut self, declared_frames: u64) -> Self {
        self.declared_frames = declared_frames;
        self
    }

    fn planes(&self, p: u64) -> impl Iterator<Item = (u64, u64, u64, u64)> + '_ {
        (0..self.frames).flat_map(move |t| {
            (0..self.channels)
                .flat_map(move |c| (0..self.slices).map(move |z| (p, t, c, z)))
        })
    }

    fn summary(&self, version: &str) -> Map<String, Value> {
        let mut summary = Map::new();
        summary.insert("MicroManagerVersion".into(), version.into());
        summary.insert("Width".into(), WIDTH.into());
        summary.insert("Height".into(), HEIGHT.into());
        summary.insert("Frames".into(), self.declared_frames.into());
        summary.insert("Channels".into(), self.channels.into());
        summary.insert("Slices".into(), self.slices.into());
        summary.insert("z-step_um".into(), json!(0.5));
        summary.insert(
            "ChNames".into(),
            (0..self.channels).map(|c| format!("ch{c}")).collect::<Vec<_>>().into(),
        );
        summary
    }

    /// Micro-Manager 1.4.22: `FrameKey-t-c-z` entries with bare file names.
    pub fn write_legacy(&self, root: &Path) {
        self.write_frame_keys(root, "1.4.22", None);
    }

    /// Micro-Manager 2.0 gamma with `FrameKey-t-c-z` entries, where the
    /// plane size is only given by each entry's `x-y-width-height` ROI.
    pub fn write_gamma_frame_keys(&self, root: &Path) {
        let roi = format!("0-0-{WIDTH}-{HEIGHT}");
        self.write_frame_keys(root, "2.0.0-gamma1", Some(&roi));
    }

    fn write_frame_keys(&self, root: &Path, version: &str, roi: Option<&str>) {
        for p in 0..self.positions {
            let dir = root.join(format!("Pos{p}"));
            std::fs::create_dir_all(&dir).expect("create position dir");
            let mut doc = Map::new();
            doc.insert("Summary".into(), Value::Object(self.summary(version)));
            for (p, t, c, z) in self.planes(p) {
                let file_name = frame_key_file_name(t, c, z);
                write_plane(&dir.join(&file_name), p, t, c, z);
                let mut entry = json!({
                    "ChannelIndex": c,
                    "PositionIndex": p,
                    "FrameIndex": t,
                    "SliceIndex": z,
                    "FileName": file_name,
                });
                if let Some(roi) = roi {
                    entry["ROI"] = roi.into();
                }
                doc.insert(format!("FrameKey-{t}-{c}-{z}"), entry);
            }
            write_metadata(&dir, &Value::Object(doc));
        }
    }

    /// Micro-Manager 2.0 gamma: paired `Coords-*` / `Metadata-*` entries,
    /// with file names relative to the acquisition root.
    pub fn write_gamma(&self, root: &Path) {
        self.write_paired(root, "2.0.0-gamma1", |doc| doc);
    }

    /// Micro-Manager 2.0 beta: size under `UserData` as strings, no axis counts.
    pub fn write_beta(&self, root: &Path) {
        self.write_paired(root, "2.0.0-beta3", |mut summary| {
            for key in ["Width", "Height", "Frames", "Channels", "Slices"] {
                summary.shift_remove(key);
            }
            summary.insert(
                "UserData".into(),
                json!({
                    "Width": {"PropVal": WIDTH.to_string()},
                    "Height": {"PropVal": HEIGHT.to_string()},
                }),
            );
            summary.insert("StartTime".into(), "2021-02-03 10:00:00".into());
            summary
        });
    }

    fn write_paired(
        &self,
        root: &Path,
        version: &str,
        edit_summary: impl Fn(Map<String, Value>) -> Map<String, Value>,
    ) {
        for p in 0..self.positions {
            let name = format!("Pos{p}");
            let dir = root.join(&name);
            std::fs::create_dir_all(&dir).expect("create position dir");
            let mut doc = Map::new();
            doc.insert(
                "Summary".into(),
                Value::Object(edit_summary(self.summary(version))),
            );
            for (p, t, c, z) in self.planes(p) {
                let plane = format!(
                    "{name}/img_channel{c:03}_position{p:03}_time{t:09}_z{z:03}.tif"
                );
                write_plane(&root.join(&plane), p, t, c, z);
                doc.insert(
                    format!("Coords-{plane}"),
                    json!({
                        "ChannelIndex": c,
                        "PositionIndex": p,
                        "FrameIndex": t,
                        "SliceIndex": z,
                    }),
                );
                doc.insert(
                    format!("Metadata-{plane}"),
                    json!({
                        "Width": WIDTH,
                        "Height": HEIGHT,
                        "FileName": plane,
                    }),
                );
            }
            write_metadata(&dir, &Value::Object(doc));
        }
    }
}

pub fn tempdir() -> TempDir {
    init_logging();
    tempfile::tempdir().expect("create temp dir")
}
