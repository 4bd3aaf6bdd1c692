use crate::client::CameraIntrinsics;
use crate::task::TaskDescription;
use anyhow::{anyhow, ensure, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Map a camera scene-graph path (or strategic camera name) to the stable
/// short name used for output files.
pub fn camera_short_name(prim_path: &str) -> String {
    if prim_path.contains("Head_Camera") {
        "head".to_string()
    } else if prim_path.contains("Right_Camera") {
        "hand_right".to_string()
    } else if prim_path.contains("Left_Camera") {
        "hand_left".to_string()
    } else if prim_path.contains("FrontFisheye") {
        "front_fisheye".to_string()
    } else if prim_path.contains("Overview") {
        "overview".to_string()
    } else if prim_path.contains("TopDown") {
        "top_down".to_string()
    } else if prim_path.contains("SideView") {
        "side_view".to_string()
    } else {
        prim_path
            .rsplit('/')
            .next()
            .unwrap_or(prim_path)
            .to_lowercase()
    }
}

/// On-disk pointers and intrinsics for one captured camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraCapture {
    pub rgb_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_path: Option<PathBuf>,
    pub camera_info: CameraIntrinsics,
    pub prim_path: String,
}

/// Per-variant metadata, finalized once after all cameras for the variant
/// have been attempted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantRecord {
    pub variant_index: usize,
    pub objects_added: Vec<String>,
    pub cameras: BTreeMap<String, CameraCapture>,
    pub variant_config: TaskDescription,
    pub capture_time: DateTime<Utc>,
}

/// Run-level aggregate written once at the end of a run. `num_variants` is
/// the count actually captured, which may be fewer than requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub task_name: String,
    pub task_json_path: String,
    pub num_variants: usize,
    pub robot_config: String,
    pub scene_usd: String,
    pub robot_init_position: [f64; 3],
    pub robot_init_quaternion: [f64; 4],
    pub variants: BTreeMap<String, BTreeMap<String, CameraCapture>>,
    pub capture_time: DateTime<Utc>,
}

/// Writes images and metadata under `<output_dir>/<task_name>/`.
pub struct RecordWriter {
    task_dir: PathBuf,
}

impl RecordWriter {
    pub fn new(output_dir: &Path, task_name: &str) -> Result<Self> {
        let task_dir = output_dir.join(task_name);
        fs::create_dir_all(&task_dir)
            .with_context(|| format!("failed to create output directory {}", task_dir.display()))?;
        Ok(Self { task_dir })
    }

    pub fn task_dir(&self) -> &Path {
        &self.task_dir
    }

    pub fn variant_dir(&self, variant_index: usize) -> PathBuf {
        self.task_dir.join(format!("variant_{variant_index}"))
    }

    /// Reinterpret raw interleaved RGBA bytes, drop alpha, encode as JPEG.
    pub fn write_color_image(
        &self,
        variant_index: usize,
        short_name: &str,
        raw_rgba: &[u8],
        intrinsics: &CameraIntrinsics,
    ) -> Result<PathBuf> {
        let (width, height) = (intrinsics.width, intrinsics.height);
        let expected = width as usize * height as usize * 4;
        ensure!(
            raw_rgba.len() == expected,
            "color buffer for {short_name} is {} bytes, expected {expected} ({width}x{height} RGBA)",
            raw_rgba.len()
        );

        let mut rgb = image::RgbImage::new(width, height);
        for (pixel, rgba) in rgb.pixels_mut().zip(raw_rgba.chunks_exact(4)) {
            *pixel = image::Rgb([rgba[0], rgba[1], rgba[2]]);
        }

        let dir = self.variant_dir(variant_index);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{short_name}.jpg"));
        rgb.save(&path)
            .with_context(|| format!("failed to encode {}", path.display()))?;
        debug!("Saved RGB image: {}", path.display());
        Ok(path)
    }

    /// Reinterpret raw little-endian f32 meters, truncate to u16 millimeters,
    /// encode as lossless 16-bit PNG.
    pub fn write_depth_image(
        &self,
        variant_index: usize,
        short_name: &str,
        raw_f32: &[u8],
        intrinsics: &CameraIntrinsics,
    ) -> Result<PathBuf> {
        let (width, height) = (intrinsics.width, intrinsics.height);
        let expected = width as usize * height as usize * 4;
        ensure!(
            raw_f32.len() == expected,
            "depth buffer for {short_name} is {} bytes, expected {expected} ({width}x{height} f32)",
            raw_f32.len()
        );

        let millimeters: Vec<u16> = raw_f32
            .chunks_exact(4)
            .map(|b| {
                let meters = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                (meters * 1000.0) as u16
            })
            .collect();
        let depth: image::ImageBuffer<image::Luma<u16>, Vec<u16>> =
            image::ImageBuffer::from_raw(width, height, millimeters)
                .ok_or_else(|| anyhow!("depth buffer dimensions mismatch for {short_name}"))?;

        let dir = self.variant_dir(variant_index);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{short_name}_depth.png"));
        depth
            .save(&path)
            .with_context(|| format!("failed to encode {}", path.display()))?;
        debug!("Saved depth image: {}", path.display());
        Ok(path)
    }

    /// Finalize one variant's metadata. Flushed to disk before the next
    /// variant begins, so a fatal error later leaves this record readable.
    pub fn write_variant_record(&self, record: &VariantRecord) -> Result<PathBuf> {
        let dir = self.variant_dir(record.variant_index);
        fs::create_dir_all(&dir)?;
        let path = dir.join("variant_metadata.json");
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn write_summary(&self, summary: &RunSummary) -> Result<PathBuf> {
        let path = self.task_dir.join("capture_summary.json");
        let json = serde_json::to_string_pretty(summary)?;
        fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// Reload a previously written variant record.
pub fn load_variant_record(path: &Path) -> Result<VariantRecord> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(serde_json::from_str(&content)?)
}
