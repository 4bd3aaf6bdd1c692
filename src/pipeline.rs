use crate::bounds::estimate_scene_bounds;
use crate::client::{AddObjectRequest, SceneClient};
use crate::config::CaptureConfig;
use crate::error::SceneClientError;
use crate::planner::{create_strategic_cameras, plan_strategic_cameras};
use crate::task::TaskDescription;
use crate::variants::VariantGenerator;
use crate::writer::{camera_short_name, CameraCapture, RecordWriter, RunSummary, VariantRecord};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

/// Top-level control loop: generate variants, then for each variant reset
/// the scene, populate objects, plan cameras, capture, and persist records.
///
/// One client connection serves the whole run and all remote calls are
/// issued strictly one at a time. Failures are contained per object and per
/// camera; only connection/initialization loss and reset failure abort the
/// run.
pub struct CapturePipeline {
    client: Box<dyn SceneClient>,
    generator: Box<dyn VariantGenerator>,
    config: CaptureConfig,
    writer: RecordWriter,
    task: TaskDescription,
    task_json_path: PathBuf,
    num_variants: usize,
}

impl CapturePipeline {
    pub fn new(
        client: Box<dyn SceneClient>,
        generator: Box<dyn VariantGenerator>,
        config: CaptureConfig,
        task: TaskDescription,
        task_json_path: PathBuf,
        output_dir: &Path,
        num_variants: usize,
    ) -> Result<Self> {
        let writer = RecordWriter::new(output_dir, &task.task)?;
        Ok(Self {
            client,
            generator,
            config,
            writer,
            task,
            task_json_path,
            num_variants,
        })
    }

    /// Run to completion. The remote session is torn down best-effort on
    /// every exit path; teardown failures are logged, never raised.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let result = self.run_inner().await;
        self.client.shutdown().await;
        result
    }

    async fn run_inner(&mut self) -> Result<RunSummary> {
        let task_name = self.task.task.clone();
        let robot_cfg = self.task.robot.robot_cfg.clone();
        let robot_usd = robot_cfg.replace(".json", ".usd");
        let scene_usd = self.task.scene.scene_usd.clone();
        let init_position = self.task.robot.robot_init_pose.position();
        let init_quaternion = self.task.robot.robot_init_pose.quaternion();

        info!("Task: {task_name}");
        info!("Robot config: {robot_cfg}");
        info!("Scene USD: {scene_usd}");
        info!("Robot position: {init_position:?}, rotation: {init_quaternion:?}");

        info!("Initializing robot and scene...");
        self.client
            .init_robot(&robot_cfg, &robot_usd, &scene_usd, init_position, init_quaternion)
            .await
            .context("robot/scene initialization failed")?;
        settle(self.config.waits.post_init_secs).await;

        // Scratch directory for materialized variant descriptions; removed
        // when this scope unwinds, on success or error.
        let scratch = tempfile::tempdir().context("failed to create variant scratch directory")?;
        let variants = self
            .generator
            .generate(&self.task, self.num_variants, scratch.path())
            .await?;
        if variants.is_empty() {
            bail!("no variants were generated for task '{task_name}'");
        }
        if variants.len() < self.num_variants {
            warn!(
                "Generator produced {} of {} requested variants",
                variants.len(),
                self.num_variants
            );
        }

        let mut all_variants = BTreeMap::new();
        for (index, variant) in variants.iter().enumerate() {
            info!("--- Processing variant {}/{} ---", index + 1, variants.len());
            match self.capture_variant(index, variant).await {
                Ok(record) => {
                    all_variants.insert(format!("variant_{index}"), record.cameras);
                }
                Err(e) => {
                    if is_fatal(&e) {
                        return Err(e.context(format!("run aborted during variant {index}")));
                    }
                    error!("Variant {index} failed, continuing with next: {e:#}");
                }
            }
        }

        let summary = RunSummary {
            task_name: task_name.clone(),
            task_json_path: self.task_json_path.display().to_string(),
            num_variants: variants.len(),
            robot_config: robot_cfg,
            scene_usd,
            robot_init_position: init_position,
            robot_init_quaternion: init_quaternion,
            variants: all_variants,
            capture_time: Utc::now(),
        };
        let summary_path = self.writer.write_summary(&summary)?;

        info!("Task variant capture completed: {task_name}");
        info!("Variants captured: {}", summary.num_variants);
        info!("Images saved to: {}", self.writer.task_dir().display());
        info!("Summary saved to: {}", summary_path.display());
        Ok(summary)
    }

    async fn capture_variant(
        &mut self,
        variant_index: usize,
        variant: &TaskDescription,
    ) -> Result<VariantRecord> {
        // Reset failure is fatal to the whole run
        self.client.reset().await?;
        settle(self.config.waits.post_reset_secs).await;

        let objects_added = self.populate_scene(variant).await?;
        settle(self.config.waits.settle_secs).await;

        let bounds = estimate_scene_bounds(self.client.as_mut(), &objects_added).await;
        let planned = plan_strategic_cameras(&bounds, self.config.strategic.resolution);
        let strategic = create_strategic_cameras(self.client.as_mut(), &planned).await?;

        let mut all_cameras = variant.camera_list();
        all_cameras.extend(strategic);
        info!("Capturing from {} cameras", all_cameras.len());

        let mut cameras = BTreeMap::new();
        for prim_path in &all_cameras {
            if let Some((short_name, capture)) = self.capture_camera(variant_index, prim_path).await? {
                cameras.insert(short_name, capture);
            }
        }

        let record = VariantRecord {
            variant_index,
            objects_added,
            cameras,
            variant_config: variant.clone(),
            capture_time: Utc::now(),
        };
        self.writer.write_variant_record(&record)?;
        info!(
            "Variant {variant_index} captured: {} objects, {} cameras",
            record.objects_added.len(),
            record.cameras.len()
        );
        Ok(record)
    }

    /// Place every non-sentinel object; a failed placement drops only that
    /// object.
    async fn populate_scene(&mut self, variant: &TaskDescription) -> Result<Vec<String>> {
        let mut objects_added = Vec::new();
        for placement in variant.objects.iter().filter(|o| !o.is_fixed()) {
            let request =
                AddObjectRequest::from_placement(placement, &self.config.placement.material);
            match self.client.add_object(&request).await {
                Ok(()) => objects_added.push(placement.object_id.clone()),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => warn!("Failed to add object {}: {e}", placement.object_id),
            }
        }
        info!("Added {} objects to scene", objects_added.len());
        Ok(objects_added)
    }

    /// Capture one camera and persist its images. Returns `Ok(None)` when
    /// the camera yields nothing usable; only fatal client errors propagate.
    async fn capture_camera(
        &mut self,
        variant_index: usize,
        prim_path: &str,
    ) -> Result<Option<(String, CameraCapture)>> {
        let result = match self.client.capture_frame(prim_path).await {
            Ok(result) => result,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!("Capture failed for {prim_path}: {e}");
                return Ok(None);
            }
        };

        let short_name = camera_short_name(prim_path);
        let Some(color) = result.color else {
            warn!("No color buffer from {prim_path}, skipping");
            return Ok(None);
        };

        let rgb_path = match self
            .writer
            .write_color_image(variant_index, &short_name, &color, &result.intrinsics)
        {
            Ok(path) => path,
            Err(e) => {
                warn!("Could not write color image for {prim_path}: {e:#}");
                return Ok(None);
            }
        };

        let depth_path = match result.depth {
            Some(depth) => match self.writer.write_depth_image(
                variant_index,
                &short_name,
                &depth,
                &result.intrinsics,
            ) {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Could not write depth image for {prim_path}: {e:#}");
                    None
                }
            },
            None => None,
        };

        Ok(Some((
            short_name,
            CameraCapture {
                rgb_path,
                depth_path,
                camera_info: result.intrinsics,
                prim_path: prim_path.to_string(),
            },
        )))
    }
}

fn is_fatal(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<SceneClientError>()
        .map(SceneClientError::is_fatal)
        .unwrap_or(false)
}

async fn settle(seconds: f64) {
    if seconds > 0.0 {
        tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
    }
}
