use crate::task::TaskDescription;
use anyhow::Result;
use async_trait::async_trait;
use nalgebra::{Quaternion, UnitQuaternion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use tracing::{info, warn};

/// Produces up to `count` structurally varied task descriptions from a base
/// task. The result is materialized: each variant is also written to
/// `dest_dir/variant_{i}.json` so later stages can address it by stable
/// index. Implementations may legitimately return fewer than `count`
/// variants; callers must use the actual length.
#[async_trait]
pub trait VariantGenerator: Send {
    async fn generate(
        &mut self,
        base: &TaskDescription,
        count: usize,
        dest_dir: &Path,
    ) -> Result<Vec<TaskDescription>>;
}

/// Built-in generator that perturbs every non-sentinel object's planar
/// position and yaw. Layout feasibility is not checked here; that is the
/// concern of whatever produced the base task.
pub struct PoseJitterGenerator {
    position_jitter: f64,
    yaw_jitter_rad: f64,
    rng: StdRng,
}

impl PoseJitterGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            position_jitter: 0.1,
            yaw_jitter_rad: 30.0_f64.to_radians(),
            rng: seed.map(StdRng::seed_from_u64).unwrap_or_else(StdRng::from_entropy),
        }
    }

    fn jitter(&mut self, base: &TaskDescription) -> TaskDescription {
        let mut variant = base.clone();
        for object in variant.objects.iter_mut().filter(|o| !o.is_fixed()) {
            object.position[0] +=
                self.rng.gen_range(-self.position_jitter..=self.position_jitter);
            object.position[1] +=
                self.rng.gen_range(-self.position_jitter..=self.position_jitter);

            let yaw = self.rng.gen_range(-self.yaw_jitter_rad..=self.yaw_jitter_rad);
            let [w, x, y, z] = object.quaternion;
            let current = UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z));
            let spun = UnitQuaternion::from_euler_angles(0.0, 0.0, yaw) * current;
            let q = spun.quaternion();
            object.quaternion = [q.w, q.i, q.j, q.k];
        }
        variant
    }
}

#[async_trait]
impl VariantGenerator for PoseJitterGenerator {
    async fn generate(
        &mut self,
        base: &TaskDescription,
        count: usize,
        dest_dir: &Path,
    ) -> Result<Vec<TaskDescription>> {
        info!("Generating {count} task variants");
        let mut variants = Vec::with_capacity(count);

        for index in 0..count {
            let variant = self.jitter(base);
            let path = dest_dir.join(format!("variant_{index}.json"));
            let json = serde_json::to_string_pretty(&variant)?;
            if let Err(e) = tokio::fs::write(&path, json).await {
                // Shortfall, not failure: callers count what they receive
                warn!("Could not materialize variant {index}: {e}");
                continue;
            }
            variants.push(variant);
        }

        info!("Successfully generated {} variants", variants.len());
        Ok(variants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::FIX_POSE_SENTINEL;
    use approx::assert_relative_eq;

    fn base_task() -> TaskDescription {
        serde_json::from_str(
            r#"{
                "task": "arrange",
                "objects": [
                    {"object_id": "fix_pose", "position": [9.0, 9.0, 9.0]},
                    {"object_id": "mug", "position": [1.0, 2.0, 0.5],
                     "quaternion": [1.0, 0.0, 0.0, 0.0]}
                ]
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn generates_requested_count_and_materializes_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut generator = PoseJitterGenerator::new(Some(7));
        let variants = generator.generate(&base_task(), 3, dir.path()).await.unwrap();

        assert_eq!(variants.len(), 3);
        for index in 0..3 {
            let path = dir.path().join(format!("variant_{index}.json"));
            assert!(path.exists());
            let reloaded: TaskDescription =
                serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
            assert_eq!(reloaded.task, "arrange");
            assert_eq!(reloaded.objects.len(), 2);
        }
    }

    #[tokio::test]
    async fn sentinel_objects_are_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut generator = PoseJitterGenerator::new(Some(7));
        let variants = generator.generate(&base_task(), 5, dir.path()).await.unwrap();

        for variant in &variants {
            let fixed = variant
                .objects
                .iter()
                .find(|o| o.object_id == FIX_POSE_SENTINEL)
                .unwrap();
            assert_eq!(fixed.position, [9.0, 9.0, 9.0]);
            assert_eq!(fixed.quaternion, [1.0, 0.0, 0.0, 0.0]);
        }
    }

    #[tokio::test]
    async fn jitter_stays_bounded_and_quaternion_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let mut generator = PoseJitterGenerator::new(Some(42));
        let variants = generator.generate(&base_task(), 10, dir.path()).await.unwrap();

        for variant in &variants {
            let mug = variant.objects.iter().find(|o| o.object_id == "mug").unwrap();
            assert!((mug.position[0] - 1.0).abs() <= 0.1 + 1e-12);
            assert!((mug.position[1] - 2.0).abs() <= 0.1 + 1e-12);
            assert_relative_eq!(mug.position[2], 0.5);

            let norm: f64 = mug.quaternion.iter().map(|c| c * c).sum::<f64>().sqrt();
            assert_relative_eq!(norm, 1.0, epsilon = 1e-9);
        }
    }

    #[tokio::test]
    async fn seeded_generation_is_reproducible() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let a = PoseJitterGenerator::new(Some(99))
            .generate(&base_task(), 2, dir_a.path())
            .await
            .unwrap();
        let b = PoseJitterGenerator::new(Some(99))
            .generate(&base_task(), 2, dir_b.path())
            .await
            .unwrap();
        for (va, vb) in a.iter().zip(&b) {
            assert_eq!(va.objects[1].position, vb.objects[1].position);
            assert_eq!(va.objects[1].quaternion, vb.objects[1].quaternion);
        }
    }
}
