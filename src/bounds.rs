use crate::client::SceneClient;
use crate::task::object_prim_path;
use nalgebra::Vector3;
use tracing::{debug, warn};

/// Axis-aligned volume covering every successfully queried object in a
/// variant. Computed once per variant, never mutated afterward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneBounds {
    pub min: Vector3<f64>,
    pub max: Vector3<f64>,
}

impl SceneBounds {
    /// Fallback volume when no object bounds could be retrieved. Keeps
    /// camera placement finite for empty scenes.
    pub fn default_volume() -> Self {
        Self {
            min: Vector3::new(-2.0, -2.0, 0.0),
            max: Vector3::new(2.0, 2.0, 2.0),
        }
    }

    pub fn center(&self) -> Vector3<f64> {
        (self.min + self.max) / 2.0
    }

    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }

    pub fn max_dimension(&self) -> f64 {
        self.size().max()
    }

    pub fn vertical_extent(&self) -> f64 {
        self.size().z
    }
}

/// Fold per-object AABB queries into one volume. A failed query excludes
/// only that object; if nothing yields valid bounds the default volume is
/// returned.
pub async fn estimate_scene_bounds(
    client: &mut dyn SceneClient,
    objects_added: &[String],
) -> SceneBounds {
    let mut folded: Option<(Vector3<f64>, Vector3<f64>)> = None;

    for object_id in objects_added {
        let prim_path = object_prim_path(object_id);
        match client.get_object_bounds(&prim_path).await {
            Ok(aabb) => {
                let obj_min = Vector3::from(aabb.min);
                let obj_max = Vector3::from(aabb.max);
                folded = Some(match folded {
                    Some((min, max)) => (min.inf(&obj_min), max.sup(&obj_max)),
                    None => (obj_min, obj_max),
                });
            }
            Err(e) => {
                warn!("Could not get bounds for object {object_id}: {e}");
            }
        }
    }

    match folded {
        Some((min, max)) => {
            debug!("Scene bounds: min {:?}, max {:?}", min, max);
            SceneBounds { min, max }
        }
        None => {
            debug!("No object bounds available, using default volume");
            SceneBounds::default_volume()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Aabb, AddObjectRequest, CaptureResult, SceneClient};
    use crate::error::SceneClientError;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Client stub answering only bounds queries, from a fixed table.
    struct BoundsOnlyClient {
        boxes: HashMap<String, Aabb>,
    }

    #[async_trait]
    impl SceneClient for BoundsOnlyClient {
        async fn init_robot(
            &mut self,
            _: &str,
            _: &str,
            _: &str,
            _: [f64; 3],
            _: [f64; 4],
        ) -> Result<(), SceneClientError> {
            Ok(())
        }

        async fn reset(&mut self) -> Result<(), SceneClientError> {
            Ok(())
        }

        async fn add_object(&mut self, _: &AddObjectRequest) -> Result<(), SceneClientError> {
            Ok(())
        }

        async fn get_object_bounds(&mut self, prim_path: &str) -> Result<Aabb, SceneClientError> {
            self.boxes
                .get(prim_path)
                .copied()
                .ok_or_else(|| SceneClientError::Query {
                    prim_path: prim_path.to_string(),
                    reason: "no such object".to_string(),
                })
        }

        async fn create_camera(
            &mut self,
            _: &str,
            _: [f64; 3],
            _: [f64; 3],
            _: f64,
            _: [u32; 2],
        ) -> Result<(), SceneClientError> {
            Ok(())
        }

        async fn capture_frame(
            &mut self,
            prim_path: &str,
        ) -> Result<CaptureResult, SceneClientError> {
            Err(SceneClientError::Capture {
                prim_path: prim_path.to_string(),
                reason: "not supported".to_string(),
            })
        }

        async fn shutdown(&mut self) {}
    }

    fn client_with(boxes: &[(&str, Aabb)]) -> BoundsOnlyClient {
        BoundsOnlyClient {
            boxes: boxes
                .iter()
                .map(|(id, aabb)| (object_prim_path(id), *aabb))
                .collect(),
        }
    }

    #[tokio::test]
    async fn folds_bounds_componentwise() {
        let mut client = client_with(&[
            (
                "cup",
                Aabb {
                    min: [-1.0, 0.0, 0.0],
                    max: [0.0, 1.0, 0.5],
                },
            ),
            (
                "plate",
                Aabb {
                    min: [0.5, -2.0, 0.1],
                    max: [1.5, -1.0, 0.2],
                },
            ),
        ]);
        let ids = vec!["cup".to_string(), "plate".to_string()];
        let bounds = estimate_scene_bounds(&mut client, &ids).await;

        assert_eq!(bounds.min, Vector3::new(-1.0, -2.0, 0.0));
        assert_eq!(bounds.max, Vector3::new(1.5, 1.0, 0.5));
        // covering invariant against each queried box
        for aabb in client.boxes.values() {
            for axis in 0..3 {
                assert!(bounds.min[axis] <= aabb.min[axis]);
                assert!(bounds.max[axis] >= aabb.max[axis]);
            }
        }
    }

    #[tokio::test]
    async fn failed_query_excludes_only_that_object() {
        let mut client = client_with(&[(
            "cup",
            Aabb {
                min: [-1.0, -1.0, 0.0],
                max: [1.0, 1.0, 1.0],
            },
        )]);
        let ids = vec!["cup".to_string(), "ghost".to_string()];
        let bounds = estimate_scene_bounds(&mut client, &ids).await;

        assert_eq!(bounds.min, Vector3::new(-1.0, -1.0, 0.0));
        assert_eq!(bounds.max, Vector3::new(1.0, 1.0, 1.0));
    }

    #[tokio::test]
    async fn empty_object_set_yields_default_volume() {
        let mut client = client_with(&[]);
        let bounds = estimate_scene_bounds(&mut client, &[]).await;
        assert_eq!(bounds, SceneBounds::default_volume());
    }

    #[tokio::test]
    async fn all_queries_failing_yields_default_volume() {
        let mut client = client_with(&[]);
        let ids = vec!["a".to_string(), "b".to_string()];
        let bounds = estimate_scene_bounds(&mut client, &ids).await;
        assert_eq!(bounds, SceneBounds::default_volume());
        assert_eq!(bounds.min, Vector3::new(-2.0, -2.0, 0.0));
        assert_eq!(bounds.max, Vector3::new(2.0, 2.0, 2.0));
    }
}
