use crate::bounds::SceneBounds;
use crate::client::SceneClient;
use crate::error::SceneClientError;
use nalgebra::Vector3;
use tracing::{info, warn};

/// An auxiliary camera synthesized from scene geometry. Created fresh in the
/// remote scene for each variant; not guaranteed to persist across variants.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategicCamera {
    pub prim_path: String,
    pub position: Vector3<f64>,
    pub target: Vector3<f64>,
    pub fov_deg: f64,
    pub resolution: [u32; 2],
}

/// Derive the four standard vantage points from the scene bounds: front,
/// oblique overview, top-down, and side. Deterministic; creation is a
/// separate, per-camera fallible step.
pub fn plan_strategic_cameras(bounds: &SceneBounds, resolution: [u32; 2]) -> Vec<StrategicCamera> {
    let center = bounds.center();
    let size = bounds.size();
    let max_dimension = bounds.max_dimension();

    info!(
        "Planning strategic cameras: center {:?}, size {:?}, max dimension {:.3}",
        center, size, max_dimension
    );

    let front_distance = 3.0_f64.max(max_dimension * 1.5);
    let front = StrategicCamera {
        prim_path: "/World/Cameras/FrontFisheye".to_string(),
        position: center + Vector3::new(front_distance, 0.0, size.z * 0.3),
        target: center,
        fov_deg: 120.0,
        resolution,
    };

    let overview_distance = 4.0_f64.max(max_dimension * 2.0);
    let overview = StrategicCamera {
        prim_path: "/World/Cameras/Overview".to_string(),
        position: center
            + Vector3::new(
                overview_distance * 0.7,
                overview_distance * 0.7,
                overview_distance * 0.5,
            ),
        target: center,
        fov_deg: 60.0,
        resolution,
    };

    let topdown_height = 3.0_f64.max(size.z + max_dimension);
    let top_down = StrategicCamera {
        prim_path: "/World/Cameras/TopDown".to_string(),
        position: center + Vector3::new(0.0, 0.0, topdown_height),
        target: center,
        fov_deg: 90.0,
        resolution,
    };

    let side_distance = 3.0_f64.max(max_dimension * 1.5);
    let side = StrategicCamera {
        prim_path: "/World/Cameras/SideView".to_string(),
        position: center + Vector3::new(0.0, side_distance, size.z * 0.5),
        target: center,
        fov_deg: 60.0,
        resolution,
    };

    vec![front, overview, top_down, side]
}

/// Create each planned camera in the remote scene. A creation failure drops
/// only that camera; the returned list holds the prim paths that exist.
/// Fatal client errors (lost connection) still escalate.
pub async fn create_strategic_cameras(
    client: &mut dyn SceneClient,
    cameras: &[StrategicCamera],
) -> Result<Vec<String>, SceneClientError> {
    let mut created = Vec::new();
    for camera in cameras {
        match client
            .create_camera(
                &camera.prim_path,
                camera.position.into(),
                camera.target.into(),
                camera.fov_deg,
                camera.resolution,
            )
            .await
        {
            Ok(()) => {
                info!(
                    "Created strategic camera {} at {:?}",
                    camera.prim_path, camera.position
                );
                created.push(camera.prim_path.clone());
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Could not create strategic camera {}: {e}", camera.prim_path);
            }
        }
    }
    info!("Created {} strategic cameras", created.len());
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn degenerate_point() -> SceneBounds {
        SceneBounds {
            min: Vector3::new(1.0, 1.0, 1.0),
            max: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    #[test]
    fn always_four_valid_specs() {
        for bounds in [
            SceneBounds::default_volume(),
            degenerate_point(),
            SceneBounds {
                min: Vector3::new(-10.0, -5.0, 0.0),
                max: Vector3::new(10.0, 5.0, 3.0),
            },
        ] {
            let cameras = plan_strategic_cameras(&bounds, [512, 512]);
            assert_eq!(cameras.len(), 4);
            for camera in &cameras {
                assert!(camera.fov_deg > 0.0 && camera.fov_deg < 180.0);
                assert!(camera.resolution[0] > 0 && camera.resolution[1] > 0);
            }
        }
    }

    #[test]
    fn degenerate_scene_falls_back_to_distance_floors() {
        let bounds = degenerate_point();
        let center = bounds.center();
        let cameras = plan_strategic_cameras(&bounds, [512, 512]);

        let front = &cameras[0];
        assert_relative_eq!(front.position.x - center.x, 3.0);
        assert_relative_eq!(front.position.z, center.z);

        let overview = &cameras[1];
        assert_relative_eq!(overview.position.x - center.x, 4.0 * 0.7);
        assert_relative_eq!(overview.position.z - center.z, 4.0 * 0.5);

        let top_down = &cameras[2];
        assert_relative_eq!(top_down.position.z - center.z, 3.0);

        let side = &cameras[3];
        assert_relative_eq!(side.position.y - center.y, 3.0);
    }

    #[test]
    fn cameras_aim_at_scene_center() {
        let bounds = SceneBounds {
            min: Vector3::new(0.0, -1.0, 0.0),
            max: Vector3::new(2.0, 3.0, 1.0),
        };
        let center = bounds.center();
        for camera in plan_strategic_cameras(&bounds, [512, 512]) {
            assert_eq!(camera.target, center);
            assert_ne!(camera.position, center);
        }
    }

    #[test]
    fn large_scene_scales_distances() {
        let bounds = SceneBounds {
            min: Vector3::new(-5.0, -5.0, 0.0),
            max: Vector3::new(5.0, 5.0, 2.0),
        };
        // max dimension 10
        let cameras = plan_strategic_cameras(&bounds, [512, 512]);
        let center = bounds.center();
        assert_relative_eq!(cameras[0].position.x - center.x, 15.0);
        assert_relative_eq!(cameras[2].position.z - center.z, 12.0);
    }
}
