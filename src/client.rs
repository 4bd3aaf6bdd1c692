use crate::error::SceneClientError;
use crate::task::ObjectPlacement;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Pinhole intrinsics reported by the remote service per capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub width: u32,
    pub height: u32,
    pub fx: f64,
    pub fy: f64,
    pub ppx: f64,
    pub ppy: f64,
}

/// Axis-aligned bounding box in scene coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

/// One camera's capture: raw interleaved RGBA bytes (HxWx4) and optionally a
/// raw little-endian f32 depth buffer (HxW, meters). Either buffer may be
/// absent on a partial capture.
#[derive(Debug, Clone)]
pub struct CaptureResult {
    pub color: Option<Vec<u8>>,
    pub depth: Option<Vec<u8>>,
    pub intrinsics: CameraIntrinsics,
}

/// Object placement command as the remote service expects it.
#[derive(Debug, Clone, Serialize)]
pub struct AddObjectRequest {
    pub usd_path: String,
    pub prim_path: String,
    pub label_name: String,
    pub target_position: [f64; 3],
    /// Scalar-first [w, x, y, z]
    pub target_quaternion: [f64; 4],
    pub target_scale: [f64; 3],
    pub color: [f64; 3],
    pub material: String,
    pub mass: f64,
}

impl AddObjectRequest {
    pub fn from_placement(placement: &ObjectPlacement, material: &str) -> Self {
        Self {
            usd_path: placement.usd_path(),
            prim_path: placement.prim_path(),
            label_name: placement.object_id.clone(),
            target_position: placement.position,
            target_quaternion: placement.quaternion,
            target_scale: placement.scale,
            color: placement.color,
            material: material.to_string(),
            mass: placement.mass,
        }
    }
}

/// Capability interface over the remote simulation service.
///
/// All operations are blocking RPCs with no built-in retry; the capture
/// pipeline decides what is fatal and what is skipped. `shutdown` is
/// best-effort and must never raise past the call.
#[async_trait]
pub trait SceneClient: Send {
    async fn init_robot(
        &mut self,
        robot_cfg: &str,
        robot_usd: &str,
        scene_usd: &str,
        init_position: [f64; 3],
        init_quaternion: [f64; 4],
    ) -> Result<(), SceneClientError>;

    async fn reset(&mut self) -> Result<(), SceneClientError>;

    async fn add_object(&mut self, request: &AddObjectRequest) -> Result<(), SceneClientError>;

    async fn get_object_bounds(&mut self, prim_path: &str) -> Result<Aabb, SceneClientError>;

    async fn create_camera(
        &mut self,
        prim_path: &str,
        position: [f64; 3],
        target: [f64; 3],
        fov_deg: f64,
        resolution: [u32; 2],
    ) -> Result<(), SceneClientError>;

    async fn capture_frame(
        &mut self,
        camera_prim_path: &str,
    ) -> Result<CaptureResult, SceneClientError>;

    async fn shutdown(&mut self);
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    InitRobot {
        robot_cfg: &'a str,
        robot_usd: &'a str,
        scene_usd: &'a str,
        init_position: [f64; 3],
        init_quaternion: [f64; 4],
    },
    Reset,
    AddObject {
        #[serde(flatten)]
        request: &'a AddObjectRequest,
    },
    GetObjectAabb {
        prim_path: &'a str,
    },
    CreateCamera {
        prim_path: &'a str,
        position: [f64; 3],
        target: [f64; 3],
        fov: f64,
        resolution: [u32; 2],
    },
    CaptureFrame {
        camera_prim_path: &'a str,
    },
    Exit,
}

#[derive(Debug, Default, Deserialize)]
struct Response {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    bbox: Option<[f64; 6]>,
    #[serde(default)]
    color_info: Option<CameraIntrinsics>,
    #[serde(default)]
    color_image: Option<Vec<u8>>,
    #[serde(default)]
    depth_image: Option<Vec<u8>>,
}

impl Response {
    fn reason(&self) -> String {
        self.error.clone().unwrap_or_else(|| "unspecified error".to_string())
    }
}

/// Newline-delimited JSON request/response client over a single TCP
/// connection. One connection serves the whole run; calls are issued
/// strictly one at a time.
pub struct RpcSceneClient {
    host: String,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl RpcSceneClient {
    pub async fn connect(host: &str) -> Result<Self, SceneClientError> {
        info!("Connecting to scene service at {host}");
        let stream =
            TcpStream::connect(host)
                .await
                .map_err(|source| SceneClientError::Connection {
                    host: host.to_string(),
                    source,
                })?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            host: host.to_string(),
            reader: BufReader::new(read_half),
            writer: write_half,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    async fn call(&mut self, request: Request<'_>) -> Result<Response, SceneClientError> {
        let mut line = serde_json::to_string(&request)
            .map_err(|e| SceneClientError::Protocol(e.to_string()))?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;

        let mut reply = String::new();
        let read = self.reader.read_line(&mut reply).await?;
        if read == 0 {
            return Err(SceneClientError::Transport(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "scene service closed the connection",
            )));
        }
        serde_json::from_str(&reply).map_err(|e| SceneClientError::Protocol(e.to_string()))
    }
}

#[async_trait]
impl SceneClient for RpcSceneClient {
    async fn init_robot(
        &mut self,
        robot_cfg: &str,
        robot_usd: &str,
        scene_usd: &str,
        init_position: [f64; 3],
        init_quaternion: [f64; 4],
    ) -> Result<(), SceneClientError> {
        let response = self
            .call(Request::InitRobot {
                robot_cfg,
                robot_usd,
                scene_usd,
                init_position,
                init_quaternion,
            })
            .await?;
        if !response.ok {
            return Err(SceneClientError::Initialization(response.reason()));
        }
        Ok(())
    }

    async fn reset(&mut self) -> Result<(), SceneClientError> {
        let response = self.call(Request::Reset).await?;
        if !response.ok {
            return Err(SceneClientError::Reset(response.reason()));
        }
        Ok(())
    }

    async fn add_object(&mut self, request: &AddObjectRequest) -> Result<(), SceneClientError> {
        debug!("Placing object {} at {:?}", request.label_name, request.target_position);
        let object_id = request.label_name.clone();
        let response = self.call(Request::AddObject { request }).await?;
        if !response.ok {
            return Err(SceneClientError::Placement {
                object_id,
                reason: response.reason(),
            });
        }
        Ok(())
    }

    async fn get_object_bounds(&mut self, prim_path: &str) -> Result<Aabb, SceneClientError> {
        let response = self.call(Request::GetObjectAabb { prim_path }).await?;
        if !response.ok {
            return Err(SceneClientError::Query {
                prim_path: prim_path.to_string(),
                reason: response.reason(),
            });
        }
        let bbox = response.bbox.ok_or_else(|| {
            SceneClientError::Protocol(format!("bounds reply for {prim_path} missing bbox"))
        })?;
        Ok(Aabb {
            min: [bbox[0], bbox[1], bbox[2]],
            max: [bbox[3], bbox[4], bbox[5]],
        })
    }

    async fn create_camera(
        &mut self,
        prim_path: &str,
        position: [f64; 3],
        target: [f64; 3],
        fov_deg: f64,
        resolution: [u32; 2],
    ) -> Result<(), SceneClientError> {
        let response = self
            .call(Request::CreateCamera {
                prim_path,
                position,
                target,
                fov: fov_deg,
                resolution,
            })
            .await?;
        if !response.ok {
            return Err(SceneClientError::CameraCreation {
                prim_path: prim_path.to_string(),
                reason: response.reason(),
            });
        }
        Ok(())
    }

    async fn capture_frame(
        &mut self,
        camera_prim_path: &str,
    ) -> Result<CaptureResult, SceneClientError> {
        let response = self.call(Request::CaptureFrame { camera_prim_path }).await?;
        if !response.ok {
            return Err(SceneClientError::Capture {
                prim_path: camera_prim_path.to_string(),
                reason: response.reason(),
            });
        }
        let intrinsics = response.color_info.ok_or_else(|| {
            SceneClientError::Protocol(format!(
                "capture reply for {camera_prim_path} missing camera intrinsics"
            ))
        })?;
        Ok(CaptureResult {
            color: response.color_image.filter(|b| !b.is_empty()),
            depth: response.depth_image.filter(|b| !b.is_empty()),
            intrinsics,
        })
    }

    async fn shutdown(&mut self) {
        // Best-effort: the run's results are already on disk at this point.
        match self.call(Request::Exit).await {
            Ok(_) => info!("Scene service session closed"),
            Err(e) => warn!("Scene service teardown failed: {e}"),
        }
    }
}
