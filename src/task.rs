use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Reserved object identifier marking a fixed, non-randomized object that is
/// already part of the base scene. Placements with this id are never sent to
/// the remote service.
pub const FIX_POSE_SENTINEL: &str = "fix_pose";

/// Robot-mounted cameras used when the task description carries no
/// `recording_setting.camera_list` override.
pub const DEFAULT_CAMERA_LIST: [&str; 3] = [
    "/G1/head_link2/Head_Camera",
    "/G1/gripper_r_base_link/Right_Camera",
    "/G1/gripper_l_base_link/Left_Camera",
];

/// One capture run's source of truth: either the base task loaded from disk
/// or a generated variant of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescription {
    /// Task name; also the top-level output directory name
    pub task: String,
    #[serde(default)]
    pub robot: RobotSection,
    #[serde(default)]
    pub scene: SceneSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_setting: Option<RecordingSetting>,
    #[serde(default)]
    pub objects: Vec<ObjectPlacement>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RobotSection {
    #[serde(default = "default_robot_cfg")]
    pub robot_cfg: String,
    #[serde(default)]
    pub robot_init_pose: RobotInitPose,
}

fn default_robot_cfg() -> String {
    "G1_120s.json".to_string()
}

/// Robot initial pose. Task files in the wild carry either a flat
/// `position`/`quaternion` pair or a workspace-keyed nesting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RobotInitPose {
    Workspace { workspace_00: PoseEntry },
    Flat {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<[f64; 3]>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quaternion: Option<[f64; 4]>,
    },
}

impl Default for RobotInitPose {
    fn default() -> Self {
        RobotInitPose::Flat {
            position: None,
            quaternion: None,
        }
    }
}

impl RobotInitPose {
    pub fn position(&self) -> [f64; 3] {
        match self {
            RobotInitPose::Workspace { workspace_00 } => workspace_00.position,
            RobotInitPose::Flat { position, .. } => position.unwrap_or([0.0, 0.0, 0.0]),
        }
    }

    pub fn quaternion(&self) -> [f64; 4] {
        match self {
            RobotInitPose::Workspace { workspace_00 } => workspace_00.quaternion,
            RobotInitPose::Flat { quaternion, .. } => {
                quaternion.unwrap_or([1.0, 0.0, 0.0, 0.0])
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseEntry {
    pub position: [f64; 3],
    pub quaternion: [f64; 4],
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneSection {
    #[serde(default)]
    pub scene_usd: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingSetting {
    #[serde(default)]
    pub camera_list: Vec<String>,
}

/// One object to place into the scene for a variant.
///
/// Quaternions are scalar-first `[w, x, y, z]` throughout this crate and on
/// the wire; the identity is `[1, 0, 0, 0]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectPlacement {
    pub object_id: String,
    #[serde(default)]
    pub position: [f64; 3],
    #[serde(default = "identity_quaternion")]
    pub quaternion: [f64; 4],
    #[serde(default)]
    pub data_info_dir: String,
    #[serde(default = "default_color")]
    pub color: [f64; 3],
    #[serde(default = "default_scale")]
    pub scale: [f64; 3],
    #[serde(default = "default_mass")]
    pub mass: f64,
}

fn identity_quaternion() -> [f64; 4] {
    [1.0, 0.0, 0.0, 0.0]
}

fn default_color() -> [f64; 3] {
    [0.8, 0.8, 0.8]
}

fn default_scale() -> [f64; 3] {
    [1.0, 1.0, 1.0]
}

fn default_mass() -> f64 {
    1.0
}

impl ObjectPlacement {
    /// Inert sentinel placements are skipped by the whole pipeline.
    pub fn is_fixed(&self) -> bool {
        self.object_id == FIX_POSE_SENTINEL
    }

    /// Asset path sent to the remote service when placing this object.
    pub fn usd_path(&self) -> String {
        if self.data_info_dir.is_empty() {
            format!("objects/generic/{}.usd", self.object_id)
        } else {
            format!("{}/Aligned.usd", self.data_info_dir.trim_end_matches('/'))
        }
    }

    pub fn prim_path(&self) -> String {
        object_prim_path(&self.object_id)
    }
}

/// Scene-graph location of a placed object.
pub fn object_prim_path(object_id: &str) -> String {
    format!("/World/Objects/{object_id}")
}

impl TaskDescription {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read task file {}", path.display()))?;
        let task: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse task file {}", path.display()))?;
        Ok(task)
    }

    /// Robot-fixed cameras to capture from: the task's override when present
    /// and non-empty, otherwise the built-in default triple.
    pub fn camera_list(&self) -> Vec<String> {
        match &self.recording_setting {
            Some(rs) if !rs.camera_list.is_empty() => rs.camera_list.clone(),
            _ => DEFAULT_CAMERA_LIST.iter().map(|s| s.to_string()).collect(),
        }
    }
}
