use thiserror::Error;

/// Failure classes for the remote scene service boundary.
///
/// Connection, initialization, and transport errors are fatal to a run;
/// everything else is contained at the granularity of one object or one
/// camera by the capture pipeline.
#[derive(Debug, Error)]
pub enum SceneClientError {
    #[error("could not connect to scene service at {host}: {source}")]
    Connection {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("robot/scene initialization failed: {0}")]
    Initialization(String),

    #[error("failed to place object '{object_id}': {reason}")]
    Placement { object_id: String, reason: String },

    #[error("failed to create camera '{prim_path}': {reason}")]
    CameraCreation { prim_path: String, reason: String },

    #[error("capture failed for camera '{prim_path}': {reason}")]
    Capture { prim_path: String, reason: String },

    #[error("bounds query failed for '{prim_path}': {reason}")]
    Query { prim_path: String, reason: String },

    #[error("scene reset failed: {0}")]
    Reset(String),

    #[error("scene service transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("malformed response from scene service: {0}")]
    Protocol(String),
}

impl SceneClientError {
    /// Fatal errors abort the whole run; recoverable ones only drop the
    /// object or camera they concern.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SceneClientError::Connection { .. }
                | SceneClientError::Initialization(_)
                | SceneClientError::Reset(_)
                | SceneClientError::Transport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatality_classification() {
        assert!(SceneClientError::Initialization("boom".into()).is_fatal());
        assert!(SceneClientError::Reset("boom".into()).is_fatal());
        assert!(!SceneClientError::Placement {
            object_id: "cup".into(),
            reason: "collision".into()
        }
        .is_fatal());
        assert!(!SceneClientError::Capture {
            prim_path: "/World/Cameras/Overview".into(),
            reason: "timeout".into()
        }
        .is_fatal());
    }
}
