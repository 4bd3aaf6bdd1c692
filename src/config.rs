use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub waits: WaitSettings,
    pub strategic: StrategicSettings,
    pub placement: PlacementSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitSettings {
    /// Pause after robot/scene initialization, seconds
    pub post_init_secs: f64,
    /// Pause after a scene reset, seconds
    pub post_reset_secs: f64,
    /// Pause after the last object placement before capture, seconds
    pub settle_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategicSettings {
    /// Resolution for synthesized auxiliary cameras, width x height
    pub resolution: [u32; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementSettings {
    /// Material assigned to placed objects
    pub material: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            waits: WaitSettings {
                post_init_secs: 3.0,
                post_reset_secs: 2.0,
                settle_secs: 3.0,
            },
            strategic: StrategicSettings {
                resolution: [512, 512],
            },
            placement: PlacementSettings {
                material: "Plastic".to_string(),
            },
        }
    }
}

impl CaptureConfig {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            // Create default config file
            let default_config = Self::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            fs::write(path, toml_content).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_toml() {
        let config = CaptureConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: CaptureConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.strategic.resolution, [512, 512]);
        assert_eq!(back.placement.material, "Plastic");
        assert!(back.waits.settle_secs > 0.0);
    }
}
