// src/config.rs - Session configuration loaded from JSON
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::InitializationError;
use crate::render::{AmputationType, MarkerStyles};

pub const CONFIG_ENV: &str = "PHANTOM_HAND_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub detector: DetectorConfig,
    pub camera: CameraConfig,
    pub render_loop: LoopConfig,
    pub markers: MarkerStyles,
    pub transport: TransportConfig,
    pub amputation: AmputationType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunningMode {
    Image,
    Video,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub model_asset_path: PathBuf,
    pub num_poses: u32,
    pub min_pose_detection_confidence: f32,
    pub min_pose_presence_confidence: f32,
    pub min_tracking_confidence: f32,
    pub running_mode: RunningMode,
    /// Program and leading arguments of the pose worker process.
    pub worker_command: Vec<String>,
    /// How long the worker may take to load the model and report ready.
    pub handshake_timeout_secs: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_asset_path: PathBuf::from("assets/models/pose_landmarker.task"),
            num_poses: 1,
            min_pose_detection_confidence: 0.5,
            min_pose_presence_confidence: 0.5,
            min_tracking_confidence: 0.5,
            running_mode: RunningMode::Video,
            worker_command: vec!["python3".to_string(), "pose_worker.py".to_string()],
            handshake_timeout_secs: 30.0,
        }
    }
}

impl DetectorConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.handshake_timeout_secs).unwrap_or(Duration::MAX)
    }

    pub fn validate(&self) -> Result<(), InitializationError> {
        if self.num_poses != 1 {
            return Err(InitializationError::InvalidOption {
                option: "num_poses",
                reason: format!("only single-person tracking is supported, got {}", self.num_poses),
            });
        }
        if self.running_mode != RunningMode::Video {
            return Err(InitializationError::InvalidOption {
                option: "running_mode",
                reason: "the landmarker must run in video mode".to_string(),
            });
        }
        let thresholds = [
            ("min_pose_detection_confidence", self.min_pose_detection_confidence),
            ("min_pose_presence_confidence", self.min_pose_presence_confidence),
            ("min_tracking_confidence", self.min_tracking_confidence),
        ];
        for (option, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(InitializationError::InvalidOption {
                    option,
                    reason: format!("{} is not a probability", value),
                });
            }
        }
        if !(self.handshake_timeout_secs.is_finite() && self.handshake_timeout_secs > 0.0) {
            return Err(InitializationError::InvalidOption {
                option: "handshake_timeout_secs",
                reason: format!("{} is not a positive duration", self.handshake_timeout_secs),
            });
        }
        if self.worker_command.is_empty() {
            return Err(InitializationError::InvalidOption {
                option: "worker_command",
                reason: "no program given".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Show the video and overlay mirrored. Detection always sees the raw frame.
    pub mirror: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: 640,
            height: 480,
            fps: 30,
            mirror: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Minimum spacing between detections, in milliseconds (~60 Hz ceiling).
    pub throttle_interval_ms: f64,
    /// Run the landmarker on its own thread instead of inside the UI tick.
    pub worker_thread: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            throttle_interval_ms: 16.67,
            worker_thread: true,
        }
    }
}

impl LoopConfig {
    pub fn throttle_interval(&self) -> Duration {
        Duration::from_nanos((self.throttle_interval_ms.max(0.0) * 1_000_000.0).round() as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Camera,
    Socket,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub mode: TransportMode,
    pub address: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::Camera,
            address: "localhost:8080".to_string(),
        }
    }
}

impl AppConfig {
    /// `$PHANTOM_HAND_CONFIG` first, then the per-user config directory.
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(path),
                _ => {
                    tracing::info!("no config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "phantomhand", "PhantomHand")
        .map(|dirs| dirs.config_dir().join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.detector.validate().is_ok());
        assert_eq!(config.amputation, AmputationType::LeftArm);
        assert_eq!(config.transport.address, "localhost:8080");
        assert_eq!(config.render_loop.throttle_interval().as_micros(), 16_670);
    }

    #[test]
    fn test_threshold_out_of_range() {
        let config = DetectorConfig {
            min_tracking_confidence: 1.5,
            ..Default::default()
        };
        match config.validate() {
            Err(InitializationError::InvalidOption { option, .. }) => {
                assert_eq!(option, "min_tracking_confidence")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_fixed_options_are_enforced() {
        let multi = DetectorConfig {
            num_poses: 2,
            ..Default::default()
        };
        assert!(multi.validate().is_err());

        let image_mode = DetectorConfig {
            running_mode: RunningMode::Image,
            ..Default::default()
        };
        assert!(image_mode.validate().is_err());
    }

    #[test]
    fn test_handshake_timeout_must_be_positive() {
        for bad in [0.0, -1.0, f64::NAN] {
            let config = DetectorConfig {
                handshake_timeout_secs: bad,
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }
        assert_eq!(DetectorConfig::default().handshake_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "amputation": "both", "markers": {{ "radius": 12.0 }}, "transport": {{ "mode": "socket" }} }}"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.amputation, AmputationType::Both);
        assert_eq!(config.markers.radius, 12.0);
        assert_eq!(config.transport.mode, TransportMode::Socket);
        assert_eq!(config.transport.address, "localhost:8080");
        assert_eq!(config.detector.num_poses, 1);
        assert!(config.camera.mirror);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(AppConfig::from_file(file.path()).is_err());
    }
}
