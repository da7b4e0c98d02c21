//! TOML configuration for the gate service.
//!
//! Every key has a default, so an empty file (or no file at all) yields a
//! configuration that matches a stock Raspberry Pi camera setup.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub camera: CameraConfig,
    pub models: ModelConfig,
    pub preprocessing: PreprocessingConfig,
    pub store: StoreConfig,
    pub mqtt: MqttConfig,
    pub audit: AuditConfig,
    pub cycle: CycleConfig,
}

impl GateConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Still-capture command settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub command: String,
    /// Fixed capture path, overwritten on every cycle
    pub output_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub timeout_secs: u64,
}

impl CameraConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            command: "libcamera-still".to_string(),
            output_path: PathBuf::from("current_image.jpg"),
            width: 3280,
            height: 2464,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub vehicle_model: PathBuf,
    pub plate_model: PathBuf,
    /// Directory holding `text-detection.rten` and `text-recognition.rten`.
    /// Defaults to `~/.cache/ocrs`.
    pub ocr_model_dir: Option<PathBuf>,
    pub input_size: u32,
    pub confidence: f32,
    pub iou: f32,
    /// Vehicle-model class ids to keep. Empty keeps every class.
    pub vehicle_classes: Vec<usize>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            vehicle_model: PathBuf::from("models/yolov8n.rten"),
            plate_model: PathBuf::from("models/license_plate_detector.rten"),
            ocr_model_dir: None,
            input_size: 640,
            confidence: 0.25,
            iou: 0.7,
            vehicle_classes: Vec::new(),
        }
    }
}

/// Linear brightness/contrast adjustment applied to each frame before
/// vehicle detection: `out = alpha * in + beta`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    pub alpha: f32,
    pub beta: f32,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            alpha: 1.2,
            beta: 50.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("smart_home.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic: String,
    pub payload: String,
    pub keep_alive_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "raspberrypi.local".to_string(),
            port: 1883,
            client_id: "gatewatch".to_string(),
            username: None,
            password: None,
            topic: "home/gate".to_string(),
            payload: "OPEN".to_string(),
            keep_alive_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub log_file: PathBuf,
    pub save_artifacts: bool,
    pub car_dir: PathBuf,
    pub plate_dir: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("recognized_plates.txt"),
            save_artifacts: true,
            car_dir: PathBuf::from("processed_cars"),
            plate_dir: PathBuf::from("processed_plates"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Delay between the end of one cycle and the start of the next
    pub interval_secs: u64,
}

impl CycleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self { interval_secs: 3 }
    }
}
