//! Append-only plate log and write-once crop artifacts.
//!
//! Neither is read back by the pipeline; they exist for diagnosing missed or
//! misread plates after the fact.

use image::RgbImage;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::macros::format_description;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::config::AuditConfig;

/// File name of the upscaled binary plate, overwritten on every recognition
pub const RESIZED_PLATE_NAME: &str = "plate_resized.jpg";

/// `YYYY-MM-DD HH:MM:SS: PLATE`
pub fn format_entry(timestamp: OffsetDateTime, plate: &str) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let stamp = timestamp
        .format(&format)
        .unwrap_or_else(|_| timestamp.unix_timestamp().to_string());
    format!("{}: {}\n", stamp, plate)
}

/// Text log of every plate string produced by normalization
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line per plate, all sharing `timestamp`
    pub async fn append(&self, timestamp: OffsetDateTime, plates: &[String]) -> std::io::Result<()> {
        if plates.is_empty() {
            return Ok(());
        }

        let lines: String = plates.iter().map(|plate| format_entry(timestamp, plate)).collect();

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(lines.as_bytes()).await?;
        file.flush().await
    }
}

/// Where vehicle and plate crops are written
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    dirs: Option<(PathBuf, PathBuf)>,
}

impl ArtifactStore {
    /// Store that writes nothing
    pub fn disabled() -> Self {
        Self { dirs: None }
    }

    pub fn new(car_dir: impl Into<PathBuf>, plate_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let car_dir = car_dir.into();
        let plate_dir = plate_dir.into();
        std::fs::create_dir_all(&car_dir)?;
        std::fs::create_dir_all(&plate_dir)?;
        Ok(Self {
            dirs: Some((car_dir, plate_dir)),
        })
    }

    pub fn from_config(config: &AuditConfig) -> std::io::Result<Self> {
        if config.save_artifacts {
            Self::new(&config.car_dir, &config.plate_dir)
        } else {
            Ok(Self::disabled())
        }
    }

    /// Path for the upscaled binary plate, if artifacts are enabled
    pub fn resized_plate_path(&self) -> Option<PathBuf> {
        self.dirs.as_ref().map(|(_, plate_dir)| plate_dir.join(RESIZED_PLATE_NAME))
    }

    pub fn save_vehicle(&self, crop: &RgbImage, timestamp: OffsetDateTime) -> Option<PathBuf> {
        let (car_dir, _) = self.dirs.as_ref()?;
        save_crop(car_dir, "car", crop, timestamp)
    }

    pub fn save_plate(&self, crop: &RgbImage, timestamp: OffsetDateTime) -> Option<PathBuf> {
        let (_, plate_dir) = self.dirs.as_ref()?;
        save_crop(plate_dir, "plate", crop, timestamp)
    }
}

fn save_crop(dir: &Path, prefix: &str, crop: &RgbImage, timestamp: OffsetDateTime) -> Option<PathBuf> {
    let format = format_description!("[year][month][day]_[hour][minute][second]");
    let stamp = timestamp.format(&format).ok()?;
    // several crops can land in the same second
    let suffix = Uuid::new_v4().simple().to_string();
    let path = dir.join(format!("{}_{}_{}.jpg", prefix, stamp, &suffix[..8]));

    match crop.save(&path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "saved {} crop", prefix);
            Some(path)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to save {} crop", prefix);
            None
        }
    }
}
