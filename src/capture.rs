//! Frame acquisition.

use image::RgbImage;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::config::CameraConfig;
use crate::error::CaptureError;

/// Source of still frames. No retries happen here; a failed capture simply
/// ends the cycle.
pub trait FrameSource {
    fn capture(&mut self) -> impl Future<Output = Result<RgbImage, CaptureError>>;
}

/// Runs a still-capture command (`libcamera-still` by default) that writes a
/// JPEG to a fixed path, then decodes it
#[derive(Debug, Clone)]
pub struct CameraStill {
    command: String,
    output_path: PathBuf,
    width: u32,
    height: u32,
    timeout: Duration,
}

impl CameraStill {
    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            command: config.command.clone(),
            output_path: config.output_path.clone(),
            width: config.width,
            height: config.height,
            timeout: config.timeout(),
        }
    }

    /// Command-line arguments passed to the capture command
    pub fn args(&self) -> Vec<String> {
        vec![
            "-o".to_string(),
            self.output_path.display().to_string(),
            "-n".to_string(),
            "--width".to_string(),
            self.width.to_string(),
            "--height".to_string(),
            self.height.to_string(),
        ]
    }
}

impl FrameSource for CameraStill {
    async fn capture(&mut self) -> Result<RgbImage, CaptureError> {
        // A stale frame from the previous cycle must not pass for a new one
        match tokio::fs::remove_file(&self.output_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.output_path.display(), error = %e, "failed to remove previous capture"),
        }

        tracing::debug!(command = %self.command, args = ?self.args(), "capturing frame");
        let mut command = Command::new(&self.command);
        command
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let status = match tokio::time::timeout(self.timeout, command.status()).await {
            Err(_) => {
                return Err(CaptureError::Timeout {
                    command: self.command.clone(),
                    timeout: self.timeout,
                });
            }
            Ok(Err(source)) => {
                return Err(CaptureError::Spawn {
                    command: self.command.clone(),
                    source,
                });
            }
            Ok(Ok(status)) => status,
        };

        if !status.success() {
            return Err(CaptureError::CommandFailed {
                command: self.command.clone(),
                status,
            });
        }

        let frame = load_still(&self.output_path)?;
        tracing::info!(path = %self.output_path.display(), width = frame.width(), height = frame.height(), "frame captured");
        Ok(frame)
    }
}

/// Serves an existing image file as the frame
#[derive(Debug, Clone)]
pub struct StillImage {
    path: PathBuf,
}

impl StillImage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FrameSource for StillImage {
    async fn capture(&mut self) -> Result<RgbImage, CaptureError> {
        load_still(&self.path)
    }
}

/// Decode an image file into an RGB frame
pub fn load_still(path: &Path) -> Result<RgbImage, CaptureError> {
    if !path.is_file() {
        return Err(CaptureError::Missing {
            path: path.to_path_buf(),
        });
    }
    let image = image::open(path).map_err(|source| CaptureError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn camera(command: &str, output_path: PathBuf) -> CameraStill {
        CameraStill::from_config(&CameraConfig {
            command: command.to_string(),
            output_path,
            timeout_secs: 5,
            ..Default::default()
        })
    }

    #[test]
    fn args_request_fixed_resolution_without_preview() {
        let cam = camera("libcamera-still", PathBuf::from("current_image.jpg"));
        assert_eq!(
            cam.args(),
            vec!["-o", "current_image.jpg", "-n", "--width", "3280", "--height", "2464"]
        );
    }

    #[tokio::test]
    async fn missing_command_is_a_spawn_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cam = camera("gatewatch-no-such-camera-binary", dir.path().join("frame.jpg"));
        let err = cam.capture().await.unwrap_err();
        assert!(matches!(err, CaptureError::Spawn { .. }));
    }

    #[tokio::test]
    async fn still_image_decodes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("frame.png");
        RgbImage::from_pixel(16, 9, Rgb([9, 9, 9])).save(&path).unwrap();

        let mut source = StillImage::new(&path);
        let frame = source.capture().await.unwrap();
        assert_eq!(frame.dimensions(), (16, 9));
    }

    #[tokio::test]
    async fn still_image_reports_missing_file() {
        let mut source = StillImage::new("/nonexistent/frame.png");
        let err = source.capture().await.unwrap_err();
        assert!(matches!(err, CaptureError::Missing { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_is_reported_and_clears_old_frame() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("frame.jpg");
        RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])).save(&output).unwrap();

        let mut cam = camera("false", output.clone());
        let err = cam.capture().await.unwrap_err();
        assert!(matches!(err, CaptureError::CommandFailed { .. }));
        assert!(!output.exists(), "previous frame must not survive a failed capture");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_command_times_out() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("hang.sh");
        std::fs::write(&script, "#!/bin/sh\nsleep 10\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let output = dir.path().join("frame.jpg");
        RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])).save(&output).unwrap();

        let mut cam = CameraStill::from_config(&CameraConfig {
            command: script.display().to_string(),
            output_path: output.clone(),
            timeout_secs: 1,
            ..Default::default()
        });
        let started = std::time::Instant::now();
        let err = cam.capture().await.unwrap_err();
        assert!(matches!(err, CaptureError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!output.exists());
    }

    #[test]
    fn garbage_file_is_a_decode_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("frame.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        let err = load_still(&path).unwrap_err();
        assert!(matches!(err, CaptureError::Decode { .. }));
    }
}
