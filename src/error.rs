use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

/// Camera or filesystem failure while acquiring a frame. Fatal to the cycle.
#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("failed to launch capture command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("capture command `{command}` exited with {status}")]
    CommandFailed { command: String, status: ExitStatus },
    #[error("capture command `{command}` did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    #[error("capture file {path:?} was not produced")]
    Missing { path: PathBuf },
    #[error("failed to decode captured image {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Object-detection inference failure
#[derive(thiserror::Error, Debug)]
pub enum DetectionError {
    #[error("{model} inference failed: {message}")]
    Inference { model: String, message: String },
    #[error("{model} produced an output of unexpected shape {shape:?}")]
    OutputShape { model: String, shape: Vec<usize> },
}

/// OCR pipeline failure; always mapped to empty text by the recognizer
#[derive(thiserror::Error, Debug)]
pub enum RecognitionError {
    #[error("plate region is empty")]
    EmptyRegion,
    #[error("OCR failed: {0}")]
    Ocr(String),
}

/// Allow-list lookup failure. Never evidence that a plate is unauthorized.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("failed to open allow-list database {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: sqlx::Error,
    },
    #[error("allow-list lookup for {plate} failed: {source}")]
    Lookup {
        plate: String,
        #[source]
        source: sqlx::Error,
    },
}

/// Gate signal could not be sent. The signal is dropped, never retried.
#[derive(thiserror::Error, Debug)]
pub enum ActuationError {
    #[error("not connected to the MQTT broker, {topic} signal dropped")]
    NotConnected { topic: String },
    #[error("failed to publish to {topic}: {source}")]
    Publish {
        topic: String,
        #[source]
        source: rumqttc::ClientError,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),
}
