pub mod access;
pub mod capture;
pub mod config;
pub mod core;
pub mod detection;
pub mod error;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod plate;

pub use access::AccessDecision;
pub use capture::{CameraStill, FrameSource, StillImage};
pub use config::GateConfig;
pub use core::audit::{ArtifactStore, AuditLog};
pub use core::db::{AllowListDb, AllowListEntry, AllowListRepository};
pub use core::gate::{GateActuator, MqttGate};
pub use detection::{ObjectDetector, PlateDetector, TextRecognizer, VehicleDetector};
pub use models::{AccessOutcome, BoundingBox, CanonicalPlate, Detection, PlateQuality, StageOutcome};
pub use pipeline::{CycleReport, CycleStatus, GatePipeline, PipelineContext};
