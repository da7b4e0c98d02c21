mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from gatewatch for tests
pub use gatewatch::core::db::{AllowListDb, AllowListEntry, AllowListRepository};
pub use gatewatch::core::gate::GateActuator;
pub use gatewatch::detection::{LineReader, ObjectDetector, PlateDetector, TextRecognizer, VehicleDetector};
pub use gatewatch::error::{ActuationError, CaptureError, DetectionError, RecognitionError, StoreError};
pub use gatewatch::models::{BoundingBox, CanonicalPlate, Detection, PlateQuality};
pub use gatewatch::{AccessDecision, AuditLog, CycleStatus, FrameSource, GatePipeline};
