pub mod ocr;
pub mod preprocessing;
pub mod yolo;

use image::RgbImage;

use crate::error::DetectionError;
use crate::models::{Detection, StageOutcome};

pub use ocr::{LineReader, TextRecognizer};
pub use yolo::{YoloDetector, YoloParams};

/// An object-detection model
pub trait ObjectDetector {
    /// Human-readable model name (used in logs)
    fn name(&self) -> &str;

    /// Run inference over `image`. Detections are in `image` coordinates and
    /// come in no particular order.
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, DetectionError>;
}

/// First stage: finds vehicles in a whole frame
pub struct VehicleDetector {
    model: Box<dyn ObjectDetector>,
    alpha: f32,
    beta: f32,
}

impl VehicleDetector {
    pub fn new(model: Box<dyn ObjectDetector>) -> Self {
        Self {
            model,
            alpha: 1.2,
            beta: 50.0,
        }
    }

    pub fn with_brightness(mut self, alpha: f32, beta: f32) -> Self {
        self.alpha = alpha;
        self.beta = beta;
        self
    }

    /// Brightness/contrast-adjust a raw frame. The adjusted frame is what gets
    /// detected on and cropped downstream.
    pub fn prepare(&self, frame: &RgbImage) -> RgbImage {
        preprocessing::adjust_brightness(frame, self.alpha, self.beta)
    }

    /// Detect vehicles in an already prepared frame
    pub fn detect(&self, frame: &RgbImage) -> StageOutcome<Vec<Detection>> {
        match self.model.detect(frame) {
            Ok(vehicles) if vehicles.is_empty() => StageOutcome::NotFound,
            Ok(vehicles) => StageOutcome::Detected(vehicles),
            Err(e) => StageOutcome::Failed(e.to_string()),
        }
    }
}

/// Second stage: finds the plate inside one vehicle crop.
///
/// Only the first candidate is used; a vehicle is assumed to carry a single
/// plate.
pub struct PlateDetector {
    model: Box<dyn ObjectDetector>,
}

impl PlateDetector {
    pub fn new(model: Box<dyn ObjectDetector>) -> Self {
        Self { model }
    }

    pub fn detect(&self, vehicle: &RgbImage) -> StageOutcome<Detection> {
        match self.model.detect(vehicle) {
            Ok(plates) => match plates.into_iter().next() {
                Some(plate) => StageOutcome::Detected(plate),
                None => StageOutcome::NotFound,
            },
            Err(e) => StageOutcome::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundingBox;

    struct Fixed(Result<Vec<Detection>, ()>);

    impl ObjectDetector for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn detect(&self, _image: &RgbImage) -> Result<Vec<Detection>, DetectionError> {
            self.0.clone().map_err(|_| DetectionError::Inference {
                model: "fixed".to_string(),
                message: "boom".to_string(),
            })
        }
    }

    fn det(confidence: f32) -> Detection {
        Detection {
            bbox: BoundingBox::new(0.0, 0.0, 4.0, 4.0),
            confidence,
            class_id: 0,
        }
    }

    #[test]
    fn no_vehicles_is_not_found() {
        let detector = VehicleDetector::new(Box::new(Fixed(Ok(vec![]))));
        assert_eq!(detector.detect(&RgbImage::new(8, 8)), StageOutcome::NotFound);
    }

    #[test]
    fn vehicle_inference_failure_is_reported() {
        let detector = VehicleDetector::new(Box::new(Fixed(Err(()))));
        let outcome = detector.detect(&RgbImage::new(8, 8));
        assert_eq!(outcome, StageOutcome::Failed("fixed inference failed: boom".to_string()));
    }

    #[test]
    fn plate_detector_uses_first_candidate() {
        let detector = PlateDetector::new(Box::new(Fixed(Ok(vec![det(0.3), det(0.9)]))));
        let plate = detector.detect(&RgbImage::new(8, 8)).detected().unwrap();
        assert_eq!(plate.confidence, 0.3);
    }

    #[test]
    fn plate_detector_distinguishes_none_from_failure() {
        let empty = PlateDetector::new(Box::new(Fixed(Ok(vec![]))));
        assert_eq!(empty.detect(&RgbImage::new(8, 8)), StageOutcome::NotFound);

        let failing = PlateDetector::new(Box::new(Fixed(Err(()))));
        assert!(matches!(failing.detect(&RgbImage::new(8, 8)), StageOutcome::Failed(_)));
    }
}
