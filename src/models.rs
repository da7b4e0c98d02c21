use image::RgbImage;
use std::fmt;
use time::{OffsetDateTime, UtcOffset};

/// Axis-aligned box in pixel coordinates of the image it was detected in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let intersection = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }

    /// Integer crop rectangle `(x, y, width, height)` clamped to an image of the
    /// given size. Coordinates are truncated, so `x2`/`y2` are exclusive.
    pub fn crop_rect(&self, image_width: u32, image_height: u32) -> Option<(u32, u32, u32, u32)> {
        let clamp = |v: f32, max: u32| (v.max(0.0) as u32).min(max);
        let x1 = clamp(self.x1, image_width);
        let y1 = clamp(self.y1, image_height);
        let x2 = clamp(self.x2, image_width);
        let y2 = clamp(self.y2, image_height);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some((x1, y1, x2 - x1, y2 - y1))
    }
}

/// A single object found by one of the detection models
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_id: usize,
}

impl Detection {
    /// Cut the detected region out of `image`; `None` when the box is empty
    /// after clamping.
    pub fn crop(&self, image: &RgbImage) -> Option<RgbImage> {
        let (x, y, width, height) = self.bbox.crop_rect(image.width(), image.height())?;
        Some(image::imageops::crop_imm(image, x, y, width, height).to_image())
    }
}

/// Result of a single pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Detected(T),
    NotFound,
    Failed(String),
}

impl<T> StageOutcome<T> {
    pub fn detected(self) -> Option<T> {
        match self {
            StageOutcome::Detected(value) => Some(value),
            _ => None,
        }
    }
}

/// How the canonical plate text was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlateQuality {
    /// Two letters, four digits, two letters found verbatim
    Exact,
    /// Eight characters stitched together from letter/digit runs
    Reconstructed,
    /// Cleaned OCR text that could not be repaired
    Uncorrected,
}

/// Normalized plate text. Only `as_str()` is compared against the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPlate {
    text: String,
    quality: PlateQuality,
}

impl CanonicalPlate {
    pub fn new(text: impl Into<String>, quality: PlateQuality) -> Self {
        Self {
            text: text.into(),
            quality,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn quality(&self) -> PlateQuality {
        self.quality
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Display for CanonicalPlate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Access decision for one recognized plate
#[derive(Debug, Clone)]
pub struct AccessOutcome {
    pub plate: CanonicalPlate,
    pub granted: bool,
    pub owner_name: Option<String>,
    pub timestamp: OffsetDateTime,
}

/// Current wall-clock time in the given offset.
///
/// The local offset has to be resolved before any threads are spawned, so it
/// is captured once at startup and passed around instead of calling
/// `OffsetDateTime::now_local` here.
pub fn now_at(offset: UtcOffset) -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(offset)
}
