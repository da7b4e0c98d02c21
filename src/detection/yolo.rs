//! YOLOv8-format detector running on rten.
//!
//! Models are exported from Ultralytics to ONNX and converted to `.rten`. The
//! network takes a square `[1, 3, S, S]` RGB input scaled to `[0, 1]` and
//! returns `[1, 4 + nc, N]`: box centre/size followed by one score per class.

use anyhow::Context;
use image::RgbImage;
use image::imageops::FilterType;
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;
use std::path::Path;

use crate::detection::ObjectDetector;
use crate::error::DetectionError;
use crate::models::{BoundingBox, Detection};

const CXYWH_OFFSET: usize = 4;
const PAD_VALUE: f32 = 144.0 / 255.0;

/// Thresholds applied while decoding raw predictions
#[derive(Debug, Clone)]
pub struct YoloParams {
    pub input_size: u32,
    pub confidence: f32,
    pub iou: f32,
    /// Class ids to keep; empty keeps all
    pub classes: Vec<usize>,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            confidence: 0.25,
            iou: 0.7,
            classes: Vec::new(),
        }
    }
}

pub struct YoloDetector {
    name: String,
    model: Model,
    params: YoloParams,
}

impl std::fmt::Debug for YoloDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloDetector")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

impl YoloDetector {
    /// Load a converted YOLO model from disk
    pub fn load(name: impl Into<String>, path: &Path, params: YoloParams) -> anyhow::Result<Self> {
        let name = name.into();
        if !path.is_file() {
            anyhow::bail!("{} model not found at {}", name, path.display());
        }
        let model = Model::load_file(path)
            .with_context(|| format!("Failed to load {} model from {:?}", name, path))?;
        Ok(Self { name, model, params })
    }

    fn inference_error(&self, message: impl ToString) -> DetectionError {
        DetectionError::Inference {
            model: self.name.clone(),
            message: message.to_string(),
        }
    }
}

impl ObjectDetector for YoloDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, DetectionError> {
        let size = self.params.input_size as usize;
        let (data, ratio) = letterbox(image, self.params.input_size);
        let input = NdTensor::from_data([1, 3, size, size], data);

        let output = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|e| self.inference_error(e))?;
        let output: NdTensor<f32, 3> = output.try_into().map_err(|e| self.inference_error(e))?;

        let [batch, attrs, boxes] = output.shape();
        if batch != 1 || attrs <= CXYWH_OFFSET {
            return Err(DetectionError::OutputShape {
                model: self.name.clone(),
                shape: vec![batch, attrs, boxes],
            });
        }

        let mut detections = decode_predictions(
            &output.to_vec(),
            attrs,
            boxes,
            ratio,
            image.dimensions(),
            &self.params,
        );
        non_max_suppression(&mut detections, self.params.iou);
        Ok(detections)
    }
}

/// Scale `image` to fit an `size`x`size` square anchored at the top-left,
/// pad the rest, and lay it out as planar RGB in `[0, 1]`.
///
/// Returns the tensor data and the scale ratio applied to the image.
pub fn letterbox(image: &RgbImage, size: u32) -> (Vec<f32>, f32) {
    let (w0, h0) = image.dimensions();
    let ratio = (size as f32 / w0 as f32).min(size as f32 / h0 as f32);
    let w1 = ((w0 as f32 * ratio).round() as u32).clamp(1, size);
    let h1 = ((h0 as f32 * ratio).round() as u32).clamp(1, size);
    let resized = image::imageops::resize(image, w1, h1, FilterType::Triangle);

    let plane = (size * size) as usize;
    let mut data = vec![PAD_VALUE; 3 * plane];
    for (x, y, rgb) in resized.enumerate_pixels() {
        let idx = (y * size + x) as usize;
        for c in 0..3 {
            data[c * plane + idx] = rgb[c] as f32 / 255.0;
        }
    }
    (data, ratio)
}

/// Decode a row-major `[attrs, boxes]` prediction matrix into detections in
/// original image coordinates
pub fn decode_predictions(
    output: &[f32],
    attrs: usize,
    boxes: usize,
    ratio: f32,
    (orig_w, orig_h): (u32, u32),
    params: &YoloParams,
) -> Vec<Detection> {
    let at = |attr: usize, i: usize| output[attr * boxes + i];
    let (orig_w, orig_h) = (orig_w as f32, orig_h as f32);
    let mut detections = Vec::new();

    for i in 0..boxes {
        let Some((class_id, confidence)) = (CXYWH_OFFSET..attrs)
            .map(|attr| (attr - CXYWH_OFFSET, at(attr, i)))
            .reduce(|best, x| if x.1 > best.1 { x } else { best })
        else {
            continue;
        };

        if confidence < params.confidence {
            continue;
        }
        if !params.classes.is_empty() && !params.classes.contains(&class_id) {
            continue;
        }

        let cx = at(0, i) / ratio;
        let cy = at(1, i) / ratio;
        let w = at(2, i) / ratio;
        let h = at(3, i) / ratio;

        detections.push(Detection {
            bbox: BoundingBox::new(
                (cx - w / 2.0).clamp(0.0, orig_w),
                (cy - h / 2.0).clamp(0.0, orig_h),
                (cx + w / 2.0).clamp(0.0, orig_w),
                (cy + h / 2.0).clamp(0.0, orig_h),
            ),
            confidence,
            class_id,
        });
    }

    detections
}

/// Greedy per-class NMS; leaves detections sorted by descending confidence
pub fn non_max_suppression(detections: &mut Vec<Detection>, iou_threshold: f32) {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept = 0;
    for index in 0..detections.len() {
        let suppressed = (0..kept).any(|prev| {
            detections[prev].class_id == detections[index].class_id
                && detections[prev].bbox.iou(&detections[index].bbox) > iou_threshold
        });
        if !suppressed {
            detections.swap(kept, index);
            kept += 1;
        }
    }
    detections.truncate(kept);
}
