//! Seams to the camera and the inference engine.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// One detection as produced by the inference engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// Detected category.
    #[serde(rename = "class", alias = "name", alias = "type")]
    pub class_label: String,

    /// Detector confidence (0.0 - 1.0).
    pub confidence: f64,

    /// Bounding box `[x1, y1, x2, y2]` in frame pixels, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "box")]
    pub bbox: Option<[f32; 4]>,
}

impl RawDetection {
    /// Create a detection without a bounding box.
    pub fn new(class_label: impl Into<String>, confidence: f64) -> Self {
        Self {
            class_label: class_label.into(),
            confidence,
            bbox: None,
        }
    }
}

/// Produces frames, e.g. a camera.
pub trait FrameSource {
    /// Frame type handed to the detector.
    type Frame;

    /// Grab the next frame. `Ok(None)` means the source is exhausted.
    ///
    /// A transient failure is reported as [`crate::Error::FrameGrab`]; the
    /// session skips that frame and keeps going.
    fn grab(&mut self) -> Result<Option<Self::Frame>>;
}

/// Runs the vision model on a frame.
pub trait Detector {
    /// Frame type this detector accepts.
    type Frame;

    /// Detect objects in `frame`. Thresholding happens downstream.
    fn detect(&mut self, frame: &Self::Frame) -> Result<Vec<RawDetection>>;
}
