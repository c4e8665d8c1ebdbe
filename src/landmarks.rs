// src/landmarks.rs - Pose landmark types and the detection capability boundary
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::DetectionError;
use crate::video::VideoFrame;

// MediaPipe Pose landmark indices (33 total)
pub const LEFT_ELBOW: usize = 13;
pub const RIGHT_ELBOW: usize = 14;
pub const POSE_LANDMARK_COUNT: usize = 33;

/// A single body keypoint, normalized to the frame bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z, visibility: None }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// One pose worth of landmarks in the model's canonical layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkSet {
    landmarks: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index)
    }
}

/// Unblocks a `detect` call running on another thread.
pub struct InterruptHandle(Box<dyn Fn() + Send>);

impl InterruptHandle {
    pub fn new(interrupt: impl Fn() + Send + 'static) -> Self {
        Self(Box::new(interrupt))
    }

    pub fn interrupt(&self) {
        (self.0)()
    }
}

/// The opaque pose-estimation capability.
///
/// Takes `&mut self` because the underlying model is not reentrant: a source
/// can only ever serve one request at a time. `timestamp` is monotonic and
/// strictly increasing across calls, as video-mode models require.
pub trait LandmarkSource: Send {
    fn detect(
        &mut self,
        frame: &VideoFrame,
        timestamp: Duration,
    ) -> Result<Option<LandmarkSet>, DetectionError>;

    /// Sources that can be stuck inside `detect` hand out a way to break it.
    fn interrupt_handle(&self) -> Option<InterruptHandle> {
        None
    }
}
