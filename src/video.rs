// src/video.rs - Webcam acquisition
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;

use crate::config::CameraConfig;
use crate::error::CaptureError;

#[derive(Debug, Clone)]
pub struct VideoFrame {
    image: RgbImage,
}

impl VideoFrame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Tightly packed RGB8 rows.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }
}

/// Where the render loop pulls frames from.
pub trait FrameSource {
    fn grab(&mut self) -> Result<VideoFrame, CaptureError>;
}

/// Raw, unmirrored camera frames. Left and right stay the way the pose model
/// expects them; mirroring is a display concern.
pub struct CameraFeed {
    camera: Camera,
}

impl CameraFeed {
    /// Opens the camera and starts streaming right away so a permission
    /// problem shows up here rather than on the first frame.
    pub fn open(config: &CameraConfig) -> Result<Self, CaptureError> {
        tracing::info!(index = config.index, "opening camera");

        let format = CameraFormat::new(
            Resolution::new(config.width, config.height),
            FrameFormat::MJPEG,
            config.fps,
        );
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

        let mut camera = Camera::new(CameraIndex::Index(config.index), requested)
            .map_err(|e| CaptureError::Unavailable(e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| CaptureError::Unavailable(e.to_string()))?;

        let resolution = camera.resolution();
        tracing::info!(
            width = resolution.width(),
            height = resolution.height(),
            fps = camera.frame_rate(),
            "camera stream open"
        );

        Ok(Self { camera })
    }
}

impl FrameSource for CameraFeed {
    fn grab(&mut self) -> Result<VideoFrame, CaptureError> {
        let frame = self
            .camera
            .frame()
            .map_err(|e| CaptureError::Frame(e.to_string()))?;
        let decoded = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| CaptureError::Frame(e.to_string()))?;
        Ok(VideoFrame::new(decoded))
    }
}

impl Drop for CameraFeed {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            tracing::warn!("failed to stop camera stream: {}", e);
        }
    }
}
