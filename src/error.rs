// src/error.rs - Typed failures for each stage of the overlay pipeline
use std::path::PathBuf;
use thiserror::Error;

/// Model or asset failed to load. Fatal: the render loop is never started.
#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("model asset not found: {0}")]
    ModelAssetMissing(PathBuf),

    #[error("invalid detector option `{option}`: {reason}")]
    InvalidOption { option: &'static str, reason: String },

    #[error("failed to start pose worker `{command}`: {source}")]
    WorkerSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("pose worker did not become ready: {0}")]
    WorkerHandshake(String),
}

/// Per-frame failure. Callers treat it as "no detection this frame".
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("landmarker is not initialized")]
    NotInitialized,

    #[error("frame unreadable: {0}")]
    FrameUnreadable(String),

    #[error("pose worker I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("pose worker exited")]
    WorkerExited,

    #[error("malformed pose worker reply: {0}")]
    MalformedReply(#[from] serde_json::Error),

    #[error("pose worker reported: {0}")]
    Worker(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("canvas has no drawable area ({width}x{height})")]
    InvalidCanvas { width: u32, height: u32 },

    #[error("non-finite coordinates ({x}, {y})")]
    InvalidCoordinates { x: f64, y: f64 },

    #[error("invalid marker radius {0}")]
    InvalidRadius(f32),
}

/// Socket transport only. Ends the reader, never the host process.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("could not connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connection lost: {0}")]
    Lost(#[from] std::io::Error),

    #[error("peer closed the connection")]
    Closed,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("webcam access denied or unavailable: {0}")]
    Unavailable(String),

    #[error("failed to capture frame: {0}")]
    Frame(String),
}

impl From<CaptureError> for DetectionError {
    fn from(err: CaptureError) -> Self {
        DetectionError::FrameUnreadable(err.to_string())
    }
}
