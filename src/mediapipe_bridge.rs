// src/mediapipe_bridge.rs - Pose landmarker backed by an external MediaPipe worker process
//
// Wire protocol over the worker's stdin/stdout:
//   worker -> us, once:      {"ready": true}            (or {"ready": false, "error": "..."})
//   us -> worker, per frame: {"width":W,"height":H,"timestamp_ms":T}\n followed by W*H*3 RGB bytes
//   worker -> us, per frame: {"landmarks": [[{"x":..,"y":..,"z":..,"visibility":..}, ...]]}
//                            or {"error": "..."}
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use crate::config::DetectorConfig;
use crate::error::{DetectionError, InitializationError};
use crate::landmarks::{InterruptHandle, Landmark, LandmarkSet, LandmarkSource, POSE_LANDMARK_COUNT};
use crate::video::VideoFrame;

#[derive(Debug, Deserialize)]
struct Handshake {
    ready: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct FrameHeader {
    width: u32,
    height: u32,
    timestamp_ms: u64,
}

#[derive(Debug, Deserialize)]
struct WorkerReply {
    #[serde(default)]
    landmarks: Vec<Vec<Landmark>>,
    #[serde(default)]
    error: Option<String>,
}

pub struct PoseLandmarker {
    // Shared so another thread can kill a worker that stopped answering.
    child: Arc<Mutex<Child>>,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    last_timestamp_ms: Option<u64>,
    exited: bool,
}

impl PoseLandmarker {
    pub fn from_options(config: &DetectorConfig) -> Result<Self, InitializationError> {
        config.validate()?;

        if !config.model_asset_path.is_file() {
            return Err(InitializationError::ModelAssetMissing(
                config.model_asset_path.clone(),
            ));
        }

        let (program, leading) = config
            .worker_command
            .split_first()
            .ok_or_else(|| InitializationError::InvalidOption {
                option: "worker_command",
                reason: "no program given".to_string(),
            })?;
        let command_line = config.worker_command.join(" ");

        tracing::info!(command = %command_line, model = %config.model_asset_path.display(), "starting pose worker");

        let mut child = Command::new(program)
            .args(leading)
            .arg("--model")
            .arg(&config.model_asset_path)
            .arg("--num-poses")
            .arg(config.num_poses.to_string())
            .arg("--min-pose-detection-confidence")
            .arg(config.min_pose_detection_confidence.to_string())
            .arg("--min-pose-presence-confidence")
            .arg(config.min_pose_presence_confidence.to_string())
            .arg("--min-tracking-confidence")
            .arg(config.min_tracking_confidence.to_string())
            .args(["--running-mode", "video"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| InitializationError::WorkerSpawn {
                command: command_line.clone(),
                source,
            })?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, BufReader::new(stdout)),
            _ => {
                terminate(&mut child);
                return Err(InitializationError::WorkerHandshake(
                    "worker pipes unavailable".to_string(),
                ));
            }
        };

        let stdout = match await_ready(stdout, config.handshake_timeout()) {
            Ok(stdout) => stdout,
            Err(e) => {
                terminate(&mut child);
                return Err(e);
            }
        };

        tracing::info!("pose worker ready");
        Ok(Self {
            child: Arc::new(Mutex::new(child)),
            stdin,
            stdout,
            last_timestamp_ms: None,
            exited: false,
        })
    }

    /// Video mode needs strictly increasing timestamps.
    fn next_timestamp(&mut self, timestamp: Duration) -> u64 {
        let requested = timestamp.as_millis() as u64;
        let ts = match self.last_timestamp_ms {
            Some(last) if requested <= last => last + 1,
            _ => requested,
        };
        self.last_timestamp_ms = Some(ts);
        ts
    }
}

impl LandmarkSource for PoseLandmarker {
    fn detect(
        &mut self,
        frame: &VideoFrame,
        timestamp: Duration,
    ) -> Result<Option<LandmarkSet>, DetectionError> {
        if self.exited {
            return Err(DetectionError::NotInitialized);
        }

        let expected = frame.width() as usize * frame.height() as usize * 3;
        if expected == 0 || frame.as_raw().len() != expected {
            return Err(DetectionError::FrameUnreadable(format!(
                "{}x{} frame with {} bytes",
                frame.width(),
                frame.height(),
                frame.as_raw().len()
            )));
        }

        let header = FrameHeader {
            width: frame.width(),
            height: frame.height(),
            timestamp_ms: self.next_timestamp(timestamp),
        };
        serde_json::to_writer(&mut self.stdin, &header).map_err(std::io::Error::from)?;
        self.stdin.write_all(b"\n")?;
        self.stdin.write_all(frame.as_raw())?;
        self.stdin.flush()?;

        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            tracing::error!("pose worker exited");
            self.exited = true;
            return Err(DetectionError::WorkerExited);
        }
        parse_reply(&line)
    }

    fn interrupt_handle(&self) -> Option<InterruptHandle> {
        let child = Arc::clone(&self.child);
        Some(InterruptHandle::new(move || {
            tracing::warn!("killing unresponsive pose worker");
            let mut child = child.lock().unwrap_or_else(|e| e.into_inner());
            let _ = child.kill();
        }))
    }
}

impl Drop for PoseLandmarker {
    fn drop(&mut self) {
        tracing::info!("shutting down pose worker");
        let mut child = self.child.lock().unwrap_or_else(|e| e.into_inner());
        terminate(&mut child);
    }
}

fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Waits for the ready line on a helper thread so a worker that never answers
/// cannot hang the caller. On error the caller kills the worker, which also
/// releases the helper.
fn await_ready(
    stdout: BufReader<ChildStdout>,
    timeout: Duration,
) -> Result<BufReader<ChildStdout>, InitializationError> {
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("pose-handshake".to_string())
        .spawn(move || {
            let mut stdout = stdout;
            let mut line = String::new();
            let read = stdout.read_line(&mut line).map(|n| (n, line));
            let _ = tx.send((stdout, read));
        })
        .map_err(|e| InitializationError::WorkerHandshake(e.to_string()))?;

    let (stdout, read) = rx.recv_timeout(timeout).map_err(|_| {
        InitializationError::WorkerHandshake(format!("worker not ready after {:?}", timeout))
    })?;
    let (read, line) = read.map_err(|e| InitializationError::WorkerHandshake(e.to_string()))?;
    if read == 0 {
        return Err(InitializationError::WorkerHandshake(
            "worker exited before becoming ready".to_string(),
        ));
    }

    let handshake: Handshake = serde_json::from_str(line.trim())
        .map_err(|e| InitializationError::WorkerHandshake(format!("bad handshake: {}", e)))?;
    if handshake.ready {
        Ok(stdout)
    } else {
        Err(InitializationError::WorkerHandshake(
            handshake.error.unwrap_or_else(|| "worker not ready".to_string()),
        ))
    }
}

fn parse_reply(line: &str) -> Result<Option<LandmarkSet>, DetectionError> {
    let reply: WorkerReply = serde_json::from_str(line.trim())?;
    if let Some(error) = reply.error {
        return Err(DetectionError::Worker(error));
    }
    let pose = reply.landmarks.into_iter().next();
    if let Some(landmarks) = &pose {
        if landmarks.len() != POSE_LANDMARK_COUNT {
            tracing::debug!(count = landmarks.len(), "unexpected landmark count");
        }
    }
    Ok(pose.map(LandmarkSet::new))
}
