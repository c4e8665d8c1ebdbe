// src/render_loop.rs - Self-rescheduling acquire -> detect -> draw loop
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::LoopConfig;
use crate::elbows;
use crate::error::{DetectionError, RenderError};
use crate::landmarks::{InterruptHandle, LandmarkSet, LandmarkSource};
use crate::render::{self, AmputationType, Canvas, MarkerStyles};
use crate::video::{FrameSource, VideoFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickId(pub u64);

/// The host's per-frame animation tick.
pub trait Scheduler {
    /// Queues one continuation for the next tick.
    fn schedule(&mut self) -> TickId;
    /// Revokes a queued continuation. It must not fire afterwards.
    fn cancel(&mut self, tick: TickId);
}

/// Monotonic time since an arbitrary origin.
pub trait Clock {
    fn now(&self) -> Duration;
}

pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

pub type DetectionOutcome = Result<Option<LandmarkSet>, DetectionError>;

pub enum DetectionPoll {
    Pending,
    Ready(DetectionOutcome),
}

/// Hands frames to a landmark source and reports back when it is done.
/// At most one request is outstanding at a time; the loop enforces that.
pub trait DetectionDispatch {
    fn submit(&mut self, frame: VideoFrame, timestamp: Duration);
    fn poll(&mut self) -> DetectionPoll;
    /// Forget the outstanding request. Its result, if it ever arrives, is dropped.
    fn abandon(&mut self);
}

/// Runs the source synchronously inside `submit`.
pub struct InlineDetector<S> {
    source: S,
    outcome: Option<DetectionOutcome>,
}

impl<S: LandmarkSource> InlineDetector<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            outcome: None,
        }
    }
}

impl<S: LandmarkSource> DetectionDispatch for InlineDetector<S> {
    fn submit(&mut self, frame: VideoFrame, timestamp: Duration) {
        self.outcome = Some(self.source.detect(&frame, timestamp));
    }

    fn poll(&mut self) -> DetectionPoll {
        match self.outcome.take() {
            Some(outcome) => DetectionPoll::Ready(outcome),
            None => DetectionPoll::Pending,
        }
    }

    fn abandon(&mut self) {
        self.outcome = None;
    }
}

/// Owns the source on a single worker thread so a slow model never blocks
/// the UI tick. The source is still only ever called serially.
pub struct WorkerDetector {
    jobs: Option<Sender<(VideoFrame, Duration)>>,
    results: Receiver<DetectionOutcome>,
    handle: Option<JoinHandle<()>>,
    interrupt: Option<InterruptHandle>,
    in_flight: bool,
    stale: usize,
    send_failed: bool,
}

impl WorkerDetector {
    pub fn spawn<S: LandmarkSource + 'static>(mut source: S) -> std::io::Result<Self> {
        let interrupt = source.interrupt_handle();
        let (job_tx, job_rx) = mpsc::channel::<(VideoFrame, Duration)>();
        let (result_tx, result_rx) = mpsc::channel();

        let handle = std::thread::Builder::new()
            .name("pose-detector".to_string())
            .spawn(move || {
                for (frame, timestamp) in job_rx {
                    let outcome = source.detect(&frame, timestamp);
                    if result_tx.send(outcome).is_err() {
                        break;
                    }
                }
                tracing::debug!("detector worker exiting");
            })?;

        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            handle: Some(handle),
            interrupt,
            in_flight: false,
            stale: 0,
            send_failed: false,
        })
    }
}

impl DetectionDispatch for WorkerDetector {
    fn submit(&mut self, frame: VideoFrame, timestamp: Duration) {
        self.in_flight = true;
        let sent = self
            .jobs
            .as_ref()
            .map(|jobs| jobs.send((frame, timestamp)).is_ok())
            .unwrap_or(false);
        self.send_failed = !sent;
    }

    fn poll(&mut self) -> DetectionPoll {
        if self.send_failed {
            self.send_failed = false;
            self.in_flight = false;
            return DetectionPoll::Ready(Err(DetectionError::WorkerExited));
        }
        loop {
            match self.results.try_recv() {
                Ok(_) if self.stale > 0 => self.stale -= 1,
                Ok(outcome) => {
                    self.in_flight = false;
                    return DetectionPoll::Ready(outcome);
                }
                Err(TryRecvError::Empty) => return DetectionPoll::Pending,
                Err(TryRecvError::Disconnected) => {
                    self.in_flight = false;
                    return DetectionPoll::Ready(Err(DetectionError::WorkerExited));
                }
            }
        }
    }

    fn abandon(&mut self) {
        if self.in_flight && !self.send_failed {
            self.stale += 1;
        }
        self.in_flight = false;
        self.send_failed = false;
    }
}

impl Drop for WorkerDetector {
    fn drop(&mut self) {
        // Closing the job channel ends the worker after its current frame.
        self.jobs = None;
        while self.stale > 0 && self.results.try_recv().is_ok() {
            self.stale -= 1;
        }

        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => return,
        };
        if self.in_flight || self.stale > 0 {
            // Never wait on a detection from the UI thread; the worker exits
            // on its own once the current call returns.
            if let Some(interrupt) = &self.interrupt {
                interrupt.interrupt();
            }
            tracing::debug!("detaching busy detector worker");
            return;
        }
        if handle.join().is_err() {
            tracing::error!("detector worker panicked");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Scheduled,
    Detecting,
    Rendering,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub detections: u64,
    pub misses: u64,
    pub skipped: u64,
    pub render_failures: u64,
}

pub struct RenderLoop<C: Canvas> {
    canvas: C,
    frames: Box<dyn FrameSource>,
    detector: Box<dyn DetectionDispatch>,
    scheduler: Box<dyn Scheduler>,
    clock: Box<dyn Clock>,
    styles: MarkerStyles,
    throttle_interval: Duration,

    state: LoopState,
    pending_tick: Option<TickId>,
    processing: bool,
    submitted_at: Option<Duration>,
    last_detection: Option<Duration>,
    display_frame: Option<VideoFrame>,
    stats: LoopStats,
}

impl<C: Canvas> RenderLoop<C> {
    pub fn new(
        canvas: C,
        frames: Box<dyn FrameSource>,
        detector: Box<dyn DetectionDispatch>,
        scheduler: Box<dyn Scheduler>,
        clock: Box<dyn Clock>,
        config: &LoopConfig,
        styles: MarkerStyles,
    ) -> Self {
        Self {
            canvas,
            frames,
            detector,
            scheduler,
            clock,
            styles,
            throttle_interval: config.throttle_interval(),
            state: LoopState::Idle,
            pending_tick: None,
            processing: false,
            submitted_at: None,
            last_detection: None,
            display_frame: None,
            stats: LoopStats::default(),
        }
    }

    pub fn start(&mut self) {
        if self.state != LoopState::Idle {
            tracing::warn!(state = ?self.state, "render loop already started");
            return;
        }
        tracing::info!(interval = ?self.throttle_interval, "render loop started");
        self.reschedule();
    }

    /// Runs the continuation registered for `tick`. Ticks that were revoked or
    /// superseded are ignored.
    pub fn on_tick(&mut self, tick: TickId, amputation: AmputationType) {
        if self.state == LoopState::Cancelled || self.pending_tick != Some(tick) {
            tracing::debug!(?tick, "ignoring stale tick");
            return;
        }
        self.pending_tick = None;
        self.stats.ticks += 1;

        self.step(amputation);
        self.reschedule();
    }

    /// Revokes the pending tick and abandons any in-flight detection.
    pub fn cancel(&mut self) {
        if self.state == LoopState::Cancelled {
            return;
        }
        if let Some(tick) = self.pending_tick.take() {
            self.scheduler.cancel(tick);
        }
        if self.processing {
            self.detector.abandon();
            self.processing = false;
            self.submitted_at = None;
        }
        self.state = LoopState::Cancelled;
        tracing::info!(stats = ?self.stats, "render loop cancelled");
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn pending_tick(&self) -> Option<TickId> {
        self.pending_tick
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// The newest grabbed frame, if one arrived since the last call. Frames
    /// are grabbed every tick, whether or not a detection is running.
    pub fn take_frame(&mut self) -> Option<VideoFrame> {
        self.display_frame.take()
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    fn step(&mut self, amputation: AmputationType) {
        let grabbed = self.frames.grab();
        if let Ok(frame) = &grabbed {
            self.display_frame = Some(frame.clone());
        }

        if self.processing {
            match self.detector.poll() {
                DetectionPoll::Pending => self.stats.skipped += 1,
                DetectionPoll::Ready(outcome) => self.finish_detection(outcome, amputation),
            }
            return;
        }

        let now = self.clock.now();
        if let Some(last) = self.last_detection {
            if now.saturating_sub(last) < self.throttle_interval {
                self.stats.skipped += 1;
                return;
            }
        }

        let frame = match grabbed {
            Ok(frame) => frame,
            Err(e) => {
                self.record_miss(DetectionError::from(e));
                return;
            }
        };

        self.processing = true;
        self.submitted_at = Some(now);
        self.state = LoopState::Detecting;
        self.detector.submit(frame, now);

        // Inline dispatchers finish inside submit.
        if let DetectionPoll::Ready(outcome) = self.detector.poll() {
            self.finish_detection(outcome, amputation);
        }
    }

    fn finish_detection(&mut self, outcome: DetectionOutcome, amputation: AmputationType) {
        self.processing = false;
        let submitted_at = self.submitted_at.take();

        match outcome {
            Ok(Some(landmarks)) => {
                self.last_detection = submitted_at;
                self.stats.detections += 1;
                self.state = LoopState::Rendering;

                let elbows = elbows::extract(&landmarks);
                let styles = &self.styles;
                let result = render::render_elbows(&mut self.canvas, &elbows, amputation, styles)
                    .map(|_| ());
                self.absorb_render_error(result);
            }
            Ok(None) => {
                self.last_detection = submitted_at;
                self.stats.detections += 1;
                tracing::debug!("no pose in frame");
                self.clear_canvas();
            }
            Err(e) => self.record_miss(e),
        }
    }

    fn record_miss(&mut self, error: DetectionError) {
        self.stats.misses += 1;
        tracing::debug!("no detection this frame: {}", error);
        self.clear_canvas();
    }

    fn clear_canvas(&mut self) {
        let result = self.canvas.clear();
        self.absorb_render_error(result);
    }

    fn absorb_render_error(&mut self, result: Result<(), RenderError>) {
        if let Err(e) = result {
            self.stats.render_failures += 1;
            tracing::warn!("skipping frame, render failed: {}", e);
        }
    }

    fn reschedule(&mut self) {
        if self.state == LoopState::Cancelled {
            return;
        }
        self.pending_tick = Some(self.scheduler.schedule());
        self.state = if self.processing {
            LoopState::Detecting
        } else {
            LoopState::Scheduled
        };
    }
}

impl<C: Canvas> Drop for RenderLoop<C> {
    fn drop(&mut self) {
        self.cancel();
    }
}
