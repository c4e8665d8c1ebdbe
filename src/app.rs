// src/app.rs - Host window: amputation selector, webcam toggle, overlay view
use eframe::egui;

use crate::config::{AppConfig, TransportMode};
use crate::mediapipe_bridge::PoseLandmarker;
use crate::render::{self, AmputationType, Canvas, OverlayCanvas};
use crate::render_loop::{
    DetectionDispatch, InlineDetector, MonotonicClock, RenderLoop, Scheduler, TickId, WorkerDetector,
};
use crate::transport::SocketFeed;
use crate::ui::{Theme, VideoWidget};
use crate::video::CameraFeed;

/// Each repaint is one animation tick. A revoked tick simply never gets
/// handed to the loop again, so cancelling needs no cooperation from egui.
struct RepaintScheduler {
    ctx: egui::Context,
    next: u64,
}

impl Scheduler for RepaintScheduler {
    fn schedule(&mut self) -> TickId {
        self.next += 1;
        self.ctx.request_repaint();
        TickId(self.next)
    }

    fn cancel(&mut self, tick: TickId) {
        tracing::debug!(?tick, "tick revoked");
    }
}

enum Session {
    Camera(RenderLoop<OverlayCanvas>),
    Socket { feed: SocketFeed, canvas: OverlayCanvas },
}

enum Notice {
    CouldNotStart(String),
    WebcamDenied(String),
    Disconnected,
}

impl Notice {
    fn text(&self) -> String {
        match self {
            Notice::CouldNotStart(reason) => format!("Could not start pose detection: {}", reason),
            Notice::WebcamDenied(reason) => {
                format!("Webcam access denied. Check your permissions and try again. ({})", reason)
            }
            Notice::Disconnected => "Tracker connection closed.".to_string(),
        }
    }
}

pub struct PhantomHandApp {
    config: AppConfig,
    amputation: AmputationType,
    session: Option<Session>,
    notice: Option<Notice>,
    video: VideoWidget,
    theme: Theme,
}

impl PhantomHandApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: AppConfig) -> Self {
        Self {
            amputation: config.amputation,
            session: None,
            notice: None,
            video: VideoWidget::new(config.camera.mirror),
            theme: Theme::default(),
            config,
        }
    }

    fn start(&mut self, ctx: &egui::Context) {
        self.notice = None;
        let session = match self.config.transport.mode {
            TransportMode::Camera => self.start_camera(ctx),
            TransportMode::Socket => self.start_socket(),
        };
        self.session = session;
    }

    fn start_camera(&mut self, ctx: &egui::Context) -> Option<Session> {
        let camera = match CameraFeed::open(&self.config.camera) {
            Ok(camera) => camera,
            Err(e) => {
                tracing::error!("{}", e);
                self.notice = Some(Notice::WebcamDenied(e.to_string()));
                return None;
            }
        };

        let landmarker = match PoseLandmarker::from_options(&self.config.detector) {
            Ok(landmarker) => landmarker,
            Err(e) => {
                tracing::error!("pose detection failed to initialize: {}", e);
                self.notice = Some(Notice::CouldNotStart(e.to_string()));
                return None;
            }
        };

        let detector: Box<dyn DetectionDispatch> = if self.config.render_loop.worker_thread {
            match WorkerDetector::spawn(landmarker) {
                Ok(worker) => Box::new(worker),
                Err(e) => {
                    tracing::error!("failed to spawn detector thread: {}", e);
                    self.notice = Some(Notice::CouldNotStart(e.to_string()));
                    return None;
                }
            }
        } else {
            Box::new(InlineDetector::new(landmarker))
        };

        let scheduler = RepaintScheduler {
            ctx: ctx.clone(),
            next: 0,
        };

        let mut render_loop = RenderLoop::new(
            OverlayCanvas::new(self.config.camera.width, self.config.camera.height),
            Box::new(camera),
            detector,
            Box::new(scheduler),
            Box::new(MonotonicClock::default()),
            &self.config.render_loop,
            self.config.markers.clone(),
        );
        render_loop.start();
        Some(Session::Camera(render_loop))
    }

    fn start_socket(&mut self) -> Option<Session> {
        match SocketFeed::connect(&self.config.transport.address) {
            Ok(feed) => Some(Session::Socket {
                feed,
                canvas: OverlayCanvas::new(self.config.camera.width, self.config.camera.height),
            }),
            Err(e) => {
                tracing::error!("{}", e);
                self.notice = Some(Notice::CouldNotStart(e.to_string()));
                None
            }
        }
    }

    fn stop(&mut self) {
        match self.session.take() {
            Some(Session::Camera(mut render_loop)) => render_loop.cancel(),
            Some(Session::Socket { mut feed, .. }) => {
                if let Some(reason) = feed.shutdown() {
                    tracing::debug!("socket feed closed: {}", reason);
                }
            }
            None => {}
        }
        self.video.clear();
    }

    /// Fires the pending tick, or applies queued socket positions.
    fn advance(&mut self, ctx: &egui::Context) {
        let amputation = self.amputation;
        let mut disconnected = false;

        match self.session.as_mut() {
            Some(Session::Camera(render_loop)) => {
                if let Some(tick) = render_loop.pending_tick() {
                    render_loop.on_tick(tick, amputation);
                }
                if let Some(frame) = render_loop.take_frame() {
                    let canvas = render_loop.canvas_mut();
                    if canvas.width() != frame.width() || canvas.height() != frame.height() {
                        canvas.resize(frame.width(), frame.height());
                    }
                    self.video.update_frame(ctx, &frame);
                }
            }
            Some(Session::Socket { feed, canvas }) => {
                let style = self.config.markers.style_for(amputation.sides()[0]);
                for position in feed.drain() {
                    if let Err(e) = render::render_position(canvas, &position, style) {
                        tracing::warn!("skipping position, render failed: {}", e);
                    }
                }
                disconnected = !feed.is_connected();
                ctx.request_repaint();
            }
            None => {}
        }

        if disconnected {
            tracing::warn!("tracker connection closed");
            self.stop();
            self.notice = Some(Notice::Disconnected);
        }
    }

    fn render_header(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(10.0);
            ui.horizontal(|ui| {
                ui.heading("Phantom Hand");
                ui.separator();

                egui::ComboBox::from_label("Amputation")
                    .selected_text(self.amputation.label())
                    .show_ui(ui, |ui| {
                        for option in AmputationType::ALL {
                            ui.selectable_value(&mut self.amputation, option, option.label());
                        }
                    });

                ui.separator();

                let running = self.session.is_some();
                let label = if running { "Disable Webcam" } else { "Enable Webcam" };
                if ui.button(label).clicked() {
                    if running {
                        self.stop();
                    } else {
                        self.start(ctx);
                    }
                }

                if let Some(Session::Camera(render_loop)) = &self.session {
                    let stats = render_loop.stats();
                    ui.colored_label(
                        self.theme.text_secondary,
                        format!(
                            "{:?} | detections {} | misses {}",
                            render_loop.state(),
                            stats.detections,
                            stats.misses
                        ),
                    );
                }
            });

            if let Some(notice) = &self.notice {
                ui.colored_label(self.theme.error, notice.text());
            } else if self.session.is_some() {
                ui.colored_label(self.theme.success, "Tracking");
            }
            ui.add_space(10.0);
        });
    }
}

impl eframe::App for PhantomHandApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.advance(ctx);
        self.render_header(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            let overlay = match &self.session {
                Some(Session::Camera(render_loop)) => Some(render_loop.canvas()),
                Some(Session::Socket { canvas, .. }) => Some(canvas),
                None => None,
            };
            self.video.show(ui, overlay);
        });
    }
}
