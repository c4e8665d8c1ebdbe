// src/main.rs
mod app;
mod config;
mod elbows;
mod error;
mod landmarks;
mod mediapipe_bridge;
mod render;
mod render_loop;
mod transport;
mod ui;
mod video;

use eframe::egui;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{:#}, falling back to defaults", e);
            AppConfig::default()
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 800.0])
            .with_min_inner_size([640.0, 560.0]),
        centered: true,
        ..Default::default()
    };

    let result = eframe::run_native(
        "Phantom Hand",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());
            Box::new(app::PhantomHandApp::new(cc, config))
        }),
    );

    if let Err(e) = result {
        tracing::error!("Error running application: {:?}", e);
    }
}
