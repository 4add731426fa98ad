#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod config;
mod counting;
mod fps;
mod model_download;
mod pipeline;
mod types;
mod ui;

use anyhow::{Context, Result};
use crossbeam_channel::bounded;
use gpui::Application;
use nokhwa::utils::CameraIndex;

use config::CounterConfig;
use pipeline::RecognizerBackend;

fn main() -> Result<()> {
    env_logger::init();

    let config = CounterConfig::from_env().context("invalid configuration")?;
    log::info!("starting finger counter with {config:?}");

    let camera_index = CameraIndex::Index(config.camera_index);
    match pipeline::available_cameras() {
        Ok(cameras) => {
            for device in &cameras {
                log::info!("found camera {}: {}", device.index, device.label);
            }
            if !cameras.iter().any(|device| device.index == camera_index) {
                log::warn!(
                    "camera {camera_index} not among {} listed device(s), trying anyway",
                    cameras.len()
                );
            }
        }
        Err(err) => log::warn!("failed to list cameras: {err:?}"),
    }

    let (camera_frame_tx, camera_frame_rx) = bounded(1);
    let (counted_tx, counted_rx) = bounded(1);

    let recognizer_handle = pipeline::start_recognizer(
        RecognizerBackend::from_config(&config),
        camera_frame_rx,
        counted_tx,
    );
    let camera_stream = pipeline::start_camera_stream(
        camera_index,
        (config.frame_width, config.frame_height),
        camera_frame_tx,
    )
    .context("failed to start camera")?;

    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            if let Err(err) = ui::launch_ui(app, counted_rx, camera_stream, recognizer_handle) {
                log::error!("failed to launch ui: {err:?}");
                app.quit();
            }
        });

    Ok(())
}
