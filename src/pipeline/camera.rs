use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};

use anyhow::{Result, anyhow};
use crossbeam_channel::{Sender, TrySendError};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraFormat, CameraIndex, CameraInfo, FrameFormat, RequestedFormat,
        RequestedFormatType, Resolution,
    },
};

use super::rgba_converter;
use crate::types::Frame;

// Prefer pixel formats that are widely supported on macOS (the built-in cameras
// often reject YUYV even though Nokhwa reports it).
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

const REQUESTED_FPS: u32 = 30;
/// The stream is considered gone after this many reads fail in a row.
const MAX_CONSECUTIVE_FAILURES: u32 = 60;

fn requested_formats(width: u32, height: u32) -> [RequestedFormat<'static>; 4] {
    let preferred = CameraFormat::new(
        Resolution::new(width, height),
        FrameFormat::MJPEG,
        REQUESTED_FPS,
    );
    [
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(preferred)),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: CameraIndex,
    pub label: String,
}

#[derive(Debug)]
pub struct CameraStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn available_cameras() -> Result<Vec<CameraDevice>> {
    let cameras = query(ApiBackend::Auto)?;
    Ok(cameras
        .into_iter()
        .map(|info| CameraDevice {
            index: info.index().clone(),
            label: format_camera_label(&info),
        })
        .collect())
}

fn format_camera_label(info: &CameraInfo) -> String {
    info.human_name()
}

fn build_camera(index: &CameraIndex, width: u32, height: u32) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats(width, height) {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

pub fn start_camera_stream(
    index: CameraIndex,
    (width, height): (u32, u32),
    frame_tx: Sender<Frame>,
) -> Result<CameraStream> {
    // Fail fast before spawning the capture thread.
    let probe = build_camera(&index, width, height)?;
    let format = probe.camera_format();
    log::info!(
        "camera {index} streaming {}x{} {:?} @ {} fps (requested {width}x{height})",
        format.width(),
        format.height(),
        format.format(),
        format.frame_rate()
    );
    drop(probe);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::spawn(move || {
        let mut camera = match build_camera(&index, width, height) {
            Ok(cam) => cam,
            Err(err) => {
                log::error!("failed to open camera: {err:?}");
                return;
            }
        };

        let mut failures = 0u32;
        while !stop_flag.load(Ordering::Relaxed) {
            if failures >= MAX_CONSECUTIVE_FAILURES {
                log::error!("camera stopped delivering frames after {failures} failed reads");
                break;
            }

            let buffer = match camera.frame() {
                Ok(buffer) => buffer,
                Err(err) => {
                    failures += 1;
                    log::warn!("camera frame read failed: {err:?}");
                    continue;
                }
            };

            let frame = match rgba_converter::convert_camera_frame(&buffer, Instant::now()) {
                Ok(frame) => frame,
                Err(err) => {
                    failures += 1;
                    log::warn!("failed to decode camera frame: {err}");
                    continue;
                }
            };
            failures = 0;

            // Drop if the worker is busy, otherwise forward every frame.
            if let Err(TrySendError::Disconnected(_)) = frame_tx.try_send(frame) {
                log::info!("frame consumer went away, stopping camera");
                break;
            }
        }

        let _ = camera.stop_stream();
    });

    Ok(CameraStream {
        stop,
        handle: Some(handle),
    })
}
