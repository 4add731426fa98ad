use std::{path::Path, thread};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, Sender};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{
    HandLandmarker, RecognizerBackend,
    common::{self, DetectedHand},
    palm::{PalmDetector, PalmRegion, crop_from_palm, select_regions},
    run_worker_loop,
};
use crate::{
    model_download::{ModelKind, ensure_model_ready},
    types::{CountedFrame, Frame},
};

pub fn start_worker(
    backend: RecognizerBackend,
    frame_rx: Receiver<Frame>,
    result_tx: Sender<CountedFrame>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let palm_path = backend.model_path(ModelKind::PalmDetector);
        let landmark_path = backend.model_path(ModelKind::HandLandmarker);

        for (kind, path) in [
            (ModelKind::PalmDetector, &palm_path),
            (ModelKind::HandLandmarker, &landmark_path),
        ] {
            if let Err(err) = ensure_model_ready(kind, path, |_evt| {}) {
                log::error!(
                    "failed to prepare {} model at {}: {err:?}",
                    kind.label(),
                    path.display()
                );
                return;
            }
        }

        let engine = match OrtEngine::new(&landmark_path, &palm_path, &backend) {
            Ok(engine) => {
                log::info!(
                    "hand landmark ORT backend ready using {} and palm detector {}",
                    landmark_path.display(),
                    palm_path.display()
                );
                engine
            }
            Err(err) => {
                log::error!("failed to load ORT hand models: {err:?}");
                return;
            }
        };

        run_worker_loop(engine, frame_rx, result_tx, backend.min_landmark_confidence);
    })
}

struct OrtEngine {
    landmarker: Session,
    palm_detector: PalmDetector,
    max_hands: usize,
}

impl OrtEngine {
    fn new(
        model_path: &Path,
        palm_detector_model_path: &Path,
        backend: &RecognizerBackend,
    ) -> Result<Self> {
        let landmarker = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load ORT session from {}", model_path.display()))?;

        let palm_detector = PalmDetector::new(palm_detector_model_path, backend.palm.clone())?;

        Ok(Self {
            landmarker,
            palm_detector,
            max_hands: backend.max_hands,
        })
    }

    fn estimate(&mut self, frame: &Frame, palm: &PalmRegion) -> Result<DetectedHand> {
        let (center, side, angle) = crop_from_palm(palm);
        let (input, transform) = common::prepare_rotated_crop(
            frame,
            center,
            side,
            angle,
            common::LANDMARK_INPUT_SIZE,
        )?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .landmarker
            .run(ort::inputs![tensor])
            .context("failed to run ORT session")?;

        if outputs.len() < 1 {
            return Err(anyhow!("model returned no outputs"));
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flattened: Vec<f32> = coords.iter().copied().collect();
        let landmarks = common::decode_landmarks(&flattened)?;

        let scalar_output = |idx: usize| -> f32 {
            if idx >= outputs.len() {
                return 0.0;
            }
            outputs[idx]
                .try_extract_array::<f32>()
                .ok()
                .and_then(|arr| arr.iter().next().copied())
                .unwrap_or(0.0)
        };
        let confidence = scalar_output(1);
        let handedness = scalar_output(2);

        Ok(DetectedHand {
            landmarks: common::project_landmarks_with_transform(&landmarks, &transform),
            confidence: (confidence * palm.score).clamp(0.0, 1.0),
            handedness,
        })
    }
}

impl HandLandmarker for OrtEngine {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedHand>> {
        let palm_regions = self.palm_detector.detect(frame).unwrap_or_else(|err| {
            log::warn!("palm detection failed: {err:?}");
            Vec::new()
        });

        let mut hands = Vec::new();
        for palm in select_regions(&palm_regions, self.max_hands) {
            match self.estimate(frame, palm) {
                Ok(hand) => hands.push(hand),
                Err(err) => log::warn!("hand landmark estimation failed: {err:?}"),
            }
        }
        Ok(hands)
    }
}
