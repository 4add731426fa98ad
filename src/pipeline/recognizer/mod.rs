mod common;
mod ort;
pub mod palm;

use std::{path::PathBuf, thread};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::{
    config::CounterConfig,
    counting,
    fps::FpsMeter,
    model_download::ModelKind,
    pipeline::skeleton,
    types::{CountedFrame, Frame, HandCount, Handedness},
};

pub(crate) use self::common::DetectedHand;

/// Turns a frame into zero or more hands with landmarks in frame pixels.
pub(crate) trait HandLandmarker: Send + 'static {
    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<DetectedHand>>;
}

fn run_worker_loop<E: HandLandmarker>(
    mut engine: E,
    frame_rx: Receiver<Frame>,
    result_tx: Sender<CountedFrame>,
    min_landmark_confidence: f32,
) {
    let mut fps = FpsMeter::new();

    while let Some(frame) = recv_latest_frame(&frame_rx) {
        let hands = match engine.detect(&frame) {
            Ok(hands) => hands,
            Err(err) => {
                log::warn!("hand detection failed: {err:?}");
                Vec::new()
            }
        };

        let fps = fps.tick(frame.timestamp);
        let counted = build_counted_frame(frame, hands, fps, min_landmark_confidence);
        if let Err(TrySendError::Disconnected(_)) = result_tx.try_send(counted) {
            log::info!("display closed, stopping recognizer");
            break;
        }
    }
}

fn recv_latest_frame(frame_rx: &Receiver<Frame>) -> Option<Frame> {
    let mut frame = frame_rx.recv().ok()?;
    while let Ok(newer) = frame_rx.try_recv() {
        frame = newer;
    }
    Some(frame)
}

/// Counts fingers on every confident hand and draws their skeletons into the frame.
pub(crate) fn build_counted_frame(
    mut frame: Frame,
    detected: Vec<DetectedHand>,
    fps: f32,
    min_landmark_confidence: f32,
) -> CountedFrame {
    let mut hands = Vec::with_capacity(detected.len());
    for hand in detected {
        if hand.confidence < min_landmark_confidence {
            continue;
        }

        let landmarks = counting::landmarks_from_points(&hand.landmarks);
        let Some(fingers) = counting::classify_slice(&landmarks) else {
            log::debug!("skipping hand with {} landmarks", landmarks.len());
            continue;
        };

        skeleton::draw_skeleton(&mut frame.rgba, frame.width, frame.height, &hand.landmarks);
        hands.push(HandCount {
            handedness: Handedness::from_score(hand.handedness),
            confidence: hand.confidence,
            landmarks,
            fingers,
        });
    }

    if !hands.is_empty() {
        log::trace!(
            "{} hand(s): {:?}",
            hands.len(),
            hands
                .iter()
                .map(|h| (h.fingers.bits(), h.confidence))
                .collect::<Vec<_>>()
        );
    }

    CountedFrame { frame, hands, fps }
}

#[derive(Clone, Debug)]
pub struct RecognizerBackend {
    model_dir: PathBuf,
    palm: palm::PalmDetectorConfig,
    max_hands: usize,
    min_landmark_confidence: f32,
}

impl RecognizerBackend {
    pub fn from_config(config: &CounterConfig) -> Self {
        Self {
            model_dir: config.model_dir.clone(),
            palm: config.palm_detector(),
            max_hands: config.max_hands,
            min_landmark_confidence: config.min_landmark_confidence,
        }
    }

    pub fn model_path(&self, model: ModelKind) -> PathBuf {
        model.path_in(&self.model_dir)
    }
}

pub fn start_recognizer(
    backend: RecognizerBackend,
    frame_rx: Receiver<Frame>,
    result_tx: Sender<CountedFrame>,
) -> thread::JoinHandle<()> {
    log::info!(
        "starting ort hand landmark backend (up to {} hands)",
        backend.max_hands
    );

    ort::start_worker(backend, frame_rx, result_tx)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use anyhow::anyhow;
    use crossbeam_channel::bounded;

    use super::*;

    fn blank_frame(timestamp: Instant) -> Frame {
        Frame {
            rgba: vec![0; 640 * 480 * 4],
            width: 640,
            height: 480,
            timestamp,
        }
    }

    /// Open hand with the thumb straight along x and all fingertips raised.
    fn open_hand_points() -> Vec<(f32, f32)> {
        let mut points = vec![(320.0, 400.0); counting::NUM_LANDMARKS];
        points[1] = (200.0, 300.0);
        points[2] = (240.0, 300.0);
        points[3] = (280.0, 302.0);
        points[4] = (310.0, 303.0);
        for (finger, x) in [(0, 330.0), (1, 360.0), (2, 390.0), (3, 420.0)] {
            let tip = 8 + finger * 4;
            points[tip - 2] = (x, 250.0);
            points[tip] = (x, 150.0);
        }
        points
    }

    fn detected(points: Vec<(f32, f32)>, confidence: f32, handedness: f32) -> DetectedHand {
        DetectedHand {
            landmarks: points,
            confidence,
            handedness,
        }
    }

    #[test]
    fn counts_each_confident_hand() {
        let mut fist = open_hand_points();
        fist[3] = (240.0, 260.0);
        for tip in [8, 12, 16, 20] {
            fist[tip].1 = 300.0;
        }

        let counted = build_counted_frame(
            blank_frame(Instant::now()),
            vec![
                detected(open_hand_points(), 0.9, 0.8),
                detected(fist, 0.8, 0.2),
                detected(open_hand_points(), 0.3, 0.9),
            ],
            30.0,
            0.5,
        );

        assert_eq!(counted.hands.len(), 2);
        assert_eq!(counted.hands[0].handedness, Handedness::Right);
        assert_eq!(counted.hands[0].fingers.total, 5);
        assert_eq!(counted.hands[1].handedness, Handedness::Left);
        assert_eq!(counted.hands[1].fingers.bits(), [0, 0, 0, 0, 0]);
        assert_eq!(counted.total_fingers(), 5);
    }

    #[test]
    fn incomplete_hand_is_skipped() {
        let mut points = open_hand_points();
        points.truncate(12);

        let counted = build_counted_frame(
            blank_frame(Instant::now()),
            vec![detected(points, 0.9, 0.9)],
            0.0,
            0.5,
        );
        assert!(counted.hands.is_empty());
        assert_eq!(counted.total_fingers(), 0);
    }

    #[test]
    fn skeleton_is_drawn_for_counted_hands() {
        let counted = build_counted_frame(
            blank_frame(Instant::now()),
            vec![detected(open_hand_points(), 0.9, 0.9)],
            0.0,
            0.5,
        );

        let idx = ((150 * 640 + 330) * 4) as usize;
        assert_ne!(&counted.frame.rgba[idx..idx + 3], &[0, 0, 0]);
    }

    struct ScriptedLandmarker {
        replies: Vec<anyhow::Result<Vec<DetectedHand>>>,
    }

    impl HandLandmarker for ScriptedLandmarker {
        fn detect(&mut self, _frame: &Frame) -> anyhow::Result<Vec<DetectedHand>> {
            if self.replies.is_empty() {
                Ok(Vec::new())
            } else {
                self.replies.remove(0)
            }
        }
    }

    #[test]
    fn worker_counts_frames_and_tracks_fps() {
        let (frame_tx, frame_rx) = bounded(1);
        let (result_tx, result_rx) = bounded(1);
        let engine = ScriptedLandmarker {
            replies: vec![
                Ok(vec![detected(open_hand_points(), 0.9, 0.9)]),
                Err(anyhow!("inference blew up")),
            ],
        };
        let worker = thread::spawn(move || run_worker_loop(engine, frame_rx, result_tx, 0.5));

        let start = Instant::now();
        frame_tx.send(blank_frame(start)).unwrap();
        let first = result_rx.recv().unwrap();
        assert_eq!(first.total_fingers(), 5);
        assert_eq!(first.fps, 0.0);

        frame_tx.send(blank_frame(start + Duration::from_millis(50))).unwrap();
        let second = result_rx.recv().unwrap();
        assert!(second.hands.is_empty());
        assert!((second.fps - 20.0).abs() < 0.01);

        drop(frame_tx);
        worker.join().unwrap();
    }
}
