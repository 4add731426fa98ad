use std::time::Instant;

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

/// Plain (x, y) pair in image space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One detected keypoint in frame pixels. `id` follows the 21-point hand model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Landmark {
    pub id: usize,
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub fn point(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn label(&self) -> &'static str {
        match self {
            Handedness::Left => "Left",
            Handedness::Right => "Right",
        }
    }

    /// The landmark model reports a right-hand probability.
    pub fn from_score(score: f32) -> Self {
        if score >= 0.5 {
            Handedness::Right
        } else {
            Handedness::Left
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FingerState {
    Extended,
    Curled,
}

impl FingerState {
    pub fn from_extended(extended: bool) -> Self {
        if extended {
            FingerState::Extended
        } else {
            FingerState::Curled
        }
    }

    pub fn bit(&self) -> u8 {
        match self {
            FingerState::Extended => 1,
            FingerState::Curled => 0,
        }
    }
}

/// Per-hand classification: thumb, index, middle, ring, pinky.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FingerCount {
    pub states: [FingerState; 5],
    pub total: u8,
}

impl FingerCount {
    pub fn from_states(states: [FingerState; 5]) -> Self {
        let total = states.iter().map(FingerState::bit).sum();
        Self { states, total }
    }

    pub fn bits(&self) -> [u8; 5] {
        self.states.map(|s| s.bit())
    }
}

#[derive(Clone, Debug)]
pub struct HandCount {
    pub handedness: Handedness,
    pub confidence: f32,
    pub landmarks: Vec<Landmark>,
    pub fingers: FingerCount,
}

impl HandCount {
    pub fn display_text(&self) -> String {
        format!("{} Hand: {}", self.handedness.label(), self.fingers.total)
    }
}

#[derive(Clone, Debug)]
pub struct CountedFrame {
    pub frame: Frame,
    pub hands: Vec<HandCount>,
    pub fps: f32,
}

impl CountedFrame {
    pub fn total_fingers(&self) -> u32 {
        self.hands.iter().map(|h| h.fingers.total as u32).sum()
    }

    pub fn total_text(&self) -> String {
        format!("Total Fingers: {}", self.total_fingers())
    }

    pub fn fps_text(&self) -> String {
        format!("FPS: {}", self.fps as u32)
    }
}
