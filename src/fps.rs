use std::time::{Duration, Instant};

const MIN_FRAME_INTERVAL: Duration = Duration::from_micros(10);

/// Frame rate from the gap between consecutive frames.
pub struct FpsMeter {
    last_frame: Option<Instant>,
}

impl FpsMeter {
    pub fn new() -> Self {
        Self { last_frame: None }
    }

    /// Records a frame at `now`. The first frame has no predecessor and reads 0.
    pub fn tick(&mut self, now: Instant) -> f32 {
        let fps = match self.last_frame {
            Some(last) => {
                let elapsed = now.saturating_duration_since(last).max(MIN_FRAME_INTERVAL);
                1.0 / elapsed.as_secs_f32()
            }
            None => 0.0,
        };
        self.last_frame = Some(now);
        fps
    }
}
