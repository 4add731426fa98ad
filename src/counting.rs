//! Finger counting over the 21-point hand landmark model.
//!
//! Landmark ids are fixed by the landmark model: 0 is the wrist, then four
//! joints per digit from the thumb (1..=4) to the pinky (17..=20).

use crate::types::{FingerCount, FingerState, Landmark, Point2D};

pub const NUM_LANDMARKS: usize = 21;

/// Thumb counts as extended when its middle joint is straighter than this.
pub const THUMB_EXTENDED_ANGLE: f32 = 150.0;

pub mod landmark {
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_PIP: usize = 14;
    pub const RING_TIP: usize = 16;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_TIP: usize = 20;
}

/// (tip, reference joint) per digit, thumb first. The reference joint sits two
/// ids below the tip on the same chain.
pub const TIP_JOINTS: [(usize, usize); 5] = [
    (landmark::THUMB_TIP, landmark::THUMB_MCP),
    (landmark::INDEX_TIP, landmark::INDEX_PIP),
    (landmark::MIDDLE_TIP, landmark::MIDDLE_PIP),
    (landmark::RING_TIP, landmark::RING_PIP),
    (landmark::PINKY_TIP, landmark::PINKY_PIP),
];

/// Interior angle at `b` between `b→a` and `b→c`, in degrees within [0, 180].
pub fn angle(a: Point2D, b: Point2D, c: Point2D) -> f32 {
    let radians = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
    let degrees = radians.to_degrees().abs();
    if degrees > 180.0 {
        (360.0 - degrees).max(0.0)
    } else {
        degrees
    }
}

/// Classifies each digit of one hand as extended or curled.
///
/// Landmarks must be in one coordinate space (frame pixels) with y growing
/// downward.
pub fn classify(landmarks: &[Landmark; NUM_LANDMARKS]) -> FingerCount {
    let mut states = [FingerState::Curled; 5];

    let thumb_angle = angle(
        landmarks[landmark::THUMB_CMC].point(),
        landmarks[landmark::THUMB_MCP].point(),
        landmarks[landmark::THUMB_IP].point(),
    );
    states[0] = FingerState::from_extended(thumb_angle > THUMB_EXTENDED_ANGLE);

    for (state, &(tip, joint)) in states.iter_mut().zip(TIP_JOINTS.iter()).skip(1) {
        *state = FingerState::from_extended(landmarks[tip].y < landmarks[joint].y);
    }

    FingerCount::from_states(states)
}

/// Like [`classify`], but for landmark lists of unchecked length.
pub fn classify_slice(landmarks: &[Landmark]) -> Option<FingerCount> {
    let landmarks: &[Landmark; NUM_LANDMARKS] = landmarks.try_into().ok()?;
    Some(classify(landmarks))
}

/// Pairs projected pixel positions with their landmark ids, truncated to whole pixels.
pub fn landmarks_from_points(points: &[(f32, f32)]) -> Vec<Landmark> {
    points
        .iter()
        .enumerate()
        .map(|(id, &(x, y))| Landmark {
            id,
            x: x.trunc(),
            y: y.trunc(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use FingerState::{Curled, Extended};

    const EPS: f32 = 1e-3;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn p(x: f32, y: f32) -> Point2D {
        Point2D::new(x, y)
    }

    /// Builds a hand whose thumb bends by `thumb_deg` at the MCP joint and
    /// whose four fingers are up or down per `fingers_up`.
    fn synthetic_hand(thumb_deg: f32, fingers_up: [bool; 4]) -> [Landmark; NUM_LANDMARKS] {
        let mut points = [(300.0_f32, 400.0_f32); NUM_LANDMARKS];

        let mcp = (200.0, 300.0);
        let heading = (180.0 - thumb_deg).to_radians();
        points[landmark::THUMB_CMC] = (mcp.0 - 50.0, mcp.1);
        points[landmark::THUMB_MCP] = mcp;
        points[landmark::THUMB_IP] = (mcp.0 + 50.0 * heading.cos(), mcp.1 + 50.0 * heading.sin());
        points[landmark::THUMB_TIP] = (mcp.0 + 90.0 * heading.cos(), mcp.1 + 90.0 * heading.sin());

        for (finger, &up) in fingers_up.iter().enumerate() {
            let (tip, joint) = TIP_JOINTS[finger + 1];
            let x = 260.0 + finger as f32 * 30.0;
            points[joint] = (x, 250.0);
            points[tip] = (x, if up { 150.0 } else { 290.0 });
        }

        let mut landmarks = [Landmark { id: 0, x: 0.0, y: 0.0 }; NUM_LANDMARKS];
        for (id, (x, y)) in points.into_iter().enumerate() {
            landmarks[id] = Landmark { id, x, y };
        }
        landmarks
    }

    #[test]
    fn collinear_points_form_straight_angle() {
        assert_close(angle(p(0.0, 0.0), p(1.0, 1.0), p(3.0, 3.0)), 180.0);
        assert_close(angle(p(10.0, 5.0), p(4.0, 5.0), p(-20.0, 5.0)), 180.0);
        assert_close(angle(p(7.0, -3.0), p(7.0, 0.0), p(7.0, 12.0)), 180.0);
    }

    #[test]
    fn right_angle() {
        assert_close(angle(p(1.0, 0.0), p(0.0, 0.0), p(0.0, 1.0)), 90.0);
        assert_close(angle(p(0.0, 1.0), p(0.0, 0.0), p(-1.0, 0.0)), 90.0);
    }

    #[test]
    fn reflex_difference_folds_to_interior_angle() {
        // Raw atan2 difference here is 270 degrees.
        assert_close(angle(p(0.0, -1.0), p(0.0, 0.0), p(-1.0, 0.0)), 90.0);
        // Rays straddling the atan2 branch cut.
        let expected = 2.0 * 0.1_f32.atan().to_degrees();
        assert_close(angle(p(-1.0, 0.1), p(0.0, 0.0), p(-1.0, -0.1)), expected);
    }

    #[test]
    fn degenerate_points_stay_finite() {
        let same = p(5.0, 5.0);
        assert_eq!(angle(same, same, same), 0.0);
        assert!(angle(same, same, p(9.0, 1.0)).is_finite());
        assert!(angle(p(0.0, 3.0), same, same).is_finite());
    }

    #[test]
    fn symmetric_and_bounded() {
        let coords = [-40.0, -3.5, 0.0, 2.0, 17.0, 120.0];
        let b = p(1.0, -2.0);
        for &ax in &coords {
            for &ay in &coords {
                for &cx in &coords {
                    for &cy in &coords {
                        let a = p(ax, ay);
                        let c = p(cx, cy);
                        let forward = angle(a, b, c);
                        let backward = angle(c, b, a);
                        assert!((0.0..=180.0).contains(&forward), "{forward} out of range");
                        assert_close(forward, backward);
                    }
                }
            }
        }
    }

    #[test]
    fn open_hand_counts_five() {
        let count = classify(&synthetic_hand(170.0, [true; 4]));
        assert_eq!(count.bits(), [1, 1, 1, 1, 1]);
        assert_eq!(count.total, 5);
    }

    #[test]
    fn fist_counts_zero() {
        let count = classify(&synthetic_hand(30.0, [false; 4]));
        assert_eq!(count.states, [Curled; 5]);
        assert_eq!(count.total, 0);
    }

    #[test]
    fn thumb_and_index_count_two() {
        let mut hand = synthetic_hand(160.0, [false; 4]);
        hand[landmark::INDEX_TIP].y = 100.0;
        hand[landmark::INDEX_PIP].y = 150.0;

        let count = classify(&hand);
        assert_eq!(count.states, [Extended, Extended, Curled, Curled, Curled]);
        assert_eq!(count.total, 2);
    }

    #[test]
    fn thumb_threshold_sits_at_150_degrees() {
        let bent = classify(&synthetic_hand(149.0, [false; 4]));
        assert_eq!(bent.states[0], Curled);

        let straight = classify(&synthetic_hand(151.0, [false; 4]));
        assert_eq!(straight.states[0], Extended);
    }

    #[test]
    fn finger_level_with_joint_is_curled() {
        let mut hand = synthetic_hand(30.0, [true; 4]);
        hand[landmark::RING_TIP].y = hand[landmark::RING_PIP].y;

        let count = classify(&hand);
        assert_eq!(count.bits(), [0, 1, 1, 0, 1]);
        assert_eq!(count.total, 3);
    }

    #[test]
    fn total_matches_states() {
        for mask in 0u8..16 {
            let fingers = [0, 1, 2, 3].map(|bit| mask & (1 << bit) != 0);
            for thumb in [20.0, 90.0, 175.0] {
                let count = classify(&synthetic_hand(thumb, fingers));
                let sum: u8 = count.bits().iter().sum();
                assert_eq!(count.total, sum);
            }
        }
    }

    #[test]
    fn slice_entry_requires_full_hand() {
        let hand = synthetic_hand(170.0, [true; 4]);
        assert_eq!(classify_slice(&hand).map(|c| c.total), Some(5));
        assert_eq!(classify_slice(&hand[..20]), None);
        assert_eq!(classify_slice(&[]), None);
    }

    #[test]
    fn landmark_ids_follow_position() {
        let landmarks = landmarks_from_points(&[(1.0, 2.0), (3.0, 4.0)]);
        assert_eq!(landmarks[1], Landmark { id: 1, x: 3.0, y: 4.0 });
    }

    #[test]
    fn tip_in_joint_pixel_row_is_curled() {
        let mut points = synthetic_hand(90.0, [false; 4]).map(|lm| (lm.x, lm.y));
        points[landmark::INDEX_PIP] = (260.4, 150.9);
        points[landmark::INDEX_TIP] = (260.7, 150.2);

        let landmarks = landmarks_from_points(&points);
        assert_eq!(landmarks[landmark::INDEX_TIP].y, 150.0);
        assert_eq!(landmarks[landmark::INDEX_PIP].x, 260.0);

        let count = classify_slice(&landmarks).map(|c| c.bits());
        assert_eq!(count, Some([0, 0, 0, 0, 0]));
    }
}
