use std::sync::LazyLock;

use super::super::common::PALM_INPUT_SIZE;

/// Feature-map strides of the SSD heads; consecutive equal strides share a grid.
const STRIDES: [u32; 4] = [8, 16, 16, 16];
/// Every layer contributes its aspect-ratio-1 box plus the interpolated one.
const ANCHORS_PER_LAYER: usize = 2;

pub const NUM_ANCHORS: usize = 2016;

/// Anchor centres in normalized input coordinates.
pub static ANCHORS: LazyLock<Vec<[f32; 2]>> = LazyLock::new(generate_anchors);

fn generate_anchors() -> Vec<[f32; 2]> {
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);
    let mut layer = 0;
    while layer < STRIDES.len() {
        let stride = STRIDES[layer];
        let mut repeats = 0;
        while layer < STRIDES.len() && STRIDES[layer] == stride {
            repeats += ANCHORS_PER_LAYER;
            layer += 1;
        }

        let grid = PALM_INPUT_SIZE.div_ceil(stride);
        for y in 0..grid {
            for x in 0..grid {
                let center = [
                    (x as f32 + 0.5) / grid as f32,
                    (y as f32 + 0.5) / grid as f32,
                ];
                anchors.extend(std::iter::repeat_n(center, repeats));
            }
        }
    }
    anchors
}
