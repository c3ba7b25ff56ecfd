// ============================================================================
// FIELD INTEGRATOR — decay + radial injection from pointer velocity
// ============================================================================

use crate::config::{EffectConfig, INJECTION_SCALE, POWER_CAP};
use crate::field::DisplacementField;
use crate::pointer::PointerState;

/// Advance the field by one tick.
///
/// 1. Every component decays by `relaxation`.
/// 2. Cells strictly closer than `N * mouse` to the pointer's grid position
///    receive `strength * 100 * v * min(maxDist / dist, 10)`.  The x term is
///    added and the y term subtracted: pointer space is y-up while the field
///    is sampled top-down in the fragment stage.
///
/// Returns the number of cells that received an injection this tick.
pub fn step(field: &mut DisplacementField, pointer: &PointerState, config: &EffectConfig) -> usize {
    field.scale(config.relaxation);

    let size = field.size();
    let n = size as f32;
    let grid_x = n * pointer.x;
    let grid_y = n * pointer.y;
    let max_dist = n * config.mouse;
    let max_dist_sq = max_dist * max_dist;
    let gain = config.strength * INJECTION_SCALE;

    let mut touched = 0;
    for i in 0..size {
        for j in 0..size {
            let dx = grid_x - i as f32;
            let dy = grid_y - j as f32;
            let dist_sq = dx * dx + dy * dy;
            if dist_sq < max_dist_sq {
                // sqrt(0) gives +inf here, which the cap absorbs.
                let power = (max_dist / dist_sq.sqrt()).min(POWER_CAP);
                field.add(i, j, gain * pointer.vx * power, -(gain * pointer.vy * power));
                touched += 1;
            }
        }
    }

    field.mark_dirty();
    touched
}
