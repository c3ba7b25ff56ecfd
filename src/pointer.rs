// ============================================================================
// POINTER TRACKER — raw cursor coordinates to normalized position + velocity
// ============================================================================

/// Bounds of the drawable region in the same coordinate space as the raw
/// pointer events (window pixels for the winit host).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Region {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Region {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Latest pointer sample.  Position is region-relative with `y` growing
/// upward; velocity is the delta from the previous sample.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerState {
    pub x: f32,
    pub y: f32,
    pub prev_x: f32,
    pub prev_y: f32,
    pub vx: f32,
    pub vy: f32,
}

/// Turns host pointer events into a [`PointerState`].  Events overwrite the
/// state immediately; only the latest sample is visible to the next tick.
#[derive(Clone, Debug)]
pub struct PointerTracker {
    region: Region,
    state: PointerState,
}

impl PointerTracker {
    pub fn new(region: Region) -> Self {
        Self {
            region,
            state: PointerState::default(),
        }
    }

    pub fn set_region(&mut self, region: Region) {
        self.region = region;
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn state(&self) -> PointerState {
        self.state
    }

    /// Record a move.  Coordinates outside the region are kept as-is; the
    /// integrator's radius test simply finds no cells near them.
    pub fn on_pointer_move(&mut self, raw_x: f64, raw_y: f64) {
        if self.region.is_empty() {
            return;
        }
        let x = ((raw_x - self.region.left) / self.region.width) as f32;
        let y = (1.0 - (raw_y - self.region.top) / self.region.height) as f32;
        self.state.vx = x - self.state.prev_x;
        self.state.vy = y - self.state.prev_y;
        self.state.x = x;
        self.state.y = y;
        self.state.prev_x = x;
        self.state.prev_y = y;
    }

    /// Pointer left the region: back to the neutral state, no more injection.
    pub fn on_pointer_leave(&mut self) {
        self.state = PointerState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn normalizes_and_flips_y() {
        let mut t = PointerTracker::new(Region::new(200.0, 100.0));
        t.on_pointer_move(50.0, 25.0);
        let s = t.state();
        assert!(approx(s.x, 0.25));
        assert!(approx(s.y, 0.75));
    }

    #[test]
    fn velocity_is_delta_from_previous_sample() {
        let mut t = PointerTracker::new(Region::new(100.0, 100.0));
        t.on_pointer_move(50.0, 50.0);
        t.on_pointer_move(60.0, 40.0);
        let s = t.state();
        assert!(approx(s.vx, 0.1));
        // Moving up the screen is positive y velocity.
        assert!(approx(s.vy, 0.1));
    }

    #[test]
    fn region_offset_is_subtracted() {
        let mut t = PointerTracker::new(Region {
            left: 100.0,
            top: 20.0,
            width: 100.0,
            height: 100.0,
        });
        t.on_pointer_move(150.0, 20.0);
        assert!(approx(t.state().x, 0.5));
        assert!(approx(t.state().y, 1.0));
    }

    #[test]
    fn out_of_bounds_is_accepted() {
        let mut t = PointerTracker::new(Region::new(100.0, 100.0));
        t.on_pointer_move(-50.0, 250.0);
        assert!(approx(t.state().x, -0.5));
        assert!(approx(t.state().y, -1.5));
    }

    #[test]
    fn leave_resets_everything() {
        let mut t = PointerTracker::new(Region::new(100.0, 100.0));
        t.on_pointer_move(10.0, 10.0);
        t.on_pointer_move(30.0, 70.0);
        t.on_pointer_leave();
        assert_eq!(t.state(), PointerState::default());
    }

    #[test]
    fn last_write_wins_between_ticks() {
        let mut t = PointerTracker::new(Region::new(100.0, 100.0));
        t.on_pointer_move(10.0, 50.0);
        t.on_pointer_move(20.0, 50.0);
        t.on_pointer_move(25.0, 50.0);
        // Only the last step is visible.
        assert!(approx(t.state().vx, 0.05));
    }

    #[test]
    fn empty_region_ignores_moves() {
        let mut t = PointerTracker::new(Region::new(0.0, 100.0));
        t.on_pointer_move(10.0, 10.0);
        assert_eq!(t.state(), PointerState::default());
    }
}
