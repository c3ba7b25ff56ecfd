// ============================================================================
// DISPLACEMENT FIELD — N×N grid of (dx, dy) vectors
// ============================================================================

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Per-cell displacement, stored row-major as flat `(dx, dy)` pairs so the
/// whole field can be handed to `queue.write_texture` as an `Rg32Float` image
/// without repacking.
///
/// Cell `(i, j)` is column `i`, row `j`, and maps to normalized image-space
/// position `(i / N, j / N)` with `j` growing upward.
#[derive(Clone, Debug)]
pub struct DisplacementField {
    size: usize,
    /// Flat array of (dx, dy) pairs.  Length = size * size * 2.
    data: Vec<f32>,
    dirty: bool,
}

impl DisplacementField {
    /// Create a zero-displacement field.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            data: vec![0.0; size * size * 2],
            dirty: true,
        }
    }

    /// Field filled with uniform noise in `[-125, 130)` per component: the
    /// start-up shatter that relaxes back to an undistorted image.
    pub fn seeded(size: usize, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let mut field = Self::new(size);
        for v in field.data.iter_mut() {
            *v = rng.gen_range(-125.0f32..130.0);
        }
        field
    }

    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    fn index(&self, i: usize, j: usize) -> usize {
        (i + self.size * j) * 2
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> (f32, f32) {
        let idx = self.index(i, j);
        (self.data[idx], self.data[idx + 1])
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, dx: f32, dy: f32) {
        let idx = self.index(i, j);
        self.data[idx] = dx;
        self.data[idx + 1] = dy;
        self.dirty = true;
    }

    #[inline]
    pub fn add(&mut self, i: usize, j: usize, dx: f32, dy: f32) {
        let idx = self.index(i, j);
        self.data[idx] += dx;
        self.data[idx + 1] += dy;
        self.dirty = true;
    }

    /// Multiply every component by `factor`.
    pub fn scale(&mut self, factor: f32) {
        for v in self.data.iter_mut() {
            *v *= factor;
        }
        self.dirty = true;
    }

    /// Euclidean length of the vector at `(i, j)`.
    pub fn magnitude(&self, i: usize, j: usize) -> f32 {
        let (dx, dy) = self.get(i, j);
        (dx * dx + dy * dy).sqrt()
    }

    /// Largest cell magnitude in the field.
    pub fn max_magnitude(&self) -> f32 {
        self.data
            .chunks_exact(2)
            .map(|c| (c[0] * c[0] + c[1] * c[1]).sqrt())
            .fold(0.0, f32::max)
    }

    /// Raw texel data, two floats per cell, rows bottom-up.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Called once the field has been copied to the GPU.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_field_is_zero_and_dirty() {
        let f = DisplacementField::new(4);
        assert_eq!(f.as_slice().len(), 4 * 4 * 2);
        assert_eq!(f.max_magnitude(), 0.0);
        assert!(f.is_dirty());
    }

    #[test]
    fn column_major_within_row() {
        let mut f = DisplacementField::new(3);
        f.set(2, 1, 5.0, -1.0);
        // (i + N*j) * 2 = (2 + 3) * 2 = 10
        assert_eq!(f.as_slice()[10], 5.0);
        assert_eq!(f.as_slice()[11], -1.0);
        assert_eq!(f.get(2, 1), (5.0, -1.0));
    }

    #[test]
    fn seeded_noise_is_in_range_and_reproducible() {
        let a = DisplacementField::seeded(10, Some(7));
        let b = DisplacementField::seeded(10, Some(7));
        assert_eq!(a.as_slice(), b.as_slice());
        assert!(a.as_slice().iter().all(|v| (-125.0..130.0).contains(v)));
        assert!(a.max_magnitude() > 0.0);
    }

    #[test]
    fn scale_shrinks_every_cell() {
        let mut f = DisplacementField::new(2);
        f.set(0, 0, 3.0, 4.0);
        f.set(1, 1, -6.0, 8.0);
        f.mark_clean();
        f.scale(0.5);
        assert_eq!(f.get(0, 0), (1.5, 2.0));
        assert!((f.magnitude(1, 1) - 5.0).abs() < 1e-6);
        assert!(f.is_dirty());
    }

    #[test]
    fn add_accumulates() {
        let mut f = DisplacementField::new(2);
        f.add(1, 0, 1.0, 1.0);
        f.add(1, 0, 0.5, -2.0);
        assert_eq!(f.get(1, 0), (1.5, -1.0));
    }
}
