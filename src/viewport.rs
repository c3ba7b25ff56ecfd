// ============================================================================
// VIEWPORT — drawable size, "cover" mesh scale and orthographic camera
// ============================================================================
//
// Camera convention: unit-height orthographic frustum, width = container
// aspect.  The unit quad is scaled to (imageAspect * s, s) with
// s = max(containerAspect / imageAspect, 1), so whichever axis is tighter
// fits exactly and the other overflows and gets cropped.  No letterboxing.
// ============================================================================

/// Snapshot of everything derived from the drawable size and image aspect.
/// Always rebuilt from scratch via [`Viewport::compute`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Drawable size in logical (CSS-like) units.
    pub logical_width: f64,
    pub logical_height: f64,
    /// Effective device pixel ratio after capping.
    pub pixel_ratio: f64,
    /// Render target size in device pixels.
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub container_aspect: f32,
    pub image_aspect: f32,
    /// Uniform cover scale, always >= 1.
    pub cover_scale: f32,
    /// Quad scale along x and y.
    pub mesh_scale: [f32; 2],
    /// Orthographic bounds: left, right, top, bottom.
    pub frustum: Frustum,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Viewport {
    /// Recompute the viewport.
    ///
    /// * `logical_*`: drawable region size in logical units.
    /// * `scale_factor`: host device pixel ratio.
    /// * `max_pixel_ratio`: cap applied to `scale_factor`.
    /// * `image_aspect`: width / height of the source image, 1.0 until loaded.
    pub fn compute(
        logical_width: f64,
        logical_height: f64,
        scale_factor: f64,
        max_pixel_ratio: f64,
        image_aspect: f32,
    ) -> Self {
        let pixel_ratio = scale_factor.min(max_pixel_ratio).max(f64::MIN_POSITIVE);
        let pixel_width = (logical_width.max(0.0) * pixel_ratio).round() as u32;
        let pixel_height = (logical_height.max(0.0) * pixel_ratio).round() as u32;

        // Keep the math finite for a collapsed region; nothing is drawn then.
        let container_aspect = if logical_width > 0.0 && logical_height > 0.0 {
            (logical_width / logical_height) as f32
        } else {
            1.0
        };
        let image_aspect = if image_aspect.is_finite() && image_aspect > 0.0 {
            image_aspect
        } else {
            1.0
        };

        let cover_scale = (container_aspect / image_aspect).max(1.0);
        let mesh_scale = [image_aspect * cover_scale, cover_scale];

        let frustum_height = 1.0;
        let frustum_width = frustum_height * container_aspect;
        let frustum = Frustum {
            left: -frustum_width / 2.0,
            right: frustum_width / 2.0,
            top: frustum_height / 2.0,
            bottom: -frustum_height / 2.0,
        };

        Self {
            logical_width,
            logical_height,
            pixel_ratio,
            pixel_width,
            pixel_height,
            container_aspect,
            image_aspect,
            cover_scale,
            mesh_scale,
            frustum,
        }
    }

    /// Viewport for a target already sized in device pixels (headless).
    pub fn from_pixels(width: u32, height: u32, image_aspect: f32) -> Self {
        Self::compute(width as f64, height as f64, 1.0, 1.0, image_aspect)
    }

    /// Whether there is anything to draw into.
    pub fn is_drawable(&self) -> bool {
        self.pixel_width > 0 && self.pixel_height > 0
    }

    /// Column-major `projection * model` for the unit quad centred at the
    /// origin.  z passes through untouched; the quad lives at z = 0.
    pub fn view_proj(&self) -> [[f32; 4]; 4] {
        let f = &self.frustum;
        let sx = 2.0 / (f.right - f.left);
        let sy = 2.0 / (f.top - f.bottom);
        let tx = -(f.right + f.left) / (f.right - f.left);
        let ty = -(f.top + f.bottom) / (f.top - f.bottom);
        [
            [sx * self.mesh_scale[0], 0.0, 0.0, 0.0],
            [0.0, sy * self.mesh_scale[1], 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [tx, ty, 0.0, 1.0],
        ]
    }

    /// `resolution` uniform: logical region size plus two unit components.
    pub fn resolution(&self) -> [f32; 4] {
        [self.logical_width as f32, self.logical_height as f32, 1.0, 1.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn wide_container_narrow_image() {
        // 16:9 container, 4:3 image.
        let vp = Viewport::compute(1600.0, 900.0, 1.0, 2.0, 4.0 / 3.0);
        assert!(approx(vp.cover_scale, 1.333));
        assert!(approx(vp.mesh_scale[0], 1.778));
        assert!(approx(vp.mesh_scale[1], 1.333));
    }

    #[test]
    fn cover_invariant_holds_for_many_pairs() {
        let aspects = [0.25f32, 0.5, 0.75, 1.0, 4.0 / 3.0, 16.0 / 9.0, 2.5, 7.0];
        for &container in &aspects {
            for &image in &aspects {
                let vp = Viewport::compute(container as f64 * 100.0, 100.0, 1.0, 2.0, image);
                assert!(vp.cover_scale >= 1.0);
                let ratio = vp.mesh_scale[0] / vp.mesh_scale[1];
                assert!((ratio - image).abs() < 1e-4, "aspect squished");
                // The quad covers the frustum on both axes.
                assert!(vp.mesh_scale[0] + 1e-4 >= vp.frustum.right - vp.frustum.left);
                assert!(vp.mesh_scale[1] + 1e-4 >= vp.frustum.top - vp.frustum.bottom);
            }
        }
    }

    #[test]
    fn pixel_ratio_is_capped() {
        let vp = Viewport::compute(800.0, 600.0, 3.0, 2.0, 1.0);
        assert_eq!(vp.pixel_ratio, 2.0);
        assert_eq!((vp.pixel_width, vp.pixel_height), (1600, 1200));

        let vp = Viewport::compute(800.0, 600.0, 1.25, 2.0, 1.0);
        assert_eq!((vp.pixel_width, vp.pixel_height), (1000, 750));
    }

    #[test]
    fn frustum_is_unit_height_and_symmetric() {
        let vp = Viewport::compute(200.0, 100.0, 1.0, 2.0, 1.0);
        assert_eq!(vp.frustum.left, -1.0);
        assert_eq!(vp.frustum.right, 1.0);
        assert_eq!(vp.frustum.top, 0.5);
        assert_eq!(vp.frustum.bottom, -0.5);
    }

    #[test]
    fn collapsed_region_is_not_drawable() {
        let vp = Viewport::compute(0.0, 300.0, 1.0, 2.0, 1.5);
        assert!(!vp.is_drawable());
        assert!(vp.cover_scale.is_finite());
        assert!(vp.view_proj().iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn unloaded_image_defaults_to_square() {
        let vp = Viewport::compute(400.0, 400.0, 1.0, 2.0, 0.0);
        assert_eq!(vp.image_aspect, 1.0);
        assert_eq!(vp.mesh_scale, [1.0, 1.0]);
    }

    #[test]
    fn view_proj_maps_tight_axis_to_clip_edge() {
        // 16:9 container, 4:3 image: x fits exactly, y overflows.
        let vp = Viewport::compute(1600.0, 900.0, 1.0, 2.0, 4.0 / 3.0);
        let m = vp.view_proj();
        let clip_x = m[0][0] * 0.5 + m[3][0];
        let clip_y = m[1][1] * 0.5 + m[3][1];
        assert!(approx(clip_x, 1.0));
        assert!(clip_y > 1.0);
    }

    #[test]
    fn resolution_is_logical_size() {
        let vp = Viewport::compute(800.0, 600.0, 2.0, 2.0, 1.0);
        assert_eq!((vp.pixel_width, vp.pixel_height), (1600, 1200));
        assert_eq!(vp.resolution(), [800.0, 600.0, 1.0, 1.0]);
    }
}
