//! Projection, view and model matrices
//!
//! Entities live in viewport pixel space (origin bottom-left, Y up). The model
//! matrix maps that space onto the fixed logical play field, and the
//! projection maps the field (plus a density-dependent margin above and below)
//! to clip space. All matrices are recomputed only on init and resize.

use glam::{Mat4, Vec2, Vec3};

/// Drawable surface size as delivered by the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    /// Device pixels per logical point
    pub pixels_per_pt: f32,
}

impl Viewport {
    pub fn new(width: u32, height: u32, pixels_per_pt: f32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            pixels_per_pt: if pixels_per_pt > 0.0 { pixels_per_pt } else { 1.0 },
        }
    }

    /// Scale factors that carry positions from `self` to `next`
    pub fn scale_to(&self, next: &Viewport) -> Vec2 {
        Vec2::new(
            next.width as f32 / self.width as f32,
            next.height as f32 / self.height as f32,
        )
    }

    /// Convert a host pointer position (origin top-left) to world space
    pub fn to_world(&self, x: f32, y: f32) -> Vec2 {
        Vec2::new(x, self.height as f32 - y)
    }

    /// Normalized (0..1) touch position, origin top-left like the host's
    pub fn normalized(&self, x: f32, y: f32) -> Vec2 {
        Vec2::new(
            (x / self.width as f32).clamp(0.0, 1.0),
            (y / self.height as f32).clamp(0.0, 1.0),
        )
    }
}

/// Logical play-field size the projection is built around
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Field {
    pub width: f32,
    pub height: f32,
}

impl Field {
    /// Field X coordinate to viewport pixels
    pub fn x(&self, viewport: &Viewport, x: f32) -> f32 {
        x * viewport.width as f32 / self.width
    }

    /// Field Y coordinate to viewport pixels
    pub fn y(&self, viewport: &Viewport, y: f32) -> f32 {
        y * viewport.height as f32 / self.height
    }
}

/// Static transforms uploaded as `model`, `view` and `projection`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
}

impl Transform {
    pub fn new(viewport: &Viewport, field: &Field) -> Self {
        Self {
            model: Self::model_matrix(viewport, field),
            view: Mat4::from_translation(Vec3::ZERO),
            projection: Self::projection_matrix(viewport, field),
        }
    }

    /// Orthographic projection with a margin of `width / ppp / 2` above and below
    fn projection_matrix(viewport: &Viewport, field: &Field) -> Mat4 {
        let margin = (field.width / viewport.pixels_per_pt) / 2.0;
        Mat4::orthographic_rh_gl(
            0.0,
            field.width,
            -margin,
            field.height + margin,
            -1.0,
            1.0,
        )
    }

    fn model_matrix(viewport: &Viewport, field: &Field) -> Mat4 {
        Mat4::from_scale(Vec3::new(
            field.width / viewport.width as f32,
            field.height / viewport.height as f32,
            1.0,
        ))
    }

    pub fn model_cols(&self) -> [f32; 16] {
        self.model.to_cols_array()
    }

    pub fn view_cols(&self) -> [f32; 16] {
        self.view.to_cols_array()
    }

    pub fn projection_cols(&self) -> [f32; 16] {
        self.projection.to_cols_array()
    }
}
