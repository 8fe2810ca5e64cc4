use crate::enums::{Axis, TextureFilter};
use glam::Mat4;

/// Live view/display configuration of the slice-stack renderer.
///
/// Rotation angles accumulate as signed whole degrees without bounds; the
/// trigonometric transform wraps them naturally. The toggles map onto the
/// renderer's pipeline/uniform state and are independent of each other.
pub struct RenderState {
    xy_rotation: i32,
    yz_rotation: i32,
    xz_rotation: i32,
    filter: TextureFilter,
    lighting: bool,
    blending: bool,
    depth_test: bool,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            xy_rotation: 0,
            yz_rotation: 0,
            xz_rotation: 0,
            filter: TextureFilter::default(),
            lighting: true,
            blending: true,
            depth_test: false,
        }
    }
}

impl RenderState {
    /// Accumulate a rotation delta in whole degrees about `axis`.
    pub fn rotate(&mut self, axis: Axis, delta_degrees: i32) {
        match axis {
            Axis::X => self.yz_rotation += delta_degrees,
            Axis::Y => self.xz_rotation += delta_degrees,
            Axis::Z => self.xy_rotation += delta_degrees,
        }
    }

    pub fn cycle_filter(&mut self) -> TextureFilter {
        self.filter = self.filter.next();
        self.filter
    }

    pub fn toggle_lighting(&mut self) -> bool {
        self.lighting = !self.lighting;
        self.lighting
    }

    pub fn toggle_blending(&mut self) -> bool {
        self.blending = !self.blending;
        self.blending
    }

    pub fn toggle_depth_test(&mut self) -> bool {
        self.depth_test = !self.depth_test;
        self.depth_test
    }

    pub fn filter(&self) -> TextureFilter {
        self.filter
    }

    pub fn lighting(&self) -> bool {
        self.lighting
    }

    pub fn blending(&self) -> bool {
        self.blending
    }

    pub fn depth_test(&self) -> bool {
        self.depth_test
    }

    /// Rotation transform of the quad stack.
    ///
    /// Applied about X, then Y, then Z; the order matters since rotations
    /// do not commute.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_rotation_x((self.yz_rotation as f32).to_radians())
            * Mat4::from_rotation_y((self.xz_rotation as f32).to_radians())
            * Mat4::from_rotation_z((self.xy_rotation as f32).to_radians())
    }
}
