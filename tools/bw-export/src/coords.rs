//! Coordinate transformer
//!
//! Remaps authoring-space data into the engine's convention. One transformer
//! is built per batch from the settings and applied to every position,
//! direction and bone transform, for geometry and skeletons alike.
//!
//! For `SourceUp` the basis change is `(x, y, z) → (x, z, -y)`, a proper
//! rotation (-90° about X), so triangle winding is preserved.

use glam::{Quat, Vec3};

use crate::scene::Transform;
use crate::settings::{CoordinateConvention, ExportSettings};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransformer {
    convention: CoordinateConvention,
    scale: f32,
}

impl CoordinateTransformer {
    pub fn new(convention: CoordinateConvention, scale: f32) -> Self {
        Self { convention, scale }
    }

    pub fn from_settings(settings: &ExportSettings) -> Self {
        Self::new(settings.coordinate_convention, settings.scale)
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    #[inline]
    fn remap(&self, v: Vec3) -> Vec3 {
        match self.convention {
            CoordinateConvention::SourceUp => Vec3::new(v.x, v.z, -v.y),
            CoordinateConvention::TargetUp => v,
        }
    }

    /// Positions and translations: remapped, then scaled.
    pub fn position(&self, p: [f32; 3]) -> [f32; 3] {
        (self.remap(Vec3::from(p)) * self.scale).to_array()
    }

    /// Normals, tangents and binormals: remapped and renormalized, never scaled.
    pub fn direction(&self, d: [f32; 3]) -> [f32; 3] {
        self.remap(Vec3::from(d)).normalize_or_zero().to_array()
    }

    /// Rotations: conjugated by the basis change, which keeps `w` and remaps
    /// the vector part.
    pub fn rotation(&self, q: [f32; 4]) -> [f32; 4] {
        let axis = self.remap(Vec3::new(q[0], q[1], q[2]));
        let rotated = Quat::from_xyzw(axis.x, axis.y, axis.z, q[3]);
        let rotated = if rotated.length_squared() > 0.0 {
            rotated.normalize()
        } else {
            Quat::IDENTITY
        };
        rotated.to_array()
    }

    /// Non-uniform scale: permuted with the axes, signs kept.
    pub fn scale3(&self, s: [f32; 3]) -> [f32; 3] {
        match self.convention {
            CoordinateConvention::SourceUp => [s[0], s[2], s[1]],
            CoordinateConvention::TargetUp => s,
        }
    }

    /// Full local transform
    pub fn transform(&self, t: &Transform) -> Transform {
        Transform {
            translation: self.position(t.translation),
            rotation: self.rotation(t.rotation),
            scale: self.scale3(t.scale),
        }
    }
}
