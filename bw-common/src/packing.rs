//! Vertex attribute packing
//!
//! - direction (f32x3) → short2 spherical angles (2 × i16)
//! - bone weights (f32x3, normalized) → two u8 weights, third implied
//!
//! Used by the exporter when building vertex buffers and by tests/inspection
//! when decoding them again.

use std::f64::consts::PI;

/// Fixed-point scale for short2 angles: `angle / π` maps onto `[-32767, 32767]`.
pub const SHORT2_SCALE: f64 = 32767.0;

// ============================================================================
// Direction Packing
// ============================================================================

/// Encode a direction as spherical angles in signed 16-bit fixed point.
///
/// `theta = atan2(y, x)` in `[-π, π]`, `phi` is the polar angle from +Z in
/// `[0, π]` (equal to `acos(z)` for unit input). Each is divided by π and
/// quantized to `i16`. The input does not need to be normalized; a zero vector
/// encodes as +Z.
///
/// The reconstruction error of [`decode_direction_short2`] is at most
/// `π / 32767` radians.
pub fn encode_direction_short2(dir: [f32; 3]) -> [i16; 2] {
    let x = dir[0] as f64;
    let y = dir[1] as f64;
    let z = dir[2] as f64;

    let len = (x * x + y * y + z * z).sqrt();
    if len <= f64::EPSILON || !len.is_finite() {
        return [0, 0];
    }

    let theta = y.atan2(x);
    // atan2 form stays accurate near the poles where acos(z) loses precision
    let phi = (x * x + y * y).sqrt().atan2(z);

    [quantize_angle(theta), quantize_angle(phi)]
}

/// Decode short2 spherical angles back to a unit direction.
pub fn decode_direction_short2(packed: [i16; 2]) -> [f32; 3] {
    let theta = packed[0] as f64 / SHORT2_SCALE * PI;
    let phi = packed[1] as f64 / SHORT2_SCALE * PI;
    let (sin_phi, cos_phi) = phi.sin_cos();
    let (sin_theta, cos_theta) = theta.sin_cos();
    [
        (sin_phi * cos_theta) as f32,
        (sin_phi * sin_theta) as f32,
        cos_phi as f32,
    ]
}

#[inline]
fn quantize_angle(angle: f64) -> i16 {
    (angle / PI * SHORT2_SCALE)
        .round()
        .clamp(-SHORT2_SCALE, SHORT2_SCALE) as i16
}

// ============================================================================
// Skin Weight Packing
// ============================================================================

/// Pack three normalized weights into the two stored `u8` weights.
///
/// The third weight is implied as `255 - w0 - w1`, so the stored pair is
/// clamped to never exceed 255 in total.
pub fn pack_bone_weights_u8(weights: [f32; 3]) -> [u8; 2] {
    let w0 = (weights[0].clamp(0.0, 1.0) * 255.0).round() as u16;
    let w1 = (weights[1].clamp(0.0, 1.0) * 255.0).round() as u16;
    let w1 = w1.min(255 - w0.min(255));
    [w0.min(255) as u8, w1 as u8]
}

/// Expand stored weights back to three normalized weights.
pub fn unpack_bone_weights_u8(packed: [u8; 2]) -> [f32; 3] {
    let w0 = packed[0] as f32;
    let w1 = packed[1] as f32;
    let w2 = (255.0 - w0 - w1).max(0.0);
    [w0 / 255.0, w1 / 255.0, w2 / 255.0]
}
