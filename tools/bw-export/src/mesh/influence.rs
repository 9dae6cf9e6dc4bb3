//! Bone influence resolution

use super::types::MAX_INFLUENCES;

/// Reduce raw `(bone index, weight)` influences to at most three.
///
/// Non-positive (and NaN) weights are dropped, the rest are stable-sorted by
/// descending weight, truncated to [`MAX_INFLUENCES`] and renormalized to sum
/// to 1. Equal weights keep their original influence order. With nothing left
/// the result is all zero.
pub fn resolve_influences(raw: &[(usize, f32)]) -> ([u8; 3], [f32; 3]) {
    let mut kept: Vec<(usize, f32)> = raw.iter().copied().filter(|(_, w)| *w > 0.0).collect();
    kept.sort_by(|a, b| b.1.total_cmp(&a.1));
    kept.truncate(MAX_INFLUENCES);

    let mut indices = [0u8; 3];
    let mut weights = [0.0f32; 3];
    let total: f32 = kept.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return (indices, weights);
    }

    for (slot, (bone, weight)) in kept.into_iter().enumerate() {
        indices[slot] = bone as u8;
        weights[slot] = weight / total;
    }
    (indices, weights)
}
