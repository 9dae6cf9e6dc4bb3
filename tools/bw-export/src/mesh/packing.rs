//! Vertex packing for `.primitives` vertex buffers

use bw_common::{encode_direction_short2, pack_bone_weights_u8, VertexAttribute, VertexFormat};

use super::types::Vertex;

/// Append one vertex to `out`, fields in the format's storage order.
///
/// An unskinned vertex written to a skinned format binds fully to bone 0.
pub fn pack_vertex(format: &VertexFormat, vertex: &Vertex, out: &mut Vec<u8>) {
    for attribute in format.attributes {
        match attribute {
            VertexAttribute::Position => push_f32s(out, &vertex.position),
            VertexAttribute::Normal => push_short2(out, vertex.normal),
            VertexAttribute::Uv => push_f32s(out, &vertex.uv),
            VertexAttribute::BoneIndices => out.extend_from_slice(&vertex.bone_indices),
            VertexAttribute::BoneWeights => {
                let packed = if vertex.bone_weights.iter().all(|w| *w == 0.0) {
                    [255, 0]
                } else {
                    pack_bone_weights_u8(vertex.bone_weights)
                };
                out.extend_from_slice(&packed);
            }
            VertexAttribute::Tangent => push_short2(out, vertex.tangent),
            VertexAttribute::Binormal => push_short2(out, vertex.binormal),
        }
    }
}

#[inline]
fn push_f32s(out: &mut Vec<u8>, values: &[f32]) {
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

#[inline]
fn push_short2(out: &mut Vec<u8>, dir: [f32; 3]) {
    for v in encode_direction_short2(dir) {
        out.extend_from_slice(&v.to_le_bytes());
    }
}
