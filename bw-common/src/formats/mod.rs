//! BigWorld binary asset formats
//!
//! - [`vertex_format`] - vertex-format tags and their attribute layouts
//! - [`primitives`] - `.primitives` geometry blob
//! - [`animation`] - `.animation` keyframe blob
//! - [`bsp`] - `.bsp` collision tree

mod animation;
mod bsp;
mod primitives;
mod vertex_format;

pub use animation::{
    decode_animation, AnimationHeader, DecodedAnimation, DecodedMarker, DecodedTrack, KeyRecord,
    KEY_RECORD_SIZE, MARKER_NAME_LEN, MARKER_RECORD_SIZE, TRACK_HEADER_SIZE, TRACK_NAME_LEN,
};
pub use bsp::{
    decode_bsp, BspHeader, BspNode, DecodedBsp, BSP_IDENTIFIER, BSP_NODE_SIZE, BSP_TRIANGLE_SIZE,
    BSP_VERTEX_SIZE,
};
pub use primitives::{decode_primitives, DecodedPrimitives, PrimitivesHeader};
pub use vertex_format::{VertexAttribute, VertexFormat, VERTEX_FORMATS};

/// Pack an identifier into a fixed-size, null-padded byte field.
///
/// Returns `None` unless the name is ASCII and leaves room for at least one
/// terminating null byte.
pub fn pack_name<const N: usize>(name: &str) -> Option<[u8; N]> {
    if !name.is_ascii() || name.len() >= N {
        return None;
    }
    let mut field = [0u8; N];
    field[..name.len()].copy_from_slice(name.as_bytes());
    Some(field)
}

/// Read a null-padded identifier field.
pub fn unpack_name(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

#[inline]
pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[inline]
pub(crate) fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    f32::from_bits(read_u32(bytes, offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_name_pads_with_nulls() {
        let field: [u8; 8] = pack_name("spine").unwrap();
        assert_eq!(&field, b"spine\0\0\0");
        assert_eq!(unpack_name(&field), "spine");
    }

    #[test]
    fn test_pack_name_rejects_long_or_non_ascii() {
        assert!(pack_name::<4>("four").is_none());
        assert!(pack_name::<4>("abc").is_some());
        assert!(pack_name::<16>("böne").is_none());
    }
}
