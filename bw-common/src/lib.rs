//! Engine-side definitions shared by the exporter and inspection tooling
//!
//! # Modules
//!
//! - [`packing`] - Vertex attribute packing (direction → short2, weights → u8)
//! - [`formats`] - Vertex-format registry and the `.primitives` / `.animation` / `.bsp` binary layouts

pub mod formats;
pub mod packing;

pub use packing::{
    decode_direction_short2, encode_direction_short2, pack_bone_weights_u8, unpack_bone_weights_u8,
    SHORT2_SCALE,
};

pub use formats::{
    decode_animation, decode_bsp, decode_primitives, pack_name, unpack_name, AnimationHeader,
    BspHeader, BspNode, DecodedAnimation, DecodedBsp, DecodedMarker, DecodedPrimitives,
    DecodedTrack, KeyRecord, PrimitivesHeader, VertexAttribute, VertexFormat, BSP_IDENTIFIER,
    BSP_NODE_SIZE, BSP_TRIANGLE_SIZE, BSP_VERTEX_SIZE, KEY_RECORD_SIZE, MARKER_NAME_LEN,
    MARKER_RECORD_SIZE, TRACK_HEADER_SIZE, TRACK_NAME_LEN, VERTEX_FORMATS,
};
