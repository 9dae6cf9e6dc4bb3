//! Vertex-format registry
//!
//! A format tag (e.g. `"xyznuviiiwwtb"`) names the attributes of one vertex in
//! storage order. The tag is written into the `.primitives` header so a reader
//! can derive the stride and field offsets.

/// One packed vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexAttribute {
    /// f32x3
    Position,
    /// short2 spherical direction
    Normal,
    /// f32x2
    Uv,
    /// u8x3 bone indices
    BoneIndices,
    /// u8x2 weights, third implied
    BoneWeights,
    /// short2 spherical direction
    Tangent,
    /// short2 spherical direction
    Binormal,
}

impl VertexAttribute {
    /// Packed size in bytes
    pub const fn size(self) -> u32 {
        match self {
            Self::Position => 12,
            Self::Normal | Self::Tangent | Self::Binormal => 4,
            Self::Uv => 8,
            Self::BoneIndices => 3,
            Self::BoneWeights => 2,
        }
    }
}

/// A named vertex layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexFormat {
    pub tag: &'static str,
    pub attributes: &'static [VertexAttribute],
}

use VertexAttribute::*;

/// All vertex formats the exporter can emit.
pub const VERTEX_FORMATS: &[VertexFormat] = &[
    VertexFormat {
        tag: "xyznuv",
        attributes: &[Position, Normal, Uv],
    },
    VertexFormat {
        tag: "xyznuvtb",
        attributes: &[Position, Normal, Uv, Tangent, Binormal],
    },
    VertexFormat {
        tag: "xyznuviiiww",
        attributes: &[Position, Normal, Uv, BoneIndices, BoneWeights],
    },
    VertexFormat {
        tag: "xyznuviiiwwtb",
        attributes: &[
            Position,
            Normal,
            Uv,
            BoneIndices,
            BoneWeights,
            Tangent,
            Binormal,
        ],
    },
];

impl VertexFormat {
    /// Look up a format by its tag.
    pub fn from_tag(tag: &str) -> Option<&'static VertexFormat> {
        VERTEX_FORMATS.iter().find(|f| f.tag == tag)
    }

    /// Vertex stride in bytes
    pub fn stride(&self) -> u32 {
        self.attributes.iter().map(|a| a.size()).sum()
    }

    /// Whether the format stores bone indices and weights
    pub fn is_skinned(&self) -> bool {
        self.attributes.contains(&BoneIndices)
    }

    /// Whether the format stores tangent and binormal
    pub fn has_tangent_frame(&self) -> bool {
        self.attributes.contains(&Tangent)
    }

    /// Byte offset of an attribute within one vertex
    pub fn offset_of(&self, attribute: VertexAttribute) -> Option<u32> {
        let mut offset = 0;
        for a in self.attributes {
            if *a == attribute {
                return Some(offset);
            }
            offset += a.size();
        }
        None
    }
}
