//! BigWorld collision blob (.bsp)
//!
//! # Layout
//! ```text
//! 0x00: identifier, 64 bytes null-padded ASCII ("bsp")
//! 0x40: node_count u32
//! 0x44: triangle_count u32
//! 0x48: vertex_count u32
//! 0x4C: nodes (node_count * 32 bytes):
//!         plane f32x4 (nx, ny, nz, d), front i32, back i32,
//!         first_triangle u32, triangle_count u32
//! var:  triangles (triangle_count * u32x3 vertex indices)
//! var:  vertices (vertex_count * f32x3)
//! ```
//!
//! Leaves have `front == back == -1` and own a contiguous triangle range.
//! Interior nodes own no triangles.

use anyhow::{bail, Result};

use super::{read_f32, read_u32, unpack_name};

/// Identifier stamped into every BSP header
pub const BSP_IDENTIFIER: &str = "bsp";
/// plane + two children + triangle range
pub const BSP_NODE_SIZE: usize = 16 + 8 + 8;
/// Three u32 vertex indices
pub const BSP_TRIANGLE_SIZE: usize = 12;
/// One f32x3 position
pub const BSP_VERTEX_SIZE: usize = 12;

/// Header of a `.bsp` file (76 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BspHeader {
    pub identifier: [u8; 64],
    pub node_count: u32,
    pub triangle_count: u32,
    pub vertex_count: u32,
}

impl BspHeader {
    pub const SIZE: usize = 76;

    pub fn new(node_count: u32, triangle_count: u32, vertex_count: u32) -> Self {
        let mut identifier = [0u8; 64];
        identifier[..BSP_IDENTIFIER.len()].copy_from_slice(BSP_IDENTIFIER.as_bytes());
        Self {
            identifier,
            node_count,
            triangle_count,
            vertex_count,
        }
    }

    pub fn identifier_str(&self) -> String {
        unpack_name(&self.identifier)
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..64].copy_from_slice(&self.identifier);
        bytes[64..68].copy_from_slice(&self.node_count.to_le_bytes());
        bytes[68..72].copy_from_slice(&self.triangle_count.to_le_bytes());
        bytes[72..76].copy_from_slice(&self.vertex_count.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        let mut identifier = [0u8; 64];
        identifier.copy_from_slice(&bytes[0..64]);
        Some(Self {
            identifier,
            node_count: read_u32(bytes, 64),
            triangle_count: read_u32(bytes, 68),
            vertex_count: read_u32(bytes, 72),
        })
    }

    /// Size of everything after the header
    pub fn data_size(&self) -> usize {
        self.node_count as usize * BSP_NODE_SIZE
            + self.triangle_count as usize * BSP_TRIANGLE_SIZE
            + self.vertex_count as usize * BSP_VERTEX_SIZE
    }
}

/// One BSP node as stored on disk
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BspNode {
    /// Splitting plane `n·x + d = 0`
    pub plane: [f32; 4],
    /// Child on the `<=` side, -1 for a leaf
    pub front: i32,
    /// Child on the `>` side, -1 for a leaf
    pub back: i32,
    pub first_triangle: u32,
    pub triangle_count: u32,
}

impl BspNode {
    pub fn is_leaf(&self) -> bool {
        self.front < 0 && self.back < 0
    }

    pub fn to_bytes(&self) -> [u8; BSP_NODE_SIZE] {
        let mut bytes = [0u8; BSP_NODE_SIZE];
        for (chunk, value) in bytes[..16].chunks_exact_mut(4).zip(self.plane) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        bytes[16..20].copy_from_slice(&self.front.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.back.to_le_bytes());
        bytes[24..28].copy_from_slice(&self.first_triangle.to_le_bytes());
        bytes[28..32].copy_from_slice(&self.triangle_count.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < BSP_NODE_SIZE {
            return None;
        }
        let f = |i: usize| read_f32(bytes, i * 4);
        Some(Self {
            plane: [f(0), f(1), f(2), f(3)],
            front: read_u32(bytes, 16) as i32,
            back: read_u32(bytes, 20) as i32,
            first_triangle: read_u32(bytes, 24),
            triangle_count: read_u32(bytes, 28),
        })
    }
}

/// A parsed `.bsp` file
#[derive(Debug, Clone)]
pub struct DecodedBsp {
    pub header: BspHeader,
    pub nodes: Vec<BspNode>,
    pub triangles: Vec<[u32; 3]>,
    pub vertices: Vec<[f32; 3]>,
}

/// Parse a `.bsp` file and check that children, leaf ranges and triangle
/// indices stay in bounds.
pub fn decode_bsp(bytes: &[u8]) -> Result<DecodedBsp> {
    let Some(header) = BspHeader::from_bytes(bytes) else {
        bail!("BSP file too small ({} bytes)", bytes.len());
    };
    if header.identifier_str() != BSP_IDENTIFIER {
        bail!("Bad BSP identifier '{}'", header.identifier_str());
    }
    let expected = BspHeader::SIZE + header.data_size();
    if bytes.len() != expected {
        bail!(
            "BSP size mismatch: {} bytes, header describes {}",
            bytes.len(),
            expected
        );
    }

    let nodes_end = BspHeader::SIZE + header.node_count as usize * BSP_NODE_SIZE;
    let triangles_end = nodes_end + header.triangle_count as usize * BSP_TRIANGLE_SIZE;

    let nodes: Vec<BspNode> = bytes[BspHeader::SIZE..nodes_end]
        .chunks_exact(BSP_NODE_SIZE)
        .filter_map(BspNode::from_bytes)
        .collect();
    let triangles: Vec<[u32; 3]> = bytes[nodes_end..triangles_end]
        .chunks_exact(BSP_TRIANGLE_SIZE)
        .map(|c| [read_u32(c, 0), read_u32(c, 4), read_u32(c, 8)])
        .collect();
    let vertices: Vec<[f32; 3]> = bytes[triangles_end..]
        .chunks_exact(BSP_VERTEX_SIZE)
        .map(|c| [read_f32(c, 0), read_f32(c, 4), read_f32(c, 8)])
        .collect();

    for (i, node) in nodes.iter().enumerate() {
        if node.is_leaf() {
            let end = node.first_triangle as u64 + node.triangle_count as u64;
            if end > triangles.len() as u64 {
                bail!("BSP leaf {} triangle range ends at {}", i, end);
            }
        } else {
            let in_range = |child: i32| usize::try_from(child).is_ok_and(|c| c < nodes.len());
            if !in_range(node.front) || !in_range(node.back) {
                bail!(
                    "BSP node {} children out of range: {}, {}",
                    i,
                    node.front,
                    node.back
                );
            }
        }
    }
    if let Some(bad) = triangles.iter().flatten().find(|&&v| v >= header.vertex_count) {
        bail!("BSP triangle references vertex {} of {}", bad, header.vertex_count);
    }

    Ok(DecodedBsp {
        header,
        nodes,
        triangles,
        vertices,
    })
}
