//! `.bsp` encoder

use bw_common::{BspHeader, BSP_NODE_SIZE, BSP_TRIANGLE_SIZE, BSP_VERTEX_SIZE};

use crate::collision::BspTree;
use crate::error::ExportError;

/// Header, nodes, triangles, then vertices.
pub fn encode_bsp(name: &str, tree: &BspTree) -> Result<Vec<u8>, ExportError> {
    let entity = format!("collision tree '{}'", name);
    let count = |what: &str, len: usize| {
        u32::try_from(len).map_err(|_| ExportError::encoding(&entity, format!("too many {}", what)))
    };
    let header = BspHeader::new(
        count("nodes", tree.nodes.len())?,
        count("triangles", tree.triangles.len())?,
        count("vertices", tree.vertices.len())?,
    );

    let mut out = Vec::with_capacity(
        BspHeader::SIZE
            + tree.nodes.len() * BSP_NODE_SIZE
            + tree.triangles.len() * BSP_TRIANGLE_SIZE
            + tree.vertices.len() * BSP_VERTEX_SIZE,
    );
    out.extend_from_slice(&header.to_bytes());
    for node in &tree.nodes {
        out.extend_from_slice(&node.to_bytes());
    }
    for index in tree.triangles.iter().flatten() {
        out.extend_from_slice(&index.to_le_bytes());
    }
    for component in tree.vertices.iter().flatten() {
        out.extend_from_slice(&component.to_le_bytes());
    }
    Ok(out)
}
