//! `.primitives` encoder

use bw_common::PrimitivesHeader;

use crate::error::ExportError;
use crate::mesh::BuiltGeometry;

/// Header, packed vertices, then u16 little-endian indices.
pub fn encode_primitives(geometry: &BuiltGeometry) -> Result<Vec<u8>, ExportError> {
    let entity = format!("mesh '{}'", geometry.name);
    geometry
        .check_consistency()
        .map_err(|reason| ExportError::encoding(&entity, reason))?;

    let header = PrimitivesHeader::new(
        geometry.format.tag,
        geometry.vertex_count() as u32,
        geometry.indices.len() as u32,
        geometry.format.stride(),
    )
    .ok_or_else(|| ExportError::encoding(&entity, "vertex format tag does not fit the header"))?;

    let mut out = Vec::with_capacity(PrimitivesHeader::SIZE + header.data_size());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&geometry.vertex_data);
    for index in &geometry.indices {
        out.extend_from_slice(&index.to_le_bytes());
    }
    Ok(out)
}
