//! BigWorld geometry blob (.primitives)
//!
//! # Layout
//! ```text
//! 0x00: magic u32 (0x42570100)
//! 0x04: format tag, 64 bytes null-padded ASCII
//! 0x44: vertex_count u32
//! 0x48: index_count u32
//! 0x4C: stride u32
//! 0x50: vertex_data (vertex_count * stride)
//! var:  index_data (index_count * 2 bytes, u16)
//! ```
//!
//! All integers are little-endian.

use anyhow::{bail, Result};
use bigworld_shared::BIGWORLD_LAYOUT;

use super::{pack_name, read_u32, unpack_name, VertexFormat};

/// Header of a `.primitives` file (80 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitivesHeader {
    pub magic: u32,
    pub tag: [u8; 64],
    pub vertex_count: u32,
    pub index_count: u32,
    pub stride: u32,
}

impl PrimitivesHeader {
    pub const SIZE: usize = 80;

    /// Returns `None` if the tag does not fit the 64-byte field.
    pub fn new(tag: &str, vertex_count: u32, index_count: u32, stride: u32) -> Option<Self> {
        Some(Self {
            magic: BIGWORLD_LAYOUT.primitives_magic,
            tag: pack_name(tag)?,
            vertex_count,
            index_count,
            stride,
        })
    }

    /// Format tag as a string
    pub fn tag_str(&self) -> String {
        unpack_name(&self.tag)
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4..68].copy_from_slice(&self.tag);
        bytes[68..72].copy_from_slice(&self.vertex_count.to_le_bytes());
        bytes[72..76].copy_from_slice(&self.index_count.to_le_bytes());
        bytes[76..80].copy_from_slice(&self.stride.to_le_bytes());
        bytes
    }

    /// Read header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        let mut tag = [0u8; 64];
        tag.copy_from_slice(&bytes[4..68]);
        Some(Self {
            magic: read_u32(bytes, 0),
            tag,
            vertex_count: read_u32(bytes, 68),
            index_count: read_u32(bytes, 72),
            stride: read_u32(bytes, 76),
        })
    }

    /// Size of the vertex and index payload that follows the header
    pub fn data_size(&self) -> usize {
        self.vertex_count as usize * self.stride as usize + self.index_count as usize * 2
    }
}

/// A parsed `.primitives` file
#[derive(Debug, Clone)]
pub struct DecodedPrimitives {
    pub header: PrimitivesHeader,
    /// Packed vertices, `vertex_count * stride` bytes
    pub vertex_data: Vec<u8>,
    pub indices: Vec<u16>,
}

impl DecodedPrimitives {
    /// Packed bytes of one vertex
    pub fn vertex(&self, index: usize) -> &[u8] {
        let stride = self.header.stride as usize;
        &self.vertex_data[index * stride..(index + 1) * stride]
    }
}

/// Parse a `.primitives` file.
///
/// The stride must match the registered layout of the header's format tag.
pub fn decode_primitives(bytes: &[u8]) -> Result<DecodedPrimitives> {
    let Some(header) = PrimitivesHeader::from_bytes(bytes) else {
        bail!("Primitives file too small ({} bytes)", bytes.len());
    };
    if header.magic != BIGWORLD_LAYOUT.primitives_magic {
        bail!("Bad primitives magic: {:#010x}", header.magic);
    }

    let tag = header.tag_str();
    let Some(format) = VertexFormat::from_tag(&tag) else {
        bail!("Unknown vertex format tag '{}'", tag);
    };
    if format.stride() != header.stride {
        bail!(
            "Stride {} does not match format '{}' (expected {})",
            header.stride,
            tag,
            format.stride()
        );
    }

    let expected = PrimitivesHeader::SIZE + header.data_size();
    if bytes.len() != expected {
        bail!(
            "Primitives size mismatch: {} bytes, header describes {}",
            bytes.len(),
            expected
        );
    }

    let vertex_end = PrimitivesHeader::SIZE + header.vertex_count as usize * header.stride as usize;
    let vertex_data = bytes[PrimitivesHeader::SIZE..vertex_end].to_vec();
    let indices = bytes[vertex_end..]
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();

    Ok(DecodedPrimitives {
        header,
        vertex_data,
        indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> Vec<u8> {
        let header = PrimitivesHeader::new("xyznuv", 3, 3, 24).unwrap();
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend(std::iter::repeat_n(0u8, 3 * 24));
        for i in [0u16, 1, 2] {
            bytes.extend_from_slice(&i.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_header_layout() {
        let header = PrimitivesHeader::new("xyznuviiiwwtb", 4, 6, 37).unwrap();
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], &0x42570100u32.to_le_bytes());
        assert_eq!(&bytes[4..17], b"xyznuviiiwwtb");
        assert!(bytes[17..68].iter().all(|&b| b == 0));
        assert_eq!(&bytes[68..72], &4u32.to_le_bytes());
        assert_eq!(&bytes[72..76], &6u32.to_le_bytes());
        assert_eq!(&bytes[76..80], &37u32.to_le_bytes());
        assert_eq!(PrimitivesHeader::from_bytes(&bytes), Some(header));
    }

    #[test]
    fn test_header_too_small() {
        assert!(PrimitivesHeader::from_bytes(&[0u8; 79]).is_none());
    }

    #[test]
    fn test_decode() {
        let decoded = decode_primitives(&sample_file()).unwrap();
        assert_eq!(decoded.header.vertex_count, 3);
        assert_eq!(decoded.indices, vec![0, 1, 2]);
        assert_eq!(decoded.vertex(2).len(), 24);
    }

    #[test]
    fn test_decode_rejects_truncated_and_bad_stride() {
        let mut truncated = sample_file();
        truncated.pop();
        assert!(decode_primitives(&truncated).is_err());

        let mut bad_stride = sample_file();
        bad_stride[76..80].copy_from_slice(&32u32.to_le_bytes());
        assert!(decode_primitives(&bad_stride).is_err());
    }
}
