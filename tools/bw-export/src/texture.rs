//! Texture conversion to DXT5 `.dds`

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::material::ImageConverter;

/// `DDS ` magic
const DDS_MAGIC: u32 = 0x2053_3344;
/// Header size after the magic
const DDS_HEADER_SIZE: u32 = 124;
/// CAPS | HEIGHT | WIDTH | PIXELFORMAT | LINEARSIZE
const DDSD_FLAGS: u32 = 0x0008_1007;
const DDPF_FOURCC: u32 = 0x4;
const DDSCAPS_TEXTURE: u32 = 0x1000;

/// Decodes any format the `image` crate reads and re-encodes it as BC3/DXT5.
#[derive(Debug, Default, Clone, Copy)]
pub struct DdsConverter;

impl ImageConverter for DdsConverter {
    fn convert(&self, source: &Path) -> Result<Vec<u8>> {
        let img = image::open(source)
            .with_context(|| format!("Failed to load texture: {}", source.display()))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            bail!("Texture has no pixels: {}", source.display());
        }

        let blocks = compress_bc3(rgba.as_raw(), width, height);
        let mut out = dds_header(width, height, blocks.len() as u32);
        out.extend_from_slice(&blocks);
        Ok(out)
    }
}

/// Compress RGBA8 pixels to BC3 blocks (16 bytes per 4x4 block)
fn compress_bc3(pixels: &[u8], width: u32, height: u32) -> Vec<u8> {
    use intel_tex_2::bc3;

    let w = width as usize;
    let h = height as usize;
    let blocks_x = w.div_ceil(4);
    let blocks_y = h.div_ceil(4);
    let padded_width = blocks_x * 4;
    let padded_height = blocks_y * 4;

    // Edge extension up to whole blocks
    let input_data: Vec<u8> = if w == padded_width && h == padded_height {
        pixels.to_vec()
    } else {
        let mut padded = vec![0u8; padded_width * padded_height * 4];
        for y in 0..padded_height {
            for x in 0..padded_width {
                let src_idx = (y.min(h - 1) * w + x.min(w - 1)) * 4;
                let dst_idx = (y * padded_width + x) * 4;
                padded[dst_idx..dst_idx + 4].copy_from_slice(&pixels[src_idx..src_idx + 4]);
            }
        }
        padded
    };

    let surface = intel_tex_2::RgbaSurface {
        width: padded_width as u32,
        height: padded_height as u32,
        stride: (padded_width * 4) as u32,
        data: &input_data,
    };

    let mut output = vec![0u8; blocks_x * blocks_y * 16];
    bc3::compress_blocks_into(&surface, &mut output);
    output
}

/// Magic plus the 124-byte legacy header for a single-mip DXT5 surface
fn dds_header(width: u32, height: u32, linear_size: u32) -> Vec<u8> {
    let mut fields = [0u32; 32];
    fields[0] = DDS_MAGIC;
    fields[1] = DDS_HEADER_SIZE;
    fields[2] = DDSD_FLAGS;
    fields[3] = height;
    fields[4] = width;
    fields[5] = linear_size;
    // fields[6] depth, [7] mip count, [8..19] reserved
    fields[19] = 32; // pixel format size
    fields[20] = DDPF_FOURCC;
    fields[21] = u32::from_le_bytes(*b"DXT5");
    fields[27] = DDSCAPS_TEXTURE;

    fields.iter().flat_map(|f| f.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = dds_header(8, 4, 32);
        assert_eq!(header.len(), 128);
        assert_eq!(&header[0..4], b"DDS ");
        assert_eq!(&header[84..88], b"DXT5");
        assert_eq!(u32::from_le_bytes(header[12..16].try_into().unwrap()), 4);
        assert_eq!(u32::from_le_bytes(header[16..20].try_into().unwrap()), 8);
    }

    #[test]
    fn test_convert_pads_odd_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brick.png");
        image::RgbaImage::from_pixel(5, 3, image::Rgba([200, 10, 10, 255]))
            .save(&path)
            .unwrap();

        let dds = DdsConverter.convert(&path).unwrap();
        // 2x1 blocks of 16 bytes after the header
        assert_eq!(dds.len(), 128 + 32);
        assert_eq!(u32::from_le_bytes(dds[20..24].try_into().unwrap()), 32);
    }

    #[test]
    fn test_convert_rejects_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.png");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(DdsConverter.convert(&path).is_err());
    }
}
