//! BigWorld keyframe blob (.animation)
//!
//! # Layout
//! ```text
//! header (92 bytes):
//!   0x00: magic u32 (0x42570101)
//!   0x04: version u32
//!   0x08: track_count u32
//!   0x0C: frame_count u32
//!   0x10: frame_rate f32
//!   0x14: duration f32 (seconds)
//!   0x18: clip name, 64 bytes null-padded
//!   0x58: flags u8x4 [loop, cognate, alpha, reserved]
//! per track:
//!   bone name, 32 bytes null-padded
//!   parent track index i32 (-1 for root)
//!   key_count u32
//!   key_count * (time f32, position f32x3, rotation f32x4 xyzw, scale f32x3)
//! marker table:
//!   marker_count u32
//!   marker_count * (time f32, name 32 bytes null-padded)
//! ```

use anyhow::{bail, Result};
use bigworld_shared::BIGWORLD_LAYOUT;

use super::{pack_name, read_f32, read_u32, unpack_name};

/// Size of the per-track bone name field
pub const TRACK_NAME_LEN: usize = 32;
/// Size of the per-marker name field
pub const MARKER_NAME_LEN: usize = 32;
/// Bone name + parent index + key count
pub const TRACK_HEADER_SIZE: usize = TRACK_NAME_LEN + 8;
/// time + position + rotation + scale
pub const KEY_RECORD_SIZE: usize = 4 + 12 + 16 + 12;
/// time + name
pub const MARKER_RECORD_SIZE: usize = 4 + MARKER_NAME_LEN;

/// Header of a `.animation` file (92 bytes)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationHeader {
    pub magic: u32,
    pub version: u32,
    pub track_count: u32,
    pub frame_count: u32,
    pub frame_rate: f32,
    pub duration: f32,
    pub name: [u8; 64],
    pub looped: bool,
    pub cognate: bool,
    pub alpha: bool,
}

impl AnimationHeader {
    pub const SIZE: usize = 92;

    /// Returns `None` if the clip name does not fit the 64-byte field.
    pub fn new(
        name: &str,
        track_count: u32,
        frame_count: u32,
        frame_rate: f32,
        duration: f32,
    ) -> Option<Self> {
        Some(Self {
            magic: BIGWORLD_LAYOUT.animation_magic,
            version: BIGWORLD_LAYOUT.animation_version,
            track_count,
            frame_count,
            frame_rate,
            duration,
            name: pack_name(name)?,
            looped: false,
            cognate: false,
            alpha: false,
        })
    }

    pub fn name_str(&self) -> String {
        unpack_name(&self.name)
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.track_count.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.frame_count.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.frame_rate.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.duration.to_le_bytes());
        bytes[24..88].copy_from_slice(&self.name);
        bytes[88] = self.looped as u8;
        bytes[89] = self.cognate as u8;
        bytes[90] = self.alpha as u8;
        // reserved flag byte stays 0
        bytes
    }

    /// Read header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        let mut name = [0u8; 64];
        name.copy_from_slice(&bytes[24..88]);
        Some(Self {
            magic: read_u32(bytes, 0),
            version: read_u32(bytes, 4),
            track_count: read_u32(bytes, 8),
            frame_count: read_u32(bytes, 12),
            frame_rate: read_f32(bytes, 16),
            duration: read_f32(bytes, 20),
            name,
            looped: bytes[88] != 0,
            cognate: bytes[89] != 0,
            alpha: bytes[90] != 0,
        })
    }
}

/// One stored keyframe
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyRecord {
    pub time: f32,
    pub position: [f32; 3],
    /// Quaternion [x, y, z, w]
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl KeyRecord {
    pub fn to_bytes(&self) -> [u8; KEY_RECORD_SIZE] {
        let mut bytes = [0u8; KEY_RECORD_SIZE];
        let values = std::iter::once(self.time)
            .chain(self.position)
            .chain(self.rotation)
            .chain(self.scale);
        for (chunk, value) in bytes.chunks_exact_mut(4).zip(values) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < KEY_RECORD_SIZE {
            return None;
        }
        let f = |i: usize| read_f32(bytes, i * 4);
        Some(Self {
            time: f(0),
            position: [f(1), f(2), f(3)],
            rotation: [f(4), f(5), f(6), f(7)],
            scale: [f(8), f(9), f(10)],
        })
    }
}

#[derive(Debug, Clone)]
pub struct DecodedTrack {
    pub bone: String,
    pub parent: Option<usize>,
    pub keys: Vec<KeyRecord>,
}

#[derive(Debug, Clone)]
pub struct DecodedMarker {
    pub time: f32,
    pub name: String,
}

/// A parsed `.animation` file
#[derive(Debug, Clone)]
pub struct DecodedAnimation {
    pub header: AnimationHeader,
    pub tracks: Vec<DecodedTrack>,
    pub markers: Vec<DecodedMarker>,
}

/// Parse a `.animation` file.
pub fn decode_animation(bytes: &[u8]) -> Result<DecodedAnimation> {
    let Some(header) = AnimationHeader::from_bytes(bytes) else {
        bail!("Animation file too small ({} bytes)", bytes.len());
    };
    if header.magic != BIGWORLD_LAYOUT.animation_magic {
        bail!("Bad animation magic: {:#010x}", header.magic);
    }
    if header.version != BIGWORLD_LAYOUT.animation_version {
        bail!("Unsupported animation version {}", header.version);
    }

    let mut offset = AnimationHeader::SIZE;
    // The header count is untrusted; every track needs at least its header bytes
    let capacity = (header.track_count as usize).min(bytes.len() / TRACK_HEADER_SIZE);
    let mut tracks = Vec::with_capacity(capacity);
    for index in 0..header.track_count as usize {
        if bytes.len() < offset + TRACK_HEADER_SIZE {
            bail!("Truncated track header {}", index);
        }
        let bone = unpack_name(&bytes[offset..offset + TRACK_NAME_LEN]);
        let parent = read_u32(bytes, offset + TRACK_NAME_LEN) as i32;
        let key_count = read_u32(bytes, offset + TRACK_NAME_LEN + 4) as usize;
        offset += TRACK_HEADER_SIZE;

        let keys_end = key_count
            .checked_mul(KEY_RECORD_SIZE)
            .and_then(|size| size.checked_add(offset))
            .filter(|&end| end <= bytes.len());
        let Some(keys_end) = keys_end else {
            bail!("Truncated keys for track '{}'", bone);
        };
        let keys = bytes[offset..keys_end]
            .chunks_exact(KEY_RECORD_SIZE)
            .filter_map(KeyRecord::from_bytes)
            .collect();
        offset = keys_end;

        tracks.push(DecodedTrack {
            bone,
            parent: usize::try_from(parent).ok(),
            keys,
        });
    }

    if bytes.len() < offset + 4 {
        bail!("Missing marker table");
    }
    let marker_count = read_u32(bytes, offset) as usize;
    offset += 4;
    let markers_end = marker_count
        .checked_mul(MARKER_RECORD_SIZE)
        .and_then(|size| size.checked_add(offset));
    if markers_end != Some(bytes.len()) {
        bail!(
            "Animation size mismatch: {} bytes, marker table declares {} markers",
            bytes.len(),
            marker_count
        );
    }
    let markers = bytes[offset..]
        .chunks_exact(MARKER_RECORD_SIZE)
        .map(|c| DecodedMarker {
            time: read_f32(c, 0),
            name: unpack_name(&c[4..]),
        })
        .collect();

    Ok(DecodedAnimation {
        header,
        tracks,
        markers,
    })
}
