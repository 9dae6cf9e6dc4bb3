//! `.animation` encoder

use bw_common::{pack_name, AnimationHeader, KeyRecord, MARKER_NAME_LEN, TRACK_NAME_LEN};

use crate::animation::SampledClip;
use crate::error::ExportError;

pub fn encode_animation(clip: &SampledClip) -> Result<Vec<u8>, ExportError> {
    let entity = format!("animation '{}'", clip.name);
    let too_long = |name: &str| ExportError::encoding(&entity, format!("name '{}' does not fit", name));

    let mut header = AnimationHeader::new(
        &clip.name,
        clip.tracks.len() as u32,
        clip.frame_count,
        clip.frame_rate,
        clip.duration,
    )
    .ok_or_else(|| too_long(&clip.name))?;
    header.looped = clip.looped;

    let mut out = header.to_bytes().to_vec();
    for track in &clip.tracks {
        let name = pack_name::<TRACK_NAME_LEN>(&track.bone).ok_or_else(|| too_long(&track.bone))?;
        let parent = track.parent.map_or(-1, |p| p as i32);

        out.extend_from_slice(&name);
        out.extend_from_slice(&parent.to_le_bytes());
        out.extend_from_slice(&(track.keys.len() as u32).to_le_bytes());
        for key in &track.keys {
            let record = KeyRecord {
                time: key.time,
                position: key.position,
                rotation: key.rotation,
                scale: key.scale,
            };
            out.extend_from_slice(&record.to_bytes());
        }
    }

    out.extend_from_slice(&(clip.markers.len() as u32).to_le_bytes());
    for (time, name) in &clip.markers {
        let packed = pack_name::<MARKER_NAME_LEN>(name).ok_or_else(|| too_long(name))?;
        out.extend_from_slice(&time.to_le_bytes());
        out.extend_from_slice(&packed);
    }

    Ok(out)
}
