//! Export settings
//!
//! One explicit, immutable settings value is passed into the pipeline. The CLI
//! reads it from a TOML file; every field has a default so a partial file works.
//!
//! ```toml
//! scale = 0.01
//! coordinate_convention = "source-up"
//! vertex_format_tag = "xyznuviiiwwtb"
//! frame_range = [1, 60]
//! optimize_keyframes = true
//! texture_roots = ["textures"]
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bigworld_shared::fs::{read_file_with_limit, MAX_SETTINGS_BYTES};
use bw_common::VertexFormat;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum bone influences stored per vertex
pub const MAX_BONE_INFLUENCES: u8 = 3;
/// Camera distances at which each generated LOD level takes over
pub const LOD_DISTANCES: [f32; 4] = [10.0, 25.0, 50.0, 100.0];
/// Fraction of detail kept at each LOD level
pub const LOD_REDUCTION_RATIOS: [f32; 4] = [1.0, 0.5, 0.25, 0.1];
/// Largest frame magnitude; below 2^23 every `frame / frame_rate` is a distinct `f32`
pub const MAX_FRAME: i32 = 1 << 23;
/// Most frames one clip may span
pub const MAX_FRAME_SPAN: i64 = 100_000;

/// Up-axis convention of the incoming scene data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoordinateConvention {
    /// Authoring tool is Z-up; remapped to the engine's Y-up
    #[default]
    SourceUp,
    /// Data is already in the engine's convention
    TargetUp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub scale: f32,
    pub coordinate_convention: CoordinateConvention,
    pub vertex_format_tag: String,
    pub max_bone_influences: u8,
    pub generate_lods: bool,
    pub lod_levels: u8,
    pub frame_rate: f32,
    /// Inclusive frame range `[start, end]`
    pub frame_range: (i32, i32),
    pub bake_animation: bool,
    pub optimize_keyframes: bool,
    pub copy_textures: bool,
    pub convert_to_dds: bool,
    /// Ordered search roots for material textures
    pub texture_roots: Vec<PathBuf>,
    /// Sets the loop flag on every exported `.animation`
    pub loop_animation: bool,
    /// Written as `treatAsWorldSpaceObject` on every renderSet
    pub treat_as_world_space: bool,
    /// Build a `.bsp` from each model's collision meshes
    pub export_collision: bool,
    /// Write each model's portals into its `.visual`
    pub export_portals: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            scale: 1.0,
            coordinate_convention: CoordinateConvention::SourceUp,
            vertex_format_tag: "xyznuviiiwwtb".to_string(),
            max_bone_influences: MAX_BONE_INFLUENCES,
            generate_lods: false,
            lod_levels: 1,
            frame_rate: 30.0,
            frame_range: (1, 250),
            bake_animation: true,
            optimize_keyframes: false,
            copy_textures: false,
            convert_to_dds: false,
            texture_roots: Vec::new(),
            loop_animation: false,
            treat_as_world_space: false,
            export_collision: true,
            export_portals: true,
        }
    }
}

impl ExportSettings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = read_file_with_limit(path, MAX_SETTINGS_BYTES)?;
        let text = String::from_utf8(bytes)
            .with_context(|| format!("Settings file is not UTF-8: {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))
    }

    /// Check every option and resolve the vertex format.
    ///
    /// Invalid settings fail the whole batch before any unit starts.
    pub fn validate(&self) -> Result<&'static VertexFormat, ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidSettings { reason };

        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(invalid(format!("scale must be positive, got {}", self.scale)));
        }
        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 {
            return Err(invalid(format!(
                "frame_rate must be positive, got {}",
                self.frame_rate
            )));
        }
        let (start, end) = self.frame_range;
        if start > end {
            return Err(invalid(format!(
                "frame_range start {} is after end {}",
                start, end
            )));
        }
        if start.unsigned_abs() > MAX_FRAME as u32 || end.unsigned_abs() > MAX_FRAME as u32 {
            return Err(invalid(format!(
                "frame_range [{}, {}] exceeds ±{}",
                start, end, MAX_FRAME
            )));
        }
        let span = end as i64 - start as i64 + 1;
        if span > MAX_FRAME_SPAN {
            return Err(invalid(format!(
                "frame_range spans {} frames, at most {} allowed",
                span, MAX_FRAME_SPAN
            )));
        }
        if self.max_bone_influences != MAX_BONE_INFLUENCES {
            return Err(invalid(format!(
                "max_bone_influences is fixed at {}, got {}",
                MAX_BONE_INFLUENCES, self.max_bone_influences
            )));
        }
        if self.lod_levels == 0 || self.lod_levels as usize > LOD_DISTANCES.len() {
            return Err(invalid(format!(
                "lod_levels must be between 1 and {}, got {}",
                LOD_DISTANCES.len(),
                self.lod_levels
            )));
        }

        VertexFormat::from_tag(&self.vertex_format_tag).ok_or_else(|| {
            ValidationError::UnknownVertexFormat {
                tag: self.vertex_format_tag.clone(),
            }
        })
    }

    /// Number of LOD levels to emit, including the full-detail level
    pub fn effective_lod_levels(&self) -> usize {
        if self.generate_lods {
            self.lod_levels as usize
        } else {
            1
        }
    }
}
