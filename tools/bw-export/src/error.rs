//! Error and warning taxonomy for export units
//!
//! Every fatal condition aborts only the unit it occurs in. Warnings are
//! collected on the unit report and never stop an export.

use std::path::PathBuf;

use thiserror::Error;

/// Structural problem in the input, detected before anything is encoded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("skeleton '{skeleton}': bone '{bone}' is part of a parent cycle")]
    CyclicHierarchy { skeleton: String, bone: String },

    #[error("{kind} '{name}' is defined more than once")]
    DuplicateName { kind: &'static str, name: String },

    #[error("skeleton '{skeleton}': bone '{bone}' has unknown parent '{parent}'")]
    UnknownParent {
        skeleton: String,
        bone: String,
        parent: String,
    },

    #[error("skeleton '{skeleton}' has {count} root bones, expected exactly one")]
    MultipleRoots { skeleton: String, count: usize },

    #[error("{entity}: required field '{field}' is empty")]
    EmptyField { entity: String, field: &'static str },

    #[error("mesh '{mesh}': vertex {vertex} bone weights sum to {sum} after normalization")]
    WeightSum { mesh: String, vertex: u32, sum: f32 },

    #[error("mesh '{mesh}': skin has {found} influence lists for {expected} positions")]
    SkinMismatch {
        mesh: String,
        expected: usize,
        found: usize,
    },

    #[error("mesh '{mesh}': triangle {triangle} references vertex {vertex} out of {count}")]
    VertexOutOfRange {
        mesh: String,
        triangle: usize,
        vertex: u32,
        count: usize,
    },

    #[error("animation '{clip}': track references bone '{bone}' missing from skeleton '{skeleton}'")]
    UnboundTrack {
        clip: String,
        bone: String,
        skeleton: String,
    },

    #[error("animation '{clip}': frame range {start}..={end} yields no samples")]
    EmptyClip { clip: String, start: i32, end: i32 },

    #[error("unknown vertex format '{tag}'")]
    UnknownVertexFormat { tag: String },

    #[error("mesh '{mesh}' is skinned but vertex format '{tag}' stores no bone weights")]
    SkinnedFormatRequired { mesh: String, tag: String },

    #[error("mesh '{mesh}': material slot '{slot}' has no material definition")]
    UnresolvedMaterial { mesh: String, slot: String },

    #[error("{entity} references unknown skeleton '{skeleton}'")]
    UnknownSkeleton { entity: String, skeleton: String },

    #[error("{entity} depends on {dependency}, which failed to export")]
    DependencyFailed { entity: String, dependency: String },

    #[error("{entity}: identifier '{name}' must be ASCII and shorter than {limit} bytes")]
    IdentifierTooLong {
        entity: String,
        name: String,
        limit: usize,
    },

    #[error("mesh '{mesh}': portal '{portal}' {reason}")]
    InvalidPortal {
        mesh: String,
        portal: String,
        reason: &'static str,
    },

    #[error("invalid settings: {reason}")]
    InvalidSettings { reason: String },
}

/// Fatal failure of one export unit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExportError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{entity}: {what} count {count} exceeds the limit of {limit}")]
    Capacity {
        entity: String,
        what: &'static str,
        count: usize,
        limit: usize,
    },

    #[error("{entity}: failed to encode: {reason}")]
    Encoding { entity: String, reason: String },

    #[error("I/O failure at {}: {reason}", .path.display())]
    Io { path: PathBuf, reason: String },
}

impl ExportError {
    pub fn encoding(entity: &str, reason: impl Into<String>) -> Self {
        Self::Encoding {
            entity: entity.to_string(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, err: &anyhow::Error) -> Self {
        Self::Io {
            path: path.into(),
            reason: format!("{:#}", err),
        }
    }

    /// Short class name used in reports
    pub fn class(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Capacity { .. } => "CapacityError",
            Self::Encoding { .. } => "EncodingError",
            Self::Io { .. } => "IOError",
        }
    }
}

/// Non-fatal condition recorded on a unit; the documented default is applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExportWarning {
    #[error("material '{material}': texture '{path}' for '{slot}' was not found, keeping the original path")]
    MissingTexture {
        material: String,
        slot: String,
        path: String,
    },

    #[error("mesh '{mesh}' has no UV layer, UVs default to (0, 0)")]
    MissingUvLayer { mesh: String },

    #[error("mesh '{mesh}' has no triangles, no files were written for it")]
    EmptyGeometry { mesh: String },

    #[error("material '{material}': could not convert '{path}': {reason}")]
    TextureConversionFailed {
        material: String,
        path: String,
        reason: String,
    },

    #[error("mesh '{mesh}': influence group '{group}' matches no bone and was ignored")]
    UnknownInfluenceGroup { mesh: String, group: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_converts_into_export_error() {
        let err: ExportError = ValidationError::CyclicHierarchy {
            skeleton: "rig".into(),
            bone: "A".into(),
        }
        .into();
        assert_eq!(err.class(), "ValidationError");
        assert_eq!(
            err.to_string(),
            "skeleton 'rig': bone 'A' is part of a parent cycle"
        );
    }

    #[test]
    fn test_capacity_message() {
        let err = ExportError::Capacity {
            entity: "mesh 'terrain'".into(),
            what: "vertex",
            count: 70000,
            limit: 65535,
        };
        assert_eq!(err.class(), "CapacityError");
        assert!(err.to_string().contains("70000"));
    }
}
