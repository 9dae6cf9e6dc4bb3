//! Types and constants for geometry building

use bw_common::VertexFormat;

/// Maximum vertex count addressable by u16 indices (65535)
/// Meshes with more unique vertices must be split before export.
pub(crate) const MAX_VERTICES: usize = u16::MAX as usize;

/// Maximum bone count addressable by u8 bone indices (256)
pub(crate) const MAX_BONES: usize = u8::MAX as usize + 1;

/// Maximum bone influences kept per vertex
pub const MAX_INFLUENCES: usize = 3;

/// Fully resolved vertex, in the engine's coordinate convention
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub bone_indices: [u8; 3],
    /// Sum to 1.0 when skinned, all zero otherwise
    pub bone_weights: [f32; 3],
    pub tangent: [f32; 3],
    pub binormal: [f32; 3],
}

/// A contiguous index/vertex range drawn with one material.
///
/// Ranges are half-open: `start_index..end_index`, `start_vertex..end_vertex`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveGroup {
    /// Material identifier
    pub material: String,
    pub start_index: u32,
    pub end_index: u32,
    pub start_vertex: u32,
    pub end_vertex: u32,
}

impl PrimitiveGroup {
    pub fn index_count(&self) -> u32 {
        self.end_index - self.start_index
    }

    pub fn triangle_count(&self) -> u32 {
        self.index_count() / 3
    }

    pub fn vertex_count(&self) -> u32 {
        self.end_vertex - self.start_vertex
    }
}

/// Axis-aligned bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min: [0.0; 3],
            max: [0.0; 3],
        }
    }
}

impl BoundingBox {
    /// Bounds of a set of points; all-zero for an empty set
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a [f32; 3]>) -> Self {
        let mut iter = points.into_iter();
        let Some(first) = iter.next() else {
            return Self::default();
        };
        let mut bounds = Self {
            min: *first,
            max: *first,
        };
        for p in iter {
            for axis in 0..3 {
                bounds.min[axis] = bounds.min[axis].min(p[axis]);
                bounds.max[axis] = bounds.max[axis].max(p[axis]);
            }
        }
        bounds
    }

    /// Half the box diagonal
    pub fn extent(&self) -> f32 {
        let d: f32 = (0..3)
            .map(|axis| {
                let side = self.max[axis] - self.min[axis];
                side * side
            })
            .sum();
        d.sqrt() * 0.5
    }
}

/// Result of building one mesh
#[derive(Debug, Clone)]
pub struct BuiltGeometry {
    pub name: String,
    pub format: &'static VertexFormat,
    /// One entry per packed vertex
    pub vertices: Vec<Vertex>,
    /// Packed vertex data (`vertices.len() * stride` bytes)
    pub vertex_data: Vec<u8>,
    pub indices: Vec<u16>,
    pub groups: Vec<PrimitiveGroup>,
    pub bounds: BoundingBox,
    /// Name of the bound skeleton, if skinned
    pub skeleton: Option<String>,
}

impl BuiltGeometry {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Check buffer sizes and the primitive group invariants: ascending,
    /// contiguous, non-overlapping triangle ranges covering every index once,
    /// with each group's indices inside its vertex range.
    pub fn check_consistency(&self) -> Result<(), String> {
        let stride = self.format.stride() as usize;
        if self.vertex_data.len() != self.vertices.len() * stride {
            return Err(format!(
                "vertex data is {} bytes, expected {} vertices x {} bytes",
                self.vertex_data.len(),
                self.vertices.len(),
                stride
            ));
        }

        let mut expected_start = 0u32;
        for (i, group) in self.groups.iter().enumerate() {
            if group.start_index != expected_start || group.end_index < group.start_index {
                return Err(format!(
                    "primitive group {} covers {}..{}, expected to start at {}",
                    i, group.start_index, group.end_index, expected_start
                ));
            }
            if group.index_count() % 3 != 0 {
                return Err(format!(
                    "primitive group {} has {} indices, not a triangle list",
                    i,
                    group.index_count()
                ));
            }
            if group.end_vertex < group.start_vertex
                || group.end_vertex as usize > self.vertices.len()
            {
                return Err(format!(
                    "primitive group {} vertex range {}..{} is invalid",
                    i, group.start_vertex, group.end_vertex
                ));
            }
            let range = group.start_index as usize..group.end_index as usize;
            if let Some(&index) = self.indices[range]
                .iter()
                .find(|&&idx| (idx as u32) < group.start_vertex || idx as u32 >= group.end_vertex)
            {
                return Err(format!(
                    "primitive group {} references vertex {} outside {}..{}",
                    i, index, group.start_vertex, group.end_vertex
                ));
            }
            expected_start = group.end_index;
        }

        if expected_start as usize != self.indices.len() {
            return Err(format!(
                "primitive groups cover {} of {} indices",
                expected_start,
                self.indices.len()
            ));
        }
        Ok(())
    }
}
