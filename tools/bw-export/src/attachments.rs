//! Hardpoints and portals
//!
//! Both are written into the owning model's `.visual`. Host names keep their
//! scene prefix (`HP_torch`, `PORTAL_door`); the exported identifier drops it.

use glam::Vec3;
use hashbrown::HashSet;

use crate::coords::CoordinateTransformer;
use crate::error::ValidationError;
use crate::scene::{MeshEntry, PortalEntry, Transform};

pub const HARDPOINT_PREFIX: &str = "HP_";
pub const PORTAL_PREFIX: &str = "PORTAL_";

/// Portal polygons with a smaller Newell normal are degenerate
const MIN_PORTAL_AREA: f32 = 1e-8;

#[derive(Debug, Clone, PartialEq)]
pub struct Hardpoint {
    pub identifier: String,
    /// Local transform in the engine's convention
    pub transform: Transform,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portal {
    pub identifier: String,
    pub vertices: Vec<[f32; 3]>,
    /// `n·x + d = 0`, normal by the right-hand rule over the winding
    pub plane: [f32; 4],
    pub adjacent_chunk: Option<String>,
}

/// Exported identifier: the scene name without its prefix, trimmed
pub fn identifier<'a>(name: &'a str, prefix: &str) -> &'a str {
    name.strip_prefix(prefix).unwrap_or(name).trim()
}

/// Reject unnamed or repeated identifiers and degenerate portal polygons.
pub fn validate_attachments(mesh: &MeshEntry) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for hardpoint in &mesh.hardpoints {
        let id = identifier(&hardpoint.name, HARDPOINT_PREFIX);
        if id.is_empty() {
            return Err(ValidationError::EmptyField {
                entity: format!("mesh '{}' hardpoint '{}'", mesh.name, hardpoint.name),
                field: "name",
            });
        }
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateName {
                kind: "hardpoint",
                name: id.to_string(),
            });
        }
    }

    let mut seen = HashSet::new();
    for portal in &mesh.portals {
        let id = identifier(&portal.name, PORTAL_PREFIX);
        let invalid = |reason| ValidationError::InvalidPortal {
            mesh: mesh.name.clone(),
            portal: portal.name.clone(),
            reason,
        };
        if id.is_empty() {
            return Err(invalid("has no identifier"));
        }
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateName {
                kind: "portal",
                name: id.to_string(),
            });
        }
        if portal.vertices.len() < 3 {
            return Err(invalid("needs at least 3 vertices"));
        }
        if newell_normal(&portal.vertices).length() <= MIN_PORTAL_AREA {
            return Err(invalid("has zero area"));
        }
    }
    Ok(())
}

/// Hardpoints in the engine's convention, in scene order
pub fn build_hardpoints(mesh: &MeshEntry, transformer: &CoordinateTransformer) -> Vec<Hardpoint> {
    mesh.hardpoints
        .iter()
        .map(|hardpoint| Hardpoint {
            identifier: identifier(&hardpoint.name, HARDPOINT_PREFIX).to_string(),
            transform: transformer.transform(&hardpoint.transform),
        })
        .collect()
}

/// Portals in the engine's convention, in scene order.
///
/// Expects polygons that passed [`validate_attachments`].
pub fn build_portals(mesh: &MeshEntry, transformer: &CoordinateTransformer) -> Vec<Portal> {
    mesh.portals
        .iter()
        .map(|portal| build_portal(portal, transformer))
        .collect()
}

fn build_portal(portal: &PortalEntry, transformer: &CoordinateTransformer) -> Portal {
    let vertices: Vec<[f32; 3]> = portal
        .vertices
        .iter()
        .map(|v| transformer.position(*v))
        .collect();

    let normal = newell_normal(&vertices).normalize_or_zero();
    let centroid = vertices.iter().map(|v| Vec3::from(*v)).sum::<Vec3>() / vertices.len() as f32;
    let d = -normal.dot(centroid);

    Portal {
        identifier: identifier(&portal.name, PORTAL_PREFIX).to_string(),
        vertices,
        plane: [normal.x, normal.y, normal.z, d],
        adjacent_chunk: portal.adjacent_chunk.clone(),
    }
}

/// Unnormalized polygon normal; its length is twice the polygon's area
fn newell_normal(vertices: &[[f32; 3]]) -> Vec3 {
    let mut normal = Vec3::ZERO;
    for (i, current) in vertices.iter().enumerate() {
        let a = Vec3::from(*current);
        let b = Vec3::from(vertices[(i + 1) % vertices.len()]);
        normal += Vec3::new(
            (a.y - b.y) * (a.z + b.z),
            (a.z - b.z) * (a.x + b.x),
            (a.x - b.x) * (a.y + b.y),
        );
    }
    normal
}
