//! Mesh resolution and geometry building

use std::collections::BTreeMap;

use bw_common::VertexFormat;
use glam::Vec3;
use hashbrown::{HashMap, HashSet};

use super::influence::resolve_influences;
use super::packing::pack_vertex;
use super::types::{BoundingBox, BuiltGeometry, PrimitiveGroup, Vertex, MAX_BONES, MAX_VERTICES};
use crate::coords::CoordinateTransformer;
use crate::error::{ExportError, ExportWarning, ValidationError};
use crate::material::DEFAULT_MATERIAL;
use crate::scene::{MeshCorner, MeshEntry};
use crate::skeleton::BuiltSkeleton;

/// Tolerance on the sum of resolved bone weights
const WEIGHT_SUM_TOLERANCE: f32 = 1e-4;

/// Name references of a mesh resolved to dense indices.
#[derive(Debug, Clone)]
pub struct ResolvedMesh {
    /// Material id per slot, plus one trailing entry used by triangles whose
    /// slot index is out of range
    pub slot_materials: Vec<String>,
    /// Per-position `(skeleton node index, weight)` influences
    pub influences: Option<Vec<Vec<(usize, f32)>>>,
    /// Bound skeleton name
    pub skeleton: Option<String>,
}

impl ResolvedMesh {
    /// Whether any triangle falls back to the built-in default material
    pub fn uses_fallback(&self, mesh: &MeshEntry) -> bool {
        mesh.triangles
            .iter()
            .any(|t| t.material_slot >= mesh.material_slots.len())
    }
}

/// Validate a mesh and resolve its bone and material references.
///
/// `material_exists` answers whether a material name is part of the export set.
pub fn resolve_mesh(
    mesh: &MeshEntry,
    skeleton: Option<&BuiltSkeleton>,
    format: &VertexFormat,
    material_exists: impl Fn(&str) -> bool,
    warnings: &mut Vec<ExportWarning>,
) -> Result<ResolvedMesh, ExportError> {
    if mesh.name.is_empty() {
        return Err(ValidationError::EmptyField {
            entity: "mesh".to_string(),
            field: "name",
        }
        .into());
    }

    for (t, triangle) in mesh.triangles.iter().enumerate() {
        for corner in &triangle.corners {
            if corner.vertex as usize >= mesh.positions.len() {
                return Err(ValidationError::VertexOutOfRange {
                    mesh: mesh.name.clone(),
                    triangle: t,
                    vertex: corner.vertex,
                    count: mesh.positions.len(),
                }
                .into());
            }
        }
    }

    // Materials: only slots that triangles actually use must resolve
    let used_slots: HashSet<usize> = mesh.triangles.iter().map(|t| t.material_slot).collect();
    for (slot, material) in mesh.material_slots.iter().enumerate() {
        if !used_slots.contains(&slot) {
            continue;
        }
        if material.is_empty() {
            return Err(ValidationError::EmptyField {
                entity: format!("mesh '{}' material slot {}", mesh.name, slot),
                field: "material",
            }
            .into());
        }
        if !material_exists(material) {
            return Err(ValidationError::UnresolvedMaterial {
                mesh: mesh.name.clone(),
                slot: material.clone(),
            }
            .into());
        }
    }
    let mut slot_materials = mesh.material_slots.clone();
    slot_materials.push(DEFAULT_MATERIAL.to_string());

    if !mesh.triangles.is_empty() && !mesh.has_uv_layer() {
        warnings.push(ExportWarning::MissingUvLayer {
            mesh: mesh.name.clone(),
        });
    }

    let Some(skin) = &mesh.skin else {
        return Ok(ResolvedMesh {
            slot_materials,
            influences: None,
            skeleton: None,
        });
    };

    if !format.is_skinned() {
        return Err(ValidationError::SkinnedFormatRequired {
            mesh: mesh.name.clone(),
            tag: format.tag.to_string(),
        }
        .into());
    }
    let skeleton = match skeleton {
        Some(s) if s.name == skin.skeleton => s,
        _ => {
            return Err(ValidationError::UnknownSkeleton {
                entity: format!("mesh '{}'", mesh.name),
                skeleton: skin.skeleton.clone(),
            }
            .into());
        }
    };
    if skeleton.nodes.len() > MAX_BONES {
        return Err(ExportError::Capacity {
            entity: format!("mesh '{}'", mesh.name),
            what: "bone",
            count: skeleton.nodes.len(),
            limit: MAX_BONES,
        });
    }
    if skin.influences.len() != mesh.positions.len() {
        return Err(ValidationError::SkinMismatch {
            mesh: mesh.name.clone(),
            expected: mesh.positions.len(),
            found: skin.influences.len(),
        }
        .into());
    }

    let mut unknown_groups: Vec<&str> = Vec::new();
    let influences = skin
        .influences
        .iter()
        .map(|raw| {
            raw.iter()
                .filter_map(|influence| match skeleton.bone_index(&influence.bone) {
                    Some(bone) => Some((bone, influence.weight)),
                    None => {
                        if !unknown_groups.contains(&influence.bone.as_str()) {
                            unknown_groups.push(&influence.bone);
                        }
                        None
                    }
                })
                .collect()
        })
        .collect();

    for group in unknown_groups {
        warnings.push(ExportWarning::UnknownInfluenceGroup {
            mesh: mesh.name.clone(),
            group: group.to_string(),
        });
    }

    Ok(ResolvedMesh {
        slot_materials,
        influences: Some(influences),
        skeleton: Some(skeleton.name.clone()),
    })
}

/// Build packed geometry from a resolved mesh.
///
/// Triangles are bucketed by material slot in ascending order (out-of-range
/// slots last). Vertices are deduplicated within each bucket on their packed
/// bytes, so every group owns a contiguous vertex range.
pub fn build_geometry(
    mesh: &MeshEntry,
    resolved: &ResolvedMesh,
    format: &'static VertexFormat,
    transformer: &CoordinateTransformer,
) -> Result<BuiltGeometry, ExportError> {
    let skin = match &resolved.influences {
        Some(influences) => Some(resolve_skin(&mesh.name, influences)?),
        None => None,
    };

    let fallback_slot = mesh.material_slots.len();
    let mut buckets: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (t, triangle) in mesh.triangles.iter().enumerate() {
        let slot = triangle.material_slot.min(fallback_slot);
        buckets.entry(slot).or_default().push(t);
    }

    let stride = format.stride() as usize;
    let mut vertices: Vec<Vertex> = Vec::new();
    let mut vertex_data: Vec<u8> = Vec::new();
    let mut indices: Vec<u32> = Vec::with_capacity(mesh.triangles.len() * 3);
    let mut groups = Vec::with_capacity(buckets.len());

    for (slot, triangles) in &buckets {
        let start_index = indices.len() as u32;
        let start_vertex = vertices.len() as u32;
        let mut seen: HashMap<Vec<u8>, u32> = HashMap::new();

        for &t in triangles {
            for corner in &mesh.triangles[t].corners {
                let vertex = make_vertex(mesh, corner, skin.as_deref(), format, transformer);
                let mut packed = Vec::with_capacity(stride);
                pack_vertex(format, &vertex, &mut packed);

                let index = match seen.get(&packed) {
                    Some(&index) => index,
                    None => {
                        let index = vertices.len() as u32;
                        vertex_data.extend_from_slice(&packed);
                        vertices.push(vertex);
                        seen.insert(packed, index);
                        index
                    }
                };
                indices.push(index);
            }
        }

        groups.push(PrimitiveGroup {
            material: resolved.slot_materials[*slot].clone(),
            start_index,
            end_index: indices.len() as u32,
            start_vertex,
            end_vertex: vertices.len() as u32,
        });
    }

    if vertices.len() > MAX_VERTICES {
        return Err(ExportError::Capacity {
            entity: format!("mesh '{}'", mesh.name),
            what: "vertex",
            count: vertices.len(),
            limit: MAX_VERTICES,
        });
    }

    let bounds = BoundingBox::from_points(vertices.iter().map(|v| &v.position));
    let indices = indices.into_iter().map(|i| i as u16).collect();

    tracing::debug!(
        "Built mesh '{}': {} vertices, {} triangles, {} groups",
        mesh.name,
        vertices.len(),
        mesh.triangles.len(),
        groups.len()
    );

    Ok(BuiltGeometry {
        name: mesh.name.clone(),
        format,
        vertices,
        vertex_data,
        indices,
        groups,
        bounds,
        skeleton: resolved.skeleton.clone(),
    })
}

/// Resolve every position's influences once and check the weight sum.
fn resolve_skin(
    mesh: &str,
    influences: &[Vec<(usize, f32)>],
) -> Result<Vec<([u8; 3], [f32; 3])>, ExportError> {
    influences
        .iter()
        .enumerate()
        .map(|(vertex, raw)| {
            let (indices, weights) = resolve_influences(raw);
            let sum: f32 = weights.iter().sum();
            // NaN sums (infinite input weights) fail as well
            if sum != 0.0 && !((sum - 1.0).abs() <= WEIGHT_SUM_TOLERANCE) {
                return Err(ValidationError::WeightSum {
                    mesh: mesh.to_string(),
                    vertex: vertex as u32,
                    sum,
                }
                .into());
            }
            Ok((indices, weights))
        })
        .collect()
}

fn make_vertex(
    mesh: &MeshEntry,
    corner: &MeshCorner,
    skin: Option<&[([u8; 3], [f32; 3])]>,
    format: &VertexFormat,
    transformer: &CoordinateTransformer,
) -> Vertex {
    let normal = transformer.direction(corner.normal);
    let (bone_indices, bone_weights) = skin
        .map(|s| s[corner.vertex as usize])
        .unwrap_or_default();

    let (tangent, binormal) = if format.has_tangent_frame() {
        tangent_frame(normal, corner.tangent, transformer)
    } else {
        ([0.0; 3], [0.0; 3])
    };

    Vertex {
        position: transformer.position(mesh.positions[corner.vertex as usize]),
        normal,
        uv: corner.uv.unwrap_or([0.0, 0.0]),
        bone_indices,
        bone_weights,
        tangent,
        binormal,
    }
}

/// Tangent and binormal for a (transformed, unit or zero) normal.
///
/// The binormal is `sign * (normal × tangent)`. Without a host tangent the
/// tangent is +X, and a normal parallel to it gets a +Y binormal.
fn tangent_frame(
    normal: [f32; 3],
    tangent: Option<[f32; 4]>,
    transformer: &CoordinateTransformer,
) -> ([f32; 3], [f32; 3]) {
    let n = Vec3::from(normal);
    let (t, sign) = match tangent {
        Some(t) => (
            Vec3::from(transformer.direction([t[0], t[1], t[2]])),
            if t[3] < 0.0 { -1.0 } else { 1.0 },
        ),
        None => (Vec3::X, 1.0),
    };
    let b = n.cross(t) * sign;
    let b = if b.length_squared() > 0.0 { b } else { Vec3::Y };
    (t.to_array(), b.to_array())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{MeshTriangle, RawInfluence, SkeletonEntry, SkinBinding};
    use crate::settings::CoordinateConvention;
    use crate::skeleton::build_skeleton;

    fn identity() -> CoordinateTransformer {
        CoordinateTransformer::new(CoordinateConvention::TargetUp, 1.0)
    }

    fn corner(vertex: u32, uv: [f32; 2]) -> MeshCorner {
        MeshCorner {
            vertex,
            normal: [0.0, 0.0, 1.0],
            uv: Some(uv),
            tangent: None,
        }
    }

    fn quad(slots: [usize; 2]) -> MeshEntry {
        MeshEntry {
            name: "quad".to_string(),
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            triangles: vec![
                MeshTriangle {
                    material_slot: slots[0],
                    corners: [corner(0, [0.0, 0.0]), corner(1, [1.0, 0.0]), corner(2, [1.0, 1.0])],
                },
                MeshTriangle {
                    material_slot: slots[1],
                    corners: [corner(0, [0.0, 0.0]), corner(2, [1.0, 1.0]), corner(3, [0.0, 1.0])],
                },
            ],
            material_slots: vec!["a".to_string(), "b".to_string()],
            ..Default::default()
        }
    }

    fn build(mesh: &MeshEntry, tag: &str) -> Result<BuiltGeometry, ExportError> {
        let format = VertexFormat::from_tag(tag).unwrap();
        let mut warnings = Vec::new();
        let resolved = resolve_mesh(mesh, None, format, |_| true, &mut warnings)?;
        build_geometry(mesh, &resolved, format, &identity())
    }

    #[test]
    fn test_quad_single_group() {
        let geometry = build(&quad([0, 0]), "xyznuv").unwrap();
        assert_eq!(geometry.vertex_count(), 4);
        assert_eq!(geometry.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(geometry.groups.len(), 1);
        assert_eq!(geometry.groups[0].index_count(), 6);
        assert_eq!(geometry.groups[0].material, "a");
        geometry.check_consistency().unwrap();
    }

    #[test]
    fn test_groups_ordered_by_slot_with_own_vertex_ranges() {
        // Second triangle uses slot 0, first uses slot 1
        let geometry = build(&quad([1, 0]), "xyznuv").unwrap();
        assert_eq!(geometry.groups.len(), 2);
        assert_eq!(geometry.groups[0].material, "a");
        assert_eq!(geometry.groups[1].material, "b");
        assert_eq!(geometry.groups[0].start_index, 0);
        assert_eq!(geometry.groups[0].end_index, 3);
        assert_eq!(geometry.groups[1].start_index, 3);
        assert_eq!(geometry.groups[1].end_index, 6);
        // Shared corners are duplicated per group
        assert_eq!(geometry.vertex_count(), 6);
        assert_eq!(geometry.groups[1].start_vertex, 3);
        geometry.check_consistency().unwrap();
    }

    #[test]
    fn test_out_of_range_slot_uses_default_material() {
        let geometry = build(&quad([0, 9]), "xyznuv").unwrap();
        assert_eq!(geometry.groups.len(), 2);
        assert_eq!(geometry.groups[1].material, DEFAULT_MATERIAL);
    }

    #[test]
    fn test_split_normals_are_not_merged() {
        let mut mesh = quad([0, 0]);
        mesh.triangles[1].corners[0].normal = [0.0, 1.0, 0.0];
        let geometry = build(&mesh, "xyznuv").unwrap();
        assert_eq!(geometry.vertex_count(), 5);
    }

    #[test]
    fn test_missing_uv_layer_warns_and_defaults() {
        let mut mesh = quad([0, 0]);
        for triangle in &mut mesh.triangles {
            for corner in &mut triangle.corners {
                corner.uv = None;
            }
        }
        let format = VertexFormat::from_tag("xyznuv").unwrap();
        let mut warnings = Vec::new();
        let resolved = resolve_mesh(&mesh, None, format, |_| true, &mut warnings).unwrap();
        assert_eq!(
            warnings,
            vec![ExportWarning::MissingUvLayer {
                mesh: "quad".into()
            }]
        );
        let geometry = build_geometry(&mesh, &resolved, format, &identity()).unwrap();
        assert!(geometry.vertices.iter().all(|v| v.uv == [0.0, 0.0]));
    }

    #[test]
    fn test_unresolved_material_and_bad_vertex() {
        let mesh = quad([0, 1]);
        let format = VertexFormat::from_tag("xyznuv").unwrap();
        let err = resolve_mesh(&mesh, None, format, |m| m == "a", &mut Vec::new()).unwrap_err();
        assert_eq!(
            err,
            ExportError::Validation(ValidationError::UnresolvedMaterial {
                mesh: "quad".into(),
                slot: "b".into()
            })
        );

        let mut bad = quad([0, 0]);
        bad.triangles[0].corners[1].vertex = 10;
        assert!(matches!(
            build(&bad, "xyznuv"),
            Err(ExportError::Validation(ValidationError::VertexOutOfRange { vertex: 10, .. }))
        ));
    }

    #[test]
    fn test_empty_mesh_builds_empty_buffers() {
        let mesh = MeshEntry {
            name: "empty".into(),
            ..Default::default()
        };
        let geometry = build(&mesh, "xyznuv").unwrap();
        assert!(geometry.is_empty());
        assert!(geometry.groups.is_empty());
        assert_eq!(geometry.vertex_count(), 0);
    }

    #[test]
    fn test_tangent_frame_is_orthonormal() {
        let geometry = build(&quad([0, 0]), "xyznuvtb").unwrap();
        for v in &geometry.vertices {
            let n = Vec3::from(v.normal);
            let t = Vec3::from(v.tangent);
            let b = Vec3::from(v.binormal);
            assert!(n.dot(t).abs() < 1e-6);
            assert!((b - n.cross(t)).length() < 1e-6);
        }
    }

    fn skinned_quad() -> (MeshEntry, BuiltSkeleton) {
        let skeleton_entry: SkeletonEntry = serde_json::from_str(
            r#"{"name": "rig", "bones": [
                {"name": "root"},
                {"name": "a", "parent": "root"},
                {"name": "b", "parent": "root"},
                {"name": "c", "parent": "root"}
            ]}"#,
        )
        .unwrap();
        let skeleton = build_skeleton(&skeleton_entry, &identity()).unwrap();

        let influence = |bone: &str, weight: f32| RawInfluence {
            bone: bone.to_string(),
            weight,
        };
        let mut mesh = quad([0, 0]);
        mesh.skin = Some(SkinBinding {
            skeleton: "rig".into(),
            influences: vec![
                vec![
                    influence("root", 0.4),
                    influence("a", 0.3),
                    influence("b", 0.2),
                    influence("c", 0.1),
                ],
                vec![influence("a", 1.0)],
                vec![influence("ghost", 0.5), influence("b", 0.5)],
                vec![],
            ],
        });
        (mesh, skeleton)
    }

    #[test]
    fn test_skinned_weights_resolved() {
        let (mesh, skeleton) = skinned_quad();
        let format = VertexFormat::from_tag("xyznuviiiwwtb").unwrap();
        let mut warnings = Vec::new();
        let resolved = resolve_mesh(&mesh, Some(&skeleton), format, |_| true, &mut warnings).unwrap();
        assert_eq!(
            warnings,
            vec![ExportWarning::UnknownInfluenceGroup {
                mesh: "quad".into(),
                group: "ghost".into()
            }]
        );

        let geometry = build_geometry(&mesh, &resolved, format, &identity()).unwrap();
        assert_eq!(geometry.skeleton.as_deref(), Some("rig"));
        let first = geometry.vertices[0];
        assert_eq!(first.bone_indices, [0, 1, 2]);
        assert!((first.bone_weights[0] - 0.444).abs() < 1e-3);
        assert!((first.bone_weights[1] - 0.333).abs() < 1e-3);
        assert!((first.bone_weights[2] - 0.222).abs() < 1e-3);

        for v in &geometry.vertices {
            let nonzero = v.bone_weights.iter().filter(|w| **w != 0.0).count();
            assert!(nonzero <= 3);
            if nonzero > 0 {
                assert!((v.bone_weights.iter().sum::<f32>() - 1.0).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_skinned_mesh_needs_skinned_format() {
        let (mesh, skeleton) = skinned_quad();
        let format = VertexFormat::from_tag("xyznuvtb").unwrap();
        let err = resolve_mesh(&mesh, Some(&skeleton), format, |_| true, &mut Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            ExportError::Validation(ValidationError::SkinnedFormatRequired { .. })
        ));
    }

    #[test]
    fn test_infinite_weight_fails_weight_sum() {
        let (mut mesh, skeleton) = skinned_quad();
        if let Some(skin) = &mut mesh.skin {
            skin.influences[3] = vec![
                RawInfluence {
                    bone: "a".into(),
                    weight: f32::INFINITY,
                },
                RawInfluence {
                    bone: "b".into(),
                    weight: 1.0,
                },
            ];
        }
        let format = VertexFormat::from_tag("xyznuviiiww").unwrap();
        let resolved = resolve_mesh(&mesh, Some(&skeleton), format, |_| true, &mut Vec::new()).unwrap();
        let err = build_geometry(&mesh, &resolved, format, &identity()).unwrap_err();
        assert!(matches!(
            err,
            ExportError::Validation(ValidationError::WeightSum { vertex: 3, .. })
        ));
    }
}
