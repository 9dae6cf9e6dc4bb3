//! `.visual` encoder

use bigworld_shared::BIGWORLD_LAYOUT;
use glam::{Mat4, Quat, Vec3};
use xmltree::Element;

use super::document::{
    bounding_box, empty_element, format_bool, format_f32, format_vec3, push, push_text,
    write_document,
};
use crate::attachments::{Hardpoint, Portal};
use crate::error::ExportError;
use crate::material::ResolvedMaterials;
use crate::mesh::BuiltGeometry;
use crate::scene::Transform;
use crate::skeleton::BuiltSkeleton;

/// One renderSet: a built geometry and the `.primitives` it is written to
#[derive(Debug, Clone, Copy)]
pub struct RenderLevel<'a> {
    pub geometry: &'a BuiltGeometry,
    pub primitives: &'a str,
}

#[derive(Debug, Clone)]
pub struct VisualDocument<'a> {
    pub name: &'a str,
    /// Level 0 first; bounds come from level 0
    pub levels: &'a [RenderLevel<'a>],
    pub skeleton: Option<&'a BuiltSkeleton>,
    pub materials: &'a ResolvedMaterials,
    pub world_space: bool,
    /// Switch distances; written only with more than one level
    pub lod_distances: &'a [f32],
    pub hardpoints: &'a [Hardpoint],
    pub portals: &'a [Portal],
}

pub fn encode_visual(doc: &VisualDocument) -> Result<Vec<u8>, ExportError> {
    let entity = format!("visual '{}'", doc.name);
    let mut root = Element::new(&format!("{}.{}", doc.name, BIGWORLD_LAYOUT.visual_ext));

    if let Some(skeleton) = doc.skeleton {
        push(&mut root, node_element(skeleton, 0));
    }

    for level in doc.levels {
        push(&mut root, render_set(doc, level, &entity)?);
    }

    if doc.levels.len() > 1 {
        let distances: Vec<String> = doc
            .lod_distances
            .iter()
            .take(doc.levels.len())
            .map(|d| format_f32(*d))
            .collect();
        push_text(&mut root, "lodDistances", distances.join(" "));
    }

    if !doc.hardpoints.is_empty() {
        let mut section = Element::new("hardPoints");
        for hardpoint in doc.hardpoints {
            let mut element = Element::new("hardPoint");
            push_text(&mut element, "identifier", hardpoint.identifier.as_str());
            push(&mut element, transform_element(&hardpoint.transform));
            push(&mut section, element);
        }
        push(&mut root, section);
    }

    if !doc.portals.is_empty() {
        let mut section = Element::new("portals");
        for portal in doc.portals {
            push(&mut section, portal_element(portal));
        }
        push(&mut root, section);
    }

    let bounds = doc
        .levels
        .first()
        .map(|level| level.geometry.bounds)
        .unwrap_or_default();
    push(&mut root, bounding_box(bounds.min, bounds.max));

    write_document(&entity, &root)
}

fn render_set(
    doc: &VisualDocument,
    level: &RenderLevel,
    entity: &str,
) -> Result<Element, ExportError> {
    let mut render_set = Element::new("renderSet");
    push_text(
        &mut render_set,
        "treatAsWorldSpaceObject",
        format_bool(doc.world_space),
    );
    match doc.skeleton {
        Some(skeleton) => push_text(&mut render_set, "node", skeleton.root().name.as_str()),
        None => push(&mut render_set, empty_element("node")),
    }

    let mut geometry = Element::new("geometry");
    push_text(&mut geometry, "vertices", level.primitives);
    push_text(&mut geometry, "primitive", "triangles");

    for group in &level.geometry.groups {
        let Some(material) = doc.materials.get(&group.material) else {
            return Err(ExportError::encoding(
                entity,
                format!("primitive group material '{}' was not resolved", group.material),
            ));
        };

        let mut material_element = Element::new("material");
        push_text(&mut material_element, "identifier", material.name.as_str());
        push_text(&mut material_element, "mfm", material.mfm_path());

        let mut primitive_group = Element::new("primitiveGroup");
        push(&mut primitive_group, material_element);
        push_text(&mut primitive_group, "startIndex", group.start_index.to_string());
        push_text(&mut primitive_group, "endIndex", group.end_index.to_string());
        push_text(&mut primitive_group, "startVertex", group.start_vertex.to_string());
        push_text(&mut primitive_group, "endVertex", group.end_vertex.to_string());
        push(&mut geometry, primitive_group);
    }

    push(&mut render_set, geometry);
    Ok(render_set)
}

/// Nested `node` elements for a skeleton subtree
fn node_element(skeleton: &BuiltSkeleton, index: usize) -> Element {
    let node = &skeleton.nodes[index];
    let mut element = Element::new("node");
    push_text(&mut element, "identifier", node.name.as_str());
    push(&mut element, transform_element(&node.bind));
    for child in skeleton.children(index) {
        push(&mut element, node_element(skeleton, child));
    }
    element
}

fn portal_element(portal: &Portal) -> Element {
    let mut element = Element::new("portal");
    push_text(&mut element, "identifier", portal.identifier.as_str());
    let mut vertices = Element::new("vertices");
    for v in &portal.vertices {
        push_text(&mut vertices, "v", format_vec3(*v));
    }
    push(&mut element, vertices);
    push_text(
        &mut element,
        "plane",
        portal.plane.map(format_f32).join(" "),
    );
    if let Some(chunk) = portal.adjacent_chunk.as_deref().filter(|c| !c.is_empty()) {
        push_text(&mut element, "adjacentChunk", chunk);
    }
    element
}

/// Local transform as four rows: the basis vectors, then the translation
fn transform_element(transform: &Transform) -> Element {
    let matrix = Mat4::from_scale_rotation_translation(
        Vec3::from(transform.scale),
        Quat::from_array(transform.rotation),
        Vec3::from(transform.translation),
    );
    let rows = [
        matrix.x_axis.truncate(),
        matrix.y_axis.truncate(),
        matrix.z_axis.truncate(),
        matrix.w_axis.truncate(),
    ];

    let mut element = Element::new("transform");
    for (i, row) in rows.iter().enumerate() {
        push_text(&mut element, &format!("row{}", i), format_vec3(row.to_array()));
    }
    element
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::CoordinateTransformer;
    use crate::material::MaterialRef;
    use crate::mesh::{BoundingBox, PrimitiveGroup, Vertex};
    use crate::scene::{BoneEntry, SkeletonEntry};
    use crate::settings::CoordinateConvention;
    use crate::skeleton::build_skeleton;
    use bw_common::VertexFormat;

    fn geometry(material: &str) -> BuiltGeometry {
        BuiltGeometry {
            name: "hero".into(),
            format: VertexFormat::from_tag("xyznuv").unwrap(),
            vertices: vec![Vertex::default(); 3],
            vertex_data: vec![0u8; 72],
            indices: vec![0, 1, 2],
            groups: vec![PrimitiveGroup {
                material: material.into(),
                start_index: 0,
                end_index: 3,
                start_vertex: 0,
                end_vertex: 3,
            }],
            bounds: BoundingBox {
                min: [0.0; 3],
                max: [1.0, 2.0, 3.0],
            },
            skeleton: None,
        }
    }

    fn materials() -> ResolvedMaterials {
        ResolvedMaterials {
            materials: vec![MaterialRef::fallback()],
            ..Default::default()
        }
    }

    #[test]
    fn test_rigid_visual() {
        let geometry = geometry("default");
        let materials = materials();
        let levels = [RenderLevel {
            geometry: &geometry,
            primitives: "models/hero.primitives",
        }];
        let doc = VisualDocument {
            name: "hero",
            levels: &levels,
            skeleton: None,
            materials: &materials,
            world_space: false,
            lod_distances: &[],
            hardpoints: &[],
            portals: &[],
        };
        let text = String::from_utf8(encode_visual(&doc).unwrap()).unwrap();

        assert!(text.starts_with("<hero.visual>"));
        assert!(text.contains("<treatAsWorldSpaceObject>false</treatAsWorldSpaceObject>"));
        assert!(["<node/>", "<node />", "<node></node>"]
            .iter()
            .any(|empty| text.contains(empty)));
        assert!(text.contains("<vertices>models/hero.primitives</vertices>"));
        assert!(text.contains("<primitive>triangles</primitive>"));
        assert!(text.contains("<mfm>materials/default.mfm</mfm>"));
        assert!(text.contains("<endIndex>3</endIndex>"));
        assert!(text.contains("<max>1.000000 2.000000 3.000000</max>"));
        assert!(!text.contains("lodDistances"));
    }

    #[test]
    fn test_skinned_visual_has_node_tree() {
        let entry = SkeletonEntry {
            name: "rig".into(),
            bones: vec![
                BoneEntry {
                    name: "pelvis".into(),
                    parent: None,
                    bind: Transform {
                        translation: [0.0, 1.0, 0.0],
                        ..Default::default()
                    },
                },
                BoneEntry {
                    name: "spine".into(),
                    parent: Some("pelvis".into()),
                    bind: Transform::default(),
                },
            ],
        };
        let transformer = CoordinateTransformer::new(CoordinateConvention::TargetUp, 1.0);
        let skeleton = build_skeleton(&entry, &transformer).unwrap();
        let geometry = geometry("default");
        let materials = materials();
        let levels = [
            RenderLevel {
                geometry: &geometry,
                primitives: "models/hero.primitives",
            },
            RenderLevel {
                geometry: &geometry,
                primitives: "models/hero_lod1.primitives",
            },
        ];
        let doc = VisualDocument {
            name: "hero",
            levels: &levels,
            skeleton: Some(&skeleton),
            materials: &materials,
            world_space: true,
            lod_distances: &[10.0, 25.0, 50.0],
            hardpoints: &[],
            portals: &[],
        };
        let text = String::from_utf8(encode_visual(&doc).unwrap()).unwrap();

        assert!(text.contains("<identifier>pelvis</identifier>"));
        assert!(text.contains("<identifier>spine</identifier>"));
        assert!(text.contains("<row3>0.000000 1.000000 0.000000</row3>"));
        assert!(text.contains("<row0>1.000000 0.000000 0.000000</row0>"));
        assert!(text.contains("<node>pelvis</node>"));
        assert_eq!(text.matches("<renderSet>").count(), 2);
        assert!(text.contains("<lodDistances>10.000000 25.000000</lodDistances>"));
        assert!(text.find("pelvis").unwrap() < text.find("spine").unwrap());
    }

    #[test]
    fn test_unknown_group_material_fails() {
        let geometry = geometry("ghost");
        let materials = materials();
        let levels = [RenderLevel {
            geometry: &geometry,
            primitives: "models/hero.primitives",
        }];
        let doc = VisualDocument {
            name: "hero",
            levels: &levels,
            skeleton: None,
            materials: &materials,
            world_space: false,
            lod_distances: &[],
            hardpoints: &[],
            portals: &[],
        };
        assert_eq!(encode_visual(&doc).unwrap_err().class(), "EncodingError");
    }

    #[test]
    fn test_hardpoints_and_portals_follow_lod_distances() {
        let geometry = geometry("default");
        let materials = materials();
        let levels = [RenderLevel {
            geometry: &geometry,
            primitives: "models/gate.primitives",
        }];
        let hardpoints = [Hardpoint {
            identifier: "torch".into(),
            transform: Transform {
                translation: [1.0, 2.0, 3.0],
                ..Default::default()
            },
        }];
        let portals = [Portal {
            identifier: "door".into(),
            vertices: vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [2.0, 2.0, 0.0]],
            plane: [0.0, 0.0, 1.0, 0.0],
            adjacent_chunk: Some("0001fffe".into()),
        }];
        let doc = VisualDocument {
            name: "gate",
            levels: &levels,
            skeleton: None,
            materials: &materials,
            world_space: false,
            lod_distances: &[],
            hardpoints: &hardpoints,
            portals: &portals,
        };
        let text = String::from_utf8(encode_visual(&doc).unwrap()).unwrap();

        assert!(text.contains("<identifier>torch</identifier>"));
        assert!(text.contains("<row3>1.000000 2.000000 3.000000</row3>"));
        assert!(text.contains("<v>2.000000 2.000000 0.000000</v>"));
        assert!(text.contains("<plane>0.000000 0.000000 1.000000 0.000000</plane>"));
        assert!(text.contains("<adjacentChunk>0001fffe</adjacentChunk>"));
        let order = ["<renderSet>", "<hardPoints>", "<portals>", "<boundingBox>"]
            .map(|tag| text.find(tag).unwrap());
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }
}
