//! Programmatic scene snapshots for integration tests.
//!
//! Everything is built in memory; tests that need files on disk serialize the
//! snapshot with `serde_json`.

#![allow(dead_code)]

use bw_export::scene::{
    AnimationEntry, AnimationMarker, BoneCurve, BoneEntry, CollisionMeshEntry, HardpointEntry,
    MaterialProperty, MaterialSlotEntry, MeshCorner, MeshEntry, MeshTriangle, PortalEntry, PoseKey,
    PropertyValue, RawInfluence, SkeletonEntry, SkinBinding, TextureSlot, Transform,
};

/// Bone names of [`chain_skeleton`], root first
pub const CHAIN_BONES: [&str; 4] = ["root", "spine", "chest", "head"];

fn corner(vertex: u32, normal: [f32; 3], uv: [f32; 2]) -> MeshCorner {
    MeshCorner {
        vertex,
        normal,
        uv: Some(uv),
        tangent: None,
    }
}

fn triangle(slot: usize, corners: [MeshCorner; 3]) -> MeshTriangle {
    MeshTriangle {
        material_slot: slot,
        corners,
    }
}

/// Unit quad in the XY plane: 4 positions, 2 triangles, one material slot
pub fn quad_mesh(name: &str, material: &str) -> MeshEntry {
    let n = [0.0, 0.0, 1.0];
    MeshEntry {
        name: name.into(),
        positions: vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ],
        triangles: vec![
            triangle(
                0,
                [
                    corner(0, n, [0.0, 0.0]),
                    corner(1, n, [1.0, 0.0]),
                    corner(2, n, [1.0, 1.0]),
                ],
            ),
            triangle(
                0,
                [
                    corner(0, n, [0.0, 0.0]),
                    corner(2, n, [1.0, 1.0]),
                    corner(3, n, [0.0, 1.0]),
                ],
            ),
        ],
        material_slots: vec![material.into()],
        ..Default::default()
    }
}

/// A material with one texture and one scalar property
pub fn material(name: &str) -> MaterialSlotEntry {
    MaterialSlotEntry {
        name: name.into(),
        textures: vec![TextureSlot {
            slot: "diffuseMap".into(),
            path: format!("textures/{}.png", name),
        }],
        properties: vec![MaterialProperty {
            name: "selfIllumination".into(),
            value: PropertyValue::Float(0.5),
        }],
        ..Default::default()
    }
}

fn bone(name: &str, parent: Option<&str>, translation: [f32; 3]) -> BoneEntry {
    BoneEntry {
        name: name.into(),
        parent: parent.map(String::from),
        bind: Transform {
            translation,
            ..Default::default()
        },
    }
}

/// Four bones stacked along +Z: root → spine → chest → head
pub fn chain_skeleton(name: &str) -> SkeletonEntry {
    SkeletonEntry {
        name: name.into(),
        bones: vec![
            bone(CHAIN_BONES[0], None, [0.0, 0.0, 0.0]),
            bone(CHAIN_BONES[1], Some(CHAIN_BONES[0]), [0.0, 0.0, 1.0]),
            bone(CHAIN_BONES[2], Some(CHAIN_BONES[1]), [0.0, 0.0, 1.0]),
            bone(CHAIN_BONES[3], Some(CHAIN_BONES[2]), [0.0, 0.0, 1.0]),
        ],
    }
}

/// Skeleton whose only bone is its own parent
pub fn self_parented_skeleton(name: &str) -> SkeletonEntry {
    SkeletonEntry {
        name: name.into(),
        bones: vec![bone("A", Some("A"), [0.0; 3])],
    }
}

/// Cube skinned to [`chain_skeleton`].
///
/// Position 0 is influenced by all four bones with weights
/// `0.4, 0.3, 0.2, 0.1`; every other position is bound fully to the root.
pub fn skinned_cube(name: &str, skeleton: &str, material: &str) -> MeshEntry {
    let positions: Vec<[f32; 3]> = (0..8)
        .map(|i| {
            [
                if i & 1 == 0 { -1.0 } else { 1.0 },
                if i & 2 == 0 { -1.0 } else { 1.0 },
                if i & 4 == 0 { -1.0 } else { 1.0 },
            ]
        })
        .collect();

    // (corner positions, outward normal) per face, two triangles each
    let faces: [([u32; 4], [f32; 3]); 6] = [
        ([0, 2, 3, 1], [0.0, 0.0, -1.0]),
        ([4, 5, 7, 6], [0.0, 0.0, 1.0]),
        ([0, 1, 5, 4], [0.0, -1.0, 0.0]),
        ([2, 6, 7, 3], [0.0, 1.0, 0.0]),
        ([0, 4, 6, 2], [-1.0, 0.0, 0.0]),
        ([1, 3, 7, 5], [1.0, 0.0, 0.0]),
    ];
    let uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

    let mut triangles = Vec::with_capacity(12);
    for (quad, normal) in faces {
        let c = |i: usize| corner(quad[i], normal, uvs[i]);
        triangles.push(triangle(0, [c(0), c(1), c(2)]));
        triangles.push(triangle(0, [c(0), c(2), c(3)]));
    }

    let influence = |bone: &str, weight: f32| RawInfluence {
        bone: bone.into(),
        weight,
    };
    let mut influences = vec![vec![influence(CHAIN_BONES[0], 1.0)]; positions.len()];
    influences[0] = vec![
        influence(CHAIN_BONES[0], 0.4),
        influence(CHAIN_BONES[1], 0.3),
        influence(CHAIN_BONES[2], 0.2),
        influence(CHAIN_BONES[3], 0.1),
    ];

    MeshEntry {
        name: name.into(),
        positions,
        triangles,
        material_slots: vec![material.into()],
        skin: Some(SkinBinding {
            skeleton: skeleton.into(),
            influences,
        }),
        ..Default::default()
    }
}

/// [`quad_mesh`] with a torch hardpoint, a doorway portal, and a unit box
/// collision mesh of 12 triangles
pub fn gate_mesh(name: &str, material: &str) -> MeshEntry {
    let corners: Vec<[f32; 3]> = (0..8)
        .map(|i| [(i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32])
        .collect();
    let faces = [
        [0, 1, 3, 2],
        [4, 6, 7, 5],
        [0, 4, 5, 1],
        [2, 3, 7, 6],
        [0, 2, 6, 4],
        [1, 5, 7, 3],
    ];
    let triangles = faces
        .iter()
        .flat_map(|&[a, b, c, d]| [[a, b, c], [a, c, d]])
        .collect();

    MeshEntry {
        hardpoints: vec![HardpointEntry {
            name: "HP_torch".into(),
            transform: Transform {
                translation: [0.5, 1.0, 0.25],
                ..Default::default()
            },
        }],
        portals: vec![PortalEntry {
            name: "PORTAL_doorway".into(),
            vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0], [0.0, 0.0, 1.0]],
            adjacent_chunk: Some("0000ffffo".into()),
        }],
        collision: vec![CollisionMeshEntry {
            name: "COL_frame".into(),
            positions: corners,
            triangles,
        }],
        ..quad_mesh(name, material)
    }
}

/// Flat `size × size` grid where every position is a distinct vertex
pub fn dense_grid(name: &str, size: u32, material: &str) -> MeshEntry {
    let n = [0.0, 0.0, 1.0];
    let positions: Vec<[f32; 3]> = (0..size)
        .flat_map(|y| (0..size).map(move |x| [x as f32, y as f32, 0.0]))
        .collect();
    let uv = |v: u32| {
        let p = positions[v as usize];
        [p[0] / size as f32, p[1] / size as f32]
    };

    let mut triangles = Vec::new();
    for y in 0..size - 1 {
        for x in 0..size - 1 {
            let a = y * size + x;
            let b = a + 1;
            let c = a + size + 1;
            let d = a + size;
            triangles.push(triangle(0, [corner(a, n, uv(a)), corner(b, n, uv(b)), corner(c, n, uv(c))]));
            triangles.push(triangle(0, [corner(a, n, uv(a)), corner(c, n, uv(c)), corner(d, n, uv(d))]));
        }
    }

    MeshEntry {
        name: name.into(),
        positions,
        triangles,
        material_slots: vec![material.into()],
        ..Default::default()
    }
}

/// Fan of triangles whose corner normals sweep the whole sphere.
///
/// Every triangle shares the same positions; only the normals differ, so each
/// corner becomes its own vertex.
pub fn normal_sweep(name: &str, material: &str, steps: u32) -> MeshEntry {
    let mut normals = Vec::new();
    for i in 0..=steps {
        let phi = std::f32::consts::PI * i as f32 / steps as f32;
        for j in 0..steps * 2 {
            let theta = std::f32::consts::PI * j as f32 / steps as f32;
            normals.push([phi.sin() * theta.cos(), phi.sin() * theta.sin(), phi.cos()]);
        }
    }

    let triangles = normals
        .chunks(3)
        .filter(|chunk| chunk.len() == 3)
        .map(|chunk| {
            triangle(
                0,
                [
                    corner(0, chunk[0], [0.0, 0.0]),
                    corner(1, chunk[1], [1.0, 0.0]),
                    corner(2, chunk[2], [0.0, 1.0]),
                ],
            )
        })
        .collect();

    MeshEntry {
        name: name.into(),
        positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        triangles,
        material_slots: vec![material.into()],
        ..Default::default()
    }
}

/// Root translates linearly along +X from `first` to `last`; other bones have no curve.
pub fn linear_clip(name: &str, skeleton: &str, model: Option<&str>, first: f32, last: f32) -> AnimationEntry {
    let key = |frame: f32, x: f32| PoseKey {
        frame,
        transform: Transform {
            translation: [x, 0.0, 0.0],
            ..Default::default()
        },
    };
    AnimationEntry {
        name: name.into(),
        skeleton: skeleton.into(),
        model: model.map(String::from),
        curves: vec![BoneCurve {
            bone: CHAIN_BONES[0].into(),
            keys: vec![key(first, 0.0), key(last, last - first)],
        }],
        markers: vec![AnimationMarker {
            frame: first,
            name: "start".into(),
        }],
    }
}
