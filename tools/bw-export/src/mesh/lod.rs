//! Level-of-detail generation by vertex clustering

use glam::Vec3;
use hashbrown::HashMap;

use crate::scene::{MeshEntry, SkinBinding};

/// Grid resolution per axis at full detail
const GRID_CELLS: f32 = 64.0;

/// Reduce a mesh by snapping positions to a uniform grid over its bounds.
///
/// Every occupied cell becomes one position at the centroid of its members;
/// triangles collapsing to fewer than three distinct positions are dropped.
/// Corner attributes are kept and a merged position takes the skin weights of
/// its first member.
pub fn simplify(mesh: &MeshEntry, ratio: f32) -> MeshEntry {
    let cells = (GRID_CELLS * ratio).round().max(1.0);

    let (min, max) = mesh.positions.iter().fold(
        (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
        |(lo, hi), p| (lo.min(Vec3::from(*p)), hi.max(Vec3::from(*p))),
    );
    let size = (max - min).max(Vec3::splat(f32::EPSILON));

    let mut cluster_of = Vec::with_capacity(mesh.positions.len());
    let mut clusters: HashMap<[u32; 3], usize> = HashMap::new();
    let mut sums: Vec<(Vec3, u32, usize)> = Vec::new();

    for (i, p) in mesh.positions.iter().enumerate() {
        let p = Vec3::from(*p);
        let cell = ((p - min) / size * cells)
            .floor()
            .clamp(Vec3::ZERO, Vec3::splat(cells - 1.0));
        let key = [cell.x as u32, cell.y as u32, cell.z as u32];
        let cluster = *clusters.entry(key).or_insert_with(|| {
            sums.push((Vec3::ZERO, 0, i));
            sums.len() - 1
        });
        sums[cluster].0 += p;
        sums[cluster].1 += 1;
        cluster_of.push(cluster);
    }

    let positions = sums
        .iter()
        .map(|(sum, count, _)| (*sum / *count as f32).to_array())
        .collect();

    let triangles = mesh
        .triangles
        .iter()
        .filter_map(|triangle| {
            let mut reduced = triangle.clone();
            for corner in &mut reduced.corners {
                corner.vertex = cluster_of[corner.vertex as usize] as u32;
            }
            let [a, b, c] = reduced.corners.map(|corner| corner.vertex);
            (a != b && b != c && a != c).then_some(reduced)
        })
        .collect();

    let skin = mesh.skin.as_ref().map(|skin| SkinBinding {
        skeleton: skin.skeleton.clone(),
        influences: sums
            .iter()
            .map(|(_, _, first)| skin.influences.get(*first).cloned().unwrap_or_default())
            .collect(),
    });

    MeshEntry {
        name: mesh.name.clone(),
        positions,
        triangles,
        material_slots: mesh.material_slots.clone(),
        skin,
        parent: mesh.parent.clone(),
        bsp_models: mesh.bsp_models.clone(),
        // Attachments belong to the full-detail level only
        ..Default::default()
    }
}
