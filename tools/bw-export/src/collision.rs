//! Collision tree builder
//!
//! Merges a model's collision meshes into one vertex space and splits their
//! triangles at the median centroid along X, Y, Z in turn. Leaves own a
//! contiguous range of the reordered triangle list.

use bw_common::BspNode;
use glam::Vec3;

use crate::coords::CoordinateTransformer;
use crate::error::ValidationError;
use crate::scene::{CollisionMeshEntry, MeshEntry};

/// Triangles a node may hold before it is split
pub const LEAF_TRIANGLE_LIMIT: usize = 128;
/// Depth at which splitting stops regardless of triangle count
pub const MAX_DEPTH: usize = 16;

/// Built collision tree, ready for the `.bsp` encoder
#[derive(Debug, Clone, PartialEq)]
pub struct BspTree {
    /// Root first
    pub nodes: Vec<BspNode>,
    pub triangles: Vec<[u32; 3]>,
    /// Engine-space positions of every collision mesh, concatenated
    pub vertices: Vec<[f32; 3]>,
}

impl BspTree {
    pub fn leaves(&self) -> impl Iterator<Item = &BspNode> {
        self.nodes.iter().filter(|n| n.is_leaf())
    }
}

/// Every collision triangle must index its own mesh's positions.
pub fn validate_collision(mesh: &MeshEntry) -> Result<(), ValidationError> {
    for collision in &mesh.collision {
        check_indices(collision)?;
    }
    Ok(())
}

fn check_indices(collision: &CollisionMeshEntry) -> Result<(), ValidationError> {
    let count = collision.positions.len();
    for (triangle, indices) in collision.triangles.iter().enumerate() {
        if let Some(&vertex) = indices.iter().find(|&&v| v as usize >= count) {
            return Err(ValidationError::VertexOutOfRange {
                mesh: collision.name.clone(),
                triangle,
                vertex,
                count,
            });
        }
    }
    Ok(())
}

/// Build the collision tree of a model, or `None` when it has no collision
/// triangles. Expects meshes that passed [`validate_collision`].
pub fn build_bsp(mesh: &MeshEntry, transformer: &CoordinateTransformer) -> Option<BspTree> {
    let mut vertices = Vec::new();
    let mut source = Vec::new();
    for collision in &mesh.collision {
        let offset = vertices.len() as u32;
        vertices.extend(collision.positions.iter().map(|p| transformer.position(*p)));
        source.extend(
            collision
                .triangles
                .iter()
                .map(|t| t.map(|v| v + offset)),
        );
    }
    if source.is_empty() {
        return None;
    }

    let centroids: Vec<Vec3> = source
        .iter()
        .map(|t| t.iter().map(|&v| Vec3::from(vertices[v as usize])).sum::<Vec3>() / 3.0)
        .collect();

    let mut builder = Builder {
        source: &source,
        centroids: &centroids,
        nodes: Vec::new(),
        triangles: Vec::with_capacity(source.len()),
    };
    let all: Vec<usize> = (0..source.len()).collect();
    builder.node(all, 0, 0);

    tracing::debug!(
        "Built collision tree for '{}': {} nodes, {} triangles",
        mesh.name,
        builder.nodes.len(),
        builder.triangles.len()
    );

    Some(BspTree {
        nodes: builder.nodes,
        triangles: builder.triangles,
        vertices,
    })
}

struct Builder<'a> {
    source: &'a [[u32; 3]],
    centroids: &'a [Vec3],
    nodes: Vec<BspNode>,
    triangles: Vec<[u32; 3]>,
}

impl Builder<'_> {
    /// Append the subtree for `members` and return its root index.
    fn node(&mut self, members: Vec<usize>, depth: usize, axis: usize) -> usize {
        let median = median(members.iter().map(|&i| self.centroids[i][axis]).collect());
        let mut plane = [0.0; 4];
        plane[axis] = 1.0;
        plane[3] = -median;

        let index = self.nodes.len();
        if depth >= MAX_DEPTH || members.len() <= LEAF_TRIANGLE_LIMIT {
            let first_triangle = self.triangles.len() as u32;
            self.triangles.extend(members.iter().map(|&i| self.source[i]));
            self.nodes.push(BspNode {
                plane,
                front: -1,
                back: -1,
                first_triangle,
                triangle_count: members.len() as u32,
            });
            return index;
        }

        let (mut front, mut back): (Vec<usize>, Vec<usize>) = members
            .iter()
            .copied()
            .partition(|&i| self.centroids[i][axis] <= median);
        // All centroids on one side: split the list in half instead
        if front.is_empty() || back.is_empty() {
            let half = members.len() / 2;
            front = members[..half].to_vec();
            back = members[half..].to_vec();
        }

        // Children are patched in once their subtrees exist
        self.nodes.push(BspNode {
            plane,
            front: -1,
            back: -1,
            first_triangle: 0,
            triangle_count: 0,
        });
        let next = (axis + 1) % 3;
        let front = self.node(front, depth + 1, next);
        let back = self.node(back, depth + 1, next);
        self.nodes[index].front = front as i32;
        self.nodes[index].back = back as i32;
        index
    }
}

fn median(mut values: Vec<f32>) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        0.5 * (values[mid - 1] + values[mid])
    }
}
