//! Skeleton builder
//!
//! Validates a bone hierarchy and orders it parent-before-child. Node indices
//! in the built skeleton are the bone indices stored in vertices and the track
//! order of every `.animation` that uses the skeleton.

use hashbrown::{HashMap, HashSet};

use crate::coords::CoordinateTransformer;
use crate::error::ValidationError;
use crate::scene::{SkeletonEntry, Transform};

/// One bone in output order
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonNode {
    pub name: String,
    /// Index of the parent node; always lower than this node's index
    pub parent: Option<usize>,
    /// Local bind transform in the engine's convention
    pub bind: Transform,
}

#[derive(Debug, Clone)]
pub struct BuiltSkeleton {
    pub name: String,
    pub nodes: Vec<SkeletonNode>,
    index: HashMap<String, usize>,
}

impl BuiltSkeleton {
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn root(&self) -> &SkeletonNode {
        &self.nodes[0]
    }

    pub fn children(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, n)| n.parent == Some(node))
            .map(|(i, _)| i)
    }
}

/// Validate the hierarchy and return source bone indices in parent-before-child order.
///
/// Fails on empty names, duplicate names, unknown parents, cycles (including a
/// bone parented to itself) and forests with more than one root.
pub fn topological_order(entry: &SkeletonEntry) -> Result<Vec<usize>, ValidationError> {
    let skeleton = &entry.name;
    if skeleton.is_empty() {
        return Err(ValidationError::EmptyField {
            entity: "skeleton".to_string(),
            field: "name",
        });
    }
    if entry.bones.is_empty() {
        return Err(ValidationError::EmptyField {
            entity: format!("skeleton '{}'", skeleton),
            field: "bones",
        });
    }

    let mut by_name: HashMap<&str, usize> = HashMap::with_capacity(entry.bones.len());
    for (i, bone) in entry.bones.iter().enumerate() {
        if bone.name.is_empty() {
            return Err(ValidationError::EmptyField {
                entity: format!("skeleton '{}' bone {}", skeleton, i),
                field: "name",
            });
        }
        if by_name.insert(bone.name.as_str(), i).is_some() {
            return Err(ValidationError::DuplicateName {
                kind: "bone",
                name: bone.name.clone(),
            });
        }
    }

    // Resolve parent names to source indices
    let mut parents: Vec<Option<usize>> = Vec::with_capacity(entry.bones.len());
    for bone in &entry.bones {
        let parent = match bone.parent.as_deref() {
            None | Some("") => None,
            Some(name) if name == bone.name => {
                return Err(ValidationError::CyclicHierarchy {
                    skeleton: skeleton.clone(),
                    bone: bone.name.clone(),
                });
            }
            Some(name) => match by_name.get(name) {
                Some(&p) => Some(p),
                None => {
                    return Err(ValidationError::UnknownParent {
                        skeleton: skeleton.clone(),
                        bone: bone.name.clone(),
                        parent: name.to_string(),
                    });
                }
            },
        };
        parents.push(parent);
    }

    // Repeated extraction: each pass takes, in source order, every bone whose
    // parent is already placed.
    let mut order = Vec::with_capacity(entry.bones.len());
    let mut placed = vec![false; entry.bones.len()];
    loop {
        let before = order.len();
        for i in 0..entry.bones.len() {
            if placed[i] {
                continue;
            }
            if parents[i].is_none_or(|p| placed[p]) {
                placed[i] = true;
                order.push(i);
            }
        }
        if order.len() == entry.bones.len() {
            break;
        }
        if order.len() == before {
            let stuck = find_cycle_member(&parents, &placed);
            return Err(ValidationError::CyclicHierarchy {
                skeleton: skeleton.clone(),
                bone: entry.bones[stuck].name.clone(),
            });
        }
    }

    let roots = parents.iter().filter(|p| p.is_none()).count();
    if roots != 1 {
        return Err(ValidationError::MultipleRoots {
            skeleton: skeleton.clone(),
            count: roots,
        });
    }

    Ok(order)
}

/// First unplaced bone (in source order) that lies on a parent cycle.
fn find_cycle_member(parents: &[Option<usize>], placed: &[bool]) -> usize {
    let start = placed.iter().position(|p| !p).unwrap_or(0);
    let mut seen = HashSet::new();
    let mut current = start;
    // Unplaced bones always have an unplaced parent, so the walk must revisit a bone
    while seen.insert(current) {
        match parents[current] {
            Some(p) => current = p,
            None => return start,
        }
    }
    current
}

/// Build a skeleton: validate, order, and transform bind poses into the engine's convention.
pub fn build_skeleton(
    entry: &SkeletonEntry,
    transformer: &CoordinateTransformer,
) -> Result<BuiltSkeleton, ValidationError> {
    let order = topological_order(entry)?;
    Ok(assemble(entry, &order, transformer))
}

/// Build a skeleton from an order already produced by [`topological_order`].
pub(crate) fn assemble(
    entry: &SkeletonEntry,
    order: &[usize],
    transformer: &CoordinateTransformer,
) -> BuiltSkeleton {
    let mut index = HashMap::with_capacity(order.len());
    for (node, &source) in order.iter().enumerate() {
        index.insert(entry.bones[source].name.clone(), node);
    }

    let nodes = order
        .iter()
        .map(|&source| {
            let bone = &entry.bones[source];
            SkeletonNode {
                name: bone.name.clone(),
                parent: bone
                    .parent
                    .as_deref()
                    .filter(|p| !p.is_empty())
                    .and_then(|p| index.get(p).copied()),
                bind: transformer.transform(&bone.bind),
            }
        })
        .collect();

    tracing::debug!(
        "Built skeleton '{}': {} bones",
        entry.name,
        order.len()
    );

    BuiltSkeleton {
        name: entry.name.clone(),
        nodes,
        index,
    }
}
