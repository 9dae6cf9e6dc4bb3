//! Geometry builder (mesh + skin → vertex buffer, u16 indices, primitive groups)

mod builder;
mod influence;
mod lod;
mod packing;
mod types;

// Re-export public API
pub use builder::{build_geometry, resolve_mesh, ResolvedMesh};
pub use influence::resolve_influences;
pub use lod::simplify;
pub use packing::pack_vertex;
pub use types::{BoundingBox, BuiltGeometry, PrimitiveGroup, Vertex, MAX_INFLUENCES};
