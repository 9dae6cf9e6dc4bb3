//! bw-export library
//!
//! Converts a [`SceneSnapshot`] captured from an authoring tool into a BigWorld
//! resource tree:
//!
//! ```text
//! R/models/<name>.model
//! R/models/<name>.visual
//! R/models/<name>.primitives
//! R/models/<name>.bsp
//! R/materials/<name>.mfm
//! R/animations/<model>/<clip>.animation
//! ```
//!
//! The entry point is [`ExportPipeline`]. The builders and encoders are public
//! so other tools can convert single entities without running a batch.

pub mod animation;
pub mod attachments;
pub mod collision;
pub mod coords;
pub mod encode;
pub mod error;
pub mod material;
pub mod mesh;
pub mod pipeline;
pub mod scene;
pub mod settings;
pub mod skeleton;
pub mod texture;

pub use bigworld_shared::BIGWORLD_LAYOUT;
pub use bw_common::{VertexFormat, VERTEX_FORMATS};

pub use animation::{sample_clip, AnimationTrack, Keyframe, SampledClip};
pub use attachments::{Hardpoint, Portal};
pub use collision::{build_bsp, BspTree};
pub use coords::CoordinateTransformer;
pub use error::{ExportError, ExportWarning, ValidationError};
pub use material::{ImageConverter, MaterialRef, MaterialResolver, ResolvedMaterials};
pub use mesh::{build_geometry, BuiltGeometry, PrimitiveGroup, Vertex};
pub use pipeline::{
    CancelToken, ExportPipeline, ExportResult, PipelineState, UnitId, UnitKind, UnitOutcome,
    UnitReport,
};
pub use scene::SceneSnapshot;
pub use settings::{CoordinateConvention, ExportSettings};
pub use skeleton::{build_skeleton, BuiltSkeleton, SkeletonNode};
pub use texture::DdsConverter;
