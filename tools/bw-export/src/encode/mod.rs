//! Encoders: pure transforms from built structures to file bytes
//!
//! Nothing here touches the filesystem. Identical input always yields
//! identical bytes: documents carry no attributes (so no map ordering), and
//! floats are printed with a fixed precision.

mod animation;
mod bsp;
mod document;
mod material;
mod model;
mod primitives;
mod visual;

pub use animation::encode_animation;
pub use bsp::encode_bsp;
pub use document::{format_f32, format_vec3};
pub use material::encode_material;
pub use model::{encode_model, AnimationListing, ModelDocument};
pub use primitives::encode_primitives;
pub use visual::{encode_visual, RenderLevel, VisualDocument};
