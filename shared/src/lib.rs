//! Shared constants and filesystem helpers for the BigWorld export tools.
//!
//! - [`layout`] - on-disk layout of an exported resource tree (subfolders, extensions, magic numbers)
//! - [`fs`] - capped reads and scoped atomic writes
//! - [`names`] - file stems derived from authoring-tool names

pub mod fs;
pub mod layout;
pub mod names;

pub use layout::{AssetLayout, BIGWORLD_LAYOUT};
pub use names::sanitize_name;
