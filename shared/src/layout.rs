//! Resource tree layout for exported BigWorld assets.
//!
//! `AssetLayout` is the single source of truth for where each exported file lives
//! relative to the export root, and for the magic numbers stamped into binary files.
//!
//! # Example
//!
//! ```
//! use bigworld_shared::BIGWORLD_LAYOUT;
//!
//! assert_eq!(BIGWORLD_LAYOUT.model_file("crate"), "models/crate.model");
//! assert_eq!(BIGWORLD_LAYOUT.animation_file("hero", "walk"), "animations/hero/walk.animation");
//! ```

use std::path::{Path, PathBuf};

/// Layout of an exported resource tree.
///
/// All relative paths produced here use `/` separators, since they are also
/// written into documents that the engine resolves.
#[derive(Debug, Clone, Copy)]
pub struct AssetLayout {
    /// Subfolder for `.model`, `.visual`, `.primitives` and `.bsp`
    pub models_dir: &'static str,
    /// Subfolder for `.mfm` files and staged textures
    pub materials_dir: &'static str,
    /// Subfolder for `.animation` files (one nested folder per model)
    pub animations_dir: &'static str,

    pub model_ext: &'static str,
    pub visual_ext: &'static str,
    pub primitives_ext: &'static str,
    pub material_ext: &'static str,
    pub animation_ext: &'static str,
    pub bsp_ext: &'static str,

    /// First four bytes of every `.primitives` file (little-endian u32)
    pub primitives_magic: u32,
    /// First four bytes of every `.animation` file (little-endian u32)
    pub animation_magic: u32,
    /// Version stamped after the animation magic
    pub animation_version: u32,
}

impl AssetLayout {
    /// `models/<name>.model`
    pub fn model_file(&self, name: &str) -> String {
        format!("{}/{}.{}", self.models_dir, name, self.model_ext)
    }

    /// `models/<name>.visual`
    pub fn visual_file(&self, name: &str) -> String {
        format!("{}/{}.{}", self.models_dir, name, self.visual_ext)
    }

    /// `models/<name>.primitives`
    pub fn primitives_file(&self, name: &str) -> String {
        format!("{}/{}.{}", self.models_dir, name, self.primitives_ext)
    }

    /// `models/<name>_lod<level>.primitives`; level 0 is the plain primitives file.
    pub fn lod_primitives_file(&self, name: &str, level: usize) -> String {
        if level == 0 {
            self.primitives_file(name)
        } else {
            format!("{}/{}_lod{}.{}", self.models_dir, name, level, self.primitives_ext)
        }
    }

    /// `models/<name>.bsp`, the collision tree of a model
    pub fn bsp_file(&self, name: &str) -> String {
        format!("{}/{}.{}", self.models_dir, name, self.bsp_ext)
    }

    /// `materials/<name>.mfm`
    pub fn material_file(&self, name: &str) -> String {
        format!("{}/{}.{}", self.materials_dir, name, self.material_ext)
    }

    /// `materials/<file_name>` for staged textures
    pub fn material_asset(&self, file_name: &str) -> String {
        format!("{}/{}", self.materials_dir, file_name)
    }

    /// `animations/<group>/<clip>.animation`
    pub fn animation_file(&self, group: &str, clip: &str) -> String {
        format!(
            "{}/{}/{}.{}",
            self.animations_dir, group, clip, self.animation_ext
        )
    }

    /// Extension-less resource id the engine uses to reference a model's visual.
    pub fn visual_resource(&self, name: &str) -> String {
        format!("{}/{}", self.models_dir, name)
    }

    /// Join a `/`-separated relative path onto an export root.
    pub fn resolve(&self, root: &Path, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(root.to_path_buf(), |path, part| path.join(part))
    }

    /// Subfolders that must exist under an export root.
    pub fn subfolders(&self) -> [&'static str; 3] {
        [self.models_dir, self.materials_dir, self.animations_dir]
    }
}

/// BigWorld resource tree layout.
pub const BIGWORLD_LAYOUT: AssetLayout = AssetLayout {
    models_dir: "models",
    materials_dir: "materials",
    animations_dir: "animations",
    model_ext: "model",
    visual_ext: "visual",
    primitives_ext: "primitives",
    material_ext: "mfm",
    animation_ext: "animation",
    bsp_ext: "bsp",
    primitives_magic: 0x4257_0100,
    animation_magic: 0x4257_0101,
    animation_version: 1,
};
