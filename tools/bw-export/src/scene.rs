//! Scene snapshot data model
//!
//! An immutable capture of the authoring scene, produced by a host adapter and
//! handed to the pipeline once per export. All coordinates are in the
//! authoring tool's convention; the pipeline transforms them.

use std::path::Path;

use anyhow::{Context, Result};
use bigworld_shared::fs::{read_file_with_limit, MAX_SCENE_BYTES};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSnapshot {
    pub meshes: Vec<MeshEntry>,
    pub skeletons: Vec<SkeletonEntry>,
    pub animations: Vec<AnimationEntry>,
    pub materials: Vec<MaterialSlotEntry>,
}

impl SceneSnapshot {
    /// Load a snapshot from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = read_file_with_limit(path, MAX_SCENE_BYTES)?;
        Self::from_json(&bytes).with_context(|| format!("Invalid scene file: {}", path.display()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn skeleton(&self, name: &str) -> Option<&SkeletonEntry> {
        self.skeletons.iter().find(|s| s.name == name)
    }

    pub fn material(&self, name: &str) -> Option<&MaterialSlotEntry> {
        self.materials.iter().find(|m| m.name == name)
    }
}

// ============================================================================
// Meshes
// ============================================================================

/// A triangulated mesh
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshEntry {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    #[serde(default)]
    pub triangles: Vec<MeshTriangle>,
    /// Material name per slot; triangles reference slots by index
    #[serde(default)]
    pub material_slots: Vec<String>,
    #[serde(default)]
    pub skin: Option<SkinBinding>,
    /// Optional parent model written into the `.model`
    #[serde(default)]
    pub parent: Option<String>,
    /// Editor-only BSP model references
    #[serde(default)]
    pub bsp_models: Vec<String>,
    /// `HP_` attachment points under this model
    #[serde(default)]
    pub hardpoints: Vec<HardpointEntry>,
    /// `PORTAL_` polygons under this model
    #[serde(default)]
    pub portals: Vec<PortalEntry>,
    /// `COL_` meshes, merged into one collision tree
    #[serde(default)]
    pub collision: Vec<CollisionMeshEntry>,
}

impl MeshEntry {
    /// Whether any corner carries UV coordinates
    pub fn has_uv_layer(&self) -> bool {
        self.triangles
            .iter()
            .any(|t| t.corners.iter().any(|c| c.uv.is_some()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshTriangle {
    #[serde(default)]
    pub material_slot: usize,
    pub corners: [MeshCorner; 3],
}

/// One triangle corner (a "loop" in host terms): split normal and per-corner UV
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MeshCorner {
    /// Index into `MeshEntry::positions`
    pub vertex: u32,
    pub normal: [f32; 3],
    #[serde(default)]
    pub uv: Option<[f32; 2]>,
    /// Tangent xyz plus bitangent sign in w
    #[serde(default)]
    pub tangent: Option<[f32; 4]>,
}

/// Per-position skin weights, addressed by bone name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkinBinding {
    pub skeleton: String,
    /// One list per entry of `MeshEntry::positions`
    pub influences: Vec<Vec<RawInfluence>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawInfluence {
    pub bone: String,
    pub weight: f32,
}

/// Named attachment point, relative to its model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardpointEntry {
    pub name: String,
    #[serde(default)]
    pub transform: Transform,
}

/// Planar polygon connecting this model's space to a neighbour
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortalEntry {
    pub name: String,
    /// Polygon outline in model space, in winding order
    pub vertices: Vec<[f32; 3]>,
    #[serde(default)]
    pub adjacent_chunk: Option<String>,
}

/// Triangulated collision geometry in model space
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollisionMeshEntry {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    #[serde(default)]
    pub triangles: Vec<[u32; 3]>,
}

// ============================================================================
// Skeletons
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkeletonEntry {
    pub name: String,
    pub bones: Vec<BoneEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoneEntry {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    /// Local bind transform relative to the parent
    #[serde(default)]
    pub bind: Transform,
}

/// Translation, rotation (quaternion xyzw) and scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: [0.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0, 1.0], // Identity quaternion
            scale: [1.0, 1.0, 1.0],
        }
    }
}

// ============================================================================
// Animations
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnimationEntry {
    pub name: String,
    /// Skeleton the curves drive
    pub skeleton: String,
    /// Model this clip belongs to; defaults to the skeleton name
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub curves: Vec<BoneCurve>,
    #[serde(default)]
    pub markers: Vec<AnimationMarker>,
}

/// Native keys of one bone's local transform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoneCurve {
    pub bone: String,
    pub keys: Vec<PoseKey>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoseKey {
    pub frame: f32,
    #[serde(flatten)]
    pub transform: Transform,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationMarker {
    pub frame: f32,
    pub name: String,
}

// ============================================================================
// Materials
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialSlotEntry {
    pub name: String,
    #[serde(default)]
    pub shader: Option<String>,
    #[serde(default)]
    pub material_kind: Option<String>,
    #[serde(default)]
    pub textures: Vec<TextureSlot>,
    #[serde(default)]
    pub properties: Vec<MaterialProperty>,
    #[serde(default)]
    pub collision_flags: Option<u32>,
    #[serde(default)]
    pub alpha_test: bool,
    #[serde(default)]
    pub double_sided: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextureSlot {
    /// Shader property name, e.g. `diffuseMap`
    pub slot: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialProperty {
    pub name: String,
    pub value: PropertyValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vector4([f32; 4]),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_scene() {
        let json = br#"{
            "meshes": [{
                "name": "tri",
                "positions": [[0,0,0],[1,0,0],[0,1,0]],
                "triangles": [{
                    "corners": [
                        {"vertex": 0, "normal": [0,0,1], "uv": [0,0]},
                        {"vertex": 1, "normal": [0,0,1], "uv": [1,0]},
                        {"vertex": 2, "normal": [0,0,1]}
                    ]
                }],
                "material_slots": ["stone"]
            }],
            "materials": [{
                "name": "stone",
                "properties": [{"name": "glow", "value": {"float": 0.5}}]
            }]
        }"#;

        let scene = SceneSnapshot::from_json(json).unwrap();
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.triangles[0].material_slot, 0);
        assert!(mesh.has_uv_layer());
        assert!(mesh.triangles[0].corners[2].uv.is_none());
        assert!(scene.material("stone").is_some());
        assert_eq!(
            scene.materials[0].properties[0].value,
            PropertyValue::Float(0.5)
        );
    }

    #[test]
    fn test_parse_attachments() {
        let json = br#"{
            "name": "gate",
            "positions": [],
            "hardpoints": [{"name": "HP_torch", "transform": {"translation": [1, 0, 2]}}],
            "portals": [{"name": "PORTAL_door", "vertices": [[0,0,0],[1,0,0],[1,0,1]]}],
            "collision": [{"name": "COL_gate", "positions": [[0,0,0],[1,0,0],[0,1,0]], "triangles": [[0,1,2]]}]
        }"#;
        let mesh: MeshEntry = serde_json::from_slice(json).unwrap();
        assert_eq!(mesh.hardpoints[0].transform.translation, [1.0, 0.0, 2.0]);
        assert_eq!(mesh.hardpoints[0].transform.rotation, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(mesh.portals[0].vertices.len(), 3);
        assert!(mesh.portals[0].adjacent_chunk.is_none());
        assert_eq!(mesh.collision[0].triangles, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_pose_key_defaults_to_identity() {
        let key: PoseKey = serde_json::from_str(r#"{"frame": 3, "translation": [1,2,3]}"#).unwrap();
        assert_eq!(key.frame, 3.0);
        assert_eq!(key.transform.translation, [1.0, 2.0, 3.0]);
        assert_eq!(key.transform.rotation, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(key.transform.scale, [1.0, 1.0, 1.0]);
    }
}
