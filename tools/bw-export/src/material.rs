//! Material resolver
//!
//! Turns the snapshot's material slots into [`MaterialRef`]s: texture paths are
//! looked up in the configured search roots and, on request, copied or
//! converted into the export's `materials/` folder. Nothing is written here;
//! staged texture bytes are handed back to the pipeline.

use std::path::{Path, PathBuf};

use bigworld_shared::fs::{read_file_with_limit, MAX_ASSET_BYTES};
use bigworld_shared::{sanitize_name, BIGWORLD_LAYOUT};
use hashbrown::{HashMap, HashSet};

use crate::error::{ExportError, ExportWarning, ValidationError};
use crate::scene::{MaterialProperty, MaterialSlotEntry};
use crate::settings::ExportSettings;

/// Identifier of the built-in fallback material
pub const DEFAULT_MATERIAL: &str = "default";
pub const DEFAULT_SHADER: &str = "shaders/std_effects.fx";
pub const DEFAULT_MATERIAL_KIND: &str = "solid";

/// External image codec used when `convert_to_dds` is set.
pub trait ImageConverter: Send + Sync {
    /// Convert the image at `source` and return the encoded file.
    fn convert(&self, source: &Path) -> anyhow::Result<Vec<u8>>;

    /// Extension of the converted file
    fn extension(&self) -> &'static str {
        "dds"
    }
}

/// One texture binding after resolution
#[derive(Debug, Clone, PartialEq)]
pub struct TextureRef {
    /// Shader property name
    pub slot: String,
    /// Path written into the `.mfm`: relative to the export root when staged,
    /// otherwise as found (or the original path when missing)
    pub path: String,
}

/// A resolved material, ready for `.mfm` encoding
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialRef {
    /// Identifier referenced by primitive groups
    pub name: String,
    /// Sanitized file stem of the `.mfm`
    pub file_stem: String,
    pub shader: String,
    pub material_kind: String,
    pub textures: Vec<TextureRef>,
    pub properties: Vec<MaterialProperty>,
    pub collision_flags: Option<u32>,
    pub alpha_test: bool,
    pub double_sided: bool,
}

impl MaterialRef {
    /// Built-in material for triangles with an out-of-range slot
    pub fn fallback() -> Self {
        Self {
            name: DEFAULT_MATERIAL.to_string(),
            file_stem: DEFAULT_MATERIAL.to_string(),
            shader: DEFAULT_SHADER.to_string(),
            material_kind: DEFAULT_MATERIAL_KIND.to_string(),
            textures: Vec::new(),
            properties: Vec::new(),
            collision_flags: None,
            alpha_test: false,
            double_sided: false,
        }
    }

    /// `materials/<stem>.mfm`
    pub fn mfm_path(&self) -> String {
        BIGWORLD_LAYOUT.material_file(&self.file_stem)
    }
}

/// Output of [`MaterialResolver::resolve`]
#[derive(Debug, Clone, Default)]
pub struct ResolvedMaterials {
    pub materials: Vec<MaterialRef>,
    /// `(relative path, bytes)` of copied or converted textures
    pub staged: Vec<(String, Vec<u8>)>,
    pub warnings: Vec<ExportWarning>,
}

impl ResolvedMaterials {
    pub fn get(&self, name: &str) -> Option<&MaterialRef> {
        self.materials.iter().find(|m| m.name == name)
    }
}

pub struct MaterialResolver<'a> {
    roots: &'a [PathBuf],
    copy_textures: bool,
    convert_to_dds: bool,
    converter: Option<&'a dyn ImageConverter>,
}

impl<'a> MaterialResolver<'a> {
    pub fn new(settings: &'a ExportSettings, converter: Option<&'a dyn ImageConverter>) -> Self {
        Self {
            roots: &settings.texture_roots,
            copy_textures: settings.copy_textures,
            convert_to_dds: settings.convert_to_dds,
            converter,
        }
    }

    /// Resolve every material entry.
    ///
    /// `include_fallback` appends the built-in `default` material unless an
    /// entry already uses that name.
    pub fn resolve(
        &self,
        entries: &[MaterialSlotEntry],
        include_fallback: bool,
    ) -> Result<ResolvedMaterials, ExportError> {
        let mut resolved = ResolvedMaterials::default();
        let mut stems: HashSet<String> = HashSet::new();
        // staged file name -> source it came from
        let mut staged_names: HashMap<String, PathBuf> = HashMap::new();

        for entry in entries {
            if entry.name.is_empty() {
                return Err(ValidationError::EmptyField {
                    entity: "material".to_string(),
                    field: "name",
                }
                .into());
            }
            let Some(stem) = sanitize_name(&entry.name) else {
                return Err(ValidationError::EmptyField {
                    entity: format!("material '{}'", entry.name),
                    field: "name",
                }
                .into());
            };
            if !stems.insert(stem.clone()) {
                return Err(ValidationError::DuplicateName {
                    kind: "material",
                    name: entry.name.clone(),
                }
                .into());
            }

            let textures = entry
                .textures
                .iter()
                .map(|texture| {
                    let path = self.resolve_texture(
                        &entry.name,
                        &stem,
                        &texture.slot,
                        &texture.path,
                        &mut staged_names,
                        &mut resolved,
                    );
                    TextureRef {
                        slot: texture.slot.clone(),
                        path,
                    }
                })
                .collect();

            resolved.materials.push(MaterialRef {
                name: entry.name.clone(),
                file_stem: stem,
                shader: entry
                    .shader
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SHADER.to_string()),
                material_kind: entry
                    .material_kind
                    .clone()
                    .unwrap_or_else(|| DEFAULT_MATERIAL_KIND.to_string()),
                textures,
                properties: entry.properties.clone(),
                collision_flags: entry.collision_flags,
                alpha_test: entry.alpha_test,
                double_sided: entry.double_sided,
            });
        }

        if include_fallback && resolved.get(DEFAULT_MATERIAL).is_none() {
            if stems.contains(DEFAULT_MATERIAL) {
                return Err(ValidationError::DuplicateName {
                    kind: "material",
                    name: DEFAULT_MATERIAL.to_string(),
                }
                .into());
            }
            resolved.materials.push(MaterialRef::fallback());
        }

        Ok(resolved)
    }

    /// Resolve one texture path, staging bytes when copying or converting.
    fn resolve_texture(
        &self,
        material: &str,
        stem: &str,
        slot: &str,
        path: &str,
        staged_names: &mut HashMap<String, PathBuf>,
        resolved: &mut ResolvedMaterials,
    ) -> String {
        let Some((found, display)) = self.locate(path) else {
            resolved.warnings.push(ExportWarning::MissingTexture {
                material: material.to_string(),
                slot: slot.to_string(),
                path: path.to_string(),
            });
            return path.to_string();
        };

        let file_name = file_name_of(path);

        if self.convert_to_dds {
            let converted = match self.converter {
                Some(converter) => converter
                    .convert(&found)
                    .map(|bytes| (bytes, converter.extension())),
                None => Err(anyhow::anyhow!("no image converter configured")),
            };
            match converted {
                Ok((bytes, extension)) => {
                    let name = format!("{}.{}", stem_of(&file_name), extension);
                    let name = unique_name(name, stem, &found, staged_names);
                    return stage(resolved, name, bytes);
                }
                Err(e) => resolved.warnings.push(ExportWarning::TextureConversionFailed {
                    material: material.to_string(),
                    path: path.to_string(),
                    reason: format!("{:#}", e),
                }),
            }
        }

        if self.copy_textures {
            match read_file_with_limit(&found, MAX_ASSET_BYTES) {
                Ok(bytes) => {
                    let name = unique_name(file_name, stem, &found, staged_names);
                    return stage(resolved, name, bytes);
                }
                Err(e) => {
                    tracing::debug!("Could not read texture {}: {:#}", found.display(), e);
                    resolved.warnings.push(ExportWarning::MissingTexture {
                        material: material.to_string(),
                        slot: slot.to_string(),
                        path: path.to_string(),
                    });
                    return path.to_string();
                }
            }
        }

        display
    }

    /// Find a texture on disk. Returns the file and the path to record for it.
    fn locate(&self, path: &str) -> Option<(PathBuf, String)> {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            return candidate
                .is_file()
                .then(|| (candidate.to_path_buf(), path.to_string()));
        }

        let file_name = file_name_of(path);
        for root in self.roots {
            let joined = root.join(candidate);
            if joined.is_file() {
                return Some((joined, path.replace('\\', "/")));
            }
            let flat = root.join(&file_name);
            if flat.is_file() {
                return Some((flat, file_name));
            }
        }

        candidate
            .is_file()
            .then(|| (candidate.to_path_buf(), path.replace('\\', "/")))
    }
}

fn file_name_of(path: &str) -> String {
    path.rsplit(['/', '\\']).next().unwrap_or(path).to_string()
}

fn stem_of(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

/// Pick a staged file name not claimed by another source: the plain name,
/// then `<stem>_<name>`, then `<stem>_<n>_<name>` for n = 2, 3, ...
fn unique_name(
    name: String,
    stem: &str,
    source: &Path,
    staged_names: &mut HashMap<String, PathBuf>,
) -> String {
    let taken = |candidate: &str, names: &HashMap<String, PathBuf>| {
        names.get(candidate).is_some_and(|existing| existing != source)
    };
    let mut candidate = name.clone();
    let mut attempt = 1;
    while taken(&candidate, staged_names) {
        attempt += 1;
        candidate = if attempt == 2 {
            format!("{}_{}", stem, name)
        } else {
            format!("{}_{}_{}", stem, attempt - 1, name)
        };
    }
    staged_names.insert(candidate.clone(), source.to_path_buf());
    candidate
}

fn stage(resolved: &mut ResolvedMaterials, name: String, bytes: Vec<u8>) -> String {
    let relative = BIGWORLD_LAYOUT.material_asset(&name);
    if !resolved.staged.iter().any(|(path, _)| *path == relative) {
        resolved.staged.push((relative.clone(), bytes));
    }
    relative
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::TextureSlot;

    fn material(name: &str, textures: &[(&str, &str)]) -> MaterialSlotEntry {
        MaterialSlotEntry {
            name: name.to_string(),
            textures: textures
                .iter()
                .map(|(slot, path)| TextureSlot {
                    slot: slot.to_string(),
                    path: path.to_string(),
                })
                .collect(),
            ..Default::default()
        }
    }

    struct FakeConverter;

    impl ImageConverter for FakeConverter {
        fn convert(&self, source: &Path) -> anyhow::Result<Vec<u8>> {
            if source.extension().is_some_and(|e| e == "bad") {
                anyhow::bail!("unsupported");
            }
            Ok(b"DDS converted".to_vec())
        }
    }

    #[test]
    fn test_missing_texture_keeps_original_path() {
        let settings = ExportSettings::default();
        let resolver = MaterialResolver::new(&settings, None);
        let resolved = resolver
            .resolve(&[material("stone", &[("diffuseMap", "tex/nowhere.png")])], false)
            .unwrap();

        assert_eq!(resolved.materials[0].textures[0].path, "tex/nowhere.png");
        assert_eq!(resolved.materials[0].shader, DEFAULT_SHADER);
        assert_eq!(
            resolved.warnings,
            vec![ExportWarning::MissingTexture {
                material: "stone".into(),
                slot: "diffuseMap".into(),
                path: "tex/nowhere.png".into()
            }]
        );
    }

    #[test]
    fn test_found_in_root_and_copied() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rock.png"), b"png bytes").unwrap();
        let settings = ExportSettings {
            texture_roots: vec![dir.path().to_path_buf()],
            copy_textures: true,
            ..Default::default()
        };
        let resolver = MaterialResolver::new(&settings, None);
        let resolved = resolver
            .resolve(
                &[material("Rock Wall", &[("diffuseMap", "C:\\art\\rock.png")])],
                false,
            )
            .unwrap();

        let rock = &resolved.materials[0];
        assert_eq!(rock.file_stem, "Rock_Wall");
        assert_eq!(rock.mfm_path(), "materials/Rock_Wall.mfm");
        assert_eq!(rock.textures[0].path, "materials/rock.png");
        assert_eq!(
            resolved.staged,
            vec![("materials/rock.png".to_string(), b"png bytes".to_vec())]
        );
        assert!(resolved.warnings.is_empty());
    }

    #[test]
    fn test_colliding_file_names_are_prefixed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        std::fs::write(dir.path().join("a/d.png"), b"a").unwrap();
        std::fs::write(dir.path().join("b/d.png"), b"b").unwrap();
        let settings = ExportSettings {
            texture_roots: vec![dir.path().to_path_buf()],
            copy_textures: true,
            ..Default::default()
        };
        let resolver = MaterialResolver::new(&settings, None);
        let resolved = resolver
            .resolve(
                &[
                    material("first", &[("diffuseMap", "a/d.png")]),
                    material("second", &[("diffuseMap", "b/d.png")]),
                ],
                false,
            )
            .unwrap();

        assert_eq!(resolved.materials[0].textures[0].path, "materials/d.png");
        assert_eq!(resolved.materials[1].textures[0].path, "materials/second_d.png");
        assert_eq!(resolved.staged.len(), 2);
    }

    #[test]
    fn test_prefixed_name_taken_by_third_source() {
        let dir = tempfile::tempdir().unwrap();
        for (folder, file, bytes) in [
            ("a", "d.png", b"a"),
            ("c", "second_d.png", b"c"),
            ("b", "d.png", b"b"),
        ] {
            std::fs::create_dir_all(dir.path().join(folder)).unwrap();
            std::fs::write(dir.path().join(folder).join(file), bytes).unwrap();
        }
        let settings = ExportSettings {
            texture_roots: vec![dir.path().to_path_buf()],
            copy_textures: true,
            ..Default::default()
        };
        let resolver = MaterialResolver::new(&settings, None);
        let resolved = resolver
            .resolve(
                &[
                    material("first", &[("diffuseMap", "a/d.png")]),
                    material("other", &[("diffuseMap", "c/second_d.png")]),
                    material("second", &[("diffuseMap", "b/d.png"), ("specularMap", "b/d.png")]),
                ],
                false,
            )
            .unwrap();

        let second = &resolved.materials[2].textures;
        assert_eq!(second[0].path, "materials/second_2_d.png");
        // Same source reuses its staged name
        assert_eq!(second[1].path, "materials/second_2_d.png");
        assert_eq!(
            resolved.staged,
            vec![
                ("materials/d.png".to_string(), b"a".to_vec()),
                ("materials/second_d.png".to_string(), b"c".to_vec()),
                ("materials/second_2_d.png".to_string(), b"b".to_vec()),
            ]
        );
    }

    #[test]
    fn test_conversion_and_failure_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok.png"), b"x").unwrap();
        std::fs::write(dir.path().join("broken.bad"), b"x").unwrap();
        let settings = ExportSettings {
            texture_roots: vec![dir.path().to_path_buf()],
            convert_to_dds: true,
            ..Default::default()
        };
        let resolver = MaterialResolver::new(&settings, Some(&FakeConverter));
        let resolved = resolver
            .resolve(
                &[material(
                    "mixed",
                    &[("diffuseMap", "ok.png"), ("normalMap", "broken.bad")],
                )],
                false,
            )
            .unwrap();

        let textures = &resolved.materials[0].textures;
        assert_eq!(textures[0].path, "materials/ok.dds");
        assert_eq!(textures[1].path, "broken.bad");
        assert!(matches!(
            resolved.warnings.as_slice(),
            [ExportWarning::TextureConversionFailed { .. }]
        ));
    }

    #[test]
    fn test_fallback_and_duplicates() {
        let settings = ExportSettings::default();
        let resolver = MaterialResolver::new(&settings, None);

        let resolved = resolver.resolve(&[material("a", &[])], true).unwrap();
        assert_eq!(resolved.materials.len(), 2);
        assert_eq!(resolved.get(DEFAULT_MATERIAL), Some(&MaterialRef::fallback()));

        let err = resolver
            .resolve(&[material("a b", &[]), material("a_b", &[])], false)
            .unwrap_err();
        assert!(matches!(
            err,
            ExportError::Validation(ValidationError::DuplicateName { kind: "material", .. })
        ));
    }
}
