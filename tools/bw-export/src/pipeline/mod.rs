//! Export pipeline
//!
//! Runs one state machine per export unit and aggregates the reports. Phases
//! run in dependency order:
//!
//! 1. skeletons (their built form feeds meshes and clips)
//! 2. the material set (one unit for every `.mfm` and staged texture)
//! 3. meshes, in parallel
//! 4. animations, in parallel
//!
//! A failing unit never aborts its siblings. Units that depend on it fail
//! with [`ValidationError::DependencyFailed`] instead of building anything.
//!
//! Each state is entered once the work it names is done, so a failed unit's
//! [`UnitReport::reached`] tells how far it got.

mod report;
mod state;

pub use report::{CancelToken, ExportResult, UnitId, UnitKind, UnitOutcome, UnitReport};
pub use state::PipelineState;

use std::path::Path;

use bigworld_shared::fs::{ensure_dir, StagedWrite};
use bigworld_shared::{sanitize_name, BIGWORLD_LAYOUT};
use bw_common::VertexFormat;
use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;

use crate::animation::sample_clip;
use crate::attachments::{build_hardpoints, build_portals, validate_attachments};
use crate::collision::{build_bsp, validate_collision};
use crate::coords::CoordinateTransformer;
use crate::encode::{
    encode_animation, encode_bsp, encode_material, encode_model, encode_primitives,
    encode_visual, AnimationListing, ModelDocument, RenderLevel, VisualDocument,
};
use crate::error::{ExportError, ExportWarning, ValidationError};
use crate::material::{ImageConverter, MaterialResolver, ResolvedMaterials};
use crate::mesh::{build_geometry, resolve_mesh, simplify, BuiltGeometry};
use crate::scene::{AnimationEntry, MeshEntry, SceneSnapshot, SkeletonEntry};
use crate::settings::{ExportSettings, LOD_DISTANCES, LOD_REDUCTION_RATIOS};
use crate::skeleton::{assemble, topological_order, BuiltSkeleton};
use crate::texture::DdsConverter;

/// Name of the single material-set unit
pub const MATERIAL_SET: &str = "materials";

/// Batch exporter
pub struct ExportPipeline {
    settings: ExportSettings,
    converter: Option<Box<dyn ImageConverter>>,
    cancel: CancelToken,
}

impl ExportPipeline {
    /// Pipeline with the built-in [`DdsConverter`] for texture conversion
    pub fn new(settings: ExportSettings) -> Self {
        Self {
            settings,
            converter: Some(Box::new(DdsConverter)),
            cancel: CancelToken::new(),
        }
    }

    /// Replace the image converter; `None` turns every conversion into a warning
    pub fn with_converter(mut self, converter: Option<Box<dyn ImageConverter>>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Export every unit of `snapshot` under `root`.
    ///
    /// Only invalid settings or an unusable export root fail the whole batch;
    /// everything else is reported per unit.
    pub fn export(&self, snapshot: &SceneSnapshot, root: &Path) -> Result<ExportResult, ExportError> {
        let format = self.settings.validate()?;
        ensure_dir(root).map_err(|e| ExportError::io(root, &e))?;
        for folder in BIGWORLD_LAYOUT.subfolders() {
            let dir = BIGWORLD_LAYOUT.resolve(root, folder);
            ensure_dir(&dir).map_err(|e| ExportError::io(&dir, &e))?;
        }
        Ok(self.run(snapshot, format, Some(root)))
    }

    /// Validate, build and encode every unit without writing anything.
    pub fn check(&self, snapshot: &SceneSnapshot) -> Result<ExportResult, ExportError> {
        let format = self.settings.validate()?;
        Ok(self.run(snapshot, format, None))
    }

    fn run(
        &self,
        snapshot: &SceneSnapshot,
        format: &'static VertexFormat,
        root: Option<&Path>,
    ) -> ExportResult {
        tracing::info!(
            "Exporting {} skeletons, {} materials, {} meshes, {} animations (format {})",
            snapshot.skeletons.len(),
            snapshot.materials.len(),
            snapshot.meshes.len(),
            snapshot.animations.len(),
            format.tag
        );

        let batch = Batch {
            settings: &self.settings,
            format,
            transformer: CoordinateTransformer::from_settings(&self.settings),
            root,
            cancel: &self.cancel,
            converter: self.converter.as_deref(),
            snapshot,
        };

        let mut reports = Vec::new();

        let (skeleton_reports, skeletons) = batch.skeletons();
        reports.extend(skeleton_reports);

        let (material_report, materials) = batch.material_set();
        reports.push(material_report);

        reports.extend(batch.meshes(&skeletons, materials.as_ref()));
        reports.extend(batch.animations(&skeletons));

        let result = ExportResult { reports };
        tracing::info!(
            "Export finished: {} exported, {} failed, {} cancelled, {} warnings",
            result.exported_count(),
            result.failed().count(),
            result.cancelled_count(),
            result.warning_count()
        );
        result
    }
}

// ============================================================================
// Unit state tracking
// ============================================================================

struct UnitRun {
    unit: UnitId,
    state: PipelineState,
    warnings: Vec<ExportWarning>,
}

impl UnitRun {
    fn start(unit: UnitId) -> Self {
        let mut run = Self {
            unit,
            state: PipelineState::Idle,
            warnings: Vec::new(),
        };
        run.advance(PipelineState::SnapshotTaken);
        run
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_transition(next),
            "{}: illegal transition {} -> {}",
            self.unit,
            self.state,
            next
        );
        tracing::debug!("{}: {} -> {}", self.unit, self.state, next);
        self.state = next;
    }

    fn warn(&mut self, warning: ExportWarning) {
        tracing::warn!("{}: {}", self.unit, warning);
        self.warnings.push(warning);
    }

    fn finish(mut self, result: Result<Vec<String>, ExportError>) -> UnitReport {
        let reached = self.state;
        match result {
            Ok(files) => {
                self.advance(PipelineState::Done);
                tracing::info!("Exported {} ({} files)", self.unit, files.len());
                UnitReport {
                    unit: self.unit,
                    state: self.state,
                    reached,
                    outcome: UnitOutcome::Exported,
                    warnings: self.warnings,
                    files,
                }
            }
            Err(err) => {
                self.advance(PipelineState::Failed);
                tracing::warn!("{} failed ({}): {}", self.unit, err.class(), err);
                UnitReport {
                    unit: self.unit,
                    state: self.state,
                    reached,
                    outcome: UnitOutcome::Failed(err),
                    warnings: self.warnings,
                    files: Vec::new(),
                }
            }
        }
    }
}

fn cancelled(unit: UnitId) -> UnitReport {
    tracing::info!("Skipped {}: export cancelled", unit);
    UnitReport {
        unit,
        state: PipelineState::Idle,
        reached: PipelineState::Idle,
        outcome: UnitOutcome::Cancelled,
        warnings: Vec::new(),
        files: Vec::new(),
    }
}

/// File stem for a named entity, or `EmptyField` when nothing usable remains
fn file_stem(kind: &str, name: &str) -> Result<String, ValidationError> {
    sanitize_name(name).ok_or_else(|| ValidationError::EmptyField {
        entity: if name.is_empty() {
            kind.to_string()
        } else {
            format!("{} '{}'", kind, name)
        },
        field: "name",
    })
}

/// `(group, clip)` stems that place a clip under `animations/<group>/`
fn clip_stems(entry: &AnimationEntry) -> Result<(String, String), ValidationError> {
    let group = entry.model.as_deref().unwrap_or(&entry.skeleton);
    Ok((file_stem("animation group", group)?, file_stem("animation", &entry.name)?))
}

/// Per mesh, the name conflict that fails it: a stem repeating an earlier
/// mesh's, or a stem whose `.primitives` another mesh writes as a LOD level.
fn mesh_conflicts(meshes: &[MeshEntry], lod_levels: usize) -> Vec<Option<ValidationError>> {
    let stems: Vec<Option<String>> = meshes.iter().map(|m| sanitize_name(&m.name)).collect();
    let repeated = duplicates(&stems, |stem| stem.as_deref());
    let lod_files: HashSet<String> = stems
        .iter()
        .flatten()
        .flat_map(|stem| {
            (1..lod_levels).map(move |level| BIGWORLD_LAYOUT.lod_primitives_file(stem, level))
        })
        .collect();

    meshes
        .iter()
        .zip(&stems)
        .zip(repeated)
        .map(|((mesh, stem), repeated)| {
            if repeated {
                return Some(ValidationError::DuplicateName {
                    kind: "mesh",
                    name: mesh.name.clone(),
                });
            }
            let file = BIGWORLD_LAYOUT.primitives_file(stem.as_deref()?);
            lod_files.contains(&file).then(|| ValidationError::DuplicateName {
                kind: "mesh file",
                name: file,
            })
        })
        .collect()
}

/// Flags every entry whose key repeats an earlier one. Entries without a key
/// are left for the unit itself to reject.
fn duplicates<'a, T, K: std::hash::Hash + Eq>(
    items: &'a [T],
    key: impl Fn(&'a T) -> Option<K>,
) -> Vec<bool> {
    let mut seen = HashSet::new();
    items
        .iter()
        .map(|item| key(item).is_some_and(|k| !seen.insert(k)))
        .collect()
}

// ============================================================================
// Phases
// ============================================================================

struct Batch<'a> {
    settings: &'a ExportSettings,
    format: &'static VertexFormat,
    transformer: CoordinateTransformer,
    root: Option<&'a Path>,
    cancel: &'a CancelToken,
    converter: Option<&'a dyn ImageConverter>,
    snapshot: &'a SceneSnapshot,
}

impl<'a> Batch<'a> {
    /// Encode → (Written) for a unit's files. A dry run skips the write.
    fn write_files(
        &self,
        run: &mut UnitRun,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<Vec<String>, ExportError> {
        run.advance(PipelineState::Encoded);
        let paths: Vec<String> = files.iter().map(|(path, _)| path.clone()).collect();
        let Some(root) = self.root else {
            return Ok(paths);
        };

        let mut staged = StagedWrite::new();
        for (relative, bytes) in &files {
            let path = BIGWORLD_LAYOUT.resolve(root, relative);
            staged
                .stage(&path, bytes)
                .map_err(|e| ExportError::io(&path, &e))?;
        }
        staged.commit().map_err(|e| ExportError::io(root, &e))?;
        run.advance(PipelineState::Written);
        Ok(paths)
    }

    /// Whether a skeleton exists in the snapshot but did not build
    fn skeleton_failed(&self, name: &str, skeletons: &HashMap<&str, BuiltSkeleton>) -> bool {
        self.snapshot.skeleton(name).is_some() && !skeletons.contains_key(name)
    }

    fn skeletons(&self) -> (Vec<UnitReport>, HashMap<&'a str, BuiltSkeleton>) {
        let snapshot = self.snapshot;
        let mut built = HashMap::new();
        let duplicate = duplicates(&snapshot.skeletons, |s| Some(s.name.as_str()));

        let reports = snapshot
            .skeletons
            .iter()
            .zip(duplicate)
            .map(|(entry, duplicate)| {
                let unit = UnitId::new(UnitKind::Skeleton, entry.name.as_str());
                if self.cancel.is_cancelled() {
                    return cancelled(unit);
                }
                let mut run = UnitRun::start(unit);
                let result = self
                    .skeleton_unit(&mut run, entry, duplicate)
                    .map(|(skeleton, files)| {
                        built.insert(entry.name.as_str(), skeleton);
                        files
                    });
                run.finish(result)
            })
            .collect();

        (reports, built)
    }

    fn skeleton_unit(
        &self,
        run: &mut UnitRun,
        entry: &SkeletonEntry,
        duplicate: bool,
    ) -> Result<(BuiltSkeleton, Vec<String>), ExportError> {
        if duplicate {
            return Err(ValidationError::DuplicateName {
                kind: "skeleton",
                name: entry.name.clone(),
            }
            .into());
        }
        let order = topological_order(entry)?;
        run.advance(PipelineState::Validated);
        let skeleton = assemble(entry, &order, &self.transformer);
        run.advance(PipelineState::Transformed);
        run.advance(PipelineState::Built);
        // Skeletons have no file of their own
        let files = self.write_files(run, Vec::new())?;
        Ok((skeleton, files))
    }

    fn material_set(&self) -> (UnitReport, Option<ResolvedMaterials>) {
        let unit = UnitId::new(UnitKind::MaterialSet, MATERIAL_SET);
        if self.cancel.is_cancelled() {
            return (cancelled(unit), None);
        }

        let mut run = UnitRun::start(unit);
        let mut resolved = None;
        let result = self.material_unit(&mut run).map(|(materials, files)| {
            resolved = Some(materials);
            files
        });
        (run.finish(result), resolved)
    }

    fn material_unit(
        &self,
        run: &mut UnitRun,
    ) -> Result<(ResolvedMaterials, Vec<String>), ExportError> {
        let include_fallback = self.snapshot.meshes.iter().any(|mesh| {
            mesh.triangles
                .iter()
                .any(|t| t.material_slot >= mesh.material_slots.len())
        });

        let resolver = MaterialResolver::new(self.settings, self.converter);
        let mut resolved = resolver.resolve(&self.snapshot.materials, include_fallback)?;
        run.advance(PipelineState::Validated);
        for warning in std::mem::take(&mut resolved.warnings) {
            run.warn(warning);
        }
        run.advance(PipelineState::Transformed);
        run.advance(PipelineState::Built);

        let mut files = Vec::with_capacity(resolved.materials.len() + resolved.staged.len());
        for material in &resolved.materials {
            files.push((material.mfm_path(), encode_material(material)?));
        }
        files.extend(std::mem::take(&mut resolved.staged));

        let files = self.write_files(run, files)?;
        Ok((resolved, files))
    }

    fn meshes(
        &self,
        skeletons: &HashMap<&str, BuiltSkeleton>,
        materials: Option<&ResolvedMaterials>,
    ) -> Vec<UnitReport> {
        let snapshot = self.snapshot;
        let conflicts = mesh_conflicts(&snapshot.meshes, self.settings.effective_lod_levels());

        // Clips listed in each model's `.model`
        let mut listings: HashMap<&str, Vec<AnimationListing>> = HashMap::new();
        for entry in &snapshot.animations {
            let (Some(model), Ok((group, clip))) = (entry.model.as_deref(), clip_stems(entry))
            else {
                continue;
            };
            listings.entry(model).or_default().push(AnimationListing::new(
                &group,
                &clip,
                self.settings.frame_rate,
                self.settings.frame_range,
            ));
        }

        snapshot
            .meshes
            .par_iter()
            .zip(conflicts)
            .map(|(mesh, conflict)| {
                let unit = UnitId::new(UnitKind::Mesh, mesh.name.as_str());
                if self.cancel.is_cancelled() {
                    return cancelled(unit);
                }
                let mut run = UnitRun::start(unit);
                let listed = listings.get(mesh.name.as_str()).map_or(&[][..], Vec::as_slice);
                let result = self.mesh_unit(&mut run, mesh, conflict, skeletons, materials, listed);
                run.finish(result)
            })
            .collect()
    }

    fn mesh_unit(
        &self,
        run: &mut UnitRun,
        mesh: &MeshEntry,
        conflict: Option<ValidationError>,
        skeletons: &HashMap<&str, BuiltSkeleton>,
        materials: Option<&ResolvedMaterials>,
        listings: &[AnimationListing],
    ) -> Result<Vec<String>, ExportError> {
        let entity = format!("mesh '{}'", mesh.name);
        let stem = file_stem("mesh", &mesh.name)?;
        if let Some(conflict) = conflict {
            return Err(conflict.into());
        }
        let Some(materials) = materials else {
            return Err(ValidationError::DependencyFailed {
                entity,
                dependency: format!("material set '{}'", MATERIAL_SET),
            }
            .into());
        };
        let skeleton = match &mesh.skin {
            Some(skin) if self.skeleton_failed(&skin.skeleton, skeletons) => {
                return Err(ValidationError::DependencyFailed {
                    entity,
                    dependency: format!("skeleton '{}'", skin.skeleton),
                }
                .into());
            }
            Some(skin) => skeletons.get(skin.skeleton.as_str()),
            None => None,
        };
        let material_exists = |name: &str| materials.get(name).is_some();

        let mut warnings = Vec::new();
        let resolved = resolve_mesh(mesh, skeleton, self.format, material_exists, &mut warnings)?;
        for warning in warnings {
            run.warn(warning);
        }
        validate_attachments(mesh)?;
        if self.settings.export_collision {
            validate_collision(mesh)?;
        }
        run.advance(PipelineState::Validated);

        let geometry = build_geometry(mesh, &resolved, self.format, &self.transformer)?;
        let hardpoints = build_hardpoints(mesh, &self.transformer);
        let portals = if self.settings.export_portals {
            build_portals(mesh, &self.transformer)
        } else {
            Vec::new()
        };
        let collision = if self.settings.export_collision {
            build_bsp(mesh, &self.transformer)
        } else {
            None
        };
        run.advance(PipelineState::Transformed);

        if geometry.is_empty() {
            run.warn(ExportWarning::EmptyGeometry {
                mesh: mesh.name.clone(),
            });
            run.advance(PipelineState::Built);
            return self.write_files(run, Vec::new());
        }

        let bounds = geometry.bounds;
        let mut levels: Vec<(String, BuiltGeometry)> =
            vec![(BIGWORLD_LAYOUT.lod_primitives_file(&stem, 0), geometry)];
        for level in 1..self.settings.effective_lod_levels() {
            let reduced = simplify(mesh, LOD_REDUCTION_RATIOS[level]);
            let resolved =
                resolve_mesh(&reduced, skeleton, self.format, material_exists, &mut Vec::new())?;
            let geometry = build_geometry(&reduced, &resolved, self.format, &self.transformer)?;
            if geometry.is_empty() {
                tracing::debug!("{}: LOD {} collapsed, stopping", entity, level);
                break;
            }
            levels.push((BIGWORLD_LAYOUT.lod_primitives_file(&stem, level), geometry));
        }
        run.advance(PipelineState::Built);

        let mut files = Vec::with_capacity(levels.len() + 3);
        for (path, geometry) in &levels {
            files.push((path.clone(), encode_primitives(geometry)?));
        }
        let mut bsp_models = mesh.bsp_models.clone();
        if let Some(tree) = &collision {
            let path = BIGWORLD_LAYOUT.bsp_file(&stem);
            files.push((path.clone(), encode_bsp(&stem, tree)?));
            bsp_models.push(path);
        }
        let render_levels: Vec<RenderLevel> = levels
            .iter()
            .map(|(path, geometry)| RenderLevel {
                geometry,
                primitives: path,
            })
            .collect();
        let visual = encode_visual(&VisualDocument {
            name: &stem,
            levels: &render_levels,
            skeleton,
            materials,
            world_space: self.settings.treat_as_world_space,
            lod_distances: &LOD_DISTANCES,
            hardpoints: &hardpoints,
            portals: &portals,
        })?;
        let model = encode_model(&ModelDocument {
            name: &stem,
            parent: mesh.parent.as_deref(),
            bounds,
            animations: listings,
            bsp_models: &bsp_models,
        })?;
        files.push((BIGWORLD_LAYOUT.visual_file(&stem), visual));
        files.push((BIGWORLD_LAYOUT.model_file(&stem), model));

        self.write_files(run, files)
    }

    fn animations(&self, skeletons: &HashMap<&str, BuiltSkeleton>) -> Vec<UnitReport> {
        let snapshot = self.snapshot;
        let duplicate = duplicates(&snapshot.animations, |a| clip_stems(a).ok());

        snapshot
            .animations
            .par_iter()
            .zip(duplicate)
            .map(|(entry, duplicate)| {
                let unit = UnitId::new(UnitKind::Animation, entry.name.as_str());
                if self.cancel.is_cancelled() {
                    return cancelled(unit);
                }
                let mut run = UnitRun::start(unit);
                let result = self.animation_unit(&mut run, entry, duplicate, skeletons);
                run.finish(result)
            })
            .collect()
    }

    fn animation_unit(
        &self,
        run: &mut UnitRun,
        entry: &AnimationEntry,
        duplicate: bool,
        skeletons: &HashMap<&str, BuiltSkeleton>,
    ) -> Result<Vec<String>, ExportError> {
        let entity = format!("animation '{}'", entry.name);
        let (group, clip) = clip_stems(entry)?;
        if duplicate {
            return Err(ValidationError::DuplicateName {
                kind: "animation",
                name: entry.name.clone(),
            }
            .into());
        }
        if self.skeleton_failed(&entry.skeleton, skeletons) {
            return Err(ValidationError::DependencyFailed {
                entity,
                dependency: format!("skeleton '{}'", entry.skeleton),
            }
            .into());
        }
        let Some(skeleton) = skeletons.get(entry.skeleton.as_str()) else {
            return Err(ValidationError::UnknownSkeleton {
                entity,
                skeleton: entry.skeleton.clone(),
            }
            .into());
        };

        let sampled = sample_clip(entry, skeleton, &self.transformer, self.settings)?;
        run.advance(PipelineState::Validated);
        run.advance(PipelineState::Transformed);
        run.advance(PipelineState::Built);

        let bytes = encode_animation(&sampled)?;
        self.write_files(run, vec![(BIGWORLD_LAYOUT.animation_file(&group, &clip), bytes)])
    }
}
