//! Unit identities and batch results

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::state::PipelineState;
use crate::error::{ExportError, ExportWarning};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnitKind {
    Skeleton,
    MaterialSet,
    Mesh,
    Animation,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitKind::Skeleton => "skeleton",
            UnitKind::MaterialSet => "material set",
            UnitKind::Mesh => "mesh",
            UnitKind::Animation => "animation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitId {
    pub kind: UnitKind,
    pub name: String,
}

impl UnitId {
    pub fn new(kind: UnitKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    Exported,
    Failed(ExportError),
    /// Cancellation was requested before the unit started
    Cancelled,
}

/// Result of one unit's state machine
#[derive(Debug, Clone, PartialEq)]
pub struct UnitReport {
    pub unit: UnitId,
    /// Final state: `Done`, `Failed`, or `Idle` for a cancelled unit
    pub state: PipelineState,
    /// Last state before the final one; for a failed unit, where it stopped
    pub reached: PipelineState,
    pub outcome: UnitOutcome,
    pub warnings: Vec<ExportWarning>,
    /// Files written, relative to the export root with `/` separators
    pub files: Vec<String>,
}

impl UnitReport {
    pub fn is_exported(&self) -> bool {
        self.outcome == UnitOutcome::Exported
    }

    pub fn error(&self) -> Option<&ExportError> {
        match &self.outcome {
            UnitOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Aggregate of every unit in a batch, in phase then snapshot order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportResult {
    pub reports: Vec<UnitReport>,
}

impl ExportResult {
    pub fn report(&self, kind: UnitKind, name: &str) -> Option<&UnitReport> {
        self.reports
            .iter()
            .find(|r| r.unit.kind == kind && r.unit.name == name)
    }

    pub fn exported_count(&self) -> usize {
        self.reports.iter().filter(|r| r.is_exported()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &UnitReport> {
        self.reports.iter().filter(|r| r.error().is_some())
    }

    pub fn cancelled_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.outcome == UnitOutcome::Cancelled)
            .count()
    }

    /// True when every unit exported
    pub fn is_success(&self) -> bool {
        self.reports.iter().all(UnitReport::is_exported)
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.reports
            .iter()
            .flat_map(|r| r.files.iter().map(String::as_str))
    }

    pub fn warning_count(&self) -> usize {
        self.reports.iter().map(|r| r.warnings.len()).sum()
    }
}

/// Shared cancellation flag, checked before each unit starts
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
