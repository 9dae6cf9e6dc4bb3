//! Per-unit export state machine

use std::fmt;

/// Lifecycle of one export unit.
///
/// ```text
/// Idle → SnapshotTaken → Validated → Transformed → Built → Encoded → Written → Done
///                  └──────────┴────────────┴──────────┴───────┴─────────┴──→ Failed
/// ```
///
/// A dry run goes from `Encoded` straight to `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Idle,
    SnapshotTaken,
    Validated,
    Transformed,
    Built,
    Encoded,
    Written,
    Done,
    Failed,
}

impl PipelineState {
    /// Whether `self → next` is a legal transition
    pub fn can_transition(self, next: PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            (Idle, SnapshotTaken)
            | (SnapshotTaken, Validated)
            | (Validated, Transformed)
            | (Transformed, Built)
            | (Built, Encoded)
            | (Encoded, Written)
            | (Encoded, Done)
            | (Written, Done) => true,
            (Idle | Done | Failed, Failed) => false,
            (_, Failed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "Idle",
            PipelineState::SnapshotTaken => "SnapshotTaken",
            PipelineState::Validated => "Validated",
            PipelineState::Transformed => "Transformed",
            PipelineState::Built => "Built",
            PipelineState::Encoded => "Encoded",
            PipelineState::Written => "Written",
            PipelineState::Done => "Done",
            PipelineState::Failed => "Failed",
        };
        f.write_str(name)
    }
}
