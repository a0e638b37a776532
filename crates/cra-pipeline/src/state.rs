//! Pipeline state reducer.
//!
//! The run state always reflects the latest received event. There is no
//! sequence validation, so a stale event can move the active stage backwards.

use serde::Serialize;
use tracing::debug;

use crate::types::{Stage, StageEvent, StageStatus, REVIEW_ALL, STAGES};

/// Progress derived from the stage events seen for one contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineRunState {
    /// Catalog position of the last recognised stage, `None` before any.
    #[serde(rename = "activeStageIndex")]
    pub active_stage_index: Option<usize>,
    /// Status of the latest event, recognised step or not.
    #[serde(rename = "activeStatus")]
    pub active_status: Option<StageStatus>,
    /// Raw step of the latest event.
    #[serde(rename = "lastStep")]
    pub last_step: Option<String>,
    #[serde(rename = "isComplete")]
    pub is_complete: bool,
}

/// Rendering state of one stage in the progress bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "mark", content = "status")]
pub enum StageMark {
    Done,
    Active(StageStatus),
    Pending,
}

impl PipelineRunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event, returning the next state.
    pub fn apply(&self, event: &StageEvent) -> Self {
        let mut next = self.clone();

        match Stage::by_id(&event.step) {
            Some(stage) => next.active_stage_index = Some(stage.display_order),
            None => debug!("Unrecognised review step {}; keeping active stage", event.step),
        }
        next.active_status = Some(event.status.clone());
        next.last_step = Some(event.step.clone());

        // Completion follows the latest event, like the active stage.
        next.is_complete = event.step == Stage::last().id && event.status == StageStatus::Completed;

        next
    }

    /// Whether any event has been observed.
    pub fn is_started(&self) -> bool {
        self.last_step.is_some()
    }

    pub fn is_processing(&self) -> bool {
        self.active_status == Some(StageStatus::Processing)
    }

    pub fn active_stage(&self) -> Option<&'static Stage> {
        self.active_stage_index.and_then(|i| STAGES.get(i))
    }

    /// Per-stage marks in catalog order.
    pub fn stage_marks(&self) -> Vec<StageMark> {
        STAGES
            .iter()
            .enumerate()
            .map(|(i, _)| match self.active_stage_index {
                _ if self.is_complete => StageMark::Done,
                Some(active) if i < active => StageMark::Done,
                Some(active) if i == active => StageMark::Active(
                    self.active_status
                        .clone()
                        .unwrap_or(StageStatus::Processing),
                ),
                _ => StageMark::Pending,
            })
            .collect()
    }

    /// Fill ratio of the progress line in `[0, 1]`.
    pub fn progress_ratio(&self) -> f64 {
        if self.is_complete {
            return 1.0;
        }
        match self.active_stage_index {
            Some(i) if STAGES.len() > 1 => (i as f64 / (STAGES.len() - 1) as f64).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    /// Status line shown under the active stage.
    pub fn status_text(&self) -> Option<String> {
        self.active_status.as_ref().map(|status| match status {
            StageStatus::Processing => "Processing...".to_string(),
            other => other.to_string(),
        })
    }

    /// Label of the start-review control while a run is in flight.
    pub fn busy_label(&self) -> Option<&'static str> {
        if !self.is_processing() {
            return None;
        }
        Some(match self.last_step.as_deref() {
            Some(crate::types::OCR) => "OCR Processing...",
            Some(crate::types::KG_BUILD) => "Building Graph...",
            _ => "Reviewing...",
        })
    }

    /// A review can be started unless one is reported in flight.
    pub fn can_start_review(&self) -> bool {
        !self.is_processing()
    }

    /// Whether the run finished with the final stage.
    pub fn finished_with(&self, status: &StageStatus) -> bool {
        self.last_step.as_deref() == Some(REVIEW_ALL) && self.active_status.as_ref() == Some(status)
    }
}
