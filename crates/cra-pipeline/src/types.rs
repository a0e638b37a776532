//! Stage catalog and the stage event wire type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const REVIEW_START: &str = "REVIEW_START";
pub const OCR: &str = "OCR";
pub const KG_BUILD: &str = "KG_BUILD";
pub const REVIEW_ALL: &str = "REVIEW_ALL";

/// One step of the review pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stage {
    pub id: &'static str,
    #[serde(rename = "displayOrder")]
    pub display_order: usize,
    pub label: &'static str,
}

/// Canonical stage order. The `id` must match the `step` field sent on the stream.
pub const STAGES: &[Stage] = &[
    Stage {
        id: REVIEW_START,
        display_order: 0,
        label: "Initialization",
    },
    Stage {
        id: OCR,
        display_order: 1,
        label: "Smart OCR",
    },
    Stage {
        id: KG_BUILD,
        display_order: 2,
        label: "Knowledge Graph",
    },
    Stage {
        id: REVIEW_ALL,
        display_order: 3,
        label: "Risk Analysis",
    },
];

impl Stage {
    /// Look up a stage by its wire id.
    pub fn by_id(id: &str) -> Option<&'static Stage> {
        STAGES.iter().find(|s| s.id == id)
    }

    /// The stage whose completion finishes a review run.
    pub fn last() -> &'static Stage {
        &STAGES[STAGES.len() - 1]
    }

    pub fn count() -> usize {
        STAGES.len()
    }
}

/// Status carried by a stage event.
///
/// The server also emits statuses outside the pipeline vocabulary (the
/// connection handshake sends `CONNECTED`); those decode to `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StageStatus {
    Processing,
    Completed,
    Failed,
    Skipped,
    Other(String),
}

impl StageStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for StageStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PROCESSING" => Self::Processing,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            "SKIPPED" => Self::Skipped,
            _ => Self::Other(s),
        }
    }
}

impl From<StageStatus> for String {
    fn from(status: StageStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One status update for a stage, as received from the review stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvent {
    pub step: String,
    pub status: StageStatus,
    /// Stage-specific payload; opaque to the state machine.
    #[serde(default)]
    pub data: serde_json::Value,
    /// Milliseconds since the epoch, stamped by the server.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl StageEvent {
    pub fn new(step: impl Into<String>, status: StageStatus) -> Self {
        Self {
            step: step.into(),
            status,
            data: serde_json::Value::Null,
            timestamp: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Decode one stream frame.
    pub fn decode(text: &str) -> cra_core::Result<Self> {
        serde_json::from_str(text).map_err(|e| cra_core::Error::Decode(e.to_string()))
    }

    pub fn is(&self, step: &str, status: &StageStatus) -> bool {
        self.step == step && &self.status == status
    }

    /// Whether the payload carries something other than null.
    pub fn has_data(&self) -> bool {
        !self.data.is_null()
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp.and_then(DateTime::from_timestamp_millis)
    }
}
