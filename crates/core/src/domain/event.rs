// Job Event Model
// Observer-facing event shapes: progress, complete, error

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Progress update emitted by the subordinate process
///
/// `percent` keeps the number exactly as the tool wrote it and any extra
/// fields ride along in `extra`, so observers see the line as emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: String,
    pub percent: Number,
    #[serde(default)]
    pub message: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProgressEvent {
    pub fn new(
        stage: impl Into<String>,
        percent: impl Into<Number>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            stage: stage.into(),
            percent: percent.into(),
            message: message.into(),
            extra: Map::new(),
        }
    }
}

/// One entry of a job's append-only event history
///
/// Serialized with a `type` tag so observers receive
/// `{type: progress, stage, percent, message}`, `{type: complete, result}`
/// or `{type: error, message, diagnostic?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JobEvent {
    Progress(ProgressEvent),
    Complete {
        result: serde_json::Value,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        diagnostic: Option<String>,
    },
}

impl JobEvent {
    /// Terminal events close every observer feed
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobEvent::Progress(_))
    }
}

impl From<ProgressEvent> for JobEvent {
    fn from(event: ProgressEvent) -> Self {
        JobEvent::Progress(event)
    }
}
