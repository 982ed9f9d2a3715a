use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;
use crate::error::VppError;

/// Orchestrator stage a case was in when it terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validating,
    Negotiated,
    Invoking,
    Verifying,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Validating => "validating",
            Stage::Negotiated => "negotiated",
            Stage::Invoking => "invoking",
            Stage::Verifying => "verifying",
        };
        f.write_str(s)
    }
}

/// Terminal state of a test case
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Done,
    /// Not applicable to this format/backend; not a failure
    Skipped { reason: String },
    Failed {
        stage: Stage,
        #[serde(rename = "reason", serialize_with = "serialize_display")]
        error: VppError,
    },
}

impl Outcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

fn serialize_display<S: Serializer>(error: &VppError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// What happened while evaluating one test case
#[derive(Debug, Serialize)]
pub struct CaseReport {
    pub run_id: Uuid,
    /// Base artifact name, or the operation tag when synthesis was never reached
    pub name: String,
    pub operation: String,
    pub outcome: Outcome,
    /// Number of ffmpeg invocations started
    pub invocations: u32,
    /// Fingerprints computed, reference first
    pub fingerprints: Vec<String>,
    pub tool_time_ms: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
