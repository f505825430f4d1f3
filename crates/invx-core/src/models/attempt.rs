//! Telemetry describing how a result was produced.

use serde::Serialize;

use crate::extract::Strategy;

/// Outcome of the OCR stage as seen by the orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrStatus {
    /// OCR has not run (yet).
    #[default]
    NotRun,
    /// The engine produced non-blank text.
    Text,
    /// The engine ran and produced only whitespace.
    Empty,
    /// No engine could be invoked.
    Unavailable,
}

/// A strategy that was tried and did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyFailure {
    pub strategy: Strategy,
    pub reason: String,
}

/// Which strategy produced the result and what failed before it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionAttempt {
    /// Strategy that produced the final record.
    pub strategy: Option<Strategy>,
    /// Strategies that failed, in the order they were tried.
    pub failures: Vec<StrategyFailure>,
    /// OCR outcome for the document.
    pub ocr_status: OcrStatus,
    /// Wall time of the whole invocation.
    pub elapsed_ms: u64,
}

impl ExtractionAttempt {
    /// Whether any strategy failed before the successful one.
    pub fn fell_back(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Strategies that were attempted, in order.
    pub fn tried(&self) -> Vec<Strategy> {
        self.failures
            .iter()
            .map(|f| f.strategy)
            .chain(self.strategy)
            .collect()
    }
}
