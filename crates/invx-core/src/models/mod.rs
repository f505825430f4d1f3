//! Data models.

pub mod attempt;
pub mod config;
pub mod invoice;

pub use attempt::{ExtractionAttempt, OcrStatus, StrategyFailure};
pub use config::InvxConfig;
pub use invoice::ExtractionResult;
