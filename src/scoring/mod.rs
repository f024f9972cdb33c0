//! # Evaluation Metrics
//!
//! The two metric families the evaluation report carries:
//! - **transcription**: word-error-rate based accuracy between a reference
//!   and a system transcript
//! - **rouge**: ROUGE-1 / ROUGE-2 / ROUGE-L overlap between a reference and
//!   a generated summary
//!
//! Both degrade instead of failing: degenerate input yields 0.0 accuracy or
//! an empty score map, never an error.

pub mod rouge;
pub mod transcription;

pub use rouge::{score_summaries, RougeScore};
pub use transcription::transcription_accuracy;
