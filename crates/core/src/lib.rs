//! Domain vocabulary for the trend-to-video pipeline.
//!
//! Pure types and logic only: stage and job status enums, slot
//! assignment, the composite gate, the progress indicator, and spoken
//! duration estimation. Nothing in this crate performs I/O.

pub mod analysis;
pub mod duration;
pub mod error;
pub mod gate;
pub mod job;
pub mod slots;
pub mod types;
