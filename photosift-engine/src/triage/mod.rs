//! Triage session orchestration
//!
//! [`TriageController`] owns the ordered collection and cursor and drives the
//! store and cache on every transition; [`ContinuousPacer`] turns a sustained
//! gesture into a throttled stream of decisions against the controller.

mod controller;
mod pacer;

pub use controller::{SessionSummary, TriageController};
pub use pacer::ContinuousPacer;
