//! Analysis modules.
//!
//! The orchestrator drives the reachability probe and the category
//! analyzers; the aggregator derives the report-level numbers.

pub mod aggregator;
pub mod analyzers;
pub mod orchestrator;
pub mod policy;

pub use orchestrator::{JoinPolicy, Orchestrator};
pub use policy::{FixedPolicy, JitterPolicy, ScoringPolicy};
