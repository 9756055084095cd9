//! Assignment engine: greedy initial pass followed by a swap optimizer.
//!
//! A run fills open slots in one deterministic forward pass, then repeatedly
//! tries direct fills and single-hop swaps on the remaining gaps until an
//! iteration makes no progress or the iteration cap is reached.

mod greedy;
mod manual;
mod run;
mod swap;

pub use greedy::GreedyOutcome;
pub use run::{Engine, EngineError, RunSummary};
pub use swap::OptimizerOutcome;
