//! Pipeline composition and execution for rank vector construction.

mod runner;

pub use runner::{RankConfig, RankOutcome, RankPipeline};
