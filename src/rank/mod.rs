//! Rank vectors for rank-based enrichment.

mod extract;
mod vector;

pub use extract::{extract, extract_ranks, MissingStatPolicy, RankOptions};
pub use vector::{RankEntry, RankVector};
