//! Table normalization into canonical `ID` / `baseMean` / `stat` columns.

pub mod canonical;

pub use canonical::{normalize, normalize_optional, ORIG_SUFFIX};
