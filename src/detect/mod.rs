//! Detection of identifier and statistic columns.

pub mod column;
pub mod id_column;
pub mod metadata;

pub use column::{find_column, BASE_MEAN_ALIASES, STAT_ALIASES};
pub use id_column::{
    column_match_ratio, find_id_column, find_id_column_across, sample_rows, strip_version_suffix,
    DetectionOptions, IdColumnMatch, OrganismMatch,
};
pub use metadata::{
    resolve_metadata, ColumnSpec, ColumnSpecs, DerivedColumn, MetadataDescriptor, MetadataOverrides,
    Resolution, BASE_MEAN, ID, STAT,
};
