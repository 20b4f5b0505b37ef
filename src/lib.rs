//! Gene identifier detection and rank vector construction
//!
//! This library inspects differential expression result tables (DESeq2,
//! limma, edgeR style), works out which organism and identifier namespace
//! they use, renames their columns to a canonical form and builds the ranked
//! per-gene statistic vectors consumed by rank-based enrichment methods.
//!
//! # Overview
//!
//! - **annotation**: Per-organism reference identifier indexes and catalogs
//! - **data**: Heterogeneous tables with TSV I/O
//! - **detect**: Identifier/statistic column detection and metadata resolution
//! - **normalize**: Canonical renaming (`ID`, `baseMean`, `stat`)
//! - **rank**: Deduplicated, remapped, sorted rank vectors
//! - **pipeline**: Configurable end-to-end runs
//!
//! # Example
//!
//! ```no_run
//! use generank::prelude::*;
//!
//! let table = Table::from_tsv("deseq_results.tsv").unwrap();
//! let catalog = AnnotationCatalog::load("human.json").unwrap();
//!
//! let outcome = RankPipeline::new()
//!     .name("deseq")
//!     .max_genes(12_000)
//!     .run(&table, &catalog)
//!     .unwrap();
//!
//! outcome.ranks.to_tsv("ranks.tsv", None).unwrap();
//! ```

pub mod annotation;
pub mod data;
pub mod detect;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod rank;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::annotation::{
        AnnotationCatalog, AnnotationProvider, IndexBuilder, ReferenceAnnotationIndex, ReferenceSet,
        TsvAnnotationProvider,
    };
    pub use crate::data::{Column, RowView, Table, Value};
    pub use crate::detect::{
        find_column, find_id_column, find_id_column_across, resolve_metadata, ColumnSpec,
        DerivedColumn, DetectionOptions, IdColumnMatch, MetadataDescriptor, MetadataOverrides,
        OrganismMatch, Resolution,
    };
    pub use crate::error::{GeneRankError, Result};
    pub use crate::normalize::{normalize, normalize_optional};
    pub use crate::pipeline::{RankConfig, RankOutcome, RankPipeline};
    pub use crate::rank::{extract, extract_ranks, MissingStatPolicy, RankOptions, RankVector};
}
