//! Canonicalization of differential expression tables.
//!
//! Produces a table whose identifier, magnitude and statistic columns are
//! named `ID`, `baseMean` and `stat`.

use crate::data::{Column, Table};
use crate::detect::{ColumnSpec, MetadataDescriptor};
use crate::error::{GeneRankError, Result};
use tracing::debug;

/// Suffix given to pre-existing columns that collide with a canonical name.
pub const ORIG_SUFFIX: &str = ".orig";

/// First free name of the form `<name>.orig`, `<name>.orig.orig`, ...
fn free_name(table: &Table, name: &str) -> String {
    let mut candidate = format!("{}{}", name, ORIG_SUFFIX);
    while table.has_column(&candidate) {
        candidate.push_str(ORIG_SUFFIX);
    }
    candidate
}

/// Rename, derive or drop columns as directed by the descriptor.
///
/// The input table is not modified. Source columns are looked up in the raw
/// table and derived columns are evaluated against raw rows, so earlier
/// steps never feed later ones. Existing columns that already carry a
/// canonical name are kept under a `.orig` suffix.
pub fn normalize(raw: &Table, descriptor: &MetadataDescriptor) -> Result<Table> {
    let mut working = raw.clone();

    for (target, spec) in descriptor.columns.targets() {
        match spec {
            ColumnSpec::Rename(source) => {
                let src_idx = raw
                    .position(source)
                    .ok_or_else(|| GeneRankError::MissingColumn(source.clone()))?;
                if source == target {
                    continue;
                }
                let clashing: Vec<usize> = working
                    .columns()
                    .iter()
                    .enumerate()
                    .filter(|(idx, c)| *idx != src_idx && c.name == target)
                    .map(|(idx, _)| idx)
                    .collect();
                for idx in clashing {
                    let renamed = free_name(&working, target);
                    debug!(column = target, renamed = %renamed, "moving aside existing column");
                    working.rename_at(idx, renamed);
                }
                working.rename_at(src_idx, target);
            }
            ColumnSpec::Derived(derived) => {
                let values = raw.rows().map(|row| derived.evaluate(&row)).collect();
                debug!(column = target, expression = derived.label(), "deriving column");
                working.set_column(Column::new(target, values))?;
            }
            ColumnSpec::Unresolved | ColumnSpec::Omitted => {}
        }
    }

    Ok(working)
}

/// [`normalize`] for optional inputs; `None` passes through.
pub fn normalize_optional(
    raw: Option<&Table>,
    descriptor: &MetadataDescriptor,
) -> Result<Option<Table>> {
    raw.map(|table| normalize(table, descriptor)).transpose()
}
