//! Alias-based column lookup.

use crate::data::Table;

/// Aliases for the expression-magnitude column, in priority order.
pub const BASE_MEAN_ALIASES: &[&str] = &["baseMean", "aveexpr"];

/// Aliases for the ranking statistic column, in priority order.
pub const STAT_ALIASES: &[&str] = &["stat", "t", "log2FC", "log2foldchange", "logfc"];

/// Find the column matching the earliest alias, case-insensitively.
///
/// Aliases are tried in order; for a given alias the leftmost matching
/// column wins. Returns the column's name as it appears in the table.
pub fn find_column<'t, S: AsRef<str>>(table: &'t Table, aliases: &[S]) -> Option<&'t str> {
    let lowered: Vec<String> = table
        .columns()
        .iter()
        .map(|c| c.name.to_lowercase())
        .collect();

    aliases.iter().find_map(|alias| {
        let alias = alias.as_ref().to_lowercase();
        lowered
            .iter()
            .position(|name| *name == alias)
            .map(|idx| table.columns()[idx].name.as_str())
    })
}
