//! Identifier column and namespace detection.
//!
//! Cells from a row sample are matched against reference ID collections,
//! one per namespace. The column/namespace pair with the largest overlap wins.

use crate::annotation::{AnnotationCatalog, ReferenceSet};
use crate::data::{Column, Table};
use crate::error::{GeneRankError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;

/// Tuning knobs for identifier detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionOptions {
    /// Maximum number of rows sampled from the table.
    pub sample_size: usize,
    /// Minimum match ratio for the base-namespace fast path and for
    /// accepting an organism.
    pub match_threshold: f64,
    /// Drop `.N` version suffixes from accession-like values before matching.
    pub strip_version_suffix: bool,
    /// Seed for row sampling.
    pub seed: u64,
    /// Try the first (base) namespace alone before scoring every namespace.
    pub fast_path: bool,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            sample_size: 1000,
            match_threshold: 0.6,
            strip_version_suffix: true,
            seed: 42,
            fast_path: true,
        }
    }
}

impl DetectionOptions {
    /// Set the sample size.
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    /// Set the match threshold.
    pub fn with_match_threshold(mut self, threshold: f64) -> Self {
        self.match_threshold = threshold;
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.sample_size == 0 {
            return Err(GeneRankError::InvalidParameter(
                "sample_size must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.match_threshold) {
            return Err(GeneRankError::InvalidParameter(
                "match_threshold must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Best column/namespace pair for a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdColumnMatch {
    pub column: String,
    pub namespace: String,
    /// Distinct matched values divided by sampled rows.
    pub match_ratio: f64,
}

/// Best match across organisms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganismMatch {
    pub organism: String,
    #[serde(flatten)]
    pub id_match: IdColumnMatch,
}

/// Deterministic xorshift64 generator for row sampling.
struct SampleRng {
    state: u64,
}

impl SampleRng {
    fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }
}

/// Row indices to inspect: every row when the table is smaller than
/// `sample_size`, otherwise exactly `sample_size` rows drawn uniformly
/// without replacement. Returned in ascending order.
pub fn sample_rows(n_rows: usize, sample_size: usize, seed: u64) -> Vec<usize> {
    let mut rows: Vec<usize> = (0..n_rows).collect();
    if n_rows < sample_size {
        return rows;
    }
    // Partial Fisher-Yates: the first `sample_size` slots end up uniform.
    let mut rng = SampleRng::new(seed);
    for i in 0..sample_size {
        let j = i + (rng.next_u64() as usize) % (n_rows - i);
        rows.swap(i, j);
    }
    rows.truncate(sample_size);
    rows.sort_unstable();
    rows
}

fn version_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z]+[0-9]+)\.[0-9]+$").expect("valid version pattern"))
}

/// Remove a trailing `.N` version from accession-like IDs
/// (`ENSG00000141510.17` -> `ENSG00000141510`).
pub fn strip_version_suffix(id: &str) -> Cow<'_, str> {
    match version_suffix().captures(id) {
        Some(caps) => Cow::Owned(caps[1].to_string()),
        None => Cow::Borrowed(id),
    }
}

/// Distinct stringified values of one column over the sampled rows.
fn column_values(column: &Column, rows: &[usize], strip: bool) -> HashSet<String> {
    rows.iter()
        .filter_map(|&r| column.values[r].to_text())
        .map(|text| {
            if strip {
                strip_version_suffix(&text).into_owned()
            } else {
                text
            }
        })
        .collect()
}

fn sampled_values(table: &Table, rows: &[usize], strip: bool) -> Vec<HashSet<String>> {
    table
        .columns()
        .iter()
        .map(|column| column_values(column, rows, strip))
        .collect()
}

fn overlap(values: &HashSet<String>, reference: &ReferenceSet<'_>) -> usize {
    values
        .iter()
        .filter(|v| reference.ids.contains(v.as_str()))
        .count()
}

fn ratio(count: usize, n_sampled: usize) -> f64 {
    if n_sampled == 0 {
        0.0
    } else {
        count as f64 / n_sampled as f64
    }
}

/// Estimate which column holds identifiers and which namespace they use.
///
/// `references[0]` is treated as the base namespace: if it alone reaches
/// `match_threshold` it is returned without scoring the other namespaces.
/// Otherwise every column is scored against every namespace and the first
/// maximum in column-major order wins. A result is always returned, even
/// when nothing matches (ratio 0).
pub fn find_id_column(
    table: &Table,
    references: &[ReferenceSet<'_>],
    options: &DetectionOptions,
) -> Result<IdColumnMatch> {
    options.validate()?;
    if table.n_columns() == 0 {
        return Err(GeneRankError::InvalidInput("table has no columns".to_string()));
    }
    if references.is_empty() {
        return Err(GeneRankError::InvalidArgument(
            "at least one reference namespace is required".to_string(),
        ));
    }

    let rows = sample_rows(table.n_rows(), options.sample_size, options.seed);
    let n_sampled = rows.len();
    let values = sampled_values(table, &rows, options.strip_version_suffix);
    let names = table.column_names();

    if options.fast_path {
        let base = &references[0];
        let mut best_col = 0;
        let mut best_count = 0;
        for (col, column_values) in values.iter().enumerate() {
            let count = overlap(column_values, base);
            if count > best_count {
                best_col = col;
                best_count = count;
            }
        }
        let base_ratio = ratio(best_count, n_sampled);
        if base_ratio >= options.match_threshold {
            debug!(
                column = names[best_col],
                namespace = base.namespace,
                ratio = base_ratio,
                "identifier column matched base namespace"
            );
            return Ok(IdColumnMatch {
                column: names[best_col].to_string(),
                namespace: base.namespace.to_string(),
                match_ratio: base_ratio,
            });
        }
    }

    // scores[col][ns]
    let scores: Vec<Vec<usize>> = values
        .iter()
        .map(|column_values| {
            references
                .iter()
                .map(|reference| overlap(column_values, reference))
                .collect()
        })
        .collect();

    let mut best = (0, 0);
    let mut best_count = 0;
    for (col, row) in scores.iter().enumerate() {
        for (ns, &count) in row.iter().enumerate() {
            if count > best_count {
                best = (col, ns);
                best_count = count;
            }
        }
    }

    let (col, ns) = best;
    let match_ratio = ratio(best_count, n_sampled);
    debug!(
        column = names[col],
        namespace = references[ns].namespace,
        ratio = match_ratio,
        "identifier column chosen from full scan"
    );
    Ok(IdColumnMatch {
        column: names[col].to_string(),
        namespace: references[ns].namespace.to_string(),
        match_ratio,
    })
}

/// Match ratio of a single named column against one namespace, using the
/// same sampling and normalization as [`find_id_column`].
pub fn column_match_ratio(
    table: &Table,
    column: &str,
    reference: &ReferenceSet<'_>,
    options: &DetectionOptions,
) -> Result<f64> {
    options.validate()?;
    let column = table
        .column(column)
        .ok_or_else(|| GeneRankError::MissingColumn(column.to_string()))?;
    let rows = sample_rows(table.n_rows(), options.sample_size, options.seed);
    let values = column_values(column, &rows, options.strip_version_suffix);
    Ok(ratio(overlap(&values, reference), rows.len()))
}

/// Run [`find_id_column`] once per organism and keep the best one.
///
/// Returns `None` when no organism reaches `match_threshold`. Ties go to the
/// organism listed first in the catalog.
pub fn find_id_column_across(
    table: &Table,
    catalog: &AnnotationCatalog,
    options: &DetectionOptions,
) -> Result<Option<OrganismMatch>> {
    let mut best: Option<OrganismMatch> = None;
    for index in catalog.iter() {
        let id_match = find_id_column(table, &index.reference_sets(), options)?;
        debug!(
            organism = %index.organism,
            column = %id_match.column,
            namespace = %id_match.namespace,
            ratio = id_match.match_ratio,
            "organism scored"
        );
        let better = best
            .as_ref()
            .map_or(true, |b| id_match.match_ratio > b.id_match.match_ratio);
        if better {
            best = Some(OrganismMatch {
                organism: index.organism.clone(),
                id_match,
            });
        }
    }

    Ok(best.filter(|b| b.id_match.match_ratio >= options.match_threshold))
}
