//! Rank vector construction from canonical tables.

use super::vector::{RankEntry, RankVector};
use crate::annotation::AnnotationCatalog;
use crate::data::Table;
use crate::detect::{strip_version_suffix, MetadataDescriptor, BASE_MEAN, ID, STAT};
use crate::error::{GeneRankError, Result};
use crate::normalize::normalize;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// What to do with rows whose statistic is missing or NaN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingStatPolicy {
    /// Drop the row before deduplication.
    Drop,
    /// Treat the statistic as 0.
    Zero,
}

/// Options for rank extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankOptions {
    /// Row cap applied after baseMean deduplication.
    pub max_genes: usize,
    pub missing_stat: MissingStatPolicy,
    /// Drop `.N` version suffixes from base-namespace IDs. Alternate IDs are
    /// looked up as given and retried without the suffix only on a miss.
    pub strip_version_suffix: bool,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            max_genes: 10_000,
            missing_stat: MissingStatPolicy::Drop,
            strip_version_suffix: true,
        }
    }
}

#[derive(Debug, Clone)]
struct RankRow {
    id: String,
    base_mean: f64,
    stat: f64,
}

/// Descending order with NaN last.
fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

fn keep_first_per_id(rows: Vec<RankRow>) -> Vec<RankRow> {
    let mut seen = HashSet::new();
    rows.into_iter().filter(|r| seen.insert(r.id.clone())).collect()
}

/// Build a rank vector from a canonical table.
///
/// IDs are remapped into the organism's base namespace (unmapped rows are
/// dropped), duplicates collapse to the row with the highest `baseMean`
/// (or highest `|stat|` when no `baseMean` column is resolved), infinite
/// statistics are clamped to the finite range, and the result is sorted by
/// value descending.
pub fn extract(
    canonical: &Table,
    descriptor: &MetadataDescriptor,
    catalog: &AnnotationCatalog,
    options: &RankOptions,
) -> Result<RankVector> {
    let organism = descriptor
        .organism()
        .ok_or(GeneRankError::Unresolved("organism"))?;
    let id_type = descriptor
        .id_type()
        .ok_or(GeneRankError::Unresolved("id_type"))?;
    if !descriptor.columns.id.is_present() {
        return Err(GeneRankError::Unresolved("ID"));
    }
    if !descriptor.columns.stat.is_present() {
        return Err(GeneRankError::Unresolved("stat"));
    }
    let index = catalog.require(organism)?;

    let ids = canonical.values(ID)?;
    let stats = canonical.values(STAT)?;
    let base_means = if descriptor.columns.base_mean.is_present() {
        Some(canonical.values(BASE_MEAN)?)
    } else {
        None
    };

    let mut rows = Vec::with_capacity(canonical.n_rows());
    let mut missing_stat = 0usize;
    for i in 0..canonical.n_rows() {
        let Some(id) = ids[i].to_text() else { continue };
        let stat = match stats[i].as_number().filter(|v| !v.is_nan()) {
            Some(v) => v,
            None => match options.missing_stat {
                MissingStatPolicy::Drop => {
                    missing_stat += 1;
                    continue;
                }
                MissingStatPolicy::Zero => 0.0,
            },
        };
        let base_mean = base_means
            .and_then(|bm| bm[i].as_number())
            .unwrap_or(f64::NAN);
        rows.push(RankRow { id, base_mean, stat });
    }
    if missing_stat > 0 {
        warn!(rows = missing_stat, "dropped rows with missing statistic");
    }

    if id_type == index.base_namespace {
        if options.strip_version_suffix {
            for row in rows.iter_mut() {
                row.id = strip_version_suffix(&row.id).into_owned();
            }
        }
    } else {
        let map = index
            .alternate(id_type)
            .ok_or_else(|| GeneRankError::UnknownNamespace {
                organism: organism.to_string(),
                namespace: id_type.to_string(),
            })?;
        // exact key first; the unversioned form only when that misses
        let lookup = |id: &str| {
            map.get(id).or_else(|| {
                if !options.strip_version_suffix {
                    return None;
                }
                match strip_version_suffix(id) {
                    Cow::Owned(stripped) => map.get(&stripped),
                    Cow::Borrowed(_) => None,
                }
            })
        };
        let before = rows.len();
        rows = rows
            .into_iter()
            .filter_map(|mut row| {
                lookup(&row.id).map(|base| {
                    row.id = base.clone();
                    row
                })
            })
            .collect();
        let dropped = before - rows.len();
        if dropped > 0 {
            warn!(
                rows = dropped,
                from = id_type,
                to = %index.base_namespace,
                "dropped rows without a base identifier"
            );
        }
    }

    let mut rows = if base_means.is_some() {
        rows.sort_by(|a, b| descending(a.base_mean, b.base_mean));
        let mut rows = keep_first_per_id(rows);
        rows.truncate(options.max_genes);
        rows
    } else {
        rows.sort_by(|a, b| descending(a.stat.abs(), b.stat.abs()));
        keep_first_per_id(rows)
    };
    debug!(genes = rows.len(), "deduplicated identifiers");

    clamp_infinite(&mut rows)?;

    rows.sort_by(|a, b| descending(a.stat, b.stat));
    let entries: Vec<RankEntry> = rows
        .into_iter()
        .map(|r| RankEntry { id: r.id, value: r.stat })
        .collect();

    info!(organism, genes = entries.len(), "built rank vector");
    Ok(RankVector::from_sorted(entries))
}

/// Replace `+inf` with the largest finite statistic and `-inf` with the
/// smallest, forcing the sign of the infinity it replaces.
///
/// This is not a plain max/min clamp when every finite value has the same
/// sign: the extreme is mirrored instead. With a single finite value `v > 0`,
/// `-inf` becomes `-v`; with finite values `{-5, -3}`, `+inf` becomes `3`
/// rather than `-3`. An infinity therefore never ranks on the wrong side of
/// zero.
fn clamp_infinite(rows: &mut [RankRow]) -> Result<()> {
    if !rows.iter().any(|r| r.stat.is_infinite()) {
        return Ok(());
    }
    let finite: Vec<f64> = rows
        .iter()
        .map(|r| r.stat)
        .filter(|v| v.is_finite())
        .collect();
    if finite.is_empty() {
        return Err(GeneRankError::EmptyData(
            "no finite statistic values to clamp infinities to".to_string(),
        ));
    }
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = if max > 0.0 { max } else { max.abs() };
    let min = if min < 0.0 { min } else { -min.abs() };
    for row in rows.iter_mut() {
        if row.stat == f64::INFINITY {
            row.stat = max;
        } else if row.stat == f64::NEG_INFINITY {
            row.stat = min;
        }
    }
    Ok(())
}

/// Normalize a raw table and build its rank vector.
pub fn extract_ranks(
    raw: &Table,
    descriptor: &MetadataDescriptor,
    catalog: &AnnotationCatalog,
    options: &RankOptions,
) -> Result<RankVector> {
    let canonical = normalize(raw, descriptor)?;
    extract(&canonical, descriptor, catalog, options)
}
