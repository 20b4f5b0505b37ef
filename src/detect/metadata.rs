//! Metadata resolution: which organism, identifier column and statistic
//! columns a differential expression table uses.

use super::column::{find_column, BASE_MEAN_ALIASES, STAT_ALIASES};
use super::id_column::{
    column_match_ratio, find_id_column, find_id_column_across, DetectionOptions, OrganismMatch,
};
use crate::annotation::AnnotationCatalog;
use crate::data::{RowView, Table, Value};
use crate::error::{GeneRankError, Result};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Canonical identifier column name.
pub const ID: &str = "ID";
/// Canonical expression-magnitude column name.
pub const BASE_MEAN: &str = "baseMean";
/// Canonical ranking statistic column name.
pub const STAT: &str = "stat";

/// Outcome of resolving one metadata field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution<T> {
    /// Given by the caller.
    Supplied(T),
    /// Found by detection.
    Detected(T),
    /// Detection ran but nothing was confident enough.
    Unresolved,
}

impl<T> Resolution<T> {
    /// The resolved value, however it was obtained.
    pub fn value(&self) -> Option<&T> {
        match self {
            Resolution::Supplied(v) | Resolution::Detected(v) => Some(v),
            Resolution::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Resolution::Unresolved)
    }
}

type DeriveFn = dyn Fn(&RowView<'_>) -> Value + Send + Sync;

/// A column computed from each row of the raw input table.
#[derive(Clone)]
pub struct DerivedColumn {
    label: String,
    func: Arc<DeriveFn>,
}

impl DerivedColumn {
    /// `label` describes the expression for logs and serialized descriptors.
    pub fn new<F>(label: impl Into<String>, func: F) -> Self
    where
        F: Fn(&RowView<'_>) -> Value + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            func: Arc::new(func),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Evaluate against one raw row.
    pub fn evaluate(&self, row: &RowView<'_>) -> Value {
        (self.func)(row)
    }
}

impl fmt::Debug for DerivedColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedColumn")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// How a canonical column is obtained from the raw table.
#[derive(Debug, Clone)]
pub enum ColumnSpec {
    /// Rename an existing source column.
    Rename(String),
    /// Compute from raw rows.
    Derived(DerivedColumn),
    /// Requested, but no matching column was found.
    Unresolved,
    /// Not requested by the caller.
    Omitted,
}

impl ColumnSpec {
    pub fn rename(source: impl Into<String>) -> Self {
        ColumnSpec::Rename(source.into())
    }

    /// Whether the canonical column will exist after normalization.
    pub fn is_present(&self) -> bool {
        matches!(self, ColumnSpec::Rename(_) | ColumnSpec::Derived(_))
    }

    /// Source column name for renames.
    pub fn source(&self) -> Option<&str> {
        match self {
            ColumnSpec::Rename(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for ColumnSpec {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ColumnSpec::Rename(a), ColumnSpec::Rename(b)) => a == b,
            (ColumnSpec::Derived(a), ColumnSpec::Derived(b)) => Arc::ptr_eq(&a.func, &b.func),
            (ColumnSpec::Unresolved, ColumnSpec::Unresolved) => true,
            (ColumnSpec::Omitted, ColumnSpec::Omitted) => true,
            _ => false,
        }
    }
}

impl Serialize for ColumnSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ColumnSpec::Rename(s) => serializer.serialize_newtype_variant("ColumnSpec", 0, "rename", s),
            ColumnSpec::Derived(d) => {
                serializer.serialize_newtype_variant("ColumnSpec", 1, "derived", &d.label)
            }
            ColumnSpec::Unresolved => serializer.serialize_unit_variant("ColumnSpec", 2, "unresolved"),
            ColumnSpec::Omitted => serializer.serialize_unit_variant("ColumnSpec", 3, "omitted"),
        }
    }
}

/// Column specs for the three canonical columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSpecs {
    #[serde(rename = "ID")]
    pub id: ColumnSpec,
    #[serde(rename = "baseMean")]
    pub base_mean: ColumnSpec,
    pub stat: ColumnSpec,
}

impl ColumnSpecs {
    /// Specs paired with their canonical names, in normalization order.
    pub fn targets(&self) -> [(&'static str, &ColumnSpec); 3] {
        [(ID, &self.id), (BASE_MEAN, &self.base_mean), (STAT, &self.stat)]
    }
}

/// Everything later stages need to know about a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataDescriptor {
    pub organism: Resolution<String>,
    pub id_type: Resolution<String>,
    pub columns: ColumnSpecs,
    /// Identifier match ratio when detection ran.
    pub match_ratio: Option<f64>,
}

impl MetadataDescriptor {
    /// Descriptor for a table that is already canonical.
    pub fn canonical(organism: impl Into<String>, id_type: impl Into<String>, has_base_mean: bool) -> Self {
        Self {
            organism: Resolution::Supplied(organism.into()),
            id_type: Resolution::Supplied(id_type.into()),
            columns: ColumnSpecs {
                id: ColumnSpec::rename(ID),
                base_mean: if has_base_mean {
                    ColumnSpec::rename(BASE_MEAN)
                } else {
                    ColumnSpec::Omitted
                },
                stat: ColumnSpec::rename(STAT),
            },
            match_ratio: None,
        }
    }

    /// Replace the ID spec.
    pub fn with_id(mut self, spec: ColumnSpec) -> Self {
        self.columns.id = spec;
        self
    }

    /// Replace the baseMean spec.
    pub fn with_base_mean(mut self, spec: ColumnSpec) -> Self {
        self.columns.base_mean = spec;
        self
    }

    /// Replace the stat spec.
    pub fn with_stat(mut self, spec: ColumnSpec) -> Self {
        self.columns.stat = spec;
        self
    }

    pub fn organism(&self) -> Option<&str> {
        self.organism.value().map(String::as_str)
    }

    pub fn id_type(&self) -> Option<&str> {
        self.id_type.value().map(String::as_str)
    }

    /// Names of fields that could not be resolved.
    pub fn unresolved_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if !self.organism.is_resolved() {
            fields.push("organism");
        }
        if !self.id_type.is_resolved() {
            fields.push("id_type");
        }
        for (name, spec) in self.columns.targets() {
            if matches!(spec, ColumnSpec::Unresolved) {
                fields.push(name);
            }
        }
        fields
    }

    /// Whether a rank vector can be built from this descriptor.
    pub fn is_rankable(&self) -> bool {
        self.organism.is_resolved()
            && self.id_type.is_resolved()
            && self.columns.id.is_present()
            && self.columns.stat.is_present()
    }
}

/// Caller-supplied values that bypass detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataOverrides {
    pub organism: Option<String>,
    /// Must be given together with `id_type`.
    pub id_column: Option<String>,
    /// Must be given together with `id_column`.
    pub id_type: Option<String>,
    pub base_mean_column: Option<String>,
    pub stat_column: Option<String>,
    /// Do not look for a baseMean column at all.
    pub skip_base_mean: bool,
}

impl MetadataOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn organism(mut self, organism: impl Into<String>) -> Self {
        self.organism = Some(organism.into());
        self
    }

    /// Set the identifier column together with its namespace.
    pub fn id(mut self, column: impl Into<String>, id_type: impl Into<String>) -> Self {
        self.id_column = Some(column.into());
        self.id_type = Some(id_type.into());
        self
    }

    pub fn base_mean_column(mut self, column: impl Into<String>) -> Self {
        self.base_mean_column = Some(column.into());
        self
    }

    pub fn stat_column(mut self, column: impl Into<String>) -> Self {
        self.stat_column = Some(column.into());
        self
    }

    pub fn skip_base_mean(mut self) -> Self {
        self.skip_base_mean = true;
        self
    }
}

fn require_column(table: &Table, column: &str) -> Result<ColumnSpec> {
    if table.has_column(column) {
        Ok(ColumnSpec::rename(column))
    } else {
        Err(GeneRankError::MissingColumn(column.to_string()))
    }
}

fn resolve_alias_column(
    table: &Table,
    supplied: Option<&str>,
    aliases: &[&str],
) -> Result<ColumnSpec> {
    match supplied {
        Some(column) => require_column(table, column),
        None => Ok(find_column(table, aliases)
            .map(ColumnSpec::rename)
            .unwrap_or(ColumnSpec::Unresolved)),
    }
}

/// Organism whose `id_type` namespace best matches a known column.
fn detect_organism_for_column(
    table: &Table,
    catalog: &AnnotationCatalog,
    column: &str,
    id_type: &str,
    options: &DetectionOptions,
) -> Result<Option<(String, f64)>> {
    let mut best: Option<(String, f64)> = None;
    for index in catalog.iter() {
        let sets = index.reference_sets();
        let Some(reference) = sets.iter().find(|s| s.namespace == id_type) else {
            continue;
        };
        let ratio = column_match_ratio(table, column, reference, options)?;
        if best.as_ref().map_or(true, |(_, r)| ratio > *r) {
            best = Some((index.organism.clone(), ratio));
        }
    }
    Ok(best.filter(|(_, r)| *r >= options.match_threshold))
}

/// Resolve organism, identifier column/type and statistic columns.
///
/// `id_column` and `id_type` overrides must be given together. Without them
/// the identifier column is detected across every organism in `catalog`
/// (or only the supplied organism). Fields that cannot be resolved are
/// reported as `Unresolved` rather than as errors.
pub fn resolve_metadata(
    table: &Table,
    catalog: &AnnotationCatalog,
    overrides: &MetadataOverrides,
    options: &DetectionOptions,
) -> Result<MetadataDescriptor> {
    if table.n_columns() == 0 {
        return Err(GeneRankError::InvalidInput("table has no columns".to_string()));
    }

    let (organism, id_type, id_spec, match_ratio) =
        match (&overrides.id_column, &overrides.id_type) {
            (Some(column), Some(id_type)) => {
                let id_spec = require_column(table, column)?;
                let (organism, ratio) = match &overrides.organism {
                    Some(organism) => {
                        let index = catalog.require(organism)?;
                        if !index.has_namespace(id_type) {
                            warn!(%organism, %id_type, "namespace not present in reference index");
                        }
                        (Resolution::Supplied(organism.clone()), None)
                    }
                    None => match detect_organism_for_column(table, catalog, column, id_type, options)? {
                        Some((organism, ratio)) => (Resolution::Detected(organism), Some(ratio)),
                        None => (Resolution::Unresolved, None),
                    },
                };
                (organism, Resolution::Supplied(id_type.clone()), id_spec, ratio)
            }
            (None, None) => {
                let found: Option<OrganismMatch> = match &overrides.organism {
                    Some(organism) => {
                        let index = catalog.require(organism)?;
                        let m = find_id_column(table, &index.reference_sets(), options)?;
                        (m.match_ratio >= options.match_threshold).then(|| OrganismMatch {
                            organism: organism.clone(),
                            id_match: m,
                        })
                    }
                    None => find_id_column_across(table, catalog, options)?,
                };
                let organism_resolution = |name: String| match &overrides.organism {
                    Some(_) => Resolution::Supplied(name),
                    None => Resolution::Detected(name),
                };
                match found {
                    Some(m) => (
                        organism_resolution(m.organism),
                        Resolution::Detected(m.id_match.namespace),
                        ColumnSpec::Rename(m.id_match.column),
                        Some(m.id_match.match_ratio),
                    ),
                    None => {
                        warn!("no identifier column matched any reference index confidently");
                        let organism = match &overrides.organism {
                            Some(o) => Resolution::Supplied(o.clone()),
                            None => Resolution::Unresolved,
                        };
                        (organism, Resolution::Unresolved, ColumnSpec::Unresolved, None)
                    }
                }
            }
            _ => {
                return Err(GeneRankError::InvalidArgument(
                    "id_column and id_type must be supplied together; partial override not allowed"
                        .to_string(),
                ))
            }
        };

    let base_mean = if overrides.skip_base_mean {
        ColumnSpec::Omitted
    } else {
        resolve_alias_column(table, overrides.base_mean_column.as_deref(), BASE_MEAN_ALIASES)?
    };
    let stat = resolve_alias_column(table, overrides.stat_column.as_deref(), STAT_ALIASES)?;

    let descriptor = MetadataDescriptor {
        organism,
        id_type,
        columns: ColumnSpecs {
            id: id_spec,
            base_mean,
            stat,
        },
        match_ratio,
    };

    info!(
        organism = descriptor.organism().unwrap_or("unresolved"),
        id_type = descriptor.id_type().unwrap_or("unresolved"),
        id_column = descriptor.columns.id.source().unwrap_or("unresolved"),
        base_mean = descriptor.columns.base_mean.source().unwrap_or("-"),
        stat = descriptor.columns.stat.source().unwrap_or("-"),
        "resolved table metadata"
    );
    Ok(descriptor)
}
