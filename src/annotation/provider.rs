//! Construction of reference indexes from a keyed gene annotation source.

use super::index::ReferenceAnnotationIndex;
use crate::error::{GeneRankError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// A keyed gene annotation source.
///
/// `map_ids` returns one row per (key, target) pair and may contain rows with
/// a missing target; index construction drops those.
pub trait AnnotationProvider {
    /// All keys of a namespace.
    fn keys(&self, namespace: &str) -> Result<Vec<String>>;

    /// Map keys of `from` to IDs of `to`. Keys without a counterpart yield
    /// `(key, None)`.
    fn map_ids(&self, keys: &[String], from: &str, to: &str) -> Result<Vec<(String, Option<String>)>>;

    /// Map keys of `namespace` to display names found in `name_namespace`.
    fn display_names(
        &self,
        keys: &[String],
        namespace: &str,
        name_namespace: &str,
    ) -> Result<Vec<(String, Option<String>)>> {
        self.map_ids(keys, namespace, name_namespace)
    }
}

/// Recipe for building one organism's [`ReferenceAnnotationIndex`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexBuilder {
    pub organism: String,
    pub base_namespace: String,
    /// Namespace holding display names (e.g. `SYMBOL`).
    pub name_namespace: Option<String>,
    /// Alternate namespaces to map into the base namespace, in order.
    pub alternates: Vec<String>,
}

impl IndexBuilder {
    pub fn new(organism: impl Into<String>, base_namespace: impl Into<String>) -> Self {
        Self {
            organism: organism.into(),
            base_namespace: base_namespace.into(),
            name_namespace: None,
            alternates: Vec::new(),
        }
    }

    /// Set the namespace used for display names.
    pub fn names_from(mut self, namespace: impl Into<String>) -> Self {
        self.name_namespace = Some(namespace.into());
        self
    }

    /// Add an alternate namespace.
    pub fn alternate(mut self, namespace: impl Into<String>) -> Self {
        self.alternates.push(namespace.into());
        self
    }

    /// Query the provider and assemble the index.
    pub fn build<P: AnnotationProvider + ?Sized>(&self, provider: &P) -> Result<ReferenceAnnotationIndex> {
        let keys = provider.keys(&self.base_namespace)?;
        let mut index = ReferenceAnnotationIndex::new(&self.organism, &self.base_namespace, keys);
        if index.base_ids.is_empty() {
            return Err(GeneRankError::EmptyData(format!(
                "no {} keys for {}",
                self.base_namespace, self.organism
            )));
        }

        if let Some(name_ns) = &self.name_namespace {
            let mut names = HashMap::new();
            for (key, name) in provider.display_names(&index.base_ids, &self.base_namespace, name_ns)? {
                if let Some(name) = name {
                    names.entry(key).or_insert(name);
                }
            }
            index.gene_names = names;
        }

        for alt in &self.alternates {
            let pairs = provider
                .map_ids(&index.base_ids, &self.base_namespace, alt)?
                .into_iter()
                .filter_map(|(base, alt_id)| alt_id.map(|a| (a, base)));
            let collisions = index.add_alternate(alt, pairs);
            if collisions > 0 {
                warn!(
                    organism = %self.organism,
                    namespace = %alt,
                    collisions,
                    "alternate IDs map to several base IDs; keeping the last"
                );
            }
        }

        debug!(
            organism = %index.organism,
            base_ids = index.base_ids.len(),
            alternates = index.alternates.len(),
            "built reference index"
        );
        Ok(index)
    }
}

/// Annotation provider backed by a delimited file with one column per
/// namespace and one row per gene record.
#[derive(Debug, Clone)]
pub struct TsvAnnotationProvider {
    namespaces: Vec<String>,
    records: Vec<Vec<Option<String>>>,
}

impl TsvAnnotationProvider {
    /// Load from a tab-separated file.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(File::open(path)?, b'\t')
    }

    /// Load from any delimited reader with a header row.
    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_reader(reader);
        let namespaces: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|s| s.trim().to_string())
            .collect();

        let mut records = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            records.push(
                record
                    .iter()
                    .map(|f| {
                        let f = f.trim();
                        if f.is_empty() || f == "NA" {
                            None
                        } else {
                            Some(f.to_string())
                        }
                    })
                    .collect(),
            );
        }
        if records.is_empty() {
            return Err(GeneRankError::EmptyData("annotation file has no records".to_string()));
        }

        Ok(Self { namespaces, records })
    }

    /// Namespaces available in the file.
    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    fn column(&self, namespace: &str) -> Result<usize> {
        self.namespaces
            .iter()
            .position(|n| n == namespace)
            .ok_or_else(|| GeneRankError::MissingColumn(namespace.to_string()))
    }
}

impl AnnotationProvider for TsvAnnotationProvider {
    fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        let col = self.column(namespace)?;
        let mut seen = HashSet::new();
        Ok(self
            .records
            .iter()
            .filter_map(|r| r.get(col).cloned().flatten())
            .filter(|k| seen.insert(k.clone()))
            .collect())
    }

    fn map_ids(&self, keys: &[String], from: &str, to: &str) -> Result<Vec<(String, Option<String>)>> {
        let from_col = self.column(from)?;
        let to_col = self.column(to)?;

        let mut by_key: HashMap<&str, Vec<Option<&str>>> = HashMap::new();
        for record in &self.records {
            if let Some(Some(key)) = record.get(from_col) {
                let target = record.get(to_col).and_then(|t| t.as_deref());
                by_key.entry(key.as_str()).or_default().push(target);
            }
        }

        let mut rows = Vec::with_capacity(keys.len());
        for key in keys {
            match by_key.get(key.as_str()) {
                Some(targets) => {
                    rows.extend(
                        targets
                            .iter()
                            .map(|t| (key.clone(), t.map(str::to_string))),
                    );
                }
                None => rows.push((key.clone(), None)),
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANNOTATION: &str = "\
ENSEMBL\tSYMBOL\tENTREZID
ENSG01\tTP53\t7157
ENSG02\tEGFR\t1956
ENSG03\t\t9999
ENSG04\tMYC\tNA
ENSG02\tEGFR\t1957
";

    fn provider() -> TsvAnnotationProvider {
        TsvAnnotationProvider::from_reader(ANNOTATION.as_bytes(), b'\t').unwrap()
    }

    #[test]
    fn test_keys_distinct_in_order() {
        let keys = provider().keys("ENSEMBL").unwrap();
        assert_eq!(keys, vec!["ENSG01", "ENSG02", "ENSG03", "ENSG04"]);
    }

    #[test]
    fn test_map_ids_keeps_missing_rows() {
        let keys = vec!["ENSG04".to_string(), "ENSG99".to_string()];
        let rows = provider().map_ids(&keys, "ENSEMBL", "ENTREZID").unwrap();
        assert_eq!(
            rows,
            vec![("ENSG04".to_string(), None), ("ENSG99".to_string(), None)]
        );
    }

    #[test]
    fn test_build_index_drops_missing_mappings() {
        let index = IndexBuilder::new("human", "ENSEMBL")
            .names_from("SYMBOL")
            .alternate("SYMBOL")
            .alternate("ENTREZID")
            .build(&provider())
            .unwrap();

        assert_eq!(index.base_ids.len(), 4);
        assert_eq!(index.gene_name("ENSG01"), Some("TP53"));
        assert_eq!(index.gene_name("ENSG03"), None);

        let symbols = index.alternate("SYMBOL").unwrap();
        assert_eq!(symbols.len(), 3);
        assert_eq!(symbols.get("MYC").map(String::as_str), Some("ENSG04"));

        let entrez = index.alternate("ENTREZID").unwrap();
        assert_eq!(entrez.len(), 4);
        assert_eq!(entrez.get("1957").map(String::as_str), Some("ENSG02"));
        assert!(!entrez.contains_key("NA"));
    }

    #[test]
    fn test_unknown_namespace_fails() {
        let result = IndexBuilder::new("human", "REFSEQ").build(&provider());
        assert!(matches!(result, Err(GeneRankError::MissingColumn(_))));
    }
}
