//! Ranked per-gene statistics.

use crate::annotation::ReferenceAnnotationIndex;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One gene in a rank vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    /// Base-namespace identifier.
    pub id: String,
    pub value: f64,
}

/// Finite per-gene statistics, one entry per ID, sorted by value descending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankVector {
    entries: Vec<RankEntry>,
}

impl RankVector {
    /// Wrap entries that are already deduplicated, finite and sorted.
    pub(crate) fn from_sorted(entries: Vec<RankEntry>) -> Self {
        Self { entries }
    }

    /// Number of genes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in rank order.
    pub fn entries(&self) -> &[RankEntry] {
        &self.entries
    }

    /// IDs in rank order.
    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.id.as_str()).collect()
    }

    /// Values in rank order.
    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.value).collect()
    }

    /// Value for a gene.
    pub fn get(&self, id: &str) -> Option<f64> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.value)
    }

    /// The `n` highest-ranked entries.
    pub fn top(&self, n: usize) -> &[RankEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    /// Entries paired with display names from the index.
    pub fn with_gene_names<'a>(
        &'a self,
        index: &'a ReferenceAnnotationIndex,
    ) -> Vec<(&'a str, Option<&'a str>, f64)> {
        self.entries
            .iter()
            .map(|e| (e.id.as_str(), index.gene_name(&e.id), e.value))
            .collect()
    }

    /// Write as TSV (`id`, optional `name`, `value`).
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P, names: Option<&ReferenceAnnotationIndex>) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        match names {
            Some(index) => {
                writeln!(writer, "id\tname\tvalue")?;
                for (id, name, value) in self.with_gene_names(index) {
                    writeln!(writer, "{}\t{}\t{}", id, name.unwrap_or(""), value)?;
                }
            }
            None => {
                writeln!(writer, "id\tvalue")?;
                for e in &self.entries {
                    writeln!(writer, "{}\t{}", e.id, e.value)?;
                }
            }
        }

        Ok(())
    }
}

impl<'a> IntoIterator for &'a RankVector {
    type Item = &'a RankEntry;
    type IntoIter = std::slice::Iter<'a, RankEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
