//! Per-organism reference annotation index.

use crate::error::{GeneRankError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Mapping from one alternate identifier namespace into the base namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternateNamespace {
    /// Namespace name (e.g. `SYMBOL`, `ENTREZID`).
    pub name: String,
    /// Alternate ID -> base ID.
    pub to_base: HashMap<String, String>,
}

/// Precomputed gene annotation for one organism.
///
/// All alternate namespaces map into `base_namespace`; `base_ids` are the
/// canonical gene keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceAnnotationIndex {
    /// Organism name (e.g. `Homo sapiens`).
    pub organism: String,
    /// Name of the namespace the index is keyed by.
    pub base_namespace: String,
    /// Canonical gene keys, unique, in construction order.
    pub base_ids: Vec<String>,
    /// Base ID -> display name.
    #[serde(default)]
    pub gene_names: HashMap<String, String>,
    /// Alternate namespaces in construction order.
    #[serde(default)]
    pub alternates: Vec<AlternateNamespace>,
}

impl ReferenceAnnotationIndex {
    /// Create an index with the given base IDs. Duplicate IDs are dropped,
    /// keeping the first occurrence.
    pub fn new<I, S>(organism: impl Into<String>, base_namespace: impl Into<String>, base_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let base_ids = base_ids
            .into_iter()
            .map(Into::into)
            .filter(|id: &String| seen.insert(id.clone()))
            .collect();
        Self {
            organism: organism.into(),
            base_namespace: base_namespace.into(),
            base_ids,
            gene_names: HashMap::new(),
            alternates: Vec::new(),
        }
    }

    /// Attach display names for base IDs.
    pub fn with_gene_names<I, K, V>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.gene_names
            .extend(names.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add (or extend) an alternate namespace from `(alternate_id, base_id)`
    /// pairs. Later pairs overwrite earlier ones for the same alternate ID.
    ///
    /// Returns the number of alternate IDs that were reassigned to a
    /// different base ID.
    pub fn add_alternate<I, K, V>(&mut self, namespace: &str, pairs: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let idx = match self.alternates.iter().position(|a| a.name == namespace) {
            Some(idx) => idx,
            None => {
                self.alternates.push(AlternateNamespace {
                    name: namespace.to_string(),
                    to_base: HashMap::new(),
                });
                self.alternates.len() - 1
            }
        };
        let map = &mut self.alternates[idx].to_base;
        let mut collisions = 0;
        for (alt, base) in pairs {
            let base = base.into();
            if let Some(prev) = map.insert(alt.into(), base.clone()) {
                if prev != base {
                    collisions += 1;
                }
            }
        }
        collisions
    }

    /// Builder-style variant of [`add_alternate`](Self::add_alternate).
    pub fn with_alternate<I, K, V>(mut self, namespace: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.add_alternate(namespace, pairs);
        self
    }

    /// Alternate ID -> base ID map for a namespace.
    pub fn alternate(&self, namespace: &str) -> Option<&HashMap<String, String>> {
        self.alternates
            .iter()
            .find(|a| a.name == namespace)
            .map(|a| &a.to_base)
    }

    /// All namespace names, base first.
    pub fn namespaces(&self) -> Vec<&str> {
        std::iter::once(self.base_namespace.as_str())
            .chain(self.alternates.iter().map(|a| a.name.as_str()))
            .collect()
    }

    /// Check whether the index knows a namespace.
    pub fn has_namespace(&self, namespace: &str) -> bool {
        namespace == self.base_namespace || self.alternate(namespace).is_some()
    }

    /// Display name for a base ID.
    pub fn gene_name(&self, base_id: &str) -> Option<&str> {
        self.gene_names.get(base_id).map(String::as_str)
    }

    /// Reference ID collections for detection: the base namespace first,
    /// then every alternate namespace in order.
    pub fn reference_sets(&self) -> Vec<ReferenceSet<'_>> {
        let mut sets = Vec::with_capacity(1 + self.alternates.len());
        sets.push(ReferenceSet::new(
            &self.base_namespace,
            self.base_ids.iter().map(String::as_str),
        ));
        for alt in &self.alternates {
            sets.push(ReferenceSet::new(
                &alt.name,
                alt.to_base.keys().map(String::as_str),
            ));
        }
        sets
    }
}

/// A borrowed identifier collection for one namespace.
#[derive(Debug, Clone)]
pub struct ReferenceSet<'a> {
    pub namespace: &'a str,
    pub ids: HashSet<&'a str>,
}

impl<'a> ReferenceSet<'a> {
    pub fn new<I>(namespace: &'a str, ids: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self {
            namespace,
            ids: ids.into_iter().collect(),
        }
    }
}

/// Ordered collection of reference indexes, one per organism.
///
/// Order matters: it is the tie-break order when several organisms score
/// equally during detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationCatalog {
    indexes: Vec<ReferenceAnnotationIndex>,
}

impl AnnotationCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an index, replacing any existing index for the same organism
    /// in place.
    pub fn insert(&mut self, index: ReferenceAnnotationIndex) {
        match self.indexes.iter().position(|i| i.organism == index.organism) {
            Some(pos) => self.indexes[pos] = index,
            None => self.indexes.push(index),
        }
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with(mut self, index: ReferenceAnnotationIndex) -> Self {
        self.insert(index);
        self
    }

    /// Index for an organism.
    pub fn get(&self, organism: &str) -> Option<&ReferenceAnnotationIndex> {
        self.indexes.iter().find(|i| i.organism == organism)
    }

    /// Index for an organism, or an `UnknownOrganism` error.
    pub fn require(&self, organism: &str) -> Result<&ReferenceAnnotationIndex> {
        self.get(organism)
            .ok_or_else(|| GeneRankError::UnknownOrganism(organism.to_string()))
    }

    /// Organism names in order.
    pub fn organisms(&self) -> Vec<&str> {
        self.indexes.iter().map(|i| i.organism.as_str()).collect()
    }

    /// Iterate over indexes in order.
    pub fn iter(&self) -> impl Iterator<Item = &ReferenceAnnotationIndex> {
        self.indexes.iter()
    }

    /// Number of organisms.
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Load from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(GeneRankError::from)
    }

    /// Save to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(GeneRankError::from)
    }

    /// Load from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(GeneRankError::from)
    }

    /// Save to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(GeneRankError::from)
    }

    /// Load a catalog or a single index from a `.json`, `.yaml` or `.yml`
    /// file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            Self::from_yaml(&text).or_else(|_| -> Result<Self> {
                let index: ReferenceAnnotationIndex = serde_yaml::from_str(&text)?;
                Ok(Self::new().with(index))
            })
        } else {
            Self::from_json(&text).or_else(|_| -> Result<Self> {
                let index: ReferenceAnnotationIndex = serde_json::from_str(&text)?;
                Ok(Self::new().with(index))
            })
        }
    }

    /// Merge several catalog files, in order.
    pub fn load_all<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut catalog = Self::new();
        for path in paths {
            for index in Self::load(path)?.indexes {
                catalog.insert(index);
            }
        }
        Ok(catalog)
    }
}

impl FromIterator<ReferenceAnnotationIndex> for AnnotationCatalog {
    fn from_iter<T: IntoIterator<Item = ReferenceAnnotationIndex>>(iter: T) -> Self {
        let mut catalog = Self::new();
        for index in iter {
            catalog.insert(index);
        }
        catalog
    }
}
