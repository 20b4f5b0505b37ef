//! Pipeline runner: detect metadata, normalize, and build the rank vector.

use crate::annotation::AnnotationCatalog;
use crate::data::Table;
use crate::detect::{resolve_metadata, DetectionOptions, MetadataDescriptor, MetadataOverrides};
use crate::error::{GeneRankError, Result};
use crate::normalize::normalize;
use crate::rank::{extract, MissingStatPolicy, RankOptions, RankVector};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Pipeline configuration for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankConfig {
    /// Name of the pipeline.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub detection: DetectionOptions,
    #[serde(default)]
    pub ranking: RankOptions,
    #[serde(default)]
    pub overrides: MetadataOverrides,
}

impl RankConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(GeneRankError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(GeneRankError::from)
    }
}

/// Everything produced by one pipeline run.
#[derive(Debug, Clone)]
pub struct RankOutcome {
    pub descriptor: MetadataDescriptor,
    pub canonical: Table,
    pub ranks: RankVector,
}

/// Builder for detection + ranking runs.
#[derive(Debug, Clone)]
pub struct RankPipeline {
    name: String,
    detection: DetectionOptions,
    ranking: RankOptions,
    overrides: MetadataOverrides,
}

impl Default for RankPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl RankPipeline {
    /// Create a pipeline with default options and no overrides.
    pub fn new() -> Self {
        Self {
            name: "unnamed".to_string(),
            detection: DetectionOptions::default(),
            ranking: RankOptions::default(),
            overrides: MetadataOverrides::default(),
        }
    }

    /// Create from a config.
    pub fn from_config(config: &RankConfig) -> Self {
        Self {
            name: config.name.clone(),
            detection: config.detection.clone(),
            ranking: config.ranking.clone(),
            overrides: config.overrides.clone(),
        }
    }

    /// Set the pipeline name.
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Restrict detection to one organism.
    pub fn organism(mut self, organism: &str) -> Self {
        self.overrides.organism = Some(organism.to_string());
        self
    }

    /// Skip identifier detection: use this column and namespace.
    pub fn id_column(mut self, column: &str, id_type: &str) -> Self {
        self.overrides.id_column = Some(column.to_string());
        self.overrides.id_type = Some(id_type.to_string());
        self
    }

    pub fn base_mean_column(mut self, column: &str) -> Self {
        self.overrides.base_mean_column = Some(column.to_string());
        self
    }

    pub fn stat_column(mut self, column: &str) -> Self {
        self.overrides.stat_column = Some(column.to_string());
        self
    }

    /// Deduplicate by `|stat|` even if a baseMean column exists.
    pub fn skip_base_mean(mut self) -> Self {
        self.overrides.skip_base_mean = true;
        self
    }

    pub fn detection(mut self, options: DetectionOptions) -> Self {
        self.detection = options;
        self
    }

    /// Rows sampled for identifier detection.
    pub fn sample_size(mut self, sample_size: usize) -> Self {
        self.detection = self.detection.with_sample_size(sample_size);
        self
    }

    pub fn match_threshold(mut self, threshold: f64) -> Self {
        self.detection = self.detection.with_match_threshold(threshold);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.detection = self.detection.with_seed(seed);
        self
    }

    pub fn max_genes(mut self, max_genes: usize) -> Self {
        self.ranking.max_genes = max_genes;
        self
    }

    pub fn missing_stat(mut self, policy: MissingStatPolicy) -> Self {
        self.ranking.missing_stat = policy;
        self
    }

    /// Convert to config for serialization.
    pub fn to_config(&self, description: Option<&str>) -> RankConfig {
        RankConfig {
            name: self.name.clone(),
            description: description.map(String::from),
            detection: self.detection.clone(),
            ranking: self.ranking.clone(),
            overrides: self.overrides.clone(),
        }
    }

    /// Resolve metadata only.
    pub fn detect(&self, table: &Table, catalog: &AnnotationCatalog) -> Result<MetadataDescriptor> {
        resolve_metadata(table, catalog, &self.overrides, &self.detection)
    }

    /// Run detection, normalization and rank extraction.
    ///
    /// Fails with `Unresolved` when detection leaves a field the rank vector
    /// needs unresolved.
    pub fn run(&self, table: &Table, catalog: &AnnotationCatalog) -> Result<RankOutcome> {
        let descriptor = self.detect(table, catalog)?;
        if let Some(field) = descriptor
            .unresolved_fields()
            .into_iter()
            .find(|f| *f != "baseMean")
        {
            return Err(GeneRankError::Unresolved(field));
        }

        let canonical = normalize(table, &descriptor)?;
        let ranks = extract(&canonical, &descriptor, catalog, &self.ranking)?;
        info!(pipeline = %self.name, genes = ranks.len(), "pipeline finished");

        Ok(RankOutcome {
            descriptor,
            canonical,
            ranks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::ReferenceAnnotationIndex;
    use crate::data::Column;
    use crate::detect::Resolution;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn catalog() -> AnnotationCatalog {
        AnnotationCatalog::new().with(
            ReferenceAnnotationIndex::new("human", "ENSEMBL", ["ENSG1", "ENSG2", "ENSG3"])
                .with_alternate("SYMBOL", [("TP53", "ENSG1"), ("EGFR", "ENSG2"), ("MYC", "ENSG3")]),
        )
    }

    fn create_test_table() -> Table {
        Table::new(vec![
            Column::text("symbol", &["TP53", "EGFR", "MYC", "TP53"]),
            Column::numeric("AveExpr", &[8.0, 5.0, 7.0, 2.0]),
            Column::numeric("logFC", &[1.0, -2.0, 0.5, 4.0]),
            Column::numeric("t", &[3.0, -6.0, 1.0, 9.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_pipeline_builder() {
        let pipeline = RankPipeline::new()
            .name("test")
            .organism("human")
            .stat_column("logFC")
            .max_genes(500);

        let config = pipeline.to_config(Some("Test pipeline"));
        assert_eq!(config.name, "test");
        assert_eq!(config.ranking.max_genes, 500);
        assert_eq!(config.overrides.stat_column.as_deref(), Some("logFC"));
    }

    #[test]
    fn test_pipeline_run() {
        let outcome = RankPipeline::new().run(&create_test_table(), &catalog()).unwrap();

        assert_eq!(outcome.descriptor.id_type, Resolution::Detected("SYMBOL".to_string()));
        assert_eq!(outcome.canonical.column_names(), vec!["ID", "baseMean", "logFC", "stat"]);
        // TP53 keeps the AveExpr=8 row (t=3), not the t=9 duplicate
        assert_eq!(outcome.ranks.ids(), vec!["ENSG1", "ENSG3", "ENSG2"]);
        assert_eq!(outcome.ranks.get("ENSG1"), Some(3.0));
    }

    #[test]
    fn test_pipeline_unresolved_fails() {
        let table = Table::new(vec![
            Column::text("gene", &["a", "b"]),
            Column::numeric("t", &[1.0, 2.0]),
        ])
        .unwrap();
        let result = RankPipeline::new().run(&table, &catalog());
        assert!(matches!(result, Err(GeneRankError::Unresolved("organism"))));
    }

    #[test]
    fn test_config_yaml() {
        let pipeline = RankPipeline::new()
            .name("limma")
            .skip_base_mean()
            .missing_stat(MissingStatPolicy::Zero)
            .sample_size(250)
            .match_threshold(0.8)
            .seed(7);
        let yaml = pipeline.to_config(None).to_yaml().unwrap();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", yaml).unwrap();
        file.flush().unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        let config = RankConfig::from_yaml(&text).unwrap();
        assert_eq!(config, pipeline.to_config(None));
        assert_eq!(config.detection.sample_size, 250);
        assert_eq!(config.detection.seed, 7);
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config = RankConfig::from_yaml("name: minimal\n").unwrap();
        assert_eq!(config.detection, DetectionOptions::default());
        assert_eq!(config.ranking, RankOptions::default());
        assert!(config.overrides.organism.is_none());
    }
}
