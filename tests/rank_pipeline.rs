//! Integration tests for detection and rank vector construction.

use approx::assert_relative_eq;
use generank::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

const HUMAN_ANNOTATION: &str = "\
ENSEMBL\tSYMBOL\tENTREZID
ENSG00000141510\tTP53\t7157
ENSG00000146648\tEGFR\t1956
ENSG00000136997\tMYC\t4609
ENSG00000133703\tKRAS\t3845
ENSG00000012048\tBRCA1\t672
ENSG00000139618\tBRCA2\t675
ENSG00000171862\tPTEN\t5728
ENSG00000105810\tCDK6\t1021
ENSG00000111640\tGAPDH\t2597
ENSG00000075624\tACTB\t60
";

const MOUSE_ANNOTATION: &str = "\
ENSEMBL\tSYMBOL
ENSMUSG00000059552\tTrp53
ENSMUSG00000020122\tEgfr
ENSMUSG00000022346\tMyc
ENSMUSG00000030265\tKras
ENSMUSG00000029580\tActb
";

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file.flush().unwrap();
    file
}

fn build_index(annotation: &str, organism: &str, alternates: &[&str]) -> ReferenceAnnotationIndex {
    let file = write_temp(annotation);
    let provider = TsvAnnotationProvider::from_tsv(file.path()).unwrap();
    alternates
        .iter()
        .fold(IndexBuilder::new(organism, "ENSEMBL").names_from("SYMBOL"), |b, ns| {
            b.alternate(*ns)
        })
        .build(&provider)
        .unwrap()
}

fn catalog() -> AnnotationCatalog {
    AnnotationCatalog::new()
        .with(build_index(HUMAN_ANNOTATION, "human", &["SYMBOL", "ENTREZID"]))
        .with(build_index(MOUSE_ANNOTATION, "mouse", &["SYMBOL"]))
}

/// DESeq2-style results keyed by gene symbol.
const DESEQ_RESULTS: &str = "\
gene_symbol\tbaseMean\tlog2FoldChange\tlfcSE\tstat\tpvalue\tpadj
TP53\t500\t2.0\t0.3\t6.0\t0.0001\t0.001
EGFR\t300\t-1.5\t0.4\t-4.0\t0.001\t0.01
MYC\t800\t1.0\t0.3\t3.0\t0.01\t0.05
KRAS\t120\t0.3\t0.4\t0.8\t0.4\t0.6
BRCA1\t50\t-0.2\t0.4\t-0.5\t0.6\t0.8
BRCA2\t40\t0.1\t0.5\tNA\tNA\tNA
PTEN\t90\t-2.5\t0.3\t-Inf\t0\t0
CDK6\t200\t1.2\t0.3\tInf\t0\t0
GAPDH\t10000\t0.0\t0.1\t0.1\t0.9\t0.95
TP53\t20\t5.0\t1.0\t12.0\t0.0001\t0.001
LINC01234\t30\t1.0\t0.8\t2.0\t0.2\t0.4
";

#[test]
fn test_deseq_table_end_to_end() {
    let catalog = catalog();
    let catalog_file = write_temp(&catalog.to_json().unwrap());
    let catalog = AnnotationCatalog::load(catalog_file.path()).unwrap();
    assert_eq!(catalog.organisms(), vec!["human", "mouse"]);

    let table_file = write_temp(DESEQ_RESULTS);
    let table = Table::from_tsv(table_file.path()).unwrap();

    let outcome = RankPipeline::new().name("deseq").run(&table, &catalog).unwrap();

    let d = &outcome.descriptor;
    assert_eq!(d.organism, Resolution::Detected("human".to_string()));
    assert_eq!(d.id_type, Resolution::Detected("SYMBOL".to_string()));
    assert_eq!(d.columns.id, ColumnSpec::rename("gene_symbol"));
    // 9 distinct known symbols over 11 sampled rows
    assert_relative_eq!(d.match_ratio.unwrap(), 9.0 / 11.0, epsilon = 1e-12);

    assert_eq!(
        outcome.canonical.column_names(),
        vec!["ID", "baseMean", "log2FoldChange", "lfcSE", "stat", "pvalue", "padj"]
    );

    // BRCA2 (NA stat) and LINC01234 (unmapped) dropped; TP53 keeps baseMean 500 row
    let ranks = &outcome.ranks;
    assert_eq!(ranks.len(), 8);
    assert_eq!(
        ranks.ids(),
        vec![
            "ENSG00000141510", // TP53 6
            "ENSG00000105810", // CDK6 +Inf -> 6
            "ENSG00000136997", // MYC 3
            "ENSG00000133703", // KRAS 0.8
            "ENSG00000111640", // GAPDH 0.1
            "ENSG00000012048", // BRCA1 -0.5
            "ENSG00000146648", // EGFR -4
            "ENSG00000171862", // PTEN -Inf -> -4
        ]
    );
    assert_relative_eq!(ranks.get("ENSG00000105810").unwrap(), 6.0);
    assert_relative_eq!(ranks.get("ENSG00000171862").unwrap(), -4.0);
    assert!(ranks.values().iter().all(|v| v.is_finite()));

    let out = NamedTempFile::new().unwrap();
    let human = catalog.require("human").unwrap();
    ranks.to_tsv(out.path(), Some(human)).unwrap();
    let text = std::fs::read_to_string(out.path()).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("id\tname\tvalue"));
    assert_eq!(lines.next(), Some("ENSG00000141510\tTP53\t6"));
    assert_eq!(text.lines().count(), 9);
}

#[test]
fn test_majority_ensembl_column_detected() {
    let ids = [
        "ENSG00000141510",
        "ENSG00000146648",
        "ENSG00000136997",
        "ENSG00000133703",
        "ENSG00000012048",
        "ENSG00000139618",
        "ENSG00000171862",
        "novel_transcript_1",
        "novel_transcript_2",
        "novel_transcript_3",
    ];
    let stats: Vec<f64> = (0..ids.len()).map(|i| i as f64 - 4.5).collect();
    let table = Table::new(vec![
        Column::text("feature", &ids),
        Column::numeric("AveExpr", &vec![5.0; ids.len()]),
        Column::numeric("t", &stats),
    ])
    .unwrap();

    let catalog = catalog();
    let d = RankPipeline::new().detect(&table, &catalog).unwrap();
    assert_eq!(d.organism(), Some("human"));
    assert_eq!(d.id_type(), Some("ENSEMBL"));
    assert_eq!(d.columns.id, ColumnSpec::rename("feature"));
    assert_relative_eq!(d.match_ratio.unwrap(), 0.7, epsilon = 1e-12);
    assert_eq!(d.columns.base_mean, ColumnSpec::rename("AveExpr"));
    assert_eq!(d.columns.stat, ColumnSpec::rename("t"));

    // base-namespace IDs are not filtered against the index
    let outcome = RankPipeline::new().run(&table, &catalog).unwrap();
    assert_eq!(outcome.ranks.len(), 10);
    assert_eq!(outcome.ranks.ids()[0], "novel_transcript_3");
}

#[test]
fn test_minority_matches_leave_metadata_unresolved() {
    let ids = ["ENSG00000141510", "ENSG00000146648", "x1", "x2", "x3"];
    let table = Table::new(vec![
        Column::text("feature", &ids),
        Column::numeric("stat", &[1.0, 2.0, 3.0, 4.0, 5.0]),
    ])
    .unwrap();

    let catalog = catalog();
    let d = RankPipeline::new().detect(&table, &catalog).unwrap();
    assert!(!d.is_rankable());
    assert!(d.unresolved_fields().contains(&"organism"));

    let result = RankPipeline::new().run(&table, &catalog);
    assert!(matches!(result, Err(GeneRankError::Unresolved("organism"))));
}

#[test]
fn test_mouse_symbols_pick_mouse() {
    let table = Table::new(vec![
        Column::numeric("rank", &[1.0, 2.0, 3.0, 4.0]),
        Column::text("Gene", &["Trp53", "Egfr", "Myc", "Actb"]),
        Column::numeric("logFC", &[1.5, -0.5, 2.5, 0.0]),
    ])
    .unwrap();

    let outcome = RankPipeline::new().run(&table, &catalog()).unwrap();
    assert_eq!(outcome.descriptor.organism(), Some("mouse"));
    assert_eq!(outcome.descriptor.id_type(), Some("SYMBOL"));
    assert_eq!(outcome.descriptor.columns.base_mean, ColumnSpec::Unresolved);
    assert_eq!(
        outcome.ranks.ids(),
        vec![
            "ENSMUSG00000022346", // Myc 2.5
            "ENSMUSG00000059552", // Trp53 1.5
            "ENSMUSG00000029580", // Actb 0
            "ENSMUSG00000020122", // Egfr -0.5
        ]
    );
}

#[test]
fn test_versioned_ensembl_ids() {
    let table = Table::new(vec![
        Column::text(
            "gene_id",
            &["ENSG00000141510.17", "ENSG00000146648.18", "ENSG00000136997.21"],
        ),
        Column::numeric("baseMean", &[10.0, 20.0, 30.0]),
        Column::numeric("stat", &[-1.0, 2.0, 0.5]),
    ])
    .unwrap();

    let outcome = RankPipeline::new().run(&table, &catalog()).unwrap();
    assert_eq!(outcome.descriptor.id_type(), Some("ENSEMBL"));
    assert_eq!(
        outcome.ranks.ids(),
        vec!["ENSG00000146648", "ENSG00000136997", "ENSG00000141510"]
    );
}

#[test]
fn test_entrez_ids_from_tsv() {
    let table_file = write_temp(
        "entrez\tAveExpr\tlogFC\tt\n7157\t9.1\t1.0\t4.2\n1956\t7.3\t-0.8\t-3.1\n60\t12.0\t0.1\t0.4\n",
    );
    let table = Table::from_tsv(table_file.path()).unwrap();

    let outcome = RankPipeline::new().run(&table, &catalog()).unwrap();
    assert_eq!(outcome.descriptor.id_type(), Some("ENTREZID"));
    assert_eq!(outcome.descriptor.columns.stat, ColumnSpec::rename("t"));
    assert_eq!(
        outcome.ranks.ids(),
        vec!["ENSG00000141510", "ENSG00000075624", "ENSG00000146648"]
    );
}

#[test]
fn test_config_overrides_from_yaml() {
    let config = RankConfig::from_yaml(
        "name: lfc-ranks
overrides:
  organism: human
  id_column: gene_symbol
  id_type: SYMBOL
  stat_column: log2FoldChange
  skip_base_mean: true
ranking:
  missing_stat: zero
",
    )
    .unwrap();

    let table_file = write_temp(DESEQ_RESULTS);
    let table = Table::from_tsv(table_file.path()).unwrap();
    let outcome = RankPipeline::from_config(&config).run(&table, &catalog()).unwrap();

    let d = &outcome.descriptor;
    assert_eq!(d.organism, Resolution::Supplied("human".to_string()));
    assert_eq!(d.id_type, Resolution::Supplied("SYMBOL".to_string()));
    assert_eq!(d.columns.base_mean, ColumnSpec::Omitted);
    assert_eq!(d.match_ratio, None);

    // the raw stat column is kept aside under a suffixed name
    assert!(outcome.canonical.has_column("stat.orig"));

    // without baseMean, TP53 keeps its largest |log2FoldChange| row
    let ranks = &outcome.ranks;
    assert_eq!(ranks.len(), 9);
    assert_relative_eq!(ranks.get("ENSG00000141510").unwrap(), 5.0);
    assert_eq!(ranks.ids()[0], "ENSG00000141510");
    assert_relative_eq!(ranks.get("ENSG00000139618").unwrap(), 0.1);
}

#[test]
fn test_derived_statistic() {
    let table = Table::new(vec![
        Column::text("symbol", &["TP53", "EGFR", "MYC"]),
        Column::numeric("pvalue", &[0.001, 0.01, 0.1]),
        Column::numeric("log2FoldChange", &[-1.0, 2.0, 0.5]),
    ])
    .unwrap();
    let catalog = catalog();

    let signed_p = DerivedColumn::new("-log10(pvalue) * sign(log2FoldChange)", |row| {
        match (row.number("pvalue"), row.number("log2FoldChange")) {
            (Some(p), Some(lfc)) => Value::Number(-p.log10() * lfc.signum()),
            _ => Value::Missing,
        }
    });
    let descriptor = resolve_metadata(
        &table,
        &catalog,
        &MetadataOverrides::new().skip_base_mean(),
        &DetectionOptions::default(),
    )
    .unwrap()
    .with_stat(ColumnSpec::Derived(signed_p));

    let ranks = extract_ranks(&table, &descriptor, &catalog, &RankOptions::default()).unwrap();
    assert_eq!(
        ranks.ids(),
        vec!["ENSG00000146648", "ENSG00000136997", "ENSG00000141510"]
    );
    assert_relative_eq!(ranks.values()[0], 2.0, epsilon = 1e-12);
    assert_relative_eq!(ranks.values()[2], -3.0, epsilon = 1e-12);
}
