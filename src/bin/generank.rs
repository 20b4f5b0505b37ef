//! generank - identifier detection and rank vectors for DE tables
//!
//! Command-line interface for building reference indexes, inspecting table
//! metadata and writing rank vectors.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use generank::annotation::{AnnotationCatalog, IndexBuilder, TsvAnnotationProvider};
use generank::data::Table;
use generank::detect::{ColumnSpec, MetadataDescriptor, Resolution};
use generank::pipeline::{RankConfig, RankPipeline};
use generank::rank::MissingStatPolicy;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Output format for `detect`.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Yaml,
}

/// CLI-friendly missing statistic policy
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMissingStat {
    /// Drop rows without a statistic
    Drop,
    /// Treat a missing statistic as 0
    Zero,
}

impl From<CliMissingStat> for MissingStatPolicy {
    fn from(policy: CliMissingStat) -> Self {
        match policy {
            CliMissingStat::Drop => MissingStatPolicy::Drop,
            CliMissingStat::Zero => MissingStatPolicy::Zero,
        }
    }
}

/// Gene identifier detection and rank vector construction
#[derive(Parser)]
#[command(name = "generank")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by commands that resolve table metadata.
#[derive(clap::Args, Debug)]
struct TableArgs {
    /// Differential expression table (TSV)
    #[arg(short, long)]
    table: PathBuf,

    /// Reference index or catalog files (JSON or YAML); repeatable
    #[arg(short, long = "catalog", required = true)]
    catalogs: Vec<PathBuf>,

    /// Pipeline configuration YAML
    #[arg(long)]
    config: Option<PathBuf>,

    /// Restrict detection to this organism
    #[arg(long)]
    organism: Option<String>,

    /// Identifier column (requires --id-type)
    #[arg(long, requires = "id_type")]
    id_column: Option<String>,

    /// Identifier namespace of --id-column
    #[arg(long, requires = "id_column")]
    id_type: Option<String>,

    /// Column to use as baseMean
    #[arg(long)]
    base_mean_column: Option<String>,

    /// Column to use as the ranking statistic
    #[arg(long)]
    stat_column: Option<String>,

    /// Deduplicate by |stat| instead of baseMean
    #[arg(long)]
    skip_base_mean: bool,

    /// Random seed for row sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Maximum rows sampled for identifier detection
    #[arg(long)]
    sample_size: Option<usize>,

    /// Minimum identifier match ratio
    #[arg(long)]
    match_threshold: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a reference index from a gene annotation TSV
    BuildIndex {
        /// Annotation TSV with one column per identifier namespace
        #[arg(short, long)]
        annotation: PathBuf,

        /// Organism name
        #[arg(long)]
        organism: String,

        /// Base namespace column
        #[arg(long, default_value = "ENSEMBL")]
        base: String,

        /// Namespace used for display names
        #[arg(long)]
        names: Option<String>,

        /// Alternate namespace columns; repeatable
        #[arg(long = "alternate")]
        alternates: Vec<String>,

        /// Existing catalog to add the index to
        #[arg(long)]
        merge: Option<PathBuf>,

        /// Output catalog path (.json, .yaml or .yml)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Detect organism, identifier column and statistic columns
    Detect {
        #[command(flatten)]
        args: TableArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Write a rank vector for a differential expression table
    Ranks {
        #[command(flatten)]
        args: TableArgs,

        /// Output path for the rank TSV
        #[arg(short, long)]
        output: PathBuf,

        /// Maximum genes kept after baseMean deduplication
        #[arg(long)]
        max_genes: Option<usize>,

        /// Policy for missing or NaN statistics
        #[arg(long, value_enum)]
        missing_stat: Option<CliMissingStat>,

        /// Add a display name column
        #[arg(long)]
        with_names: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::BuildIndex {
            annotation,
            organism,
            base,
            names,
            alternates,
            merge,
            output,
        } => cmd_build_index(
            &annotation,
            &organism,
            &base,
            names.as_deref(),
            &alternates,
            merge.as_deref(),
            &output,
        ),
        Commands::Detect { args, format } => cmd_detect(&args, format),
        Commands::Ranks {
            args,
            output,
            max_genes,
            missing_stat,
            with_names,
        } => cmd_ranks(&args, &output, max_genes, missing_stat, with_names),
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Build an index and write it as a catalog
fn cmd_build_index(
    annotation: &Path,
    organism: &str,
    base: &str,
    names: Option<&str>,
    alternates: &[String],
    merge: Option<&Path>,
    output: &Path,
) -> Result<()> {
    let provider = TsvAnnotationProvider::from_tsv(annotation)
        .with_context(|| format!("reading annotation {}", annotation.display()))?;

    let mut builder = IndexBuilder::new(organism, base);
    if let Some(ns) = names {
        builder = builder.names_from(ns);
    }
    for ns in alternates {
        builder = builder.alternate(ns.as_str());
    }
    let index = builder.build(&provider).context("building reference index")?;
    info!(
        organism,
        base_ids = index.base_ids.len(),
        namespaces = index.namespaces().len(),
        "built reference index"
    );

    let mut catalog = match merge {
        Some(path) => AnnotationCatalog::load(path)
            .with_context(|| format!("loading catalog {}", path.display()))?,
        None => AnnotationCatalog::new(),
    };
    catalog.insert(index);

    let text = if is_yaml(output) {
        catalog.to_yaml()?
    } else {
        catalog.to_json()?
    };
    std::fs::write(output, text).with_context(|| format!("writing {}", output.display()))?;
    info!(path = %output.display(), organisms = catalog.len(), "catalog written");
    Ok(())
}

fn load_inputs(args: &TableArgs) -> Result<(Table, AnnotationCatalog, RankPipeline)> {
    let table = Table::from_tsv(&args.table)
        .with_context(|| format!("reading table {}", args.table.display()))?;
    let catalog = AnnotationCatalog::load_all(args.catalogs.as_slice()).context("loading reference catalogs")?;
    info!(
        rows = table.n_rows(),
        columns = table.n_columns(),
        organisms = catalog.len(),
        "inputs loaded"
    );

    let mut pipeline = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            RankPipeline::from_config(&RankConfig::from_yaml(&text)?)
        }
        None => RankPipeline::new(),
    };

    if let Some(organism) = &args.organism {
        pipeline = pipeline.organism(organism);
    }
    if let (Some(column), Some(id_type)) = (&args.id_column, &args.id_type) {
        pipeline = pipeline.id_column(column, id_type);
    }
    if let Some(column) = &args.base_mean_column {
        pipeline = pipeline.base_mean_column(column);
    }
    if let Some(column) = &args.stat_column {
        pipeline = pipeline.stat_column(column);
    }
    if args.skip_base_mean {
        pipeline = pipeline.skip_base_mean();
    }
    if let Some(seed) = args.seed {
        pipeline = pipeline.seed(seed);
    }
    if let Some(n) = args.sample_size {
        pipeline = pipeline.sample_size(n);
    }
    if let Some(threshold) = args.match_threshold {
        pipeline = pipeline.match_threshold(threshold);
    }

    Ok((table, catalog, pipeline))
}

fn describe_resolution(r: &Resolution<String>) -> String {
    match r {
        Resolution::Supplied(v) => format!("{} (supplied)", v),
        Resolution::Detected(v) => format!("{} (detected)", v),
        Resolution::Unresolved => "unresolved".to_string(),
    }
}

fn describe_spec(spec: &ColumnSpec) -> String {
    match spec {
        ColumnSpec::Rename(source) => format!("<- {}", source),
        ColumnSpec::Derived(d) => format!("= {}", d.label()),
        ColumnSpec::Unresolved => "unresolved".to_string(),
        ColumnSpec::Omitted => "omitted".to_string(),
    }
}

fn print_descriptor_text(descriptor: &MetadataDescriptor) {
    println!("Table Metadata");
    println!("==============");
    println!("  Organism: {}", describe_resolution(&descriptor.organism));
    println!("  ID type:  {}", describe_resolution(&descriptor.id_type));
    if let Some(ratio) = descriptor.match_ratio {
        println!("  Match:    {:.1}%", ratio * 100.0);
    }
    println!();
    println!("Columns:");
    for (target, spec) in descriptor.columns.targets() {
        println!("  {:<9} {}", target, describe_spec(spec));
    }
    let unresolved = descriptor.unresolved_fields();
    if !unresolved.is_empty() {
        println!();
        println!("Unresolved: {}", unresolved.join(", "));
    }
}

/// Print resolved metadata
fn cmd_detect(args: &TableArgs, format: OutputFormat) -> Result<()> {
    let (table, catalog, pipeline) = load_inputs(args)?;
    let descriptor = pipeline.detect(&table, &catalog)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&descriptor)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&descriptor)?),
        OutputFormat::Text => print_descriptor_text(&descriptor),
    }
    Ok(())
}

/// Run the pipeline and write the rank vector
fn cmd_ranks(
    args: &TableArgs,
    output: &Path,
    max_genes: Option<usize>,
    missing_stat: Option<CliMissingStat>,
    with_names: bool,
) -> Result<()> {
    let (table, catalog, mut pipeline) = load_inputs(args)?;
    if let Some(n) = max_genes {
        pipeline = pipeline.max_genes(n);
    }
    if let Some(policy) = missing_stat {
        pipeline = pipeline.missing_stat(policy.into());
    }

    let outcome = pipeline.run(&table, &catalog)?;

    let names = if with_names {
        match outcome.descriptor.organism() {
            Some(organism) => Some(catalog.require(organism)?),
            None => None,
        }
    } else {
        None
    };
    outcome
        .ranks
        .to_tsv(output, names)
        .with_context(|| format!("writing {}", output.display()))?;

    info!(path = %output.display(), genes = outcome.ranks.len(), "rank vector written");
    for entry in outcome.ranks.top(5) {
        eprintln!("  {}: {:.3}", entry.id, entry.value);
    }
    Ok(())
}
