//! Newscube CLI - Command-line interface
//!
//! Usage:
//!   newscube transform --input articles.csv --tags tags.xlsx
//!   newscube tags --tags tags.xlsx

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use newscube_core::PipelineConfig;
use newscube_ingest::{registry, taxonomy, SchemaWriter};
use newscube_pipeline::BatchProcessor;

#[derive(Parser)]
#[command(name = "newscube")]
#[command(about = "Transform cleaned news-article CSV exports into an OLAP star schema")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full transformation and write the star schema
    Transform {
        /// Input article CSV
        #[arg(long)]
        input: PathBuf,

        /// Tag taxonomy workbook (xlsx); omit to run without tag matching
        #[arg(long)]
        tags: Option<PathBuf>,

        /// Known-company registry CSV; omit to run without registry strategies
        #[arg(long)]
        companies: Option<PathBuf>,

        /// Output directory for the schema tables
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Rows per processing batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// TOML configuration file; flags override its values
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Load the taxonomy and print the resolved tag definitions
    Tags {
        /// Tag taxonomy workbook (xlsx)
        #[arg(long)]
        tags: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Transform {
            input,
            tags,
            companies,
            output_dir,
            batch_size,
            config,
        } => {
            let mut config = match config {
                Some(path) => PipelineConfig::from_file(path)?,
                None => PipelineConfig::from_env()?,
            };
            if let Some(path) = tags {
                config.taxonomy_path = Some(path);
            }
            if let Some(path) = companies {
                config.registry_path = Some(path);
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if let Some(size) = batch_size {
                config.batch_size = size;
            }

            init_tracing(&config.logging.level);
            run_transform(input, config)
        }
        Commands::Tags { tags } => {
            init_tracing("info");
            let definitions = taxonomy::TaxonomyLoader::new(&tags)
                .load()
                .context("loading taxonomy")?;

            println!("{} tag definitions:", definitions.len());
            for def in &definitions {
                println!(
                    "  {:30} {:15} {:12} {} keywords",
                    def.name,
                    def.category,
                    def.domain,
                    def.keywords.len()
                );
            }
            Ok(())
        }
    }
}

fn run_transform(input: PathBuf, config: PipelineConfig) -> anyhow::Result<()> {
    let taxonomy_defs = taxonomy::load_or_empty(config.taxonomy_path.as_deref())?;
    if taxonomy_defs.is_empty() {
        warn!("running without a tag taxonomy");
    }

    let registry_entries = registry::load_or_empty(config.registry_path.as_deref())?;
    if registry_entries.is_empty() {
        warn!("running without a company registry");
    }

    let output_dir = config.output_dir.clone();
    let processor = BatchProcessor::new(config, taxonomy_defs, registry_entries);
    let output = processor
        .run_file(&input)
        .with_context(|| format!("transforming {}", input.display()))?;

    SchemaWriter::new(&output_dir)
        .write_all(&output.schema, &output.rejected, &output.summary)
        .context("writing star schema")?;

    let s = &output.summary;
    println!("Transformation complete in {:.1}s", s.elapsed_secs);
    println!(
        "  {} articles in {} batches ({} malformed rows skipped)",
        s.total_rows, s.batch_count, s.skipped_rows
    );
    println!("  Fact_Document:      {:8} rows", s.facts);
    println!("  Dim_Time:           {:8} rows", s.time_periods);
    println!("  Dim_Source:         {:8} rows", s.sources);
    println!("  Dim_Tag:            {:8} rows", s.tags);
    println!("  Dim_Entity:         {:8} rows", s.entities);
    println!("  Bridge_Fact_Tag:    {:8} rows", s.tag_relationships);
    println!("  Bridge_Fact_Entity: {:8} rows", s.entity_relationships);
    if s.unresolved_entities > 0 {
        println!(
            "  {} entity names unresolved (sample: {:?})",
            s.unresolved_entities, s.unresolved_sample
        );
    }
    println!("Output written to {}", output_dir.display());

    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
