//! # Ingredient Radar CLI (`radar`)
//!
//! The `radar` binary drives the supplement-registry pipeline: extraction
//! of raw registry snapshots into the markdown document corpus, corpus
//! aggregation, report rendering, snapshot diffing, and checkpointed bulk
//! downloads.
//!
//! ## Usage
//!
//! ```bash
//! radar --config ./config/radar.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `radar markets` | List market adapters and corpus status |
//! | `radar extract <layer>` | Extract a raw JSONL snapshot into documents |
//! | `radar aggregate` | Build the ingredient aggregate tables as JSON |
//! | `radar report` | Render the markdown report from the aggregate JSON |
//! | `radar diff <layer> <old> <new>` | Classify ids between two snapshots |
//! | `radar fetch <layer>` | Download a registry via its paged API |
//!
//! ## Examples
//!
//! ```bash
//! # Extract the newest Korean snapshot, skipping existing documents
//! radar extract kr_hff
//!
//! # Re-extract a delta file produced by `radar diff`
//! radar extract us_dsld diff/delta.jsonl --delta
//!
//! # Join the Canadian medicinal-ingredient dataset during extraction
//! radar extract ca_lnhpd products.jsonl --ingredients ingredients.jsonl
//!
//! # Rebuild aggregates, then render the monthly report
//! radar aggregate && radar report
//!
//! # Resume an interrupted bulk download
//! radar fetch ca_lnhpd --resume
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ingredient_radar::config;
use ingredient_radar::extract::{self, ExtractOptions};
use ingredient_radar::market::MarketRegistry;
use ingredient_radar::progress::ProgressMode;
use ingredient_radar::{aggregate, diff, fetch, report, sources};

/// Ingredient Radar — a multi-market supplement registry ingestion and
/// reporting pipeline.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/radar.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "radar",
    about = "Ingredient Radar — multi-market supplement registry pipeline",
    version,
    long_about = "Ingredient Radar ingests line-delimited JSON snapshots from national \
    supplement registries, normalizes them into a canonical markdown document corpus via \
    per-market adapters, and aggregates ingredient statistics into cross-market reports."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/radar.toml`. Corpus location, report options,
    /// per-market field-map overrides, and fetch endpoints are read from
    /// this file.
    #[arg(long, global = true, default_value = "./config/radar.toml")]
    config: PathBuf,

    /// Progress output on stderr: `off`, `human`, or `json`.
    ///
    /// Defaults to `human` when stderr is a terminal, `off` otherwise.
    #[arg(long, global = true)]
    progress: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// List market adapters and their corpus status.
    ///
    /// Shows each registered layer with its market tag, extracted document
    /// count, and the number of raw extracts waiting under `raw/`.
    Markets,

    /// Extract a raw JSONL snapshot into the document corpus.
    ///
    /// Reads one record per line, maps it through the layer's adapter,
    /// classifies category and form, applies the advisory review gate,
    /// and writes one markdown document per record. Existing documents
    /// are skipped unless `--force` or `--delta` is given. Per-record
    /// errors are counted and summarized; the exit status stays 0.
    Extract {
        /// Source layer (e.g. `us_dsld`, `kr_hff`). See `radar markets`.
        layer: String,

        /// Input JSONL file. Defaults to the newest `*.jsonl` under the
        /// layer's `raw/` directory.
        input: Option<PathBuf>,

        /// Overwrite existing documents.
        #[arg(short, long)]
        force: bool,

        /// Delta mode for incremental updates; implies --force.
        #[arg(short, long)]
        delta: bool,

        /// Supplementary ingredient JSONL to join (markets that support it).
        #[arg(short, long)]
        ingredients: Option<PathBuf>,
    },

    /// Walk the document corpus and build the ingredient aggregate tables.
    ///
    /// Review-flagged documents are excluded from every table. The result
    /// is written as a JSON artifact for `radar report` to consume without
    /// recomputation.
    Aggregate {
        /// Output path for the aggregate JSON. Defaults to
        /// `<report.output_dir>/ingredient_analysis.json`.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Render the markdown ingredient report from the aggregate JSON.
    Report {
        /// Aggregate JSON produced by `radar aggregate`. Defaults to
        /// `<report.output_dir>/ingredient_analysis.json`.
        analysis: Option<PathBuf>,

        /// Output path for the report. Defaults to
        /// `<report.output_dir>/<period>-ingredient-radar.md`.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Classify ids between two snapshots of the same layer.
    ///
    /// Writes `new_ids.txt`, `updated_ids.txt`, and `delta.jsonl` (for
    /// `radar extract --delta`). Classification only: no documents are
    /// deleted for removed ids.
    Diff {
        /// Source layer the snapshots belong to.
        layer: String,

        /// The older snapshot.
        old: PathBuf,

        /// The newer snapshot.
        new: PathBuf,

        /// Output directory for the id lists and delta file.
        #[arg(long, default_value = "diff")]
        out: PathBuf,
    },

    /// Download a registry dataset through its paged JSON API.
    ///
    /// Appends records as JSONL and checkpoints progress after every page,
    /// so an interrupted run can continue with `--resume` losing at most
    /// one page.
    Fetch {
        /// Source layer with a `[markets.<layer>.fetch]` config section.
        layer: String,

        /// Continue from the last checkpoint instead of starting over.
        #[arg(short, long)]
        resume: bool,

        /// Stop after this many records (for testing).
        #[arg(short, long)]
        limit: Option<u64>,

        /// Output JSONL path. Defaults to
        /// `<corpus>/<layer>/raw/<layer>-<date>.jsonl`.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_progress(arg: Option<&str>) -> Result<Option<ProgressMode>> {
    match arg {
        None => Ok(None),
        Some("off") => Ok(Some(ProgressMode::Off)),
        Some("human") => Ok(Some(ProgressMode::Human)),
        Some("json") => Ok(Some(ProgressMode::Json)),
        Some(other) => anyhow::bail!(
            "Unknown progress mode: '{}'. Must be off, human, or json.",
            other
        ),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let progress = parse_progress(cli.progress.as_deref())?;

    // `markets` works without a config file so a fresh checkout can
    // explore the adapter list.
    if matches!(cli.command, Commands::Markets) {
        let cfg =
            config::load_config(&cli.config).unwrap_or_else(|_| config::Config::minimal());
        let registry = MarketRegistry::from_config(&cfg);
        sources::list_markets(&cfg, &registry);
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    let registry = MarketRegistry::from_config(&cfg);

    match cli.command {
        Commands::Markets => unreachable!(),
        Commands::Extract {
            layer,
            input,
            force,
            delta,
            ingredients,
        } => {
            let opts = ExtractOptions {
                force,
                delta,
                ingredients,
                progress,
            };
            extract::run_extract(&cfg, &registry, &layer, input, &opts)?;
        }
        Commands::Aggregate { out } => {
            aggregate::run_aggregate(&cfg, &registry, out)?;
        }
        Commands::Report { analysis, out } => {
            report::run_report(&cfg, analysis, out)?;
        }
        Commands::Diff {
            layer,
            old,
            new,
            out,
        } => {
            diff::run_diff(&registry, &layer, &old, &new, Some(out))?;
        }
        Commands::Fetch {
            layer,
            resume,
            limit,
            output,
        } => {
            fetch::run_fetch(&cfg, &registry, &layer, resume, limit, output, progress)?;
        }
    }

    Ok(())
}
