//! Provwalk CLI - Reachable-subset queries over a provenance graph snapshot

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::{completions, rules, traverse};
use config::{config_file_path, Config};
use output::OutputFormat;
use provwalk_core::TraversalEngine;
use provwalk_storage::{GraphSnapshot, MemoryGraph};

#[derive(Parser)]
#[command(name = "provwalk")]
#[command(author, version, about = "Compute what a set of provenance nodes reaches")]
pub struct Cli {
    /// Graph snapshot (JSON)
    #[arg(short, long, global = true, env = "PROVWALK_GRAPH")]
    pub graph: Option<PathBuf>,

    /// Config file
    #[arg(long, global = true, env = "PROVWALK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format: table, json
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(config_file_path)
    }

    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::from(self.format.as_str())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Follow explicit link types forwards and backwards
    Traverse(traverse::TraverseArgs),
    /// Nodes that must be deleted together with the given ones
    Delete(traverse::DeleteArgs),
    /// Nodes that must be exported together with the given ones
    Export(traverse::ExportArgs),
    /// Show the rules of a ruleset
    Rules(rules::RulesArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Application context with the loaded graph
pub struct AppContext {
    pub engine: TraversalEngine<MemoryGraph>,
}

impl AppContext {
    pub fn new(cli: &Cli) -> anyhow::Result<Self> {
        let config_path = cli.config_path();
        let config = Config::load(&config_path)?;

        let graph_path = match cli.graph.clone().or(config.graph) {
            Some(path) => path,
            None => anyhow::bail!(
                "No graph snapshot given. Pass --graph or set `graph` in {}",
                config_path.display()
            ),
        };
        tracing::debug!("Using graph snapshot at: {:?}", graph_path);

        let graph = MemoryGraph::from_snapshot(GraphSnapshot::load(&graph_path)?)?;
        let backend = Arc::new(graph);
        let engine = TraversalEngine::new(backend).with_config(config.engine)?;

        Ok(Self { engine })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    tracing::debug!("Starting provwalk CLI");

    match &cli.command {
        Commands::Traverse(args) => {
            let ctx = AppContext::new(&cli)?;
            traverse::run_traverse(args, &cli, &ctx).await?
        }
        Commands::Delete(args) => {
            let ctx = AppContext::new(&cli)?;
            traverse::run_delete(args, &cli, &ctx).await?
        }
        Commands::Export(args) => {
            let ctx = AppContext::new(&cli)?;
            traverse::run_export(args, &cli, &ctx).await?
        }
        Commands::Rules(args) => rules::run(args, &cli)?,
        Commands::Config(args) => commands::config::run(args, &cli)?,
        Commands::Completions(args) => completions::run(args)?,
    }

    Ok(())
}
