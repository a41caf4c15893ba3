//! Config command for managing CLI configuration

use clap::{Args, Subcommand};

use crate::config::Config;
use crate::Cli;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Show config file path
    Path,
    /// Initialize default config file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

pub fn run(args: &ConfigArgs, cli: &Cli) -> anyhow::Result<()> {
    match &args.command {
        ConfigCommands::Show => run_show(cli),
        ConfigCommands::Path => run_path(cli),
        ConfigCommands::Init { force } => run_init(cli, *force),
    }
}

fn run_show(cli: &Cli) -> anyhow::Result<()> {
    let path = cli.config_path();
    let config = Config::load(&path)?;
    println!("# {}", path.display());
    print!("{}", config.to_toml()?);
    Ok(())
}

fn run_path(cli: &Cli) -> anyhow::Result<()> {
    println!("{}", cli.config_path().display());
    Ok(())
}

fn run_init(cli: &Cli, force: bool) -> anyhow::Result<()> {
    let path = cli.config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    let config = Config {
        graph: cli.graph.clone(),
        ..Config::default()
    };
    config.save(&path)?;
    println!("Created config file at {}", path.display());
    Ok(())
}
