//! Traversal commands

use std::collections::BTreeSet;

use clap::Args;

use crate::output::{format_ids, format_reachable, to_json, OutputFormat};
use crate::{AppContext, Cli};
use provwalk_core::{EntityId, LinkType, MaxIterations, RuleToggles};

#[derive(Args)]
pub struct TraverseArgs {
    /// Starting node ids
    #[arg(required = true)]
    pub ids: Vec<i64>,

    /// Link types followed forwards (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub forward: Vec<LinkType>,

    /// Link types followed backwards (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub backward: Vec<LinkType>,

    /// Rounds to run: a number, or "inf" to run until nothing new is found
    #[arg(short, long, default_value = "inf")]
    pub max_iterations: MaxIterations,

    /// Also report the links that were followed
    #[arg(short, long)]
    pub links: bool,

    /// Warn about starting ids that do not exist instead of failing
    #[arg(long)]
    pub skip_missing: bool,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Starting node ids
    #[arg(required = true)]
    pub ids: Vec<i64>,

    /// Override a toggleable rule, e.g. create_backward=false (repeatable)
    #[arg(short, long = "rule", value_name = "NAME=VALUE")]
    pub rules: Vec<String>,

    /// Also report the links that were followed
    #[arg(short, long)]
    pub links: bool,

    /// Warn about starting ids that do not exist instead of failing
    #[arg(long)]
    pub skip_missing: bool,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Starting node ids
    #[arg(required = true)]
    pub ids: Vec<i64>,

    /// Override a toggleable rule, e.g. return_backward=true (repeatable)
    #[arg(short, long = "rule", value_name = "NAME=VALUE")]
    pub rules: Vec<String>,

    /// Also report the links that were followed
    #[arg(short, long)]
    pub links: bool,
}

fn starting_ids(ids: &[i64]) -> BTreeSet<EntityId> {
    ids.iter().copied().map(EntityId).collect()
}

fn parse_toggles(pairs: &[String]) -> anyhow::Result<RuleToggles> {
    Ok(pairs
        .iter()
        .map(|pair| RuleToggles::parse_pair(pair))
        .collect::<provwalk_core::Result<RuleToggles>>()?)
}

fn report_skipped(skipped: &BTreeSet<EntityId>, cli: &Cli) {
    if !skipped.is_empty() && !cli.quiet {
        eprintln!("Skipped missing ids: {}", format_ids(skipped));
    }
}

pub async fn run_traverse(args: &TraverseArgs, cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let query = provwalk_core::TraversalQuery::new(args.ids.iter().copied())
        .with_max_iterations(args.max_iterations)
        .with_links(args.links)
        .forward(args.forward.clone())
        .backward(args.backward.clone());

    tracing::info!(
        "Traversing from {} ids (max iterations: {})",
        query.starting_ids.len(),
        args.max_iterations
    );

    let mut skipped = BTreeSet::new();
    let mut collect = |missing: &BTreeSet<EntityId>| skipped.extend(missing.iter().copied());
    let callback: Option<provwalk_core::MissingCallback<'_>> = if args.skip_missing {
        Some(&mut collect)
    } else {
        None
    };
    let output = ctx.engine.traverse_graph(&query, callback).await?;
    report_skipped(&skipped, cli);

    match cli.output_format() {
        OutputFormat::Json => println!("{}", to_json(&output)?),
        OutputFormat::Table => {
            let report = format_reachable(&output.nodes, output.links.as_ref(), None);
            print!("{}", report);
            println!("  Rounds: {}", output.iterations_done);
        }
    }

    Ok(())
}

pub async fn run_delete(args: &DeleteArgs, cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let toggles = parse_toggles(&args.rules)?;
    let ids = starting_ids(&args.ids);
    tracing::info!("Collecting delete set for {} ids", ids.len());

    let mut skipped = BTreeSet::new();
    let mut collect = |missing: &BTreeSet<EntityId>| skipped.extend(missing.iter().copied());
    let callback: Option<provwalk_core::MissingCallback<'_>> = if args.skip_missing {
        Some(&mut collect)
    } else {
        None
    };
    let output = ctx
        .engine
        .get_nodes_delete(&ids, args.links, &toggles, callback)
        .await?;
    report_skipped(&skipped, cli);

    match cli.output_format() {
        OutputFormat::Json => println!("{}", to_json(&output)?),
        OutputFormat::Table => {
            let rules = Some(&output.rules);
            let report = format_reachable(&output.nodes, output.links.as_ref(), rules);
            print!("{}", report);
        }
    }

    Ok(())
}

pub async fn run_export(args: &ExportArgs, cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let toggles = parse_toggles(&args.rules)?;
    let ids = starting_ids(&args.ids);
    tracing::info!("Collecting export set for {} ids", ids.len());

    let output = ctx
        .engine
        .get_nodes_export(&ids, args.links, &toggles)
        .await?;

    match cli.output_format() {
        OutputFormat::Json => println!("{}", to_json(&output)?),
        OutputFormat::Table => {
            let rules = Some(&output.rules);
            let report = format_reachable(&output.nodes, output.links.as_ref(), rules);
            print!("{}", report);
        }
    }

    Ok(())
}
