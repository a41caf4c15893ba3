//! Ruleset inspection

use clap::Args;

use crate::output::{to_json, OutputFormat};
use crate::Cli;
use provwalk_core::{TraversalRule, TraversalRuleset};

#[derive(Args)]
pub struct RulesArgs {
    /// Ruleset: default, delete, export
    pub ruleset: TraversalRuleset,
}

fn format_rule(rule: &TraversalRule) -> String {
    format!(
        "  {:<22} {:<11} {:<9} {:<8} {}",
        rule.name(),
        rule.link.as_str(),
        rule.direction.to_string(),
        if rule.default { "on" } else { "off" },
        if rule.toggleable { "toggle" } else { "fixed" }
    )
}

pub fn run(args: &RulesArgs, cli: &Cli) -> anyhow::Result<()> {
    let rules = args.ruleset.rules();

    match cli.output_format() {
        OutputFormat::Json => println!("{}", to_json(&rules)?),
        OutputFormat::Table => {
            println!("Rules of the {} ruleset:", args.ruleset);
            println!(
                "  {:<22} {:<11} {:<9} {:<8} {}",
                "NAME", "LINK", "DIRECTION", "DEFAULT", "MODE"
            );
            for rule in &rules {
                println!("{}", format_rule(rule));
            }
        }
    }

    Ok(())
}
