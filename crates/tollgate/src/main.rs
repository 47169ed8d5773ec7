// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tollgate - multi-tier model router with cloud budget admission control.
//!
//! This is the binary entry point for the operator CLI.

mod app;
mod ask;
mod health;
mod report;
mod tiers;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tollgate_config::TollgateConfig;
use tollgate_usage::StatsPeriod;

/// Tollgate - route prompts across local and cloud model tiers.
#[derive(Parser, Debug)]
#[command(name = "tollgate", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Route a one-shot prompt and print the answer.
    Ask {
        /// The prompt text.
        prompt: String,
        /// Force a tier instead of classifying the prompt.
        #[arg(long)]
        tier: Option<String>,
        /// Skill label used for tier lookup and usage accounting.
        #[arg(long)]
        skill: Option<String>,
        /// System prompt.
        #[arg(long)]
        system: Option<String>,
        /// Print text as it is generated.
        #[arg(long)]
        stream: bool,
    },
    /// Show daily and monthly usage.
    Usage {
        /// Day to summarize (YYYY-MM-DD, UTC). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Output JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show cloud spend against the monthly budget.
    Budget {
        #[arg(long)]
        json: bool,
    },
    /// Show per-model call statistics.
    Models {
        /// Window: day, month, or all.
        #[arg(long, default_value = "month")]
        period: StatsPeriod,
        #[arg(long)]
        json: bool,
    },
    /// Probe backend reachability.
    Health {
        #[arg(long)]
        json: bool,
    },
    /// Print the tier table and escalation map.
    Tiers,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            tollgate_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    init_tracing(&config.agent.log_level);

    let use_color = app::use_color(cli.plain);
    let result = match cli.command {
        Commands::Ask {
            prompt,
            tier,
            skill,
            system,
            stream,
        } => {
            ask::run_ask(
                config,
                ask::AskArgs {
                    prompt,
                    tier,
                    skill,
                    system,
                    stream,
                },
            )
            .await
        }
        Commands::Usage { date, json } => report::run_usage(&config, date, json).await,
        Commands::Budget { json } => report::run_budget(&config, json, use_color).await,
        Commands::Models { period, json } => report::run_models(&config, period, json).await,
        Commands::Health { json } => health::run_health(&config, json, use_color).await,
        Commands::Tiers => {
            tiers::print_tiers(&config, use_color);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn load_config(
    path: Option<&std::path::Path>,
) -> Result<TollgateConfig, Vec<tollgate_config::ConfigError>> {
    match path {
        Some(path) => tollgate_config::load_and_validate_path(path),
        None => tollgate_config::load_and_validate(),
    }
}

/// Initializes the tracing subscriber on stderr so stdout carries only answers.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tollgate={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_ask_with_hints() {
        let cli = Cli::try_parse_from([
            "tollgate", "ask", "debug this", "--tier", "coder", "--skill", "debugging", "--stream",
        ])
        .unwrap();
        match cli.command {
            Commands::Ask {
                prompt,
                tier,
                skill,
                stream,
                ..
            } => {
                assert_eq!(prompt, "debug this");
                assert_eq!(tier.as_deref(), Some("coder"));
                assert_eq!(skill.as_deref(), Some("debugging"));
                assert!(stream);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_models_period() {
        let cli = Cli::try_parse_from(["tollgate", "models", "--period", "all"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Models {
                period: StatsPeriod::All,
                ..
            }
        ));
        assert!(Cli::try_parse_from(["tollgate", "models", "--period", "year"]).is_err());
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tollgate.toml");
        std::fs::write(&path, "[cost]\nmonthly_budget_usd = 12.5\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.cost.monthly_budget_usd, 12.5);
    }
}
