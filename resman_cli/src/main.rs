use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use resman_cli::config::{AppConfig, ConfigManager, get_config};
use resman_cli::output::{OutputFormat, render_catalog, render_report};
use resman_cli::scenario::{self, Scenario};
use resman_cli::terminal;
use resman_core::ResourceCatalog;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "resman")]
#[command(author, version, about = "Resman - Optimistic mutation engine for resource management", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario of mutations against a scripted remote
    Simulate {
        /// Scenario JSON file
        path: PathBuf,

        /// Output format (defaults to output.default_format)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Do not echo notifications to the log while running
        #[arg(short, long)]
        quiet: bool,

        /// Exit with an error if any step fails
        #[arg(long)]
        strict: bool,
    },

    /// List the managed resource kinds
    Resources {
        /// Output format (defaults to output.default_format)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Get a configuration value
    Get {
        /// Configuration key (e.g., engine.max_attempts)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., engine.max_attempts)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration values
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default())
            .filter_level(log::LevelFilter::Debug)
            .filter_module("resman_core", log::LevelFilter::Debug)
            .filter_module("resman_cli", log::LevelFilter::Debug)
            .format_timestamp_millis()
            .init();
        eprintln!("Debug logging enabled");
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    match cli.command {
        Commands::Simulate {
            path,
            format,
            quiet,
            strict,
        } => {
            let config = get_config().context("Failed to load configuration")?;
            simulate_command(config, path, format, quiet, strict).await?;
        }
        Commands::Resources { format } => {
            let config = get_config().context("Failed to load configuration")?;
            terminal::configure_color(config.output.color_enabled);
            let format = resolve_format(format, &config)?;
            print!("{}", render_catalog(&ResourceCatalog::console(), format)?);
        }
        Commands::Config { command } => config_command(command)?,
        Commands::Completions { shell } => generate_completions(shell),
    }

    Ok(())
}

fn resolve_format(format: Option<OutputFormat>, config: &AppConfig) -> Result<OutputFormat> {
    match format {
        Some(format) => Ok(format),
        None => OutputFormat::from_string(&config.output.default_format),
    }
}

async fn simulate_command(
    config: AppConfig,
    path: PathBuf,
    format: Option<OutputFormat>,
    quiet: bool,
    strict: bool,
) -> Result<()> {
    terminal::configure_color(config.output.color_enabled);
    let format = resolve_format(format, &config)?;
    let scenario = Scenario::from_path(&path)?;
    log::debug!(
        "Loaded scenario {} with {} steps",
        path.display(),
        scenario.steps.len()
    );

    let start = Instant::now();
    let report = scenario::run(&scenario, config.engine, !quiet).await?;
    log::debug!("Scenario finished in {:?}", start.elapsed());

    println!("{}", render_report(&report, format)?);

    let failures = report.failures();
    if strict && failures > 0 {
        anyhow::bail!("{failures} of {} steps failed", report.steps.len());
    }
    Ok(())
}

fn config_command(command: ConfigCommand) -> Result<()> {
    let mut manager = ConfigManager::new();

    match command {
        ConfigCommand::Get { key } => match manager.get(&key) {
            Ok(value) => {
                println!("{value}");
            }
            Err(e) => {
                eprintln!("{}", format!("Error: {e}").red());
                std::process::exit(1);
            }
        },
        ConfigCommand::Set { key, value } => match manager.set(&key, &value) {
            Ok(()) => {
                eprintln!("{}", format!("Set {key} = {value}").green());
                eprintln!(
                    "Configuration saved to: {}",
                    manager.config_path().display()
                );
            }
            Err(e) => {
                eprintln!("{}", format!("Error: {e:#}").red());
                std::process::exit(1);
            }
        },
        ConfigCommand::List => {
            let items = match manager.list() {
                Ok(items) => items,
                Err(e) => {
                    eprintln!("{}", format!("Error: {e:#}").red());
                    std::process::exit(1);
                }
            };

            eprintln!("{}", "Configuration:".bold().blue());
            eprintln!("Config file: {}", manager.config_path().display());
            eprintln!();

            let mut sections: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
            for (key, value) in items {
                let (section, rest) = key.split_once('.').unwrap_or(("general", key.as_str()));
                sections
                    .entry(section.to_string())
                    .or_default()
                    .push((rest.to_string(), value));
            }

            for (section, items) in sections {
                println!("[{}]", section.yellow());
                for (key, value) in items {
                    println!("  {} = {}", key.cyan(), value);
                }
                println!();
            }
        }
    }

    Ok(())
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();

    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
