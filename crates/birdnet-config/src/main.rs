//! birdnet-config: operator tool for the BirdNET-Go configuration document.
//!
//! # Usage
//!
//! ```text
//! birdnet-config [--config-dir <DIR>]... <COMMAND>
//!
//! Commands:
//!   show      Print the effective settings (template + document + environment)
//!   validate  Load and validate; exit status 1 on a fatal finding
//!   init      Write the default document if none exists yet
//!   secret    Print a freshly generated random secret
//!   targets   List backup targets and whether each one is usable
//! ```
//!
//! `--config-dir` replaces the platform search paths; give it more than once
//! to search several directories in order.  `BIRDNET_*` environment
//! variables override document values for every command.

use std::path::PathBuf;

use anyhow::Context;
use birdnet_config_core::generate_random_secret;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use birdnet_config::{ConfigLoader, SettingsStore};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Inspect, validate and initialize the BirdNET-Go configuration.
#[derive(Debug, Parser)]
#[command(name = "birdnet-config", version, about)]
struct Cli {
    /// Directory to search for config.toml (repeatable, searched in order).
    #[arg(long = "config-dir", value_name = "DIR", global = true)]
    config_dirs: Vec<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the effective settings as TOML.
    Show,
    /// Load and validate the settings, listing every finding.
    Validate,
    /// Write the default document if none exists yet.
    Init,
    /// Print a freshly generated random secret.
    Secret,
    /// List the configured backup targets.
    Targets,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    // Level is overridden by `RUST_LOG`.  Logs go to stderr so command output
    // on stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let loader = if cli.config_dirs.is_empty() {
        ConfigLoader::with_default_paths().context("cannot determine configuration directories")?
    } else {
        ConfigLoader::new(cli.config_dirs)
    };

    match cli.command {
        Command::Show => show(SettingsStore::new(loader)),
        Command::Validate => validate(SettingsStore::new(loader)),
        Command::Init => init(&loader),
        Command::Secret => secret(),
        Command::Targets => targets(SettingsStore::new(loader)),
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn show(store: SettingsStore) -> anyhow::Result<()> {
    let settings = store.load().context("failed to load configuration")?;
    let text = toml::to_string_pretty(&settings.persisted())
        .context("failed to render settings as TOML")?;
    print!("{text}");
    Ok(())
}

fn validate(store: SettingsStore) -> anyhow::Result<()> {
    let settings = store.load().context("configuration is invalid")?;
    if settings.validation_warnings.is_empty() {
        println!("configuration is valid");
    } else {
        println!(
            "configuration is valid with {} warning(s):",
            settings.validation_warnings.len()
        );
        for warning in &settings.validation_warnings {
            println!("  - {warning}");
        }
    }
    Ok(())
}

fn init(loader: &ConfigLoader) -> anyhow::Result<()> {
    if let Some(path) = loader.find() {
        println!("{} already exists", path.display());
        return Ok(());
    }
    let (path, _) = loader
        .materialize()
        .context("failed to write the default configuration")?;
    println!("{}", path.display());
    Ok(())
}

fn secret() -> anyhow::Result<()> {
    let secret = generate_random_secret().context("the system entropy source failed")?;
    println!("{secret}");
    Ok(())
}

fn targets(store: SettingsStore) -> anyhow::Result<()> {
    let settings = store.load().context("failed to load configuration")?;
    if settings.backup.targets.is_empty() {
        println!("no backup targets configured");
        return Ok(());
    }
    for (index, target) in settings.backup.targets.iter().enumerate() {
        let state = if target.enabled { "enabled" } else { "disabled" };
        match target.resolve() {
            Ok(_) => println!("[{index}] {:<12} {state:<8} ok", target.type_name()),
            Err(err) => println!(
                "[{index}] {:<12} {state:<8} unusable: {err}",
                target.type_name()
            ),
        }
    }
    Ok(())
}
