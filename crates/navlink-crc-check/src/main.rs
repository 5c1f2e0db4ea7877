//! navlink CRC consistency checker: entry point.
//!
//! Compares the CRC extra of every navlink message across three sources:
//!
//! - the runtime registry (the built-in dialect, or `--registry-dump`);
//! - the autopilot's generated C headers;
//! - the router's generated C headers.
//!
//! # Usage
//!
//! ```text
//! navlink-crc-check [OPTIONS]
//!
//! Options:
//!   --ardupilot <PATH>      ArduPilot checkout [default: ~/ardupilot]
//!   --router <PATH>         mavlink-router checkout [default: ~/mavlink-router]
//!   --registry-dump <PATH>  Exported runtime registry (JSON) instead of the built-in dialect
//!   --config <PATH>         TOML configuration file
//!   -v, --verbose           Show all CRC values
//! ```
//!
//! # Exit status
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | All available sources agree                               |
//! | 1    | At least one discrepancy                                  |
//! | 2    | Startup error (bad config file, inconsistent dialect)     |
//!
//! Unavailable sources are warnings; they never change the exit status.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use navlink_core::{Catalog, Dialect};
use navlink_crc_check::application::{run_check, ArtifactExtractor};
use navlink_crc_check::domain::config::load_config;
use navlink_crc_check::domain::CheckConfig;
use navlink_crc_check::infrastructure::{HeaderExtractor, RegistryExtractor};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Check navlink message CRCs match across components.
#[derive(Debug, Parser)]
#[command(
    name = "navlink-crc-check",
    about = "Check navlink message CRCs match across components",
    version
)]
struct Cli {
    /// Path to the ArduPilot checkout.
    #[arg(long, env = "NAVLINK_ARDUPILOT")]
    ardupilot: Option<PathBuf>,

    /// Path to the mavlink-router checkout.
    #[arg(long, env = "NAVLINK_ROUTER")]
    router: Option<PathBuf>,

    /// Exported runtime registry (JSON) to use instead of the built-in dialect.
    #[arg(long, env = "NAVLINK_REGISTRY_DUMP")]
    registry_dump: Option<PathBuf>,

    /// TOML configuration file.  A missing file means defaults.
    #[arg(long, env = "NAVLINK_CRC_CHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Show all CRC values.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Merges the config file (if any) with the flags; flags win.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    fn into_check_config(self) -> anyhow::Result<CheckConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => CheckConfig::default(),
        };

        if let Some(root) = self.ardupilot {
            config.sources.ardupilot_root = root;
        }
        if let Some(root) = self.router {
            config.sources.router_root = root;
        }
        if let Some(dump) = self.registry_dump {
            config.sources.registry_dump = Some(dump);
        }
        config.verbose |= self.verbose;
        Ok(config)
    }
}

/// The three sources, in report order: runtime, autopilot, router.
fn build_extractors(config: &CheckConfig, dialect: Dialect) -> Vec<Box<dyn ArtifactExtractor>> {
    let runtime: Box<dyn ArtifactExtractor> = match config.sources.registry_dump_path() {
        Some(path) => Box::new(RegistryExtractor::dump(path)),
        None => Box::new(RegistryExtractor::builtin(dialect)),
    };
    vec![
        runtime,
        Box::new(HeaderExtractor::new(
            "ardupilot",
            config.sources.ardupilot_header_path(),
        )),
        Box::new(HeaderExtractor::new(
            "router",
            config.sources.router_header_path(),
        )),
    ]
}

fn run(cli: Cli) -> anyhow::Result<u8> {
    let config = cli.into_check_config()?;

    let catalog = Catalog::navlink();
    let dialect = Dialect::navlink();
    dialect
        .validate(&catalog)
        .context("built-in dialect is inconsistent with the message catalog")?;

    let extractors = build_extractors(&config, dialect);
    let report = run_check(&catalog, &extractors, config.verbose);
    println!("{report}");
    Ok(report.exit_code())
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    // Logs go to stderr so that stdout carries only the report.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
