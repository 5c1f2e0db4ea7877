//! navlink message conformance harness: entry point.
//!
//! Sends one navlink message from vehicle 2's link and checks that it is
//! routed to vehicle 1's link (or echoed back), printing a PASS/FAIL banner.
//!
//! # Usage
//!
//! ```text
//! navlink-msg-test [OPTIONS] [MESSAGE] [KEY=VALUE]...
//!
//! Examples:
//!   navlink-msg-test CHECK_IN boot_id=123 msg_seq=1 time_ms=1000 ttl_ms=5000
//!   navlink-msg-test --list
//!
//! Options:
//!   --port1 <PORT>     Vehicle 1 UDP port [default: 14560]
//!   --port2 <PORT>     Vehicle 2 UDP port [default: 14570]
//!   --timeout <SECS>   Seconds to wait for routing [default: 5]
//!   --config <PATH>    TOML configuration file
//!   --list             List available navlink messages
//! ```
//!
//! # Exit status
//!
//! `0` when the message was observed, `1` for everything else (bad message
//! or parameters, connect failure, nothing received, Ctrl+C).  `--list`
//! always exits `0`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use navlink_core::{Catalog, Dialect, Message};
use navlink_msg_test::application::{
    build_message, list_messages, render_listing, run_conformance, ConformanceError,
    ConformanceReport, FAILED_BANNER,
};
use navlink_msg_test::domain::config::load_config;
use navlink_msg_test::domain::{parse_params, EndpointConfig, HarnessConfig};
use navlink_msg_test::infrastructure::{EndpointSession, SessionOptions};

const RULE_WIDTH: usize = 60;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Test navlink messages between two vehicles.
#[derive(Debug, Parser)]
#[command(
    name = "navlink-msg-test",
    about = "Test navlink messages between two vehicles",
    version
)]
struct Cli {
    /// Message name, e.g. CHECK_IN.  Case does not matter.
    #[arg(required_unless_present = "list")]
    message: Option<String>,

    /// Message parameters as key=value pairs.
    params: Vec<String>,

    /// UDP port of vehicle 1's link.
    #[arg(long, env = "NAVLINK_PORT1")]
    port1: Option<u16>,

    /// UDP port of vehicle 2's link.
    #[arg(long, env = "NAVLINK_PORT2")]
    port2: Option<u16>,

    /// Seconds to wait for the message after sending.
    #[arg(long, env = "NAVLINK_TIMEOUT")]
    timeout: Option<u64>,

    /// TOML configuration file.  A missing file means defaults.
    #[arg(long, env = "NAVLINK_MSG_TEST_CONFIG")]
    config: Option<PathBuf>,

    /// List available navlink messages and exit.
    #[arg(long)]
    list: bool,
}

impl Cli {
    /// Merges the config file (if any) with the flags; flags win.
    ///
    /// A port flag replaces that vehicle's address with `udpin:0.0.0.0:<port>`
    /// and keeps its identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    fn into_harness_config(&self) -> anyhow::Result<HarnessConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => HarnessConfig::default(),
        };

        if let Some(port) = self.port1 {
            config.endpoint1 = EndpointConfig::udpin(port, config.endpoint1.identity);
        }
        if let Some(port) = self.port2 {
            config.endpoint2 = EndpointConfig::udpin(port, config.endpoint2.identity);
        }
        if let Some(secs) = self.timeout {
            config.settle_ms = secs.saturating_mul(1000);
        }
        Ok(config)
    }
}

/// Banner printed before any socket is opened.
fn render_banner(message: &Message, params_json: &str) -> anyhow::Result<String> {
    let heavy = "=".repeat(RULE_WIDTH);
    let fields = serde_json::to_string(&message.fields()).context("failed to render message")?;
    Ok(format!(
        "{heavy}\nNAVLINK MESSAGE TEST: {name}\n{heavy}\nParameters: {params_json}\nMessage: {name} {fields}\n",
        name = message.type_name(),
    ))
}

/// Report text for stdout and the exit status of a finished run.
///
/// Every outcome that is not a report (interrupt, connect or send failure)
/// still ends with the FAIL banner.
fn conclude(outcome: Result<ConformanceReport, ConformanceError>) -> (String, u8) {
    match outcome {
        Ok(report) => {
            let code = report.exit_code();
            (report.to_string(), code)
        }
        Err(e) => (format!("{e}\n\n{FAILED_BANNER}"), 1),
    }
}

/// Runs one conformance test; blocking, so it lives on a blocking thread.
fn run(cli: Cli, interrupt: &AtomicBool) -> anyhow::Result<u8> {
    let config = cli.into_harness_config()?;

    let catalog = Catalog::navlink();
    let dialect = Dialect::navlink();
    dialect
        .validate(&catalog)
        .context("built-in dialect is inconsistent with the message catalog")?;

    let name = cli.message.as_deref().unwrap_or_default();
    let params = parse_params(&cli.params);
    let message = match build_message(&catalog, &dialect, name, &params) {
        Ok(message) => message,
        Err(e) => {
            println!("Error creating message: {e}");
            if let Some(expected) = e.expected_parameters() {
                println!("Expected parameters: {}", expected.join(", "));
            }
            return Ok(1);
        }
    };

    let params_json = serde_json::to_string(&params).context("failed to render parameters")?;
    println!("{}", render_banner(&message, &params_json)?);

    let vehicle1 = EndpointSession::new(
        SessionOptions::from_config(&config.endpoint1, &config)
            .context("invalid vehicle 1 address")?,
        dialect.clone(),
    );
    let vehicle2 = EndpointSession::new(
        SessionOptions::from_config(&config.endpoint2, &config)
            .context("invalid vehicle 2 address")?,
        dialect,
    );

    let outcome = run_conformance(&vehicle1, &vehicle2, &message, &config, interrupt);
    let (text, code) = conclude(outcome);
    println!("{text}");
    Ok(code)
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// The harness itself is blocking (std sockets on session threads), so it
/// runs under `spawn_blocking` while the async side waits for Ctrl+C.
#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so that stdout carries only the report.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.list {
        print!(
            "{}",
            render_listing(&list_messages(&Catalog::navlink(), &Dialect::navlink()))
        );
        return ExitCode::SUCCESS;
    }

    // ── Interrupt flag ────────────────────────────────────────────────────────
    let interrupt = Arc::new(AtomicBool::new(false));
    let interrupt_clone = Arc::clone(&interrupt);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, closing sessions");
                interrupt_clone.store(true, Ordering::Relaxed);
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    let outcome = tokio::task::spawn_blocking(move || run(cli, &interrupt)).await;
    match outcome {
        Ok(Ok(code)) => ExitCode::from(code),
        Ok(Err(e)) => {
            error!("{e:#}");
            ExitCode::from(1)
        }
        Err(e) => {
            error!("harness thread failed: {e}");
            ExitCode::from(1)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cli_message_and_params() {
        // Arrange / Act
        let cli = Cli::parse_from([
            "navlink-msg-test",
            "CHECK_IN",
            "boot_id=123",
            "msg_seq=1",
        ]);

        // Assert
        assert_eq!(cli.message.as_deref(), Some("CHECK_IN"));
        assert_eq!(cli.params, vec!["boot_id=123", "msg_seq=1"]);
        assert!(!cli.list);
    }

    #[test]
    fn test_cli_list_needs_no_message() {
        let cli = Cli::try_parse_from(["navlink-msg-test", "--list"]).unwrap();
        assert!(cli.list);
        assert!(cli.message.is_none());
    }

    #[test]
    fn test_cli_message_required_without_list() {
        assert!(Cli::try_parse_from(["navlink-msg-test"]).is_err());
    }

    #[test]
    fn test_into_harness_config_defaults() {
        let config = Cli::parse_from(["navlink-msg-test", "CHECK_IN"])
            .into_harness_config()
            .unwrap();
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    fn test_into_harness_config_flags_override() {
        // Arrange
        let cli = Cli::parse_from([
            "navlink-msg-test",
            "--port1",
            "15000",
            "--port2",
            "15010",
            "--timeout",
            "2",
            "CHECK_IN",
        ]);

        // Act
        let config = cli.into_harness_config().unwrap();

        // Assert
        assert_eq!(config.endpoint1, EndpointConfig::udpin(15000, 251));
        assert_eq!(config.endpoint2, EndpointConfig::udpin(15010, 252));
        assert_eq!(config.settle_ms, 2000);
    }

    #[test]
    fn test_port_flag_keeps_identity_from_file() {
        // Arrange
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[endpoint1]\naddress = \"udpout:127.0.0.1:9\"\nidentity = 7"
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let cli = Cli::parse_from(["navlink-msg-test", "--config", &path, "--port1", "15000", "X"]);

        // Act
        let config = cli.into_harness_config().unwrap();

        // Assert
        assert_eq!(config.endpoint1, EndpointConfig::udpin(15000, 7));
    }

    #[test]
    fn test_unknown_message_exits_one_without_sockets() {
        let cli = Cli::parse_from(["navlink-msg-test", "NO_SUCH_MESSAGE"]);
        assert_eq!(run(cli, &AtomicBool::new(false)).unwrap(), 1);
    }

    #[test]
    fn test_missing_params_exit_one() {
        let cli = Cli::parse_from(["navlink-msg-test", "CHECK_IN", "boot_id=1"]);
        assert_eq!(run(cli, &AtomicBool::new(false)).unwrap(), 1);
    }

    #[test]
    fn test_conclude_connect_failure_prints_fail_banner() {
        // Arrange
        let outcome = Err(ConformanceError::Connect {
            role: 1,
            identity: 251,
            source: navlink_msg_test::infrastructure::SessionError::HeartbeatTimeout {
                address: "udpin:0.0.0.0:14560".parse().unwrap(),
                timeout: std::time::Duration::from_secs(10),
            },
        });

        // Act
        let (text, code) = conclude(outcome);

        // Assert
        assert_eq!(code, 1);
        assert!(text.starts_with("Failed to connect to vehicle 1 (system 251)"), "{text}");
        assert!(text.ends_with(FAILED_BANNER));
    }

    #[test]
    fn test_conclude_interrupt_prints_fail_banner() {
        let (text, code) = conclude(Err(ConformanceError::Interrupted));

        assert_eq!(code, 1);
        assert_eq!(text, format!("Interrupted\n\n{FAILED_BANNER}"));
    }

    #[test]
    fn test_connect_timeout_exits_one_instead_of_erroring() {
        // Arrange – vehicle 1 points at a sink that never sends a heartbeat
        let sink = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "connect_timeout_ms = 100\n\n[endpoint1]\naddress = \"udpout:{}\"\nidentity = 251",
            sink.local_addr().unwrap()
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let cli = Cli::parse_from([
            "navlink-msg-test",
            "--config",
            &path,
            "CHECK_IN",
            "boot_id=123",
            "msg_seq=1",
            "time_ms=1000",
            "ttl_ms=5000",
        ]);

        // Act
        let code = run(cli, &AtomicBool::new(false)).unwrap();

        // Assert
        assert_eq!(code, 1);
    }

    #[test]
    fn test_banner_shows_name_and_fields() {
        // Arrange
        let catalog = Catalog::navlink();
        let dialect = Dialect::navlink();
        let params = parse_params(["boot_id=123", "msg_seq=1", "time_ms=1000", "ttl_ms=5000"]);
        let message = build_message(&catalog, &dialect, "check_in", &params).unwrap();

        // Act
        let banner = render_banner(&message, "{}").unwrap();

        // Assert
        assert!(banner.contains("NAVLINK MESSAGE TEST: CHECK_IN\n"));
        assert!(banner.contains("\"boot_id\":123"));
    }
}
