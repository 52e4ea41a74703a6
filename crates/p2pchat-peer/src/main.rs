//! P2PChat terminal peer: entry point.
//!
//! Hosts or joins a direct IPv6 text chat from the command line.
//!
//! # Usage
//!
//! ```text
//! p2pchat [OPTIONS] <COMMAND>
//!
//! Commands:
//!   host        Listen for a peer and print a join code
//!   join        Connect using a join code, [addr]:port or addr:port
//!   code        Print the join code for an address and port
//!   decode      Print the address and port inside a join code
//!   addresses   List this machine's candidate IPv6 addresses
//!   save-config Write the effective settings to the config file
//!
//! Options:
//!   --config <PATH>        Config file [default: platform config dir]
//!   --log-level <FILTER>   Log filter when RUST_LOG is unset
//!   --include-link-local   Offer fe80::/10 addresses too
//!   --json                 Print events as JSON lines
//! ```
//!
//! While chatting, each line typed on stdin is sent to the peer.  `/status`
//! prints the current state and `/quit` (or Ctrl+C, or end of input) leaves.
//!
//! # Environment variable overrides
//!
//! | Variable            | Description                     |
//! |---------------------|---------------------------------|
//! | `P2PCHAT_CONFIG`    | Config file path                |
//! | `P2PCHAT_LOG_LEVEL` | Log filter                      |
//! | `P2PCHAT_PORT`      | Listen port for `host`          |
//! | `RUST_LOG`          | Full `tracing` filter, wins over everything |
//!
//! Logs go to stderr so stdout carries only chat output.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use p2pchat_core::joincode::{try_decode, PeerInfo};
use p2pchat_core::{ChatMessage, ConnectionState};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use p2pchat_peer::application::ChatSession;
use p2pchat_peer::infrastructure::discovery::{global_ipv6_addresses, InterfaceDiscovery};
use p2pchat_peer::infrastructure::storage::config::{
    load_config, load_config_from, save_config, save_config_to, AppConfig,
};
use p2pchat_peer::infrastructure::ui_bridge::{
    self, ChatMessageDto, CommandResult, ConnectionStatusDto,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Direct IPv6 peer-to-peer text chat.
#[derive(Debug, Parser)]
#[command(name = "p2pchat", about = "Direct IPv6 peer-to-peer text chat", version)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, env = "P2PCHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is unset, e.g. `debug`.
    ///
    /// Overrides `[logging] level` from the config file.
    #[arg(long, global = true, env = "P2PCHAT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Also offer link-local (fe80::/10) addresses for the join code.
    #[arg(long, global = true)]
    include_link_local: bool,

    /// Print state changes and messages as JSON lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
enum Command {
    /// Listen for a peer and print a join code.
    Host {
        /// Port to listen on; 0 lets the OS choose.  Overrides the config file.
        #[arg(long, short, env = "P2PCHAT_PORT")]
        port: Option<u16>,
    },
    /// Connect to a host.
    Join {
        /// Join code, `[addr]:port`, or `addr:port`.
        input: String,
    },
    /// Print the join code for an address and port.
    Code { address: String, port: u16 },
    /// Print the address and port inside a join code.
    Decode { code: String },
    /// List this machine's candidate IPv6 addresses.
    Addresses,
    /// Write the effective settings (file, environment and flags) to the
    /// config file.
    SaveConfig {
        /// Listen port to store for `host`.
        #[arg(long, short, env = "P2PCHAT_PORT")]
        port: Option<u16>,
    },
}

impl Cli {
    /// Layers the command-line overrides on top of the file configuration.
    fn apply_overrides(&self, mut config: AppConfig) -> AppConfig {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.include_link_local {
            config.network.include_link_local = true;
        }
        if let Command::Host { port: Some(port) } | Command::SaveConfig { port: Some(port) } =
            self.command
        {
            config.network.listen_port = port;
        }
        config
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // An explicit --config must load; the platform default may fall back.
    let (file_config, config_problem) = match cli.config.as_deref() {
        Some(path) => (load_explicit_config(path)?, None),
        None => match load_config() {
            Ok(config) => (config, None),
            Err(e) => (AppConfig::default(), Some(e)),
        },
    };
    let config = cli.apply_overrides(file_config);

    init_tracing(&config.logging.level);
    if let Some(e) = &config_problem {
        warn!("using default configuration: {e}");
    }

    match &cli.command {
        Command::Code { address, port } => {
            let code = PeerInfo::new(address.as_str(), *port)
                .to_join_code()
                .with_context(|| format!("cannot encode [{address}]:{port}"))?;
            if cli.json {
                print_json(&CommandResult::ok(code));
            } else {
                println!("{code}");
            }
        }
        Command::Decode { code } => {
            let peer = try_decode(code).with_context(|| format!("invalid join code {code:?}"))?;
            if cli.json {
                print_json(&CommandResult::ok(peer));
            } else {
                println!("{peer}");
            }
        }
        Command::Addresses => {
            let addresses =
                global_ipv6_addresses(&InterfaceDiscovery::new(), config.network.include_link_local);
            if cli.json {
                print_json(&CommandResult::ok(addresses));
            } else if addresses.is_empty() {
                println!("no global IPv6 address found");
            } else {
                for address in addresses {
                    println!("{address}");
                }
            }
        }
        Command::SaveConfig { .. } => {
            if let Some(e) = &config_problem {
                bail!("not overwriting the existing config file: {e}");
            }
            match cli.config.as_deref() {
                Some(path) => save_config_to(&config, path)
                    .with_context(|| format!("writing config {}", path.display()))?,
                None => save_config(&config).context("writing config to the platform config dir")?,
            }
            info!("configuration saved");
            if cli.json {
                print_json(&CommandResult::ok(config));
            } else {
                println!("configuration saved");
            }
        }
        Command::Host { .. } => {
            let session =
                ChatSession::with_options(InterfaceDiscovery::new(), config.network.include_link_local);
            host(&session, config.network.listen_port, cli.json).await?;
            run_chat(&session, Role::Host, cli.json).await;
        }
        Command::Join { input } => {
            let session =
                ChatSession::with_options(InterfaceDiscovery::new(), config.network.include_link_local);
            join(&session, input, cli.json).await?;
            run_chat(&session, Role::Join, cli.json).await;
        }
    }
    Ok(())
}

fn load_explicit_config(path: &Path) -> anyhow::Result<AppConfig> {
    load_config_from(path).with_context(|| format!("loading config {}", path.display()))
}

/// `RUST_LOG` wins; otherwise `level`; otherwise `info`.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ── Roles ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// Keeps listening after a peer leaves.
    Host,
    /// Leaves when the connection ends.
    Join,
}

async fn host(session: &ChatSession, port: u16, json: bool) -> anyhow::Result<()> {
    let result = ui_bridge::host_command(session, port).await;
    if json {
        print_json(&result);
    }
    let Some(info) = result.data else {
        bail!(result.error.unwrap_or_else(|| "failed to start hosting".to_string()));
    };
    if !json {
        println!("Listening on port {}", info.port);
        if info.join_code.is_empty() {
            println!("No global IPv6 address found; share [address]:{} manually", info.port);
        } else {
            println!("Join code: {}", info.join_code);
        }
        for address in &info.local_addresses {
            println!("  [{address}]:{}", info.port);
        }
    }
    Ok(())
}

async fn join(session: &ChatSession, input: &str, json: bool) -> anyhow::Result<()> {
    let result = ui_bridge::join_command(session, input).await;
    if json {
        print_json(&result);
    }
    if !result.success {
        bail!(result.error.unwrap_or_else(|| "failed to connect".to_string()));
    }
    Ok(())
}

// ── Chat loop ─────────────────────────────────────────────────────────────────

/// Relays stdin lines to the peer and prints state and message updates until
/// the user quits (or, for a joiner, the connection ends).
async fn run_chat(session: &ChatSession, role: Role, json: bool) {
    let mut state_rx = session.connection().subscribe_state();
    let mut messages_rx = session.connection().subscribe_messages();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut shown = messages_rx.borrow_and_update().len();

    let initial = state_rx.borrow_and_update().clone();
    report_state(&initial, json);

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("failed to listen for Ctrl+C: {e}");
                }
                info!("received Ctrl+C, leaving");
                break;
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = state_rx.borrow_and_update().clone();
                report_state(&state, json);
                let ended = matches!(state, ConnectionState::Disconnected | ConnectionState::Error { .. });
                if role == Role::Join && ended {
                    break;
                }
            }
            changed = messages_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let messages = messages_rx.borrow_and_update().clone();
                if messages.len() < shown {
                    shown = 0;
                }
                for message in &messages[shown..] {
                    report_message(message, json);
                }
                shown = messages.len();
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(text)) => {
                        if !handle_line(session, &text, json).await {
                            break;
                        }
                    }
                    Ok(None) => {
                        info!("end of input, leaving");
                        break;
                    }
                    Err(e) => {
                        warn!("failed to read stdin: {e}");
                        break;
                    }
                }
            }
        }
    }
    session.shutdown();
}

/// Handles one typed line.  Returns `false` when the user asked to quit.
async fn handle_line(session: &ChatSession, text: &str, json: bool) -> bool {
    match text.trim() {
        "/quit" => false,
        "/status" => {
            if json {
                print_json(&ui_bridge::get_ui_state(session));
            } else {
                let state = session.ui_state();
                println!("* {}", state.connection_state);
                if !state.join_code.is_empty() {
                    println!("* join code: {}", state.join_code);
                }
            }
            true
        }
        "" => true,
        _ => {
            if !session.send(text).await {
                if json {
                    print_json(&CommandResult::<ChatMessageDto>::err("message not sent"));
                } else {
                    println!("* not connected, message not sent");
                }
            }
            true
        }
    }
}

fn report_state(state: &ConnectionState, json: bool) {
    if json {
        print_json(&CommandResult::ok(ConnectionStatusDto::from(state)));
    } else {
        println!("* {state}");
    }
}

fn report_message(message: &ChatMessage, json: bool) {
    if json {
        print_json(&CommandResult::ok(ChatMessageDto::from(message)));
    } else if message.is_from_me {
        println!("you> {}", message.content);
    } else {
        println!("peer> {}", message.content);
    }
}

fn print_json<T: Serialize>(result: &CommandResult<T>) {
    match result.to_json() {
        Ok(line) => println!("{line}"),
        Err(e) => warn!("failed to serialize output: {e}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_host_without_port() {
        // Arrange / Act
        let cli = Cli::parse_from(["p2pchat", "host"]);

        // Assert
        assert_eq!(cli.command, Command::Host { port: None });
        assert!(!cli.json);
        assert_eq!(cli.config, None);
    }

    #[test]
    fn test_cli_host_port_override() {
        let cli = Cli::parse_from(["p2pchat", "host", "--port", "40000"]);
        assert_eq!(cli.command, Command::Host { port: Some(40000) });
    }

    #[test]
    fn test_cli_host_rejects_out_of_range_port() {
        assert!(Cli::try_parse_from(["p2pchat", "host", "--port", "70000"]).is_err());
    }

    #[test]
    fn test_cli_join_takes_positional_input() {
        let cli = Cli::parse_from(["p2pchat", "join", "[fe80::1]:4000"]);
        assert_eq!(
            cli.command,
            Command::Join {
                input: "[fe80::1]:4000".to_string()
            }
        );
    }

    #[test]
    fn test_cli_join_requires_input() {
        assert!(Cli::try_parse_from(["p2pchat", "join"]).is_err());
    }

    #[test]
    fn test_cli_code_and_decode() {
        let code = Cli::parse_from(["p2pchat", "code", "::1", "8080"]);
        assert_eq!(
            code.command,
            Command::Code {
                address: "::1".to_string(),
                port: 8080
            }
        );

        let decode = Cli::parse_from(["p2pchat", "decode", "AAAAAAAAAAAAAAAAAAAAAR-Q"]);
        assert_eq!(
            decode.command,
            Command::Decode {
                code: "AAAAAAAAAAAAAAAAAAAAAR-Q".to_string()
            }
        );
    }

    #[test]
    fn test_cli_save_config_port_is_applied() {
        // Arrange
        let cli = Cli::parse_from(["p2pchat", "--log-level", "warn", "save-config", "-p", "4100"]);

        // Act
        let config = cli.apply_overrides(AppConfig::default());

        // Assert
        assert_eq!(cli.command, Command::SaveConfig { port: Some(4100) });
        assert_eq!(config.network.listen_port, 4100);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_cli_requires_a_subcommand() {
        assert!(Cli::try_parse_from(["p2pchat"]).is_err());
    }

    #[test]
    fn test_cli_global_flags_accepted_after_subcommand() {
        let cli = Cli::parse_from(["p2pchat", "addresses", "--json", "--include-link-local"]);
        assert_eq!(cli.command, Command::Addresses);
        assert!(cli.json);
        assert!(cli.include_link_local);
    }

    #[test]
    fn test_apply_overrides_replaces_file_values() {
        // Arrange
        let cli = Cli::parse_from([
            "p2pchat",
            "--log-level",
            "debug",
            "--include-link-local",
            "host",
            "--port",
            "5000",
        ]);

        // Act
        let config = cli.apply_overrides(AppConfig::default());

        // Assert
        assert_eq!(config.logging.level, "debug");
        assert!(config.network.include_link_local);
        assert_eq!(config.network.listen_port, 5000);
    }

    #[test]
    fn test_apply_overrides_keeps_file_values_when_flags_absent() {
        // Arrange
        let mut file = AppConfig::default();
        file.network.listen_port = 41000;
        file.logging.level = "warn".to_string();
        let cli = Cli::parse_from(["p2pchat", "host"]);

        // Act
        let config = cli.apply_overrides(file.clone());

        // Assert
        assert_eq!(config, file);
    }

    #[test]
    fn test_port_flag_is_ignored_for_join() {
        let mut file = AppConfig::default();
        file.network.listen_port = 41000;
        let cli = Cli::parse_from(["p2pchat", "join", "::1:41000"]);

        let config = cli.apply_overrides(file);

        assert_eq!(config.network.listen_port, 41000);
    }
}
