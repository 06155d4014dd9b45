//! `agentctl`: command-line access to the local agent's control API.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Read configuration** — [`HttpConfig::from_env`] (agent address, ACL
//!    token, datacenter, request timeout).
//! 2. **Wire observability** — configure `tracing-subscriber` on stderr, with
//!    `RUST_LOG` filtering and JSON output when `AGENTCTL_LOG_FORMAT=json`.
//!    Streamed agent log lines go to stdout and are never mixed with our own.
//! 3. **Construct infrastructure** — build an [`HttpTransport`] and inject it
//!    into an [`Agent`].
//! 4. **Dispatch** — run one command and map its outcome to an exit code.
//!
//! ## Commands
//!
//! ```text
//! agentctl self
//! agentctl members [--wan]
//! agentctl checks
//! agentctl ttl <status> <check-id> [note]
//! agentctl monitor [level] [--json]
//! ```

use std::io::Write;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use agent::{Agent, CancellationToken, CheckId, HealthStatus, LogLevel, StatusDecodeError};
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use transport_http::{HttpConfig, HttpTransport};

#[derive(Parser)]
#[command(name = "agentctl")]
#[command(about = "Query and control the local service-discovery agent")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
enum Command {
    /// Print the agent's node name and datacenter
    #[command(name = "self")]
    SelfInfo,
    /// List cluster members
    Members {
        /// List WAN members instead of LAN members
        #[arg(long)]
        wan: bool,
    },
    /// List the checks registered with the agent
    Checks,
    /// Update a TTL check
    Ttl {
        /// pass, warn or fail (legacy endpoint); passing, warning or critical (update endpoint)
        #[arg(value_parser = parse_ttl_status)]
        status: TtlStatus,
        /// ID of the TTL check
        #[arg(value_parser = parse_check_id)]
        check_id: CheckId,
        /// Note (legacy) or output (update) recorded with the status
        note: Option<String>,
    },
    /// Stream the agent's log until it closes the stream or Ctrl-C
    Monitor {
        /// trace, debug, info, warn or error
        #[arg(default_value_t = LogLevel::Info, value_parser = LogLevel::from_str)]
        level: LogLevel,
        /// Ask the agent for JSON log lines
        #[arg(long)]
        json: bool,
    },
}

/// A decoded TTL status and the vocabulary it was written in.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TtlStatus {
    status: HealthStatus,
    /// `pass`, `warn` or `fail` select the legacy endpoint.
    legacy: bool,
}

fn parse_ttl_status(raw: &str) -> Result<TtlStatus, StatusDecodeError> {
    Ok(TtlStatus {
        status: HealthStatus::from_str(raw)?,
        legacy: HealthStatus::is_legacy_word(raw),
    })
}

fn parse_check_id(raw: &str) -> Result<CheckId, String> {
    CheckId::new(raw).ok_or_else(|| "check id must not be empty".to_string())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if std::env::var("AGENTCTL_LOG_FORMAT").as_deref() == Ok("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(agent: &Agent, command: Command) -> Result<()> {
    let mut stdout = std::io::stdout();

    match command {
        Command::SelfInfo => {
            let me = agent.self_info().await?;
            let node = me
                .config
                .node_name
                .map(|n| n.to_string())
                .unwrap_or_default();
            let dc = me.config.datacenter.unwrap_or_default();
            writeln!(stdout, "{node}\t{dc}")?;
        }
        Command::Members { wan } => {
            for member in agent.members(wan).await? {
                writeln!(
                    stdout,
                    "{}\t{}:{}\t{}",
                    member.name, member.addr, member.port, member.status
                )?;
            }
        }
        Command::Checks => {
            let mut checks: Vec<_> = agent.checks().await?.into_values().collect();
            checks.sort_by(|a, b| a.check_id.as_str().cmp(b.check_id.as_str()));
            for check in checks {
                writeln!(stdout, "{}\t{}\t{}", check.check_id, check.status, check.name)?;
            }
        }
        Command::Ttl {
            status: TtlStatus { status, legacy },
            check_id,
            note,
        } => {
            if legacy {
                agent.legacy_ttl(&check_id, status, note.as_deref()).await?;
            } else {
                agent
                    .update_ttl(&check_id, note.as_deref().unwrap_or_default(), status)
                    .await?;
            }
            info!(check = %check_id, %status, "TTL check updated");
        }
        Command::Monitor { level, json } => monitor(agent, level, json).await?,
    }
    Ok(())
}

/// Tails the agent log until the agent closes the stream or Ctrl-C.
async fn monitor(agent: &Agent, level: LogLevel, json: bool) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let opened = if json {
        agent.monitor_json(level, &cancel).await
    } else {
        agent.monitor(level, &cancel).await
    };
    let mut reader = match opened {
        Ok(reader) => reader,
        Err(e) if e.is_cancelled() => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    loop {
        match reader.next_line().await {
            Ok(Some(line)) => {
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{line}")?;
                stdout.flush()?;
            }
            Ok(None) => return Ok(()),
            Err(e) if e.is_cancelled() => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
}

async fn connect_and_run(command: Command) -> Result<()> {
    let config = HttpConfig::from_env()?;
    let transport = HttpTransport::new(config)?;
    let agent = Agent::new(Arc::new(transport));
    run(&agent, command).await
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    match connect_and_run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "agentctl failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, clap::Error> {
        Cli::try_parse_from(std::iter::once("agentctl").chain(args.iter().copied()))
            .map(|cli| cli.command)
    }

    #[test]
    fn test_ttl_keeps_track_of_vocabulary() {
        assert_eq!(
            parse(&["ttl", "warn", "web", "slow responses"]).unwrap(),
            Command::Ttl {
                status: TtlStatus {
                    status: HealthStatus::Warning,
                    legacy: true,
                },
                check_id: CheckId::new("web").unwrap(),
                note: Some("slow responses".into()),
            }
        );
        assert_eq!(
            parse(&["ttl", "critical", "web"]).unwrap(),
            Command::Ttl {
                status: TtlStatus {
                    status: HealthStatus::Critical,
                    legacy: false,
                },
                check_id: CheckId::new("web").unwrap(),
                note: None,
            }
        );
    }

    #[test]
    fn test_ttl_rejects_unknown_status() {
        assert!(parse(&["ttl", "ok", "web"]).is_err());
        assert!(parse(&["ttl", "pass"]).is_err());
        assert!(parse(&["ttl", "pass", ""]).is_err());
    }

    #[test]
    fn test_monitor_level_and_flags() {
        assert_eq!(
            parse(&["monitor", "--json", "debug"]).unwrap(),
            Command::Monitor {
                level: LogLevel::Debug,
                json: true,
            }
        );
        assert_eq!(
            parse(&["monitor"]).unwrap(),
            Command::Monitor {
                level: LogLevel::Info,
                json: false,
            }
        );
        assert_eq!(
            parse(&["members", "--wan"]).unwrap(),
            Command::Members { wan: true }
        );
        assert_eq!(parse(&["self"]).unwrap(), Command::SelfInfo);
        assert!(parse(&["monitor", "loud"]).is_err());
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["restart"]).is_err());
    }

    #[test]
    fn test_mistyped_flags_and_extra_arguments_are_rejected() {
        assert!(parse(&["monitor", "--jsno"]).is_err());
        assert!(parse(&["members", "--wna"]).is_err());
        assert!(parse(&["self", "bogus"]).is_err());
        assert!(parse(&["checks", "--wan"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
