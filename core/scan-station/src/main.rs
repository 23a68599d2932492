//! scan-station: ticket check-in from a terminal.
//!
//! Reads scanned codes and checks tickets in against the event backend over
//! its Unix socket.
//!
//! ## Subcommands
//!
//! - `scan`: Continuous scanning, one code per line on stdin (scanner wedge)
//! - `lookup`: Validate a single code, optionally check it in
//! - `health`: Probe the backend

mod backend_client;
mod line_source;
mod logging;
mod terminal;

use backend_client::SocketBackend;
use checkin_core::{
    load_config, stop_channel, CheckinConfig, CheckinOutcome, ScanCode, ScanCoordinator,
    ScanReport, SessionHandle, ValidationOutcome, ValidationResult,
};
use clap::{Parser, Subcommand};
use line_source::LineScanSource;
use std::path::PathBuf;
use std::sync::Arc;
use terminal::TerminalFeedback;

#[derive(Parser)]
#[command(name = "scan-station")]
#[command(about = "Ticket check-in scan station")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.scan-station/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Backend socket (overrides SCAN_STATION_SOCKET and the config file)
    #[arg(long, global = true, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// Disable terminal bell cues
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan continuously, reading one code per line from stdin
    Scan,

    /// Validate one code and show the ticket
    Lookup {
        /// Scanned or typed ticket code
        #[arg(value_name = "CODE")]
        code: String,

        /// Check the ticket in after a successful validation
        #[arg(long)]
        check_in: bool,
    },

    /// Check that the backend is reachable and healthy
    Health,
}

struct Station {
    config: CheckinConfig,
    backend: SocketBackend,
    session: SessionHandle,
}

impl Station {
    fn open(cli: &Cli) -> Result<Self, String> {
        let config = load_config(cli.config.clone())?;
        let socket_path = backend_client::resolve_socket_path(cli.socket.clone(), &config.backend)?;
        tracing::debug!(socket = %socket_path.display(), "Backend socket resolved");

        let sink = Arc::new(TerminalFeedback::new(!cli.quiet));
        let session = SessionHandle::new(sink, &config.timing);
        Ok(Self {
            config,
            backend: SocketBackend::new(socket_path),
            session,
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let logging_guard = logging::init();
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Scan => run_scan(&cli).await,
        Commands::Lookup { code, check_in } => run_lookup(&cli, code, *check_in).await,
        Commands::Health => run_health(&cli).await,
    };

    let exit_code = match result {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "scan-station failed");
            eprintln!("scan-station: {}", e);
            1
        }
    };

    // stdin may still be parked on a blocking read; exit without waiting
    // for the runtime to reclaim it.
    drop(logging_guard);
    std::process::exit(exit_code);
}

async fn run_scan(cli: &Cli) -> Result<(), String> {
    let station = Station::open(cli)?;
    let scanner = station.config.scanner.clone();
    let mut source = LineScanSource::new(
        tokio::io::BufReader::new(tokio::io::stdin()),
        scanner.repeat,
        scanner.frame_interval(),
    );
    let mut coordinator =
        ScanCoordinator::new(&station.backend, station.session.clone(), &station.config);

    let (stop, signal) = stop_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received; stopping scan session");
            stop.stop();
        }
    });

    eprintln!("Scanning. One code per line; Ctrl-D or Ctrl-C to finish.");
    let report = coordinator.run(&mut source, signal).await?;
    println!("{}", summary_line(&report));
    Ok(())
}

async fn run_lookup(cli: &Cli, code: &str, check_in: bool) -> Result<(), String> {
    let station = Station::open(cli)?;
    let code = ScanCode::new(code).ok_or_else(|| "Ticket code must not be blank".to_string())?;

    let outcome = station
        .session
        .validate_ticket(&station.backend, &code)
        .await;
    let record = match &outcome {
        ValidationOutcome::Eligible(record) | ValidationOutcome::AlreadyCheckedIn(record) => {
            record.clone()
        }
        // Feedback already reported why.
        _ => return Ok(()),
    };
    print!("{}", ticket_card(&record));

    if !check_in || outcome.eligible_ticket().is_none() {
        station.session.close_modal();
        return Ok(());
    }

    match station.session.check_in_ticket(&station.backend).await {
        CheckinOutcome::Failed(err) => Err(format!("Check-in failed: {}", err)),
        _ => Ok(()),
    }
}

async fn run_health(cli: &Cli) -> Result<(), String> {
    let station = Station::open(cli)?;
    let path = station.backend.socket_path().display().to_string();
    let healthy = tokio::time::timeout(
        station.config.timing.request_timeout(),
        station.backend.health(),
    )
    .await
    .map_err(|_| format!("Backend at {} did not answer in time", path))?
    .map_err(|err| err.to_string())?;

    if healthy {
        println!("Backend healthy ({})", path);
        Ok(())
    } else {
        Err(format!("Backend at {} reported unhealthy", path))
    }
}

fn summary_line(report: &ScanReport) -> String {
    format!(
        "Session ended: {} checked in, {} scans processed, {} duplicate frames skipped, {} unreadable",
        report.checked_in, report.accepted, report.dropped, report.decode_errors
    )
}

fn ticket_card(record: &ValidationResult) -> String {
    let mut card = format!("{}\n  ticket  {}\n", record.attendee_name, record.ticket_id);
    if let Some(event) = &record.event {
        card.push_str(&format!("  event   {}\n", event));
    }
    if let Some(ticket_type) = &record.ticket_type {
        card.push_str(&format!("  type    {}\n", ticket_type));
    }
    for (key, value) in &record.extra {
        let value = value
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string());
        card.push_str(&format!("  {}  {}\n", key, value));
    }
    let status = if record.checked_in {
        "checked in"
    } else {
        "not checked in"
    };
    card.push_str(&format!("  status  {}\n", status));
    card
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkin_core::StopReason;
    use serde_json::json;

    #[test]
    fn cli_parses_lookup_with_global_flags() {
        let cli = Cli::try_parse_from([
            "scan-station",
            "lookup",
            "TKT-1",
            "--check-in",
            "--socket",
            "/tmp/backend.sock",
            "--quiet",
        ])
        .unwrap();

        assert!(cli.quiet);
        assert_eq!(cli.socket, Some(PathBuf::from("/tmp/backend.sock")));
        match cli.command {
            Commands::Lookup { code, check_in } => {
                assert_eq!(code, "TKT-1");
                assert!(check_in);
            }
            _ => panic!("expected lookup"),
        }
    }

    #[test]
    fn cli_requires_a_command() {
        assert!(Cli::try_parse_from(["scan-station"]).is_err());
    }

    #[test]
    fn ticket_card_lists_known_and_extra_fields() {
        let mut extra = serde_json::Map::new();
        extra.insert("seat".to_string(), json!("B12"));
        let record = ValidationResult {
            ticket_id: "T-1".to_string(),
            attendee_name: "Ada".to_string(),
            checked_in: false,
            event: Some("Spring Gala".to_string()),
            ticket_type: None,
            extra,
        };

        let card = ticket_card(&record);
        assert!(card.starts_with("Ada\n"));
        assert!(card.contains("  event   Spring Gala\n"));
        assert!(card.contains("  seat  B12\n"));
        assert!(card.ends_with("  status  not checked in\n"));
        assert!(!card.contains("type"));
    }

    #[test]
    fn summary_reports_counts() {
        let report = ScanReport {
            accepted: 4,
            dropped: 9,
            decode_errors: 1,
            checked_in: 3,
            stop_reason: Some(StopReason::SourceEnded),
        };
        assert_eq!(
            summary_line(&report),
            "Session ended: 3 checked in, 4 scans processed, 9 duplicate frames skipped, 1 unreadable"
        );
    }
}
