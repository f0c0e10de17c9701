use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode, Stdio};
use std::sync::Arc;
use std::time::Duration;

use stream_autoconnect::candidates::{self, Candidate};
use stream_autoconnect::logging::{self, LogLevel};
use stream_autoconnect::port::TcpConnectProbe;
use stream_autoconnect::reachability::{IcmpProbe, ReachabilityProbe, SkipReachability};
use stream_autoconnect::scanner::{Probes, ScanConfig, Scanner};
use stream_autoconnect::session::ScanSession;
use stream_autoconnect::types::{ScanEvent, ScanOutcome, ScanReport};
use stream_autoconnect::validator::FfmpegValidator;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;

/// stream-autoconnect — find the first live camera stream in a candidate list and open it in a player.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stream-autoconnect",
    version,
    about = "Find the first live RTSP stream among known addresses and hand it to a video player.",
    long_about = None
)]
struct Cli {
    /// Path to candidates file (one stream address per line). Falls back to built-in addresses.
    #[arg(long, default_value = "candidates.txt")]
    candidates: PathBuf,

    /// Candidate stream address, tried in the order given. Overrides the candidates file.
    #[arg(long = "candidate", value_name = "URL")]
    candidate: Vec<String>,

    /// ICMP echo timeout in milliseconds.
    #[arg(long = "ping-timeout-ms", default_value_t = 1000)]
    ping_timeout_ms: u64,

    /// TCP connect timeout in milliseconds.
    #[arg(long = "connect-timeout-ms", default_value_t = 1000)]
    connect_timeout_ms: u64,

    /// Stream open and first-frame timeout in milliseconds.
    #[arg(long = "stream-timeout-ms", default_value_t = 2000)]
    stream_timeout_ms: u64,

    /// Skip the ICMP stage (for networks that drop echo, or without ICMP socket privileges).
    #[arg(long = "no-ping", default_value_t = false)]
    no_ping: bool,

    /// ffmpeg binary used to decode the validation frame.
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// Player to launch with the confirmed address (e.g. `vlc`). Without it the address is only printed.
    #[arg(long)]
    player: Option<PathBuf>,

    /// Extra argument passed to the player after the address. Repeatable.
    #[arg(
        long = "player-arg",
        allow_hyphen_values = true,
        default_values_t = [String::from("--fullscreen")]
    )]
    player_args: Vec<String>,

    /// Emit progress events as JSON lines on stdout.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Write the scan report as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Console log level (RUST_LOG overrides).
    #[arg(long = "log-level", value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init_tracing(cli.log_level)?;

    let list: Vec<Candidate> = if cli.candidate.is_empty() {
        candidates::load_candidates_or_default(&cli.candidates)
    } else {
        cli.candidate.iter().map(|a| Candidate::new(a.as_str())).collect()
    };

    let config = ScanConfig {
        reachability_timeout: Duration::from_millis(cli.ping_timeout_ms),
        connect_timeout: Duration::from_millis(cli.connect_timeout_ms),
        stream_timeout: Duration::from_millis(cli.stream_timeout_ms),
    };

    if !cli.json {
        print_config(&cli, &list);
    }

    let reachability: Arc<dyn ReachabilityProbe> = if cli.no_ping {
        Arc::new(SkipReachability)
    } else {
        Arc::new(IcmpProbe)
    };
    let probes = Probes {
        reachability,
        port: Arc::new(TcpConnectProbe),
        stream: Arc::new(FfmpegValidator::new(&cli.ffmpeg)),
    };

    let session = ScanSession::new(Scanner::new(probes, config));
    let mut handle = session.start(list)?;

    // Ctrl-C cancels the scan at its next checkpoint.
    let cancel = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    while let Some(event) = handle.next_event().await {
        print_event(&event, cli.json)?;
    }
    let report = handle.join().await?;

    if let Some(path) = cli.output.as_deref() {
        if let Err(e) = write_report_json(path, &report) {
            eprintln!("Failed to write JSON to {}: {e:#}", path.display());
        } else if !cli.json {
            eprintln!("Wrote JSON report to {}", path.display());
        }
    }

    match &report.outcome {
        ScanOutcome::Found(address) => {
            if !cli.json {
                println!("{address}");
            }
            if let Some(player) = cli.player.as_deref() {
                launch_player(player, &cli.player_args, address)?;
                if !cli.json {
                    eprintln!("Launched {} with {address}", player.display());
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        ScanOutcome::NotFound => {
            if !cli.json {
                eprintln!("No active stream found. Check the camera connection and cable.");
            }
            Ok(ExitCode::from(1))
        }
        ScanOutcome::Cancelled => {
            if !cli.json {
                eprintln!("Scan cancelled.");
            }
            Ok(ExitCode::from(130))
        }
    }
}

fn print_config(cli: &Cli, list: &[Candidate]) {
    eprintln!("stream-autoconnect configuration:");
    if cli.candidate.is_empty() {
        eprintln!("  candidates   : {}", cli.candidates.display());
    } else {
        eprintln!("  candidates   : <command line>");
    }
    for c in list {
        eprintln!("    - {c}");
    }
    eprintln!(
        "  ping         : {}",
        if cli.no_ping {
            "disabled".to_string()
        } else {
            format!("{}ms", cli.ping_timeout_ms)
        }
    );
    eprintln!("  connect      : {}ms", cli.connect_timeout_ms);
    eprintln!("  stream       : {}ms", cli.stream_timeout_ms);
    eprintln!("  ffmpeg       : {}", cli.ffmpeg.display());
    eprintln!(
        "  player       : {}",
        cli.player
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<print only>".to_string())
    );
}

fn print_event(event: &ScanEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    match event {
        ScanEvent::Started { total } => eprintln!("\nChecking {total} candidate(s)..."),
        ScanEvent::Progress(p) => eprintln!(
            "[{}/{}] {:<40} {:<12} {}",
            p.index + 1,
            p.total,
            p.address,
            p.stage,
            if p.passed { "ok" } else { "failed" }
        ),
        ScanEvent::Finished(_) => {}
    }
    Ok(())
}

fn write_report_json(path: &Path, report: &ScanReport) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}

/// Start the player detached; its lifetime is not ours to manage.
fn launch_player(player: &Path, extra: &[String], address: &str) -> Result<()> {
    Command::new(player)
        .arg(address)
        .args(extra)
        .stdin(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to launch player {}", player.display()))?;
    Ok(())
}
