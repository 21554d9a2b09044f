//! Bargein headless host.
//!
//! Loads settings, replays a session timeline (VAD activity, interim/final
//! transcripts, agent speech) through the arbitration engine, and prints
//! every arbitration event as a JSON line on stdout.
//!
//! ```text
//! bargein [--settings <file.json>] [--scenario <file.json>] [--init-settings]
//! ```

mod scenario;
mod settings;

use std::path::PathBuf;

use bargein_core::ArbitrationEvent;
use chrono::Utc;
use scenario::{build_engine, demo_scenario, load_scenario, replay};
use settings::{default_settings_path, load_settings, save_settings, AppSettings};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Debug, Default)]
struct Args {
    settings_path: Option<PathBuf>,
    scenario_path: Option<PathBuf>,
    init_settings: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args::default();

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--settings" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --settings".into());
                };
                args.settings_path = Some(PathBuf::from(v));
            }
            "--scenario" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --scenario".into());
                };
                args.scenario_path = Some(PathBuf::from(v));
            }
            "--init-settings" => args.init_settings = true,
            "--help" | "-h" => {
                println!(
                    "Usage: bargein [--settings <file.json>] [--scenario <file.json>] [--init-settings]"
                );
                std::process::exit(0);
            }
            other => {
                return Err(format!("unknown argument: {other}"));
            }
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("bargein=info,bargein_core=info")
                }),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("bargein failed: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = parse_args().map_err(anyhow::Error::msg)?;
    let settings_path = args.settings_path.unwrap_or_else(default_settings_path);

    if args.init_settings {
        save_settings(&settings_path, &AppSettings::default())?;
        info!("wrote default settings to {}", settings_path.display());
        return Ok(());
    }

    let settings = load_settings(&settings_path);
    info!(
        "settings loaded from {} (min_delay={}ms max_delay={}ms)",
        settings_path.display(),
        settings.arbitration.pending_interrupt_min_delay_ms,
        settings.arbitration.pending_interrupt_max_delay_ms
    );

    let steps = match args.scenario_path.or_else(|| settings.scenario_path.clone()) {
        Some(path) => load_scenario(&path)?,
        None => {
            info!("no scenario given, replaying built-in demo");
            demo_scenario()
        }
    };

    let (engine, session) = build_engine(&settings)?;
    let mut events = engine.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(n)) => warn!("event printer lagged by {n} events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    replay(&engine, &session, &steps).await?;

    let diagnostics = engine.diagnostics_snapshot();
    info!(
        started = diagnostics.validations_started,
        commits = diagnostics.commits(),
        backchannels = diagnostics.cancelled_backchannel,
        stale = diagnostics.stale_transcripts,
        "replay finished"
    );

    // Dropping the engine closes the event channel and ends the printer.
    drop(engine);
    printer.await?;
    println!("{}", serde_json::json!({ "summary": diagnostics }));
    Ok(())
}

fn print_event(event: &ArbitrationEvent) {
    let line = serde_json::json!({
        "at": Utc::now().to_rfc3339(),
        "event": event,
    });
    println!("{line}");
}
