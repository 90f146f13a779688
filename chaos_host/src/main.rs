//! Standalone host binary.
//!
//! Usage:
//!   cargo run -p chaos_host -- [--config chaos.json|config.ini] [--tick-hz 30] [--seed N] [--peds N]
//!
//! Runs a headless world with a handful of peds and dispatches effects on a
//! timer.
//!
//! Console commands:
//!   effect_start <id>  - Start an effect
//!   effect_stop <id>   - Stop an effect
//!   effects            - List effects (* = active)
//!   peds               - List peds
//!   status             - Show host status
//!   quit               - Stop all effects and exit (archived cvars are
//!                        written back to an options-file config)

use std::env;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use chaos_host::{ChaosHost, HostState};
use chaos_shared::config::ChaosConfig;
use tokio::sync::mpsc;
use tracing::{info, warn};

fn parse_args() -> anyhow::Result<(ChaosConfig, Option<PathBuf>)> {
    let args: Vec<String> = env::args().collect();

    let config_path = args
        .windows(2)
        .find(|pair| pair[0] == "--config")
        .map(|pair| PathBuf::from(&pair[1]));
    let mut cfg = match &config_path {
        Some(path) => ChaosConfig::load(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => ChaosConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1].parse().unwrap_or(cfg.tick_hz);
                i += 2;
            }
            "--seed" if i + 1 < args.len() => {
                cfg.seed = args[i + 1].parse().ok();
                i += 2;
            }
            "--peds" if i + 1 < args.len() => {
                cfg.demo_peds = args[i + 1].parse().unwrap_or(cfg.demo_peds);
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok((cfg, config_path))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let (cfg, config_path) = parse_args()?;
    info!(
        tick_hz = cfg.tick_hz,
        spawn_interval_secs = cfg.spawn_interval_secs,
        timed_duration_secs = cfg.timed_duration_secs,
        seed = ?cfg.seed,
        "Starting host"
    );

    let mut host = ChaosHost::new(cfg.clone()).context("create host")?;
    let peds = host.spawn_demo_peds(cfg.demo_peds);
    info!(peds = peds.len(), "Spawned demo peds");

    // Set up console input channel.
    let (console_tx, console_rx) = mpsc::channel::<String>(32);
    host.set_console_input(console_rx);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Host ready. Type 'effects' to list effects, 'status' for info, 'quit' to exit.");
    println!();

    let tick_interval = std::time::Duration::from_secs_f32(1.0 / cfg.tick_hz.max(1) as f32);
    let mut next_tick = tokio::time::Instant::now();

    while host.state() == HostState::Running {
        host.step(tick_interval.as_secs_f32())?;

        next_tick += tick_interval;
        tokio::time::sleep_until(next_tick).await;
    }

    host.shutdown();
    if let Some(path) = config_path {
        if let Err(e) = host.save_archived_cvars(&path) {
            warn!(error = %e, "Failed to save archived cvars");
        }
    }
    Ok(())
}
