mod config;
mod pump;
mod scheduler;
mod weather;

use anyhow::{Context, Result};
use irrigation_core::{Logger, SystemClock};
use std::{env, io, time::Duration};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pump::PumpBoard;
use scheduler::Controller;
use weather::{Scenario, SimWeather};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ── Config file ─────────────────────────────────────────────────
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = config::load(&config_path)?;
    let ctl = cfg.controller.clone();

    let plants = cfg.plants();
    if plants.is_empty() {
        warn!("no plants configured, nothing will be watered");
    }

    // ── Wall clock at boot ──────────────────────────────────────────
    let start_epoch = match ctl.start_epoch {
        Some(ts) => ts,
        None => std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .context("system clock is before 1970")?
            .as_secs(),
    };

    // ── Pumps ───────────────────────────────────────────────────────
    let plant_to_gpio: Vec<(String, u8)> = cfg
        .plants
        .iter()
        .map(|p| (p.name.clone(), p.pump_gpio_pin as u8))
        .collect();
    let mut pumps = PumpBoard::new(&plant_to_gpio, ctl.relay_active_low, ctl.ml_per_sec)?;
    pumps.all_off();

    // ── Weather ─────────────────────────────────────────────────────
    let scenario = Scenario::from_str_lossy(&env::var("SIM_SCENARIO").unwrap_or_default());
    let seed: Option<u64> = env::var("SIM_SEED").ok().and_then(|s| s.parse().ok());
    let weather = match seed {
        Some(seed) => SimWeather::with_seed(scenario, seed),
        None => SimWeather::new(scenario),
    };
    info!(%scenario, ?seed, "using simulated weather");

    // ── Telemetry log (mirrored to stdout) ──────────────────────────
    let clock = SystemClock::new();
    let log = Logger::new(Some(Box::new(io::stdout())), clock, start_epoch)
        .with_timezone(ctl.timezone_hours, ctl.dst);

    let mut controller = Controller::new(
        plants,
        pumps,
        weather,
        log,
        ctl.timezone_hours,
        ctl.dst,
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
        }
    };
    scheduler::run(
        &mut controller,
        clock,
        start_epoch,
        Duration::from_secs(ctl.tick_sec),
        shutdown,
    )
    .await;
    Ok(())
}
