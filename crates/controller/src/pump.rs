//! Pump control via GPIO relays. The `gpio` feature gates the real rppal
//! driver; without it, a mock implementation only logs what would run.

use anyhow::Result;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

#[cfg(feature = "gpio")]
use rppal::gpio::{Gpio, OutputPin};

/// How long the pump must run to deliver `ml` at `ml_per_sec`.
pub(crate) fn run_time(ml: u64, ml_per_sec: f64) -> Duration {
    Duration::from_secs_f64(ml as f64 / ml_per_sec)
}

// ---------------------------------------------------------------------------
// Real GPIO pump board (production: requires rppal + Raspberry Pi hardware)
// ---------------------------------------------------------------------------
#[cfg(feature = "gpio")]
pub(crate) struct PumpBoard {
    pins: HashMap<String, OutputPin>, // plant name -> relay pin
    active_low: bool,
    ml_per_sec: f64,
}

#[cfg(feature = "gpio")]
impl PumpBoard {
    pub(crate) fn new(plant_to_gpio: &[(String, u8)], active_low: bool, ml_per_sec: f64) -> Result<Self> {
        let gpio = Gpio::new()?;
        let mut pins = HashMap::new();

        for (plant, pin_num) in plant_to_gpio {
            let mut pin = gpio.get(*pin_num)?.into_output();

            // Fail-safe: ensure "OFF" at startup
            if active_low {
                pin.set_high();
            } else {
                pin.set_low();
            }

            pins.insert(plant.clone(), pin);
        }

        Ok(Self {
            pins,
            active_low,
            ml_per_sec,
        })
    }

    fn set(&mut self, plant: &str, on: bool) {
        if let Some(pin) = self.pins.get_mut(plant) {
            // active-low relay: LOW = ON, HIGH = OFF
            if on != self.active_low {
                pin.set_high()
            } else {
                pin.set_low()
            }
        }
    }

    /// Run the pump for `plant` long enough to deliver `ml`.  Returns the
    /// millilitres dispensed.  The relay stays on across the await; if the
    /// future is dropped mid-run, [`all_off`](Self::all_off) must follow.
    pub(crate) async fn dispense(&mut self, plant: &str, ml: u64) -> Result<u64> {
        if !self.pins.contains_key(plant) {
            warn!(plant = %plant, "no pump wired for plant");
            return Ok(0);
        }
        let duration = run_time(ml, self.ml_per_sec);
        info!(plant = %plant, ml, run_ms = duration.as_millis() as u64, "pump on");
        self.set(plant, true);
        tokio::time::sleep(duration).await;
        self.set(plant, false);
        info!(plant = %plant, "pump off");
        Ok(ml)
    }

    pub(crate) fn all_off(&mut self) {
        let keys: Vec<String> = self.pins.keys().cloned().collect();
        for k in keys {
            self.set(&k, false);
        }
    }
}

// ---------------------------------------------------------------------------
// Mock pump board (development: no hardware, logs what would run)
// ---------------------------------------------------------------------------
#[cfg(not(feature = "gpio"))]
pub(crate) struct PumpBoard {
    pub(super) pumps: HashMap<String, u64>, // plant name -> ml dispensed since boot
    ml_per_sec: f64,
}

#[cfg(not(feature = "gpio"))]
impl PumpBoard {
    pub(crate) fn new(plant_to_gpio: &[(String, u8)], _active_low: bool, ml_per_sec: f64) -> Result<Self> {
        let mut pumps = HashMap::new();
        for (plant, pin_num) in plant_to_gpio {
            info!(plant = %plant, gpio = pin_num, "[mock-gpio] registered pump (not wired)");
            pumps.insert(plant.clone(), 0);
        }
        Ok(Self { pumps, ml_per_sec })
    }

    pub(crate) async fn dispense(&mut self, plant: &str, ml: u64) -> Result<u64> {
        match self.pumps.get_mut(plant) {
            Some(given) => {
                *given += ml;
                info!(
                    plant = %plant,
                    ml,
                    run_ms = run_time(ml, self.ml_per_sec).as_millis() as u64,
                    "[mock-gpio] pump run"
                );
                Ok(ml)
            }
            None => {
                warn!(plant = %plant, "[mock-gpio] no pump wired for plant");
                Ok(0)
            }
        }
    }

    pub(crate) fn all_off(&mut self) {
        info!("[mock-gpio] all pumps off");
    }
}

// ===========================================================================
// Tests
// ===========================================================================
