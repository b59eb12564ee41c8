//! Weather readings for the demand model.
//!
//! Real sensor drivers plug in through [`WeatherSource`].  For local
//! development [`SimWeather`] produces plausible readings:
//! - Diurnal temperature cycle peaking mid-afternoon
//! - Relative humidity moving opposite to temperature
//! - Cloud cover as a bounded random walk
//! - Per-reading sensor noise

use std::f64::consts::PI;
use std::fmt;

use irrigation_core::timecalc::SECS_PER_DAY;
use irrigation_core::Weather;

pub trait WeatherSource {
    /// Current reading; `local_secs_today` is seconds since local midnight.
    fn read(&mut self, local_secs_today: u64) -> Weather;
}

/// A constant reading.
impl WeatherSource for Weather {
    fn read(&mut self, _local_secs_today: u64) -> Weather {
        *self
    }
}

// ---------------------------------------------------------------------------
// Gaussian approximation (no extra dependency)
// ---------------------------------------------------------------------------

/// Approximate a sample from N(0,1) using the Irwin-Hall method:
/// sum of 12 uniform [0,1) values minus 6.
fn approx_std_normal(rng: &mut fastrand::Rng) -> f64 {
    (0..12).map(|_| rng.f64()).sum::<f64>() - 6.0
}

// ---------------------------------------------------------------------------
// Scenario presets
// ---------------------------------------------------------------------------

/// Pre-configured simulation profiles selectable via `SIM_SCENARIO` env var.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Late-spring day: 12–26 °C, moderate humidity, scattered cloud.
    Mild,
    /// Heat wave: 24–40 °C, dry air, clear sky.  Pushes demand past
    /// `daily_max` in the afternoon.
    Hot,
    /// Cool, humid and overcast.  Demand stays near `daily_min`.
    Overcast,
}

impl Scenario {
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "hot" => Self::Hot,
            "overcast" => Self::Overcast,
            _ => Self::Mild, // default
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mild => write!(f, "mild"),
            Self::Hot => write!(f, "hot"),
            Self::Overcast => write!(f, "overcast"),
        }
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Local time of the daily temperature peak (15:00).
const PEAK_SECS: f64 = 15.0 * 3600.0;

pub struct SimWeather {
    rng: fastrand::Rng,

    // Temperature: mean ± amplitude over the day
    temp_mean: f64,
    temp_amplitude: f64,

    // Humidity: mean ∓ amplitude (lowest at the temperature peak)
    humidity_mean: f64,
    humidity_amplitude: f64,

    // Cloud random walk
    cloud: f64,
    cloud_center: f64,
    cloud_sigma: f64,
    mean_reversion: f64,

    noise_sigma: f64,
}

impl SimWeather {
    pub fn new(scenario: Scenario) -> Self {
        Self::with_rng(scenario, fastrand::Rng::new())
    }

    /// Reproducible simulator for tests and replays.
    pub fn with_seed(scenario: Scenario, seed: u64) -> Self {
        Self::with_rng(scenario, fastrand::Rng::with_seed(seed))
    }

    fn with_rng(scenario: Scenario, rng: fastrand::Rng) -> Self {
        let (temp_mean, temp_amplitude, humidity_mean, humidity_amplitude, cloud_center, cloud_sigma) =
            match scenario {
                Scenario::Mild => (19.0, 7.0, 55.0, 15.0, 35.0, 6.0),
                Scenario::Hot => (32.0, 8.0, 25.0, 10.0, 5.0, 2.0),
                Scenario::Overcast => (11.0, 3.0, 85.0, 8.0, 90.0, 4.0),
            };

        Self {
            rng,
            temp_mean,
            temp_amplitude,
            humidity_mean,
            humidity_amplitude,
            cloud: cloud_center,
            cloud_center,
            cloud_sigma,
            mean_reversion: 0.05,
            noise_sigma: 0.3,
        }
    }

    fn gaussian(&mut self, mean: f64, sigma: f64) -> f64 {
        mean + sigma * approx_std_normal(&mut self.rng)
    }
}

impl WeatherSource for SimWeather {
    fn read(&mut self, local_secs_today: u64) -> Weather {
        let secs = (local_secs_today % SECS_PER_DAY) as f64;
        let phase = 2.0 * PI * (secs - PEAK_SECS) / SECS_PER_DAY as f64;
        let diurnal = phase.cos(); // 1.0 at the afternoon peak, -1.0 before dawn

        let pull = self.mean_reversion * (self.cloud_center - self.cloud);
        let step = self.gaussian(0.0, self.cloud_sigma);
        self.cloud = (self.cloud + pull + step).clamp(0.0, 100.0);

        let temperature_c = self.gaussian(self.temp_mean + self.temp_amplitude * diurnal, self.noise_sigma);
        let humidity_pct = self
            .gaussian(self.humidity_mean - self.humidity_amplitude * diurnal, self.noise_sigma)
            .clamp(0.0, 100.0);

        Weather {
            temperature_c,
            humidity_pct,
            cloud_cover_pct: self.cloud,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
