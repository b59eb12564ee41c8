//! Per-plant water demand model.
//!
//! The daily target ramps linearly over a 13 h reference daylight window and
//! is scaled by a weather weight (cloud cover and humidity) and an
//! exponential temperature response centred on 35 °C:
//!
//! ```text
//! target = min + (max - min) * weight * 2^(5 * (temp/35 - 1)) * secs/46800
//! weight = 0.3 * (1 - cloud/100) + 0.7 * (1 - humidity/100)
//! ```
//!
//! The target is cumulative ("how much should have been given by now"), so
//! each watering dispenses the gap between it and what was already given.
//! Sensor readings are used as given; nothing is clamped.

/// Length of the reference daylight window (13 h) in seconds.
pub const DAYLIGHT_WINDOW_SECS: f64 = 46_800.0;

/// Temperature at which the temperature response is exactly 1.
pub const REFERENCE_TEMP_C: f64 = 35.0;

const TEMP_EXPONENT_SCALE: f64 = 5.0;
const CLOUD_WEIGHT: f64 = 0.3;
const HUMIDITY_WEIGHT: f64 = 0.7;

/// Environmental inputs for one control cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weather {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub cloud_cover_pct: f64,
}

impl Weather {
    pub fn new(temperature_c: f64, humidity_pct: f64, cloud_cover_pct: f64) -> Self {
        Self {
            temperature_c,
            humidity_pct,
            cloud_cover_pct,
        }
    }

    /// Share of the daily range this weather calls for, before the time ramp.
    fn demand_factor(&self) -> f64 {
        let weight = CLOUD_WEIGHT * (1.0 - self.cloud_cover_pct / 100.0)
            + HUMIDITY_WEIGHT * (1.0 - self.humidity_pct / 100.0);
        let temp_response =
            (TEMP_EXPONENT_SCALE * (self.temperature_c / REFERENCE_TEMP_C - 1.0)).exp2();
        weight * temp_response
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plant {
    name: String,
    daily_min_ml: u64,
    daily_max_ml: u64,
    max_per_watering_ml: u64,
    daily_dispensed_ml: u64,
    total_dispensed_ml: u64,
}

impl Plant {
    pub fn new(
        name: impl Into<String>,
        daily_min_ml: u64,
        daily_max_ml: u64,
        max_per_watering_ml: u64,
    ) -> Self {
        Self {
            name: name.into(),
            daily_min_ml,
            daily_max_ml,
            max_per_watering_ml,
            daily_dispensed_ml: 0,
            total_dispensed_ml: 0,
        }
    }

    /// Plant whose single waterings are only bounded by the daily maximum.
    pub fn without_watering_cap(name: impl Into<String>, daily_min_ml: u64, daily_max_ml: u64) -> Self {
        Self::new(name, daily_min_ml, daily_max_ml, daily_max_ml)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn daily_min(&self) -> u64 {
        self.daily_min_ml
    }

    pub fn daily_max(&self) -> u64 {
        self.daily_max_ml
    }

    pub fn max_per_watering(&self) -> u64 {
        self.max_per_watering_ml
    }

    /// Water given since the last [`reset_daily_water`](Self::reset_daily_water).
    pub fn daily_water(&self) -> u64 {
        self.daily_dispensed_ml
    }

    /// Water given over the plant's lifetime.
    pub fn total_water(&self) -> u64 {
        self.total_dispensed_ml
    }

    /// Cumulative target for this point of the day, in ml.
    ///
    /// Non-negative for humidity and cloud cover within 0–100 %.  The ramp
    /// keeps growing past 13 h of elapsed time.
    pub fn daily_water_total(&self, weather: &Weather, secs_elapsed_today: u64) -> f64 {
        let min = self.daily_min_ml as f64;
        let range = self.daily_max_ml as f64 - min;
        let ramp = secs_elapsed_today as f64 / DAYLIGHT_WINDOW_SECS;

        min + range * weather.demand_factor() * ramp
    }

    /// Amount to dispense now, capped at `max_per_watering`.
    ///
    /// A zero or negative result means the plant is already at or above its
    /// target for this time of day and must not be watered.  A NaN target
    /// (e.g. a failed sensor reading) yields NaN, never the cap.
    pub fn calc_water_amount(&self, weather: &Weather, secs_elapsed_today: u64) -> f64 {
        let gap = self.daily_water_total(weather, secs_elapsed_today) - self.daily_dispensed_ml as f64;
        let cap = self.max_per_watering_ml as f64;
        if gap > cap {
            cap
        } else {
            gap
        }
    }

    /// Record water actually dispensed.
    pub fn add_water(&mut self, ml: u64) {
        self.daily_dispensed_ml = self.daily_dispensed_ml.saturating_add(ml);
        self.total_dispensed_ml = self.total_dispensed_ml.saturating_add(ml);
    }

    pub fn reset_daily_water(&mut self) {
        self.daily_dispensed_ml = 0;
    }
}

// ===========================================================================
// Tests
// ===========================================================================
