//! TOML config file loading and validation for the controller and its
//! plants.

use anyhow::{bail, Context, Result};
use irrigation_core::Plant;
use serde::Deserialize;
use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerSection,
    #[serde(default)]
    pub plants: Vec<PlantEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControllerSection {
    /// Fixed offset from UTC, whole hours.
    pub timezone_hours: i32,
    /// Apply the approximate summer-time hour.
    pub dst: bool,
    /// Epoch seconds at boot.  Defaults to the host wall clock.
    pub start_epoch: Option<u64>,
    pub tick_sec: u64,
    /// Pump flow rate used to turn millilitres into run time.
    pub ml_per_sec: f64,
    /// Many relay boards switch on a LOW level.
    pub relay_active_low: bool,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            timezone_hours: 0,
            dst: false,
            start_epoch: None,
            tick_sec: 60,
            ml_per_sec: 10.0,
            relay_active_low: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlantEntry {
    pub name: String,
    pub daily_min_ml: u64,
    pub daily_max_ml: u64,
    /// Omitted → capped only by `daily_max_ml`.
    #[serde(default)]
    pub max_per_watering_ml: Option<u64>,
    pub pump_gpio_pin: i64,
}

impl PlantEntry {
    pub fn to_plant(&self) -> Plant {
        match self.max_per_watering_ml {
            Some(cap) => Plant::new(&self.name, self.daily_min_ml, self.daily_max_ml, cap),
            None => Plant::without_watering_cap(&self.name, self.daily_min_ml, self.daily_max_ml),
        }
    }
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// BCM GPIO pins available on the Raspberry Pi 40-pin header for general
/// use. GPIO 0-1 are reserved for the ID EEPROM and must never be used.
/// GPIO 28+ are not exposed on the standard header.
const VALID_GPIO_PINS: &[i64] = &[
    2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27,
];

/// Real-world UTC offsets span UTC-12 to UTC+14.
const TIMEZONE_RANGE: std::ops::RangeInclusive<i32> = -12..=14;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate all config entries. Returns `Ok(())` or an error describing
    /// every violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_controller(&mut errors);
        self.validate_plants(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    pub fn plants(&self) -> Vec<Plant> {
        self.plants.iter().map(PlantEntry::to_plant).collect()
    }

    fn validate_controller(&self, errors: &mut Vec<String>) {
        let c = &self.controller;

        if !TIMEZONE_RANGE.contains(&c.timezone_hours) {
            errors.push(format!(
                "controller: timezone_hours {} out of range [-12, 14]",
                c.timezone_hours
            ));
        }
        if c.tick_sec == 0 {
            errors.push("controller: tick_sec must be positive".to_string());
        }
        if !c.ml_per_sec.is_finite() || c.ml_per_sec <= 0.0 {
            errors.push(format!(
                "controller: ml_per_sec must be positive, got {}",
                c.ml_per_sec
            ));
        }
    }

    fn validate_plants(&self, errors: &mut Vec<String>) {
        let mut seen_names: HashSet<&str> = HashSet::new();
        let mut seen_pins: HashSet<i64> = HashSet::new();

        for (i, p) in self.plants.iter().enumerate() {
            let ctx = || {
                if p.name.is_empty() {
                    format!("plants[{i}]")
                } else {
                    format!("plant '{}'", p.name)
                }
            };

            // ── Identity ────────────────────────────────────────
            if p.name.trim().is_empty() {
                errors.push(format!("{}: name is empty", ctx()));
            } else if !seen_names.insert(&p.name) {
                errors.push(format!("{}: duplicate name", ctx()));
            }

            // ── Daily bounds ────────────────────────────────────
            if p.daily_max_ml == 0 {
                errors.push(format!("{}: daily_max_ml must be positive", ctx()));
            }
            if p.daily_min_ml > p.daily_max_ml {
                errors.push(format!(
                    "{}: daily_min_ml ({}) exceeds daily_max_ml ({})",
                    ctx(),
                    p.daily_min_ml,
                    p.daily_max_ml
                ));
            }
            if p.max_per_watering_ml == Some(0) {
                errors.push(format!("{}: max_per_watering_ml must be positive", ctx()));
            }

            // ── GPIO pin whitelist ──────────────────────────────
            if !VALID_GPIO_PINS.contains(&p.pump_gpio_pin) {
                errors.push(format!(
                    "{}: pump_gpio_pin {} is not a valid BCM GPIO pin (allowed: 2-27)",
                    ctx(),
                    p.pump_gpio_pin
                ));
            } else if !seen_pins.insert(p.pump_gpio_pin) {
                errors.push(format!(
                    "{}: pump_gpio_pin {} is already used by another plant",
                    ctx(),
                    p.pump_gpio_pin
                ));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read, parse, and validate a TOML config file.
pub fn load(path: &str) -> Result<Config> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config: {path}"))?;
    parse(&contents).with_context(|| format!("invalid config: {path}"))
}

/// Parse and validate config text.
pub fn parse(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents).context("failed to parse config")?;
    config.validate()?;
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -- Helper: build a valid baseline config that passes validation ------

    fn valid_plant() -> PlantEntry {
        PlantEntry {
            name: "basil".into(),
            daily_min_ml: 200,
            daily_max_ml: 1000,
            max_per_watering_ml: Some(300),
            pump_gpio_pin: 17,
        }
    }

    fn valid_config() -> Config {
        Config {
            controller: ControllerSection::default(),
            plants: vec![valid_plant()],
        }
    }

    /// Assert validation fails and the error message contains `needle`.
    fn assert_validation_err(cfg: &Config, needle: &str) {
        let err = cfg.validate().unwrap_err();
        let msg = format!("{err:#}");
        assert!(
            msg.contains(needle),
            "expected error containing {needle:?}, got: {msg}"
        );
    }

    // -- Parsing ----------------------------------------------------------

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[controller]
timezone_hours = 1
dst = true
start_epoch = 1718452800
tick_sec = 30
ml_per_sec = 12.5

[[plants]]
name = "basil"
daily_min_ml = 200
daily_max_ml = 1000
max_per_watering_ml = 300
pump_gpio_pin = 17

[[plants]]
name = "tomato"
daily_min_ml = 500
daily_max_ml = 2500
pump_gpio_pin = 27
"#;
        let config = parse(toml_str).unwrap();
        assert_eq!(config.controller.timezone_hours, 1);
        assert!(config.controller.dst);
        assert_eq!(config.controller.start_epoch, Some(1_718_452_800));
        assert_eq!(config.controller.tick_sec, 30);
        assert_eq!(config.plants.len(), 2);
        assert_eq!(config.plants[1].max_per_watering_ml, None);
    }

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.plants.is_empty());
        assert_eq!(config.controller.timezone_hours, 0);
        assert!(!config.controller.dst);
        assert_eq!(config.controller.start_epoch, None);
        assert_eq!(config.controller.tick_sec, 60);
        assert!(config.controller.relay_active_low);
    }

    #[test]
    fn parse_rejects_invalid_values() {
        let err = parse(
            r#"
[controller]
tick_sec = 0
"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("tick_sec must be positive"));
    }

    #[test]
    fn parse_reports_syntax_errors() {
        let err = parse("[[plants]\nname = ").unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse config"));
    }

    // -- Plant construction -----------------------------------------------

    #[test]
    fn plant_entry_with_cap() {
        let plant = valid_plant().to_plant();
        assert_eq!(plant.name(), "basil");
        assert_eq!(plant.max_per_watering(), 300);
    }

    #[test]
    fn plant_entry_without_cap_defaults_to_daily_max() {
        let entry = PlantEntry {
            max_per_watering_ml: None,
            ..valid_plant()
        };
        assert_eq!(entry.to_plant().max_per_watering(), 1000);
    }

    // -- Validation: valid configs pass -----------------------------------

    #[test]
    fn valid_config_passes() {
        valid_config().validate().unwrap();
    }

    #[test]
    fn empty_config_passes() {
        let cfg = Config {
            controller: ControllerSection::default(),
            plants: vec![],
        };
        cfg.validate().unwrap();
    }

    #[test]
    fn equal_min_and_max_passes() {
        let mut cfg = valid_config();
        cfg.plants[0].daily_min_ml = 1000;
        cfg.validate().unwrap();
    }

    // -- Controller section -----------------------------------------------

    #[test]
    fn timezone_out_of_range() {
        let mut cfg = valid_config();
        cfg.controller.timezone_hours = 15;
        assert_validation_err(&cfg, "timezone_hours 15 out of range");
        cfg.controller.timezone_hours = -13;
        assert_validation_err(&cfg, "timezone_hours -13 out of range");
    }

    #[test]
    fn timezone_bounds_accepted() {
        let mut cfg = valid_config();
        cfg.controller.timezone_hours = -12;
        cfg.validate().unwrap();
        cfg.controller.timezone_hours = 14;
        cfg.validate().unwrap();
    }

    #[test]
    fn flow_rate_must_be_positive() {
        let mut cfg = valid_config();
        cfg.controller.ml_per_sec = 0.0;
        assert_validation_err(&cfg, "ml_per_sec must be positive");
        cfg.controller.ml_per_sec = f64::NAN;
        assert_validation_err(&cfg, "ml_per_sec must be positive");
    }

    // -- Plant: identity ---------------------------------------------------

    #[test]
    fn plant_empty_name_rejected() {
        let mut cfg = valid_config();
        cfg.plants[0].name = "  ".into();
        assert_validation_err(&cfg, "name is empty");
    }

    #[test]
    fn plant_duplicate_name_rejected() {
        let mut cfg = valid_config();
        cfg.plants.push(PlantEntry {
            pump_gpio_pin: 27, // different pin, same name
            ..valid_plant()
        });
        assert_validation_err(&cfg, "duplicate name");
    }

    // -- Plant: bounds ------------------------------------------------------

    #[test]
    fn plant_min_above_max_rejected() {
        let mut cfg = valid_config();
        cfg.plants[0].daily_min_ml = 1200;
        assert_validation_err(&cfg, "daily_min_ml (1200) exceeds daily_max_ml (1000)");
    }

    #[test]
    fn plant_zero_max_rejected() {
        let mut cfg = valid_config();
        cfg.plants[0].daily_min_ml = 0;
        cfg.plants[0].daily_max_ml = 0;
        assert_validation_err(&cfg, "daily_max_ml must be positive");
    }

    #[test]
    fn plant_zero_cap_rejected() {
        let mut cfg = valid_config();
        cfg.plants[0].max_per_watering_ml = Some(0);
        assert_validation_err(&cfg, "max_per_watering_ml must be positive");
    }

    // -- Plant: GPIO whitelist ---------------------------------------------

    #[test]
    fn plant_gpio_pin_reserved_rejected() {
        for pin in [0, 1, 28, -1] {
            let mut cfg = valid_config();
            cfg.plants[0].pump_gpio_pin = pin;
            assert_validation_err(&cfg, "not a valid BCM GPIO pin");
        }
    }

    #[test]
    fn plant_duplicate_gpio_rejected() {
        let mut cfg = valid_config();
        cfg.plants.push(PlantEntry {
            name: "tomato".into(),
            ..valid_plant()
        });
        assert_validation_err(&cfg, "already used by another plant");
    }

    // -- Multiple errors reported at once ---------------------------------

    #[test]
    fn multiple_errors_collected() {
        let cfg = Config {
            controller: ControllerSection {
                tick_sec: 0,
                ..ControllerSection::default()
            },
            plants: vec![PlantEntry {
                name: "".into(),
                daily_min_ml: 10,
                daily_max_ml: 0,
                max_per_watering_ml: Some(0),
                pump_gpio_pin: 0,
            }],
        };
        let err = cfg.validate().unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("tick_sec"), "missing tick error in: {msg}");
        assert!(msg.contains("name is empty"), "missing name error in: {msg}");
        assert!(msg.contains("exceeds daily_max_ml"), "missing bounds error in: {msg}");
        assert!(
            msg.contains("not a valid BCM GPIO pin"),
            "missing gpio error in: {msg}"
        );
    }

    // -- Load from disk ----------------------------------------------------

    #[test]
    fn load_missing_file_reports_path() {
        let err = load("/nonexistent/irrigation.toml").unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/irrigation.toml"));
    }
}
