//! Control loop: once per tick, roll the day over if local midnight has
//! passed, read the weather, and give each plant the gap between what it has
//! received today and what the demand model says it should have by now.
//!
//! Plants are handled one after another; a pump run finishes before the
//! next plant is evaluated.  Pump runs await a timer, so a shutdown request
//! cuts a run short and every relay is switched off.
//!
//! ```text
//! tick ──▶ local time ──[new day]──▶ reset daily totals
//!              │
//!              ▼
//!          weather ──▶ for each plant: amount = calc_water_amount()
//!                          ├─[amount >= 1 ml]──▶ pump ──▶ add_water ──▶ log
//!                          └─[otherwise]──────▶ skip
//! ```

use std::future::Future;
use std::time::Duration;

use irrigation_core::timecalc::{correct_timezone_dst, elapsed_days, elapsed_secs_today};
use irrigation_core::{Clock, Logger, Plant};
use tracing::{debug, error, info};

use crate::pump::PumpBoard;
use crate::weather::WeatherSource;

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub(crate) struct Controller<C: Clock, W: WeatherSource> {
    plants: Vec<Plant>,
    pumps: PumpBoard,
    weather: W,
    log: Logger<C>,
    timezone_hours: i32,
    dst: bool,
    /// Local day number of the previous tick.
    current_day: Option<u64>,
}

/// What a single tick did.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct TickReport {
    pub(crate) day_rolled_over: bool,
    pub(crate) watered: Vec<(String, u64)>,
}

impl<C: Clock, W: WeatherSource> Controller<C, W> {
    pub(crate) fn new(
        plants: Vec<Plant>,
        pumps: PumpBoard,
        weather: W,
        log: Logger<C>,
        timezone_hours: i32,
        dst: bool,
    ) -> Self {
        Self {
            plants,
            pumps,
            weather,
            log,
            timezone_hours,
            dst,
            current_day: None,
        }
    }

    pub(crate) fn plants(&self) -> &[Plant] {
        &self.plants
    }

    #[cfg(test)]
    pub(crate) fn log(&self) -> &Logger<C> {
        &self.log
    }

    /// Run one control cycle at `now_epoch` (UTC epoch seconds).
    pub(crate) async fn tick(&mut self, now_epoch: u64) -> TickReport {
        let mut report = TickReport::default();

        let local = correct_timezone_dst(now_epoch, self.timezone_hours, self.dst);
        let today = elapsed_days(local);
        let secs_today = elapsed_secs_today(local);

        // ── Day boundary ────────────────────────────────────────────
        if self.current_day.is_some_and(|d| d != today) {
            for plant in &mut self.plants {
                info!(
                    plant = %plant.name(),
                    daily_ml = plant.daily_water(),
                    total_ml = plant.total_water(),
                    "day complete, resetting daily total"
                );
                plant.reset_daily_water();
            }
            self.log.println("new day, daily totals reset");
            report.day_rolled_over = true;
        }
        self.current_day = Some(today);

        // ── Weather ─────────────────────────────────────────────────
        let weather = self.weather.read(secs_today);
        debug!(
            temp_c = format!("{:.1}", weather.temperature_c),
            humidity = format!("{:.1}", weather.humidity_pct),
            cloud = format!("{:.1}", weather.cloud_cover_pct),
            secs_today,
            "weather"
        );
        self.log.print("weather T=");
        self.log.print_f64(weather.temperature_c);
        self.log.print(" H=");
        self.log.print_f64(weather.humidity_pct);
        self.log.print(" C=");
        self.log.println_f64(weather.cloud_cover_pct);

        // ── Plants, one at a time ───────────────────────────────────
        for plant in &mut self.plants {
            let amount = plant.calc_water_amount(&weather, secs_today);
            // NaN (bad sensor reading) compares false and is skipped too.
            if !(amount >= 1.0) {
                debug!(
                    plant = %plant.name(),
                    amount = format!("{amount:.1}"),
                    daily_ml = plant.daily_water(),
                    "at or above target, skipping"
                );
                continue;
            }

            let ml = amount.floor() as u64;
            match self.pumps.dispense(plant.name(), ml).await {
                Ok(given) => {
                    plant.add_water(given);
                    info!(
                        plant = %plant.name(),
                        ml = given,
                        daily_ml = plant.daily_water(),
                        "watered"
                    );
                    self.log.println(&format!(
                        "{}: {given} ml (today {} ml, total {} ml)",
                        plant.name(),
                        plant.daily_water(),
                        plant.total_water()
                    ));
                    report.watered.push((plant.name().to_string(), given));
                }
                Err(e) => {
                    error!(plant = %plant.name(), "pump failed: {e}");
                    self.log.println(&format!("{}: pump failed: {e}", plant.name()));
                }
            }
        }

        report
    }

    pub(crate) fn shutdown(&mut self) {
        self.pumps.all_off();
        self.log.println("controller stopped");
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Wall time: `start_epoch` plus the uptime reported by `clock`.
fn wall_time(start_epoch: u64, clock: &impl Clock) -> u64 {
    start_epoch.saturating_add(clock.millis() / 1000)
}

/// Tick the controller every `tick` until `shutdown` resolves, then switch
/// every pump off.  A tick still in progress is abandoned at shutdown.
pub(crate) async fn run<C: Clock, W: WeatherSource>(
    controller: &mut Controller<C, W>,
    clock: impl Clock,
    start_epoch: u64,
    tick: Duration,
    shutdown: impl Future<Output = ()>,
) {
    let mut ticker = tokio::time::interval(tick);
    tokio::pin!(shutdown);

    info!(
        plants = controller.plants().len(),
        tick_sec = tick.as_secs(),
        start_epoch,
        "controller started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = wall_time(start_epoch, &clock);
                tokio::select! {
                    report = controller.tick(now) => {
                        debug!(
                            now,
                            rolled_over = report.day_rolled_over,
                            watered = report.watered.len(),
                            "tick complete"
                        );
                    }
                    _ = &mut shutdown => break,
                }
            }
            _ = &mut shutdown => break,
        }
    }

    info!("shutdown requested");
    controller.shutdown();
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(all(test, not(feature = "gpio")))]
mod tests {
    use super::*;
    use irrigation_core::{ManualClock, Weather};

    /// 2024-06-15 00:00:00 UTC.
    const MIDNIGHT: u64 = 1_718_409_600;
    const NOON: u64 = MIDNIGHT + 12 * 3600;

    fn mild() -> Weather {
        Weather::new(25.0, 50.0, 0.0)
    }

    fn test_controller(tz: i32, dst: bool) -> Controller<ManualClock, Weather> {
        controller_with(mild(), tz, dst)
    }

    fn controller_with(weather: Weather, tz: i32, dst: bool) -> Controller<ManualClock, Weather> {
        let plants = vec![
            Plant::new("basil", 200, 1000, 300),
            Plant::new("tomato", 500, 2500, 400),
        ];
        let pins = vec![("basil".to_string(), 17), ("tomato".to_string(), 27)];
        let pumps = PumpBoard::new(&pins, true, 10.0).unwrap();
        let log = Logger::new(None, ManualClock::new(0), MIDNIGHT);
        Controller::new(plants, pumps, weather, log, tz, dst)
    }

    fn basil(c: &Controller<ManualClock, Weather>) -> &Plant {
        &c.plants()[0]
    }

    // -- Watering ---------------------------------------------------------

    #[tokio::test]
    async fn noon_tick_waters_up_to_cap() {
        let mut c = test_controller(0, false);
        let report = c.tick(NOON).await;

        // basil: target ≈ 378 ml → capped at 300.
        assert_eq!(report.watered[0], ("basil".to_string(), 300));
        assert_eq!(basil(&c).daily_water(), 300);
        assert!(!report.day_rolled_over);
    }

    #[tokio::test]
    async fn second_tick_fills_remaining_gap() {
        let mut c = test_controller(0, false);
        c.tick(NOON).await;
        c.tick(NOON).await;

        let target = basil(&c).daily_water_total(&mild(), 12 * 3600);
        let given = basil(&c).daily_water() as f64;
        assert!(given <= target);
        assert!(target - given < 1.0, "given {given}, target {target}");
    }

    #[tokio::test]
    async fn at_target_skips_plant() {
        let mut c = test_controller(0, false);
        c.tick(NOON).await;
        c.tick(NOON).await;
        let before = basil(&c).daily_water();
        let report = c.tick(NOON).await;
        // Less than 1 ml short of target: nothing to pump.
        assert!(report.watered.iter().all(|(name, _)| name != "basil"));
        assert_eq!(basil(&c).daily_water(), before);
    }

    #[tokio::test]
    async fn over_target_skips_plant() {
        let mut c = test_controller(0, false);
        c.plants[0].add_water(900);
        let report = c.tick(NOON).await;
        assert!(report.watered.iter().all(|(name, _)| name != "basil"));
        assert_eq!(basil(&c).daily_water(), 900);
    }

    #[tokio::test]
    async fn nan_reading_waters_nothing() {
        let mut c = controller_with(Weather::new(f64::NAN, 50.0, 0.0), 0, false);
        for _ in 0..3 {
            let report = c.tick(NOON).await;
            assert!(report.watered.is_empty(), "{report:?}");
        }
        assert_eq!(basil(&c).daily_water(), 0);
        assert_eq!(c.pumps.pumps["basil"], 0);
    }

    // -- Day boundary -----------------------------------------------------

    #[tokio::test]
    async fn first_tick_does_not_roll_over() {
        let mut c = test_controller(0, false);
        assert!(!c.tick(MIDNIGHT + 60).await.day_rolled_over);
    }

    #[tokio::test]
    async fn new_day_resets_daily_keeps_total() {
        let mut c = test_controller(0, false);
        c.tick(NOON).await;
        c.tick(NOON).await;
        let yesterday = basil(&c).daily_water();

        let report = c.tick(MIDNIGHT + 86_400 + 1800).await;
        assert!(report.day_rolled_over);

        // Early morning target is just above daily_min.
        let target = basil(&c).daily_water_total(&mild(), 1800);
        assert!(basil(&c).daily_water() as f64 <= target);
        assert_eq!(
            basil(&c).total_water(),
            yesterday + basil(&c).daily_water()
        );
    }

    #[tokio::test]
    async fn day_boundary_follows_local_time() {
        // 23:00 UTC on June 15 is already June 16 at UTC+2.
        let mut c = test_controller(2, false);
        c.tick(NOON).await;
        let report = c.tick(MIDNIGHT + 23 * 3600).await;
        assert!(report.day_rolled_over);

        let mut utc = test_controller(0, false);
        utc.tick(NOON).await;
        assert!(!utc.tick(MIDNIGHT + 23 * 3600).await.day_rolled_over);
    }

    // -- Telemetry log ------------------------------------------------------

    #[tokio::test]
    async fn outcomes_are_logged_with_timestamps() {
        let mut c = test_controller(0, false);
        c.tick(NOON).await;
        let log = c.log().get_log().into_owned();
        assert!(
            log.contains("15.06.2024 00:00:00: weather T=25.00 H=50.00 C=0.00\r\n"),
            "log was: {log}"
        );
        assert!(
            log.contains("15.06.2024 00:00:00: basil: 300 ml (today 300 ml, total 300 ml)\r\n"),
            "log was: {log}"
        );
    }

    #[tokio::test]
    async fn rollover_is_logged() {
        let mut c = test_controller(0, false);
        c.tick(NOON).await;
        c.tick(MIDNIGHT + 86_400 + 60).await;
        assert!(c.log().get_log().contains("new day, daily totals reset"));
    }

    #[test]
    fn shutdown_logs_stop() {
        let mut c = test_controller(0, false);
        c.shutdown();
        assert!(c.log().get_log().ends_with("controller stopped\r\n"));
    }

    // -- Run loop -----------------------------------------------------------

    #[test]
    fn wall_time_saturates() {
        assert_eq!(wall_time(NOON, &ManualClock::new(90_500)), NOON + 90);
        assert_eq!(wall_time(u64::MAX, &ManualClock::new(5_000)), u64::MAX);
    }

    #[tokio::test]
    async fn run_ticks_until_shutdown() {
        let mut c = test_controller(0, false);
        let shutdown = tokio::time::sleep(Duration::from_millis(50));
        run(&mut c, ManualClock::new(0), NOON, Duration::from_millis(10), shutdown).await;

        // First tick fires immediately: basil gets its capped watering.
        assert!(basil(&c).daily_water() >= 300);
        let log = c.log().get_log().into_owned();
        assert!(log.contains("basil: 300 ml"), "log was: {log}");
        assert!(log.ends_with("controller stopped\r\n"), "log was: {log}");
    }

    #[tokio::test]
    async fn run_survives_epoch_overflow() {
        let mut c = test_controller(0, false);
        let shutdown = tokio::time::sleep(Duration::from_millis(30));
        run(&mut c, ManualClock::new(5_000), u64::MAX, Duration::from_millis(10), shutdown).await;
        assert!(c.log().get_log().ends_with("controller stopped\r\n"));
    }
}
