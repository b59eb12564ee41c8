//! Irrigation decision and telemetry core: calendar math on epoch seconds,
//! the per-plant water demand model, and the fixed-capacity telemetry log.
//!
//! Nothing here reads the wall clock or touches hardware; the control loop
//! passes in epoch seconds, weather readings and an uptime [`Clock`].

pub mod clock;
pub mod logging;
pub mod plant;
pub mod timecalc;

pub use clock::{Clock, ManualClock, SystemClock};
pub use logging::{Logger, Sink, LOG_CAPACITY};
pub use plant::{Plant, Weather};
pub use timecalc::{correct_timezone_dst, decompose, format_date, CalendarTime, DateString};
