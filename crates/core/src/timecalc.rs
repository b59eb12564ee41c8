//! Calendar arithmetic on epoch seconds: decomposition into calendar fields,
//! fixed-offset timezone plus approximate DST correction, and the fixed-width
//! `DD.MM.YYYY HH:MM:SS` rendering used for log timestamps.
//!
//! Epoch seconds are `u64`.  Anything past [`MAX_EPOCH_SECS`]
//! (9999-12-31 23:59:59 UTC) saturates to that instant, so the year search
//! stays bounded and the rendered year always fits four digits.

use std::fmt;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const SECS_PER_MIN: u64 = 60;
pub const SECS_PER_HOUR: u64 = 3600;
pub const SECS_PER_DAY: u64 = SECS_PER_HOUR * 24;
pub const DAYS_PER_WEEK: u64 = 7;
pub const SECS_PER_WEEK: u64 = SECS_PER_DAY * DAYS_PER_WEEK;

/// Last representable instant: 9999-12-31 23:59:59 UTC.
pub const MAX_EPOCH_SECS: u64 = 253_402_300_799;

/// Length of a rendered `DD.MM.YYYY HH:MM:SS` timestamp.
pub const DATE_LEN: usize = 19;

const MONTH_DAYS: [u8; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Gregorian leap-year rule, with the year given as an offset from 1970.
pub fn is_leap_year(year_offset: u16) -> bool {
    let year = 1970 + u32::from(year_offset);
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_year(year_offset: u16) -> u64 {
    if is_leap_year(year_offset) {
        366
    } else {
        365
    }
}

fn days_in_month(month_index: usize, year_offset: u16) -> u64 {
    if month_index == 1 && is_leap_year(year_offset) {
        29
    } else {
        u64::from(MONTH_DAYS[month_index])
    }
}

// ---------------------------------------------------------------------------
// Epoch helpers
// ---------------------------------------------------------------------------

pub fn number_of_seconds(ts: u64) -> u64 {
    ts % SECS_PER_MIN
}

pub fn number_of_minutes(ts: u64) -> u64 {
    (ts / SECS_PER_MIN) % SECS_PER_MIN
}

pub fn number_of_hours(ts: u64) -> u64 {
    (ts % SECS_PER_DAY) / SECS_PER_HOUR
}

/// Day of week, 1 = Sunday.
pub fn day_of_week(ts: u64) -> u64 {
    ((ts / SECS_PER_DAY + 4) % DAYS_PER_WEEK) + 1
}

/// Days since 1970-01-01.
pub fn elapsed_days(ts: u64) -> u64 {
    ts / SECS_PER_DAY
}

/// Seconds since the last midnight.
pub fn elapsed_secs_today(ts: u64) -> u64 {
    ts % SECS_PER_DAY
}

pub fn previous_midnight(ts: u64) -> u64 {
    (ts / SECS_PER_DAY) * SECS_PER_DAY
}

pub fn next_midnight(ts: u64) -> u64 {
    previous_midnight(ts) + SECS_PER_DAY
}

/// Seconds since the start of the week (weeks start on Sunday).
pub fn elapsed_secs_this_week(ts: u64) -> u64 {
    elapsed_secs_today(ts) + (day_of_week(ts) - 1) * SECS_PER_DAY
}

// ---------------------------------------------------------------------------
// Calendar fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarTime {
    pub second: u8,
    pub minute: u8,
    pub hour: u8,
    /// 1 = Sunday … 7 = Saturday.
    pub weekday: u8,
    pub day: u8,
    pub month: u8,
    /// Years since 1970.
    pub year_offset: u16,
}

impl CalendarTime {
    pub fn year(&self) -> u32 {
        1970 + u32::from(self.year_offset)
    }

    /// Reassemble the epoch seconds these fields describe.
    pub fn to_epoch_secs(&self) -> u64 {
        let mut days: u64 = (0..self.year_offset).map(days_in_year).sum();
        for m in 0..usize::from(self.month.saturating_sub(1)).min(11) {
            days += days_in_month(m, self.year_offset);
        }
        days += u64::from(self.day.saturating_sub(1));

        days * SECS_PER_DAY
            + u64::from(self.hour) * SECS_PER_HOUR
            + u64::from(self.minute) * SECS_PER_MIN
            + u64::from(self.second)
    }
}

impl fmt::Display for CalendarTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}.{:02}.{:04} {:02}:{:02}:{:02}",
            self.day,
            self.month,
            self.year(),
            self.hour,
            self.minute,
            self.second
        )
    }
}

/// Break epoch seconds into calendar fields (UTC, no correction applied).
pub fn decompose(epoch_secs: u64) -> CalendarTime {
    let mut time = epoch_secs.min(MAX_EPOCH_SECS);

    let second = (time % 60) as u8;
    time /= 60; // minutes
    let minute = (time % 60) as u8;
    time /= 60; // hours
    let hour = (time % 24) as u8;
    time /= 24; // days since epoch

    let weekday = ((time + 4) % 7 + 1) as u8;

    let mut year_offset: u16 = 0;
    let mut days: u64 = 0;
    while days + days_in_year(year_offset) <= time {
        days += days_in_year(year_offset);
        year_offset += 1;
    }
    let mut day_of_year = time - days;

    let mut month_index = 0;
    while month_index < 11 {
        let len = days_in_month(month_index, year_offset);
        if day_of_year < len {
            break;
        }
        day_of_year -= len;
        month_index += 1;
    }

    CalendarTime {
        second,
        minute,
        hour,
        weekday,
        day: (day_of_year + 1) as u8,
        month: (month_index + 1) as u8,
        year_offset,
    }
}

// ---------------------------------------------------------------------------
// Timezone / DST
// ---------------------------------------------------------------------------

/// Shift `epoch_secs` by a fixed UTC offset and, if `dst` is set, by one more
/// hour inside the approximate summer window.
///
/// The window is deliberately rough: every day of April–September, plus
/// March 26–31 and October 1–24.  The 25th of both months is outside it.
pub fn correct_timezone_dst(epoch_secs: u64, timezone_hours: i32, dst: bool) -> u64 {
    let shifted = epoch_secs.saturating_add_signed(i64::from(timezone_hours) * SECS_PER_HOUR as i64);

    if !dst {
        return shifted;
    }

    let tm = decompose(shifted);
    let in_summer = (tm.month > 3 && tm.month < 10)
        || (tm.month == 3 && tm.day > 25)
        || (tm.month == 10 && tm.day < 25);

    if in_summer {
        shifted.saturating_add(SECS_PER_HOUR)
    } else {
        shifted
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// A rendered `DD.MM.YYYY HH:MM:SS` timestamp held in a fixed stack buffer.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DateString([u8; DATE_LEN]);

impl DateString {
    fn from_calendar(tm: &CalendarTime) -> Self {
        let mut buf = *b"00.00.0000 00:00:00";
        put_digits(&mut buf[0..2], u32::from(tm.day));
        put_digits(&mut buf[3..5], u32::from(tm.month));
        put_digits(&mut buf[6..10], tm.year());
        put_digits(&mut buf[11..13], u32::from(tm.hour));
        put_digits(&mut buf[14..16], u32::from(tm.minute));
        put_digits(&mut buf[17..19], u32::from(tm.second));
        Self(buf)
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII digits and separators are ever stored.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Right-aligned, zero-padded decimal into `slot`; excess high digits drop.
fn put_digits(slot: &mut [u8], mut value: u32) {
    for b in slot.iter_mut().rev() {
        *b = b'0' + (value % 10) as u8;
        value /= 10;
    }
}

impl fmt::Display for DateString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for DateString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DateString({:?})", self.as_str())
    }
}

/// Apply timezone/DST correction and render as `DD.MM.YYYY HH:MM:SS`.
pub fn format_date(epoch_secs: u64, timezone_hours: i32, dst: bool) -> DateString {
    let local = correct_timezone_dst(epoch_secs, timezone_hours, dst);
    DateString::from_calendar(&decompose(local))
}

// ===========================================================================
// Tests
// ===========================================================================
