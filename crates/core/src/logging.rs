//! Fixed-capacity telemetry log.
//!
//! Text is appended to a 1 KiB region and mirrored to an optional output
//! sink.  Every logical line gets one timestamp prefix, written lazily when
//! the first text of that line arrives.  When an append would run past the
//! end of the region the cursor jumps back to 0 and the new text overwrites
//! from the start; bytes after the new cursor are whatever an earlier pass
//! left there.

use std::borrow::Cow;
use std::fmt;
use std::io::Write;

use tracing::trace;

use crate::clock::Clock;
use crate::timecalc::format_date;

/// Size of the backing region, terminator included.
pub const LOG_CAPACITY: usize = 1 << 10;

/// Largest text that fits in the region after a reset.  The reset rule keeps
/// `cursor + len + 1 <= LOG_CAPACITY - 2`.
pub const MAX_ENTRY_LEN: usize = LOG_CAPACITY - 3;

const PREFIX_SEPARATOR: &str = ": ";
const LINE_END: &str = "\r\n";

pub type Sink = Box<dyn Write + Send>;

pub struct Logger<C: Clock> {
    sink: Option<Sink>,
    clock: C,
    time_offset: u64,
    timezone_hours: i32,
    dst: bool,
    region: [u8; LOG_CAPACITY],
    cursor: usize,
    print_date: bool,
}

impl<C: Clock> Logger<C> {
    /// `time_offset` is the epoch second at which the clock read 0.  With an
    /// offset of 0 lines are prefixed with plain seconds since start.
    pub fn new(sink: Option<Sink>, clock: C, time_offset: u64) -> Self {
        Self {
            sink,
            clock,
            time_offset,
            timezone_hours: 0,
            dst: false,
            region: [0; LOG_CAPACITY],
            cursor: 0,
            print_date: true,
        }
    }

    pub fn with_timezone(mut self, timezone_hours: i32, dst: bool) -> Self {
        self.timezone_hours = timezone_hours;
        self.dst = dst;
        self
    }

    pub fn set_offset(&mut self, offset: u64) {
        self.time_offset = offset;
    }

    pub fn offset(&self) -> u64 {
        self.time_offset
    }

    /// Text from the start of the region up to the write cursor.
    pub fn get_log(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.region[..self.cursor])
    }

    /// The whole backing region, stale bytes included.
    pub fn region(&self) -> &[u8] {
        &self.region
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn print(&mut self, text: &str) -> usize {
        let mut written = 0;
        if self.print_date {
            let now_secs = self.clock.millis() / 1000;
            written += if self.time_offset != 0 {
                let date = format_date(
                    self.time_offset.saturating_add(now_secs),
                    self.timezone_hours,
                    self.dst,
                );
                self.write(date.as_str())
            } else {
                self.write(&now_secs.to_string())
            };
            written += self.write(PREFIX_SEPARATOR);
            self.print_date = false;
        }
        written + self.write(text)
    }

    /// Print `text`, end the line, and arm the timestamp for the next line.
    pub fn println(&mut self, text: &str) -> usize {
        let written = self.print(text) + self.print(LINE_END);
        self.print_date = true;
        written
    }

    pub fn print_f64(&mut self, value: f64) -> usize {
        self.print(&format!("{value:.2}"))
    }

    pub fn println_f64(&mut self, value: f64) -> usize {
        self.println(&format!("{value:.2}"))
    }

    /// Raw append without any timestamp handling.
    pub fn write_char(&mut self, c: char) -> usize {
        let mut buf = [0u8; 4];
        self.write(c.encode_utf8(&mut buf))
    }

    /// Append to the region and mirror to the sink.  Returns the bytes the
    /// sink accepted, or the text length when there is no working sink.
    pub fn write(&mut self, text: &str) -> usize {
        let bytes = text.as_bytes();
        let len = bytes.len();

        if self.cursor + len + 1 > LOG_CAPACITY - 2 {
            trace!(cursor = self.cursor, len, "telemetry log wrapped");
            self.cursor = 0;
        }

        let stored = len.min(MAX_ENTRY_LEN);
        self.region[self.cursor..self.cursor + stored].copy_from_slice(&bytes[..stored]);
        self.cursor += stored;
        self.region[self.cursor] = 0;

        match self.sink.as_mut() {
            Some(sink) => match sink.write_all(bytes) {
                Ok(()) => len,
                Err(e) => {
                    trace!("telemetry sink write failed: {e}");
                    len
                }
            },
            None => len,
        }
    }
}

impl<C: Clock> fmt::Debug for Logger<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("has_sink", &self.sink.is_some())
            .field("time_offset", &self.time_offset)
            .field("timezone_hours", &self.timezone_hours)
            .field("dst", &self.dst)
            .field("cursor", &self.cursor)
            .field("print_date", &self.print_date)
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
