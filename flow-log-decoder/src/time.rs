//! Timestamp and interval rendering

use chrono::{DateTime, Local, TimeZone};

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Render epoch seconds as `YYYY-MM-DDTHH:MM:SS`, in UTC or the local zone
pub fn iso_time(secs: u32, utc: bool) -> String {
    let secs = secs as i64;
    let formatted = if utc {
        DateTime::from_timestamp(secs, 0).map(|dt| dt.format(ISO_FORMAT).to_string())
    } else {
        Local
            .timestamp_opt(secs, 0)
            .earliest()
            .map(|dt| dt.format(ISO_FORMAT).to_string())
    };
    formatted.unwrap_or_else(|| secs.to_string())
}

/// Render a number of seconds as e.g. `2w3d4h0s`.
///
/// Units with a zero count are left out, except seconds which always appear.
pub fn interval_time(secs: u64) -> String {
    const UNITS: [(char, u64); 5] = [('s', 60), ('m', 60), ('h', 24), ('d', 7), ('w', 52)];

    let mut out = String::new();
    let mut t = secs;
    for (suffix, span) in UNITS {
        let r = t % span;
        t /= span;
        if r != 0 || suffix == 's' {
            out = format!("{}{}{}", r, suffix, out);
        }
    }
    if t > 0 {
        out = format!("{}y{}", t, out);
    }
    out
}

/// Render milliseconds as an interval with a three digit fraction, e.g. `1m5s.020`
pub fn interval_time_ms(ms: u64) -> String {
    format!("{}.{:03}", interval_time(ms / 1000), ms % 1000)
}
