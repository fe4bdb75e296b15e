//! Go-style duration strings (`90s`, `5m`, `1h30m`, `250ms`).
//!
//! Operators of the janitor have always written cutoffs this way, so the flag
//! values keep the same notation.

use std::time::Duration;

use super::error::{ConfigResult, ConfigurationError};

const UNITS: &[(&str, f64)] = &[
    ("ns", 1e-9),
    ("us", 1e-6),
    ("µs", 1e-6),
    ("ms", 1e-3),
    ("s", 1.0),
    ("m", 60.0),
    ("h", 3600.0),
];

/// Parse a duration such as `2h`, `1h30m`, `1.5h` or `250ms`.
///
/// A bare `0` is accepted; any other number needs a unit.
pub fn parse_duration(input: &str) -> ConfigResult<Duration> {
    let s = input.trim();
    if s.is_empty() {
        return Err(ConfigurationError::invalid_duration(input, "empty string"));
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.starts_with('-') {
        return Err(ConfigurationError::invalid_duration(
            input,
            "negative durations are not allowed",
        ));
    }

    let mut rest = s.strip_prefix('+').unwrap_or(s);
    let mut total_secs = 0.0_f64;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(ConfigurationError::invalid_duration(input, "expected a number"));
        }
        let value: f64 = rest[..number_len]
            .parse()
            .map_err(|e: std::num::ParseFloatError| {
                ConfigurationError::invalid_duration(input, e.to_string())
            })?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        if unit_len == 0 {
            return Err(ConfigurationError::invalid_duration(input, "missing unit"));
        }
        let unit = &rest[..unit_len];
        let scale = UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, scale)| *scale)
            .ok_or_else(|| {
                ConfigurationError::invalid_duration(input, format!("unknown unit '{unit}'"))
            })?;
        rest = &rest[unit_len..];

        total_secs += value * scale;
    }

    Duration::try_from_secs_f64(total_secs)
        .map_err(|e| ConfigurationError::invalid_duration(input, e.to_string()))
}

/// Render a duration compactly for log lines (`2h`, `1h30m`, `45s`, `250ms`).
pub fn format_duration(duration: Duration) -> String {
    if duration.is_zero() {
        return "0s".to_string();
    }
    let secs = duration.as_secs();
    if secs == 0 {
        return format!("{}ms", duration.as_millis());
    }

    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds > 0 {
        out.push_str(&format!("{seconds}s"));
    }
    out
}
