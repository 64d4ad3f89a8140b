//! Unit-suffixed duration strings (`"24h"`, `"1h30m"`, `"0s"`, `"1.5s"`)
//!
//! The accepted grammar is `[-+]?([0-9]*(\.[0-9]*)?[a-z]+)+` with units
//! `ns`, `us` (also `µs`/`μs`), `ms`, `s`, `m` and `h`. A bare `"0"` is zero.
//! Negative non-zero values are rejected since a TTL cannot be negative.

use std::time::Duration;
use thiserror::Error;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Largest representable duration in nanoseconds (signed 64-bit range)
const MAX_NANOS: u128 = i64::MAX as u128;

/// Errors from [`parse_duration`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationParseError {
    /// Input does not match the duration grammar
    #[error("invalid duration {0:?}")]
    Invalid(String),

    /// A number was not followed by a unit
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),

    /// Unit suffix is not one of ns, us, ms, s, m, h
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit {
        /// The unrecognised unit
        unit: String,
        /// The full input
        input: String,
    },

    /// Value exceeds the representable range
    #[error("duration {0:?} out of range")]
    Overflow(String),

    /// Value is below zero
    #[error("negative duration {0:?}")]
    Negative(String),
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3600 * NANOS_PER_SEC),
        _ => None,
    }
}

/// Parse a unit-suffixed duration string
///
/// # Examples
///
/// ```
/// use reaper_domain::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("24h").unwrap(), Duration::from_secs(86_400));
/// assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5_400));
/// assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1_500));
/// assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
/// assert!(parse_duration("tomorrow").is_err());
/// ```
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let invalid = || DurationParseError::Invalid(input.to_string());

    let mut s = input;
    let mut negative = false;
    if let Some(rest) = s.strip_prefix('-') {
        negative = true;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }

    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err(invalid());
    }

    let mut total: u128 = 0;
    while !s.is_empty() {
        let first = s.as_bytes()[0];
        if !(first == b'.' || first.is_ascii_digit()) {
            return Err(invalid());
        }

        // Integer part
        let int_len = s.bytes().take_while(u8::is_ascii_digit).count();
        let mut whole: u128 = 0;
        for b in s[..int_len].bytes() {
            whole = whole * 10 + u128::from(b - b'0');
            if whole > MAX_NANOS {
                return Err(DurationParseError::Overflow(input.to_string()));
            }
        }
        s = &s[int_len..];

        // Fraction part; digits beyond what fits are consumed but ignored
        let mut frac: u128 = 0;
        let mut scale: u128 = 1;
        let mut frac_len = 0;
        let mut has_fraction = false;
        if let Some(rest) = s.strip_prefix('.') {
            has_fraction = true;
            frac_len = rest.bytes().take_while(u8::is_ascii_digit).count();
            let mut overflowed = false;
            for b in rest[..frac_len].bytes() {
                if overflowed {
                    continue;
                }
                if frac > MAX_NANOS / 10 {
                    overflowed = true;
                    continue;
                }
                frac = frac * 10 + u128::from(b - b'0');
                scale *= 10;
            }
            s = &rest[frac_len..];
        }
        if int_len == 0 && (!has_fraction || frac_len == 0) {
            return Err(invalid());
        }

        // Unit
        let unit_len = s
            .char_indices()
            .find(|(_, c)| *c == '.' || c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        if unit_len == 0 {
            return Err(DurationParseError::MissingUnit(input.to_string()));
        }
        let unit = &s[..unit_len];
        s = &s[unit_len..];
        let per_unit = unit_nanos(unit).ok_or_else(|| DurationParseError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        let mut value = whole
            .checked_mul(per_unit)
            .filter(|v| *v <= MAX_NANOS)
            .ok_or_else(|| DurationParseError::Overflow(input.to_string()))?;
        if frac > 0 {
            value += frac * per_unit / scale;
        }
        total += value;
        if total > MAX_NANOS {
            return Err(DurationParseError::Overflow(input.to_string()));
        }
    }

    if negative && total > 0 {
        return Err(DurationParseError::Negative(input.to_string()));
    }

    let secs = (total / NANOS_PER_SEC) as u64;
    let nanos = (total % NANOS_PER_SEC) as u32;
    Ok(Duration::new(secs, nanos))
}

/// Render `value / divisor` with a trimmed decimal fraction
fn fixed_point(value: u128, divisor: u128) -> String {
    let whole = value / divisor;
    let rem = value % divisor;
    if rem == 0 {
        return whole.to_string();
    }
    let width = divisor.ilog10() as usize;
    let digits = format!("{:0width$}", rem, width = width);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// Format a duration in the same notation [`parse_duration`] accepts
///
/// Durations under a second use the largest fitting sub-second unit;
/// longer ones are written as hours, minutes and seconds.
///
/// ```
/// use reaper_domain::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::ZERO), "0s");
/// assert_eq!(format_duration(Duration::from_secs(3600)), "1h0m0s");
/// assert_eq!(format_duration(Duration::from_secs(1800)), "30m0s");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
/// assert_eq!(format_duration(Duration::from_micros(250)), "250µs");
/// ```
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < NANOS_PER_SEC {
        let (divisor, unit) = if nanos < 1_000 {
            (1, "ns")
        } else if nanos < 1_000_000 {
            (1_000, "µs")
        } else {
            (1_000_000, "ms")
        };
        return format!("{}{}", fixed_point(nanos, divisor), unit);
    }

    let total_secs = nanos / NANOS_PER_SEC;
    let hours = total_secs / 3600;
    let minutes = (total_secs / 60) % 60;
    let sub_minute = nanos % (60 * NANOS_PER_SEC);

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    out.push_str(&fixed_point(sub_minute, NANOS_PER_SEC));
    out.push('s');
    out
}
