//! Parsing for timeouts written as `300ms`, `-1.5h` or `2h45m`.
//!
//! A duration is an optionally signed sequence of decimal numbers, each with
//! an optional fraction and a mandatory unit. Valid units are `ns`, `us`
//! (or `µs`), `ms`, `s`, `m` and `h`. Values are kept to nanosecond precision
//! and must fit in a signed 64-bit nanosecond count.

use time::Duration;

const NANOSECOND: u64 = 1;
const MICROSECOND: u64 = 1_000 * NANOSECOND;
const MILLISECOND: u64 = 1_000 * MICROSECOND;
const SECOND: u64 = 1_000 * MILLISECOND;
const MINUTE: u64 = 60 * SECOND;
const HOUR: u64 = 60 * MINUTE;

// magnitude of i64::MIN, the largest value a negative duration may reach
const LIMIT: u64 = 1 << 63;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseDurationError {
    #[error("invalid duration {0:?}")]
    Invalid(String),
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },
}

fn unit_nanos(unit: &str) -> Option<u64> {
    let nanos = match unit {
        "ns" => NANOSECOND,
        // U+00B5 micro sign and U+03BC greek small letter mu
        "us" | "µs" | "μs" => MICROSECOND,
        "ms" => MILLISECOND,
        "s" => SECOND,
        "m" => MINUTE,
        "h" => HOUR,
        _ => return None,
    };

    Some(nanos)
}

pub fn parse_duration(input: &str) -> Result<Duration, ParseDurationError> {
    let invalid = || ParseDurationError::Invalid(input.to_owned());

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

    let mut total: u64 = 0;
    while !s.is_empty() {
        if !s.starts_with(|c: char| c == '.' || c.is_ascii_digit()) {
            return Err(invalid());
        }

        let (whole, rest) = leading_int(s).ok_or_else(invalid)?;
        let has_whole = rest.len() != s.len();
        s = rest;

        let mut fraction = 0;
        let mut scale = 1.0;
        let mut has_fraction = false;
        if let Some(rest) = s.strip_prefix('.') {
            let (f, sc, rest_after) = leading_fraction(rest);
            has_fraction = rest_after.len() != rest.len();
            (fraction, scale, s) = (f, sc, rest_after);
        }

        if !has_whole && !has_fraction {
            return Err(invalid());
        }

        let unit_len = s
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(s.len());
        if unit_len == 0 {
            return Err(ParseDurationError::MissingUnit(input.to_owned()));
        }

        let (unit, rest) = s.split_at(unit_len);
        s = rest;
        let Some(unit_nanos) = unit_nanos(unit) else {
            return Err(ParseDurationError::UnknownUnit {
                unit: unit.to_owned(),
                input: input.to_owned(),
            });
        };

        if whole > LIMIT / unit_nanos {
            return Err(invalid());
        }
        let mut value = whole * unit_nanos;
        if fraction > 0 {
            value += (fraction as f64 * (unit_nanos as f64 / scale)) as u64;
            if value > LIMIT {
                return Err(invalid());
            }
        }

        total = total.checked_add(value).filter(|t| *t <= LIMIT).ok_or_else(invalid)?;
    }

    if negative {
        // LIMIT itself is i64::MIN
        return Ok(Duration::nanoseconds((total as i64).wrapping_neg()));
    }
    if total > LIMIT - 1 {
        return Err(invalid());
    }

    Ok(Duration::nanoseconds(total as i64))
}

/// Consumes leading ASCII digits. `None` on overflow.
fn leading_int(s: &str) -> Option<(u64, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());

    let mut value: u64 = 0;
    for digit in s[..end].bytes() {
        if value > LIMIT / 10 {
            return None;
        }
        value = value * 10 + u64::from(digit - b'0');
        if value > LIMIT {
            return None;
        }
    }

    Some((value, &s[end..]))
}

/// Consumes leading ASCII digits as a fraction, returning the digits read as
/// an integer plus the power of ten to divide it by. Digits past what fits
/// are consumed and ignored.
fn leading_fraction(s: &str) -> (u64, f64, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());

    let mut value: u64 = 0;
    let mut scale = 1.0;
    let mut overflowed = false;
    for digit in s[..end].bytes() {
        if overflowed {
            continue;
        }
        if value > (i64::MAX as u64) / 10 {
            overflowed = true;
            continue;
        }
        let next = value * 10 + u64::from(digit - b'0');
        if next > LIMIT {
            overflowed = true;
            continue;
        }
        value = next;
        scale *= 10.0;
    }

    (value, scale, &s[end..])
}
