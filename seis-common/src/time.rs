//! Timestamp, duration and FK window utilities
//!
//! The OSD wire format carries instants as ISO-8601 strings and spans as
//! ISO-8601 durations (`PT1.5S`). Internally everything is fractional
//! epoch seconds.

use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse a wire timestamp into fractional seconds since the epoch
pub fn parse_wire_time(wire_time: &str) -> Result<f64> {
    let parsed = DateTime::parse_from_rfc3339(wire_time.trim())
        .map_err(|e| Error::InvalidInput(format!("bad wire time '{}': {}", wire_time, e)))?;
    Ok(parsed.timestamp() as f64 + f64::from(parsed.timestamp_subsec_nanos()) / NANOS_PER_SECOND)
}

/// Convert an optional wire timestamp to epoch seconds
///
/// Absent values map to 0. Unparseable values also map to 0 and are logged.
pub fn to_epoch_seconds(wire_time: Option<&str>) -> f64 {
    match wire_time {
        None => 0.0,
        Some(value) => parse_wire_time(value).unwrap_or_else(|e| {
            tracing::warn!("{}; using epoch 0", e);
            0.0
        }),
    }
}

/// Convert epoch seconds to the wire timestamp representation
///
/// Non-finite input maps to the wire representation of 0.
pub fn to_wire_time(seconds: f64) -> String {
    let instant = if seconds.is_finite() {
        let mut whole = seconds.floor();
        let mut nanos = ((seconds - whole) * NANOS_PER_SECOND).round();
        if nanos >= NANOS_PER_SECOND {
            whole += 1.0;
            nanos = 0.0;
        }
        DateTime::<Utc>::from_timestamp(whole as i64, nanos as u32)
    } else {
        None
    };

    instant
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse an ISO-8601 duration (`PT1.5S`, `PT1M30S`, `P1DT2H`) into seconds
///
/// Calendar units (years, months) have no fixed length and are rejected.
pub fn parse_duration(wire_duration: &str) -> Result<f64> {
    let invalid = || Error::InvalidInput(format!("bad wire duration '{}'", wire_duration));

    let text = wire_duration.trim();
    let (sign, text) = match text.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, text.strip_prefix('+').unwrap_or(text)),
    };
    let body = text
        .strip_prefix('P')
        .or_else(|| text.strip_prefix('p'))
        .ok_or_else(invalid)?;
    if body.is_empty() {
        return Err(invalid());
    }

    let mut total = 0.0;
    let mut in_time = false;
    let mut number = String::new();
    let mut saw_component = false;

    for c in body.chars() {
        match c.to_ascii_uppercase() {
            'T' if !in_time && number.is_empty() => in_time = true,
            '0'..='9' | '.' | ',' | '-' | '+' => number.push(if c == ',' { '.' } else { c }),
            unit => {
                let value: f64 = number.parse().map_err(|_| invalid())?;
                let scale = match (in_time, unit) {
                    (false, 'W') => 604_800.0,
                    (false, 'D') => 86_400.0,
                    (true, 'H') => 3_600.0,
                    (true, 'M') => 60.0,
                    (true, 'S') => 1.0,
                    _ => return Err(invalid()),
                };
                total += value * scale;
                number.clear();
                saw_component = true;
            }
        }
    }

    if !number.is_empty() || !saw_component {
        return Err(invalid());
    }
    Ok(sign * total)
}

/// Convert an optional wire duration to seconds; absent or unparseable maps to 0
pub fn duration_to_seconds(wire_duration: Option<&str>) -> f64 {
    match wire_duration {
        None => 0.0,
        Some(value) => parse_duration(value).unwrap_or_else(|e| {
            tracing::warn!("{}; using 0 seconds", e);
            0.0
        }),
    }
}

/// Convert seconds to the wire duration representation
pub fn seconds_to_duration(seconds: f64) -> String {
    if seconds.is_finite() {
        format!("PT{}S", seconds)
    } else {
        "PT0S".to_string()
    }
}

/// Compute the start time of an FK request window
///
/// Steps back from `arrival_time` by a whole number of `step_size`
/// increments (plus `lead_seconds`) so that the window start is the
/// latest point reachable from `waveform_start` that still leaves at
/// least `lead_seconds` before the arrival.
///
/// Returns `None` when any input is non-finite, the step size is not
/// positive, or there is not enough data before the arrival.
pub fn calculate_fk_start_time(
    waveform_start: f64,
    arrival_time: f64,
    lead_seconds: f64,
    step_size: f64,
) -> Option<f64> {
    let inputs = [waveform_start, arrival_time, lead_seconds, step_size];
    if inputs.iter().any(|v| !v.is_finite()) || step_size <= 0.0 {
        return None;
    }

    let number_of_steps = (((arrival_time - waveform_start) - lead_seconds) / step_size).floor();
    if number_of_steps < 0.0 {
        return None;
    }

    Some(arrival_time - (step_size * number_of_steps + lead_seconds))
}
