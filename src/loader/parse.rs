use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::config::ChartClock;
use crate::model::PriceChartDataPoint;

/// Maps one `tradesAggregated` row to a data point. Never fails: fields that
/// do not coerce become NaN and an unreadable date becomes `None`.
pub fn parse_aggregated_data(row: &Value, clock: &ChartClock) -> PriceChartDataPoint {
    PriceChartDataPoint {
        open: to_number(row.get("open")),
        close: to_number(row.get("close")),
        low: to_number(row.get("min")),
        high: to_number(row.get("max")),
        turnover: to_number(row.get("volumeBase")),
        timestamp: to_timestamp(row.get("date"), clock),
    }
}

/// Permissive numeric coercion with the semantics of JavaScript's `Number()`.
pub fn to_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => str_to_number(s),
        Some(Value::Array(items)) => match items.as_slice() {
            [] => 0.0,
            [single] => match single {
                Value::Null => 0.0,
                Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
                Value::String(s) => str_to_number(s),
                // a nested array stringifies to its own contents
                Value::Array(_) => to_number(Some(single)),
                // stringified first, so "true" and "[object Object]" are NaN
                Value::Bool(_) | Value::Object(_) => f64::NAN,
            },
            _ => f64::NAN,
        },
        Some(Value::Object(_)) => f64::NAN,
    }
}

fn str_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = t.strip_prefix(prefix) {
            return radix_to_number(digits, radix);
        }
    }

    // Rust also accepts inf/nan spellings, Number() does not.
    if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

// Accumulates in f64 so literals wider than u64 stay finite.
fn radix_to_number(digits: &str, radix: u32) -> f64 {
    if digits.is_empty() {
        return f64::NAN;
    }
    let mut value = 0.0;
    for c in digits.chars() {
        match c.to_digit(radix) {
            Some(d) => value = value * radix as f64 + d as f64,
            None => return f64::NAN,
        }
    }
    value
}

/// Date coercion with the semantics of `new Date(value)` for the shapes the
/// data service returns.
pub fn to_timestamp(value: Option<&Value>, clock: &ChartClock) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(s) => parse_date(s.trim(), clock),
        Value::Number(n) => {
            let millis = n.as_f64()?;
            if !millis.is_finite() {
                return None;
            }
            Utc.timestamp_millis_opt(millis as i64).single()
        }
        _ => None,
    }
}

fn parse_date(s: &str, clock: &ChartClock) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Date-only forms are UTC midnight.
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    // Date-time forms without an offset are wall-clock time.
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return clock.resolve(&naive);
        }
    }
    DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
