//! Canonical time parsing.
//!
//! Raw plans carry timestamps as numbers, `"SS"`, `"MM:SS"` or `"HH:MM:SS"`
//! strings. They are parsed once, at ingestion, into [`Seconds`]; nothing
//! downstream looks at the raw form again.

use serde_json::Value;

/// Time offset in seconds.
pub type Seconds = f64;

/// Parse a timestamp-shaped JSON value into seconds.
///
/// Returns `None` for `null`, non-finite numbers, negative values, and
/// strings that are not a timestamp.
pub fn parse_timestamp(value: &Value) -> Option<Seconds> {
    let secs = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_time_str(s)?,
        _ => return None,
    };
    (secs.is_finite() && secs >= 0.0).then_some(secs)
}

/// Parse a timestamp string: `"83.5"`, `"01:23.5"`, `"00:01:23"`.
pub fn parse_time_str(s: &str) -> Option<Seconds> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let mut fields = Vec::with_capacity(3);
    for part in s.split(':') {
        fields.push(part.trim().parse::<f64>().ok()?);
    }

    let secs = match fields.as_slice() {
        [s] => *s,
        [m, s] if sexagesimal(&[*m, *s]) => m * 60.0 + s,
        [h, m, s] if sexagesimal(&[*h, *m, *s]) => h * 3600.0 + m * 60.0 + s,
        _ => return None,
    };
    secs.is_finite().then_some(secs)
}

/// Clock fields: all non-negative, every field after the first below 60.
fn sexagesimal(fields: &[f64]) -> bool {
    fields.iter().all(|f| *f >= 0.0) && fields[1..].iter().all(|f| *f < 60.0)
}

/// Round to one decimal place, the resolution used for slot and insert times.
pub fn round_tenth(secs: Seconds) -> Seconds {
    (secs * 10.0).round() / 10.0
}

/// Tolerance for values that are already on the tenth grid up to float error.
const GRID_EPSILON: f64 = 1e-9;

/// Smallest tenth not below `secs`.
pub fn ceil_tenth(secs: Seconds) -> Seconds {
    (secs * 10.0 - GRID_EPSILON).ceil() / 10.0
}

/// Largest tenth not above `secs`.
pub fn floor_tenth(secs: Seconds) -> Seconds {
    (secs * 10.0 + GRID_EPSILON).floor() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_pass_through() {
        assert_eq!(parse_timestamp(&json!(12)), Some(12.0));
        assert_eq!(parse_timestamp(&json!(19.7)), Some(19.7));
    }

    #[test]
    fn minutes_and_seconds() {
        assert_eq!(parse_timestamp(&json!("01:23")), Some(83.0));
        assert_eq!(parse_timestamp(&json!("0:07.5")), Some(7.5));
    }

    #[test]
    fn hours_minutes_seconds() {
        assert_eq!(parse_timestamp(&json!("01:00:05")), Some(3605.0));
    }

    #[test]
    fn numeric_string() {
        assert_eq!(parse_timestamp(&json!(" 42.25 ")), Some(42.25));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp(&json!("soon")), None);
        assert_eq!(parse_timestamp(&json!("1:2:3:4")), None);
        assert_eq!(parse_timestamp(&json!("")), None);
        assert_eq!(parse_timestamp(&json!(null)), None);
        assert_eq!(parse_timestamp(&json!(true)), None);
        assert_eq!(parse_timestamp(&json!(-3)), None);
    }

    #[test]
    fn clock_fields_must_be_in_range() {
        assert_eq!(parse_timestamp(&json!("-1:70")), None);
        assert_eq!(parse_timestamp(&json!("0:75")), None);
        assert_eq!(parse_timestamp(&json!("1:-5")), None);
        assert_eq!(parse_timestamp(&json!("1:60:00")), None);
        assert_eq!(parse_timestamp(&json!("0:59.9")), Some(59.9));
        assert_eq!(parse_timestamp(&json!("90:00")), Some(5400.0));
    }

    #[test]
    fn rounding() {
        assert_eq!(round_tenth(18.04), 18.0);
        assert_eq!(round_tenth(22.46), 22.5);
    }

    #[test]
    fn directed_rounding() {
        assert_eq!(ceil_tenth(14.04), 14.1);
        assert_eq!(ceil_tenth(14.1), 14.1);
        assert_eq!(ceil_tenth(10.5 + 10.0), 20.5);
        assert_eq!(floor_tenth(52.37), 52.3);
        assert_eq!(floor_tenth(15.04), 15.0);
        assert_eq!(floor_tenth(52.0), 52.0);
    }
}
