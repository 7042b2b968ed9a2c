//! Row limit coercion.
//!
//! The one place invalid input is repaired rather than refused: anything that
//! is not a usable positive integer becomes the default, anything above the
//! maximum becomes the maximum.

use serde_json::Value;

/// Coerce a requested limit into `[1, max]`.
pub fn clamp_limit(requested: Option<&Value>, default: u32, max: u32) -> u32 {
    let Some(n) = requested.and_then(as_integer) else {
        return default;
    };
    if n < 1 {
        default
    } else if n > i64::from(max) {
        max
    } else {
        // In range, so the narrowing cannot fail.
        u32::try_from(n).unwrap_or(default)
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}
