//! Lenient readers over a request body.
//!
//! Dispatch may run on a request that failed validation, so these accept
//! whatever can still be used and fail only when a lookup cannot be
//! issued at all.

use anyhow::{Result, bail};
use serde_json::{Map, Value};

/// The value under `key`, unless absent or null.
pub fn present<'a>(request: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    request.get(key).filter(|v| !v.is_null())
}

/// Text form of a value: strings bare, everything else as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Integer coercion: integers as-is, floats truncated, booleans as 0/1,
/// strings parsed.
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Truthiness: non-empty strings and containers, non-zero numbers, `true`.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Whether the request asks for `key`.
pub fn wants(request: &Map<String, Value>, key: &str) -> bool {
    request.get(key).is_some_and(is_truthy)
}

pub fn topic(request: &Map<String, Value>) -> Result<String> {
    match present(request, "topic") {
        Some(topic) => Ok(display_value(topic)),
        None => bail!("request has no topic"),
    }
}

/// Sentence count for a summary. Zero means "no limit" to the lookup.
pub fn sentences(value: &Value) -> Result<u32> {
    let Some(n) = coerce_int(value) else {
        bail!("sentence count is not an integer: {}", display_value(value));
    };
    u32::try_from(n).map_err(|_| anyhow::anyhow!("sentence count out of range: {n}"))
}

/// Geosearch parameters as `(lat, long, radius)`. Coordinates must be
/// floats even here; a geosearch is never issued on anything else.
pub fn geo_params(value: &Value) -> Result<(f64, f64, u32)> {
    let coordinate = |key: &str| -> Result<f64> {
        match value.get(key).filter(|v| v.is_f64()).and_then(Value::as_f64) {
            Some(f) => Ok(f),
            None => bail!("geosearch {key} is not a float: {value}"),
        }
    };
    let lat = coordinate("lat")?;
    let long = coordinate("long")?;

    let Some(radius) = value.get("radius").and_then(Value::as_u64) else {
        bail!("geosearch radius is not a non-negative integer: {value}");
    };
    let radius = u32::try_from(radius)
        .map_err(|_| anyhow::anyhow!("geosearch radius out of range: {radius}"))?;

    Ok((lat, long, radius))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerce_int_variants() {
        assert_eq!(coerce_int(&json!(3)), Some(3));
        assert_eq!(coerce_int(&json!(2.9)), Some(2));
        assert_eq!(coerce_int(&json!(" 4 ")), Some(4));
        assert_eq!(coerce_int(&json!(true)), Some(1));
        assert_eq!(coerce_int(&json!("2.5")), None);
        assert_eq!(coerce_int(&json!([1])), None);
    }

    #[test]
    fn truthiness() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!("false")));
        assert!(is_truthy(&json!(1)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!({})));
    }

    #[test]
    fn topic_reads_non_strings() {
        let r = json!({"topic": 1871});
        assert_eq!(topic(r.as_object().unwrap()).unwrap(), "1871");

        let r = json!({"topic": null});
        assert!(topic(r.as_object().unwrap()).is_err());
    }

    #[test]
    fn sentences_allows_zero_rejects_negative() {
        assert_eq!(sentences(&json!(0)).unwrap(), 0);
        assert_eq!(sentences(&json!("3")).unwrap(), 3);
        assert!(sentences(&json!(-1)).is_err());
        assert!(sentences(&json!("lots")).is_err());
    }

    #[test]
    fn geo_params_read_floats_and_radius() {
        let v = json!({"lat": 52.5, "long": 13.4, "radius": 500});
        assert_eq!(geo_params(&v).unwrap(), (52.5, 13.4, 500));
    }

    #[test]
    fn geo_params_refuse_integer_coordinates() {
        let v = json!({"lat": 52, "long": 13.4, "radius": 500});
        assert!(geo_params(&v).is_err());
    }

    #[test]
    fn geo_params_take_zero_radius() {
        let v = json!({"lat": 52.5, "long": 13.4, "radius": 0});
        assert_eq!(geo_params(&v).unwrap().2, 0);
    }

    #[test]
    fn geo_params_fail_on_text() {
        let v = json!({"lat": "north", "long": 13.4, "radius": 500});
        assert!(geo_params(&v).is_err());

        let v = json!({"lat": 52.5, "long": 13.4});
        assert!(geo_params(&v).is_err());
    }
}
