//! Request validation.
//!
//! [`validate`] checks the fields in a fixed order and stops at the first
//! violation. The boolean flags are normalized in place as they pass, so
//! a request that fails part way through is left partially normalized.

use serde_json::{Map, Value};
use thiserror::Error;

use super::request::{coerce_int, display_value, present};

/// A malformed request. The `Display` text is what the caller receives
/// under `"error"`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("no topic supplied in wikipedia request.")]
    NoTopic,

    #[error(
        "summary request must have a positive integer indicating number of sentences requested; was {0}"
    )]
    BadSentenceCount(String),

    #[error(
        "bad parameters to wikipedia geo search (lat/long must be floats; radius must be positive int): {0}"
    )]
    BadGeoParams(String),

    #[error("missing parameter to wikipedia geo search; must have lat/long/radius")]
    MissingGeoParam,

    #[error("request for wikipedia topic coordinates must be 'true', or 'false', not {0}")]
    BadCoordinatesFlag(String),

    #[error("request for wikipedia topic reference links must be 'true', or 'false', not {0}")]
    BadReferencesFlag(String),
}

/// Check `request` and turn its `coordinates`/`references` flags into
/// real booleans.
pub fn validate(request: &mut Map<String, Value>) -> Result<(), ValidationError> {
    if present(request, "topic").is_none() {
        return Err(ValidationError::NoTopic);
    }

    if let Some(sentences) = present(request, "summary") {
        match coerce_int(sentences) {
            Some(n) if n >= 1 => {}
            _ => {
                return Err(ValidationError::BadSentenceCount(display_value(
                    sentences,
                )));
            }
        }
    }

    if let Some(geo) = present(request, "geosearch") {
        check_geo(geo)?;
    }

    normalize_flag(request, "coordinates", ValidationError::BadCoordinatesFlag)?;
    normalize_flag(request, "references", ValidationError::BadReferencesFlag)?;

    Ok(())
}

fn check_geo(geo: &Value) -> Result<(), ValidationError> {
    let Some(params) = geo.as_object() else {
        return Err(ValidationError::MissingGeoParam);
    };
    let (Some(lat), Some(long), Some(radius)) =
        (params.get("lat"), params.get("long"), params.get("radius"))
    else {
        return Err(ValidationError::MissingGeoParam);
    };

    // Integers are not accepted where floats are expected.
    let radius_ok = radius.as_i64().is_some_and(|r| r >= 1);
    if !lat.is_f64() || !long.is_f64() || !radius_ok {
        return Err(ValidationError::BadGeoParams(geo.to_string()));
    }
    Ok(())
}

/// `"true"`/`"false"` in any case, or a real boolean.
fn normalize_flag(
    request: &mut Map<String, Value>,
    key: &str,
    error: fn(String) -> ValidationError,
) -> Result<(), ValidationError> {
    let Some(value) = present(request, key) else {
        return Ok(());
    };

    let wanted = display_value(value).to_lowercase();
    let flag = match wanted.as_str() {
        "true" => true,
        "false" => false,
        _ => return Err(error(wanted)),
    };
    request.insert(key.to_string(), Value::Bool(flag));
    Ok(())
}
