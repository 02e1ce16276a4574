//! Lenient field decoders for backend JSON.
//!
//! The operations backend is inconsistent about scalar encodings: GPS
//! coordinates arrive as strings, ids as either strings or numbers, and
//! timestamps as RFC 3339, SQL-style datetimes, bare dates, `""` or `null`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// `"14.6349"`, `14.6349`, `""` and `null` → `Option<f64>`.
pub fn opt_coordinate<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Str(s)) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        Some(Scalar::Int(i)) => Some(i as f64),
        Some(Scalar::Float(f)) if f.is_finite() => Some(f),
        _ => None,
    })
}

/// Ids sent either as `"abc"` or `42`.
pub fn opt_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Str(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Scalar::Int(i)) => Some(i.to_string()),
        _ => None,
    })
}

/// Integers sent either as `3` or `"3"`.
pub fn opt_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Int(i)) => Some(i),
        Some(Scalar::Str(s)) => s.trim().parse().ok(),
        Some(Scalar::Float(f)) if f.fract() == 0.0 => Some(f as i64),
        _ => None,
    })
}

pub fn opt_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Str(s)) => parse_timestamp(&s),
        Some(Scalar::Int(ms)) => DateTime::from_timestamp_millis(ms),
        _ => None,
    })
}

/// Parse the timestamp shapes the backend emits. Values without an offset
/// are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "opt_coordinate")]
        coord: Option<f64>,
        #[serde(default, deserialize_with = "opt_id_string")]
        id: Option<String>,
        #[serde(default, deserialize_with = "opt_timestamp")]
        at: Option<DateTime<Utc>>,
        #[serde(default, deserialize_with = "opt_int")]
        code: Option<i64>,
    }

    fn sample(json: &str) -> Sample {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn coordinates_accept_strings_and_numbers() {
        assert_eq!(sample(r#"{"coord":"14.5"}"#).coord, Some(14.5));
        assert_eq!(sample(r#"{"coord":-90.25}"#).coord, Some(-90.25));
        assert_eq!(sample(r#"{"coord":""}"#).coord, None);
        assert_eq!(sample(r#"{"coord":null}"#).coord, None);
        assert_eq!(sample(r#"{}"#).coord, None);
        assert_eq!(sample(r#"{"coord":"abc"}"#).coord, None);
    }

    #[test]
    fn ids_accept_strings_and_numbers() {
        assert_eq!(sample(r#"{"id":"C-12"}"#).id.as_deref(), Some("C-12"));
        assert_eq!(sample(r#"{"id":42}"#).id.as_deref(), Some("42"));
        assert_eq!(sample(r#"{"id":"  "}"#).id, None);
    }

    #[test]
    fn codes_accept_numeric_strings() {
        assert_eq!(sample(r#"{"code":"3"}"#).code, Some(3));
        assert_eq!(sample(r#"{"code":2}"#).code, Some(2));
        assert_eq!(sample(r#"{"code":"x"}"#).code, None);
    }

    #[test]
    fn timestamps_in_every_backend_shape() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 10, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-02T10:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T10:30:00.000Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T04:30:00-06:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02 10:30:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-01-02"),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("mañana"), None);
    }

    #[test]
    fn timestamp_field_tolerates_null_and_empty() {
        assert!(sample(r#"{"at":null}"#).at.is_none());
        assert!(sample(r#"{"at":""}"#).at.is_none());
        assert!(sample(r#"{"at":"2024-01-01T08:00:00Z"}"#).at.is_some());
    }
}
