//! Serde helpers for configuration fields
//!
//! Durations in configuration are written as integer milliseconds so the same
//! config reads naturally from JSON, TOML or environment overrides.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// `#[serde(with = "duration_millis")]` adapter storing a [`Duration`] as
/// whole milliseconds
///
/// # Usage
/// ```rust
/// use std::time::Duration;
///
/// use probgate_common::duration_millis;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Window {
///     #[serde(with = "duration_millis")]
///     retention: Duration,
/// }
/// ```
pub mod duration_millis {
    use super::*;

    type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    /// Serialize as milliseconds, saturating at `u64::MAX`
    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Window {
        #[serde(with = "duration_millis")]
        retention: Duration,
    }

    #[test]
    fn test_duration_millis_json() {
        let window = Window { retention: Duration::from_millis(3000) };

        let json = serde_json::to_string(&window).expect("serializable");
        assert_eq!(json, r#"{"retention":3000}"#);

        let parsed: Window = serde_json::from_str(&json).expect("deserializable");
        assert_eq!(parsed, window);
    }

    /// Sub-millisecond precision is truncated on the way out.
    #[test]
    fn test_duration_millis_truncates_micros() {
        let window = Window { retention: Duration::from_micros(1_999) };
        let json = serde_json::to_string(&window).expect("serializable");
        assert_eq!(json, r#"{"retention":1}"#);
    }

    #[test]
    fn test_duration_millis_rejects_negative() {
        let parsed: Result<Window, _> = serde_json::from_str(r#"{"retention":-5}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_duration_millis_toml() {
        let parsed: Window = toml::from_str("retention = 250").expect("valid toml");
        assert_eq!(parsed.retention, Duration::from_millis(250));
    }
}
