//! Serde helpers that represent `Duration` values as integer milliseconds.

pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// Custom serializer/deserializer for Option<Duration>
pub mod duration_ms_option {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_u64(d.as_millis() as u64),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis: Option<u64> = Option::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Timings {
        #[serde(with = "super::duration_ms")]
        timeout: Duration,
        #[serde(with = "super::duration_ms_option", default)]
        interval: Option<Duration>,
    }

    #[test]
    fn test_durations_as_millis() {
        let timings = Timings {
            timeout: Duration::from_millis(1500),
            interval: None,
        };
        let json = serde_json::to_string(&timings).unwrap();
        assert_eq!(json, r#"{"timeout":1500,"interval":null}"#);

        let parsed: Timings = serde_json::from_str(r#"{"timeout":250,"interval":30000}"#).unwrap();
        assert_eq!(parsed.timeout, Duration::from_millis(250));
        assert_eq!(parsed.interval, Some(Duration::from_secs(30)));

        let parsed: Timings = serde_json::from_str(r#"{"timeout":250}"#).unwrap();
        assert_eq!(parsed.interval, None);
    }
}
