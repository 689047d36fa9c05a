//! Config durations, written as whole seconds

/// `#[serde(with = "secs")]` for `Duration` fields
pub mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }

    /// `Option<Duration>` fields; a missing key means unset
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(d) => s.serialize_some(&d.as_secs()),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
            Option::<u64>::deserialize(d).map(|secs| secs.map(Duration::from_secs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::secs;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Timers {
        #[serde(with = "secs")]
        delay: Duration,
        #[serde(default, with = "secs::option", skip_serializing_if = "Option::is_none")]
        deadline: Option<Duration>,
    }

    #[test]
    fn test_written_as_seconds() {
        let timers = Timers {
            delay: Duration::from_secs(5),
            deadline: Some(Duration::from_secs(30)),
        };
        assert_eq!(toml::to_string(&timers).unwrap(), "delay = 5\ndeadline = 30\n");
    }

    #[test]
    fn test_missing_optional_is_unset() {
        let timers: Timers = toml::from_str("delay = 2").unwrap();
        assert_eq!(timers.delay, Duration::from_secs(2));
        assert!(timers.deadline.is_none());
    }

    #[test]
    fn test_sub_second_precision_dropped() {
        let timers = Timers {
            delay: Duration::from_millis(1500),
            deadline: None,
        };
        assert_eq!(toml::to_string(&timers).unwrap(), "delay = 1\n");
    }
}
