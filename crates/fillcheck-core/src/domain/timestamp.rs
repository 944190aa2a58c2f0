use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::ValidationError;

/// RFC3339 timestamp guaranteed to be UTC.
///
/// Fill timestamps, lot entry/exit times, and bar timestamps all use this
/// type so minute bucketing and day windows are computed in one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let parsed = OffsetDateTime::parse(input, &Rfc3339).map_err(|_| {
            ValidationError::TimestampNotUtc {
                value: input.to_owned(),
            }
        })?;

        Self::from_offset_datetime(parsed).map_err(|_| ValidationError::TimestampNotUtc {
            value: input.to_owned(),
        })
    }

    pub fn from_offset_datetime(value: OffsetDateTime) -> Result<Self, ValidationError> {
        if value.offset() != UtcOffset::UTC {
            return Err(ValidationError::TimestampNotUtc {
                value: value
                    .format(&Rfc3339)
                    .unwrap_or_else(|_| String::from("<unformattable>")),
            });
        }

        Ok(Self(value))
    }

    pub fn from_unix_seconds(seconds: i64) -> Result<Self, ValidationError> {
        OffsetDateTime::from_unix_timestamp(seconds)
            .map(Self)
            .map_err(|_| ValidationError::TimestampNotUtc {
                value: seconds.to_string(),
            })
    }

    pub fn from_unix_millis(millis: i64) -> Result<Self, ValidationError> {
        Self::from_unix_seconds(millis.div_euclid(1_000))
    }

    pub fn unix_seconds(self) -> i64 {
        self.0.unix_timestamp()
    }

    /// Timestamp truncated to the start of its minute. Cache keys for market
    /// ranges are scoped to this bucket.
    pub fn minute_bucket(self) -> i64 {
        self.0.unix_timestamp().div_euclid(60)
    }

    /// Calendar day containing this instant (UTC).
    pub fn date(self) -> Date {
        self.0.date()
    }

    /// Seconds of distance to another instant, always non-negative.
    pub fn distance_seconds(self, other: Self) -> i64 {
        (self.0.unix_timestamp() - other.0.unix_timestamp()).abs()
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    pub fn format_rfc3339(self) -> String {
        self.0
            .format(&Rfc3339)
            .expect("UtcDateTime must be RFC3339 formattable")
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl Serialize for UtcDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_rfc3339())
    }
}

impl<'de> Deserialize<'de> for UtcDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_utc_timestamp() {
        let parsed = UtcDateTime::parse("2024-03-01T14:30:45Z").expect("must parse");
        assert_eq!(parsed.format_rfc3339(), "2024-03-01T14:30:45Z");
    }

    #[test]
    fn rejects_non_utc_timestamp() {
        let err = UtcDateTime::parse("2024-03-01T15:30:45+01:00").expect_err("must fail");
        assert!(matches!(err, ValidationError::TimestampNotUtc { .. }));
    }

    #[test]
    fn minute_bucket_truncates_seconds() {
        let a = UtcDateTime::parse("2024-03-01T14:30:01Z").expect("must parse");
        let b = UtcDateTime::parse("2024-03-01T14:30:59Z").expect("must parse");
        let c = UtcDateTime::parse("2024-03-01T14:31:00Z").expect("must parse");

        assert_eq!(a.minute_bucket(), b.minute_bucket());
        assert_eq!(a.minute_bucket() + 1, c.minute_bucket());
    }

    #[test]
    fn unix_round_trip() {
        let parsed = UtcDateTime::parse("2024-03-01T00:00:00Z").expect("must parse");
        let rebuilt = UtcDateTime::from_unix_seconds(parsed.unix_seconds()).expect("must convert");
        assert_eq!(parsed, rebuilt);
    }
}
