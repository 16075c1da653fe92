//! Snowflake ID - the gateway's 64-bit unique identifier
//!
//! Structure:
//! - Bits 63-22: Timestamp (milliseconds since the platform epoch)
//! - Bits 21-17: Internal worker ID
//! - Bits 16-12: Internal process ID
//! - Bits 11-0:  Increment

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Gateway snowflake ID (64-bit)
///
/// The JSON encoding carries ids as strings while the binary term encoding carries
/// them as integers, so deserialization accepts both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Snowflake(u64);

impl Snowflake {
    /// Platform epoch: 2015-01-01 00:00:00 UTC (milliseconds)
    pub const EPOCH: u64 = 1_420_070_400_000;

    /// Create a new Snowflake from a raw u64 value
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    #[inline]
    pub const fn into_inner(self) -> u64 {
        self.0
    }

    /// Check if the Snowflake is zero (uninitialized)
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Extract timestamp (milliseconds since Unix epoch)
    #[inline]
    pub fn timestamp(&self) -> u64 {
        (self.0 >> 22) + Self::EPOCH
    }

    /// Extract internal worker ID (0-31)
    #[inline]
    pub fn worker_id(&self) -> u8 {
        ((self.0 >> 17) & 0x1F) as u8
    }

    /// Extract internal process ID (0-31)
    #[inline]
    pub fn process_id(&self) -> u8 {
        ((self.0 >> 12) & 0x1F) as u8
    }

    /// Extract increment (0-4095)
    #[inline]
    pub fn increment(&self) -> u16 {
        (self.0 & 0xFFF) as u16
    }

    /// Convert timestamp to DateTime<Utc>
    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        use chrono::{TimeZone, Utc};
        Utc.timestamp_millis_opt(self.timestamp() as i64)
            .single()
            .unwrap_or_default()
    }

    /// Parse from string representation
    pub fn parse(s: &str) -> Result<Self, SnowflakeParseError> {
        s.parse::<u64>()
            .map(Snowflake)
            .map_err(|_| SnowflakeParseError::InvalidFormat)
    }
}

/// Error when parsing a Snowflake from string
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SnowflakeParseError {
    #[error("invalid snowflake format")]
    InvalidFormat,
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Snowflake {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<Snowflake> for u64 {
    fn from(id: Snowflake) -> Self {
        id.0
    }
}

impl std::str::FromStr for Snowflake {
    type Err = SnowflakeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Snowflake::parse(s)
    }
}

// Serialize as string for JSON (JavaScript BigInt safety)
impl Serialize for Snowflake {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

// Deserialize from string or number
impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct SnowflakeVisitor;

        impl Visitor<'_> for SnowflakeVisitor {
            type Value = Snowflake;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or integer representing a snowflake ID")
            }

            fn visit_i64<E>(self, value: i64) -> Result<Snowflake, E>
            where
                E: de::Error,
            {
                u64::try_from(value)
                    .map(Snowflake)
                    .map_err(|_| de::Error::custom("negative snowflake"))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Snowflake, E>
            where
                E: de::Error,
            {
                Ok(Snowflake(value))
            }

            fn visit_str<E>(self, value: &str) -> Result<Snowflake, E>
            where
                E: de::Error,
            {
                value
                    .parse::<u64>()
                    .map(Snowflake)
                    .map_err(|_| de::Error::custom("invalid snowflake string"))
            }
        }

        deserializer.deserialize_any(SnowflakeVisitor)
    }
}
