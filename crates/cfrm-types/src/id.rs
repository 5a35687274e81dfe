use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;

/// Version nibble stamped into every minted id.
pub const VERSION: u8 = 7;
/// RFC 4122 variant bits (`0b10`).
pub const VARIANT: u8 = 0b10;

/// Largest value of the per-millisecond counter (12 bits).
pub const COUNTER_MAX: u16 = 0x0FFF;
/// Mask for the 48-bit millisecond timestamp.
pub const TIMESTAMP_MASK: u64 = (1 << 48) - 1;
/// Mask for the 62-bit random tail.
pub const RANDOM_MASK: u64 = (1 << 62) - 1;

const TIMESTAMP_SHIFT: u32 = 80;
const VERSION_SHIFT: u32 = 76;
const COUNTER_SHIFT: u32 = 64;
const VARIANT_SHIFT: u32 = 62;

/// Time-ordered 128-bit operation identifier.
///
/// Bit layout, most significant first:
///
/// ```text
/// | unix_ts_ms (48) | ver (4) = 7 | counter (12) | var (2) = 0b10 | random (62) |
/// ```
///
/// Ids compare by their numeric value, so ids minted by one
/// [`IdGenerator`](crate::IdGenerator) sort in mint order. Textually an
/// `OpId` is a hyphenated UUID and serializes as that string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpId(Uuid);

impl OpId {
    /// Assemble an id from its three variable fields.
    ///
    /// Each field is masked to its width: the timestamp to 48 bits, the
    /// counter to 12 bits and the random tail to 62 bits.
    pub fn from_parts(timestamp_ms: u64, counter: u16, random: u64) -> Self {
        let value = (u128::from(timestamp_ms & TIMESTAMP_MASK) << TIMESTAMP_SHIFT)
            | (u128::from(VERSION) << VERSION_SHIFT)
            | (u128::from(counter & COUNTER_MAX) << COUNTER_SHIFT)
            | (u128::from(VARIANT) << VARIANT_SHIFT)
            | u128::from(random & RANDOM_MASK);
        Self(Uuid::from_u128(value))
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// The id as a 128-bit integer.
    pub fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }

    /// Millisecond timestamp the id was minted at.
    pub fn timestamp_ms(&self) -> u64 {
        (self.as_u128() >> TIMESTAMP_SHIFT) as u64 & TIMESTAMP_MASK
    }

    /// Per-millisecond counter value.
    pub fn counter(&self) -> u16 {
        (self.as_u128() >> COUNTER_SHIFT) as u16 & COUNTER_MAX
    }

    /// The 62-bit random tail.
    pub fn random(&self) -> u64 {
        self.as_u128() as u64 & RANDOM_MASK
    }

    /// UUID version number (7 for minted ids).
    pub fn version(&self) -> usize {
        self.0.get_version_num()
    }

    /// `urn:uuid:` form of the id.
    pub fn urn(&self) -> String {
        self.0.urn().to_string()
    }

    /// Short representation (first 8 characters).
    pub fn short_id(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl FromStr for OpId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TypeError::InvalidId {
                input: s.to_string(),
                reason: e.to_string(),
            })
    }
}

impl From<Uuid> for OpId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Debug for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpId({})", self.0)
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}
