use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Stable identifier of a seat in the pool, e.g. `A17`.
///
/// Ordering is "natural": the alphabetic prefix first, then the trailing
/// number, so `A2` sorts before `A10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeatId(String);

impl SeatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identity of the `n`th seat of a pool (1-based).
    pub fn sequential(prefix: &str, n: u32) -> Self {
        Self(format!("{}{}", prefix, n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn natural_key(&self) -> (&str, u64, &str) {
        let split = self.0.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        let (prefix, digits) = self.0.split_at(split);
        let number = if digits.is_empty() {
            0
        } else {
            digits.parse().unwrap_or(u64::MAX)
        };
        (prefix, number, &self.0)
    }
}

impl Ord for SeatId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.natural_key().cmp(&other.natural_key())
    }
}

impl PartialOrd for SeatId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SeatId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SeatId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Seat status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Available,
    Sold,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "AVAILABLE",
            SeatStatus::Sold => "SOLD",
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(SeatStatus::Available),
            "SOLD" => Ok(SeatStatus::Sold),
            other => Err(format!("unknown seat status: {}", other)),
        }
    }
}

/// A seat record as held by the seat store.
///
/// `version` is the optimistic-concurrency token: every committed mutation
/// produces a record whose version is exactly one higher than the record it
/// was derived from. The transition helpers below are the only way the
/// engine builds a new record, so `status == Sold` iff `holder.is_some()`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Seat {
    pub id: SeatId,
    pub status: SeatStatus,
    pub holder: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Seat {
    /// Fresh, unsold seat at version 0.
    pub fn new(id: SeatId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            status: SeatStatus::Available,
            holder: None,
            version: 0,
            created_at: now,
            last_updated: now,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == SeatStatus::Available
    }

    /// Status and holder agree with each other.
    pub fn is_consistent(&self) -> bool {
        (self.status == SeatStatus::Sold) == self.holder.is_some()
    }

    /// Next record after a successful claim by `holder`.
    pub fn claimed_by(&self, holder: &str, now: DateTime<Utc>) -> Seat {
        Seat {
            id: self.id.clone(),
            status: SeatStatus::Sold,
            holder: Some(holder.to_string()),
            version: self.version + 1,
            created_at: self.created_at,
            last_updated: now,
        }
    }

    /// Next record after a release. Advances the version even when the seat
    /// was already available.
    pub fn released(&self, now: DateTime<Utc>) -> Seat {
        Seat {
            id: self.id.clone(),
            status: SeatStatus::Available,
            holder: None,
            version: self.version + 1,
            created_at: self.created_at,
            last_updated: now,
        }
    }
}
