use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Millisecond-resolution wall-clock timestamp.
///
/// Used for node change times, soft-delete markers, lock expiry, and change
/// feed ordering keys. Stored as milliseconds since the UNIX epoch so it
/// round-trips exactly through the legacy cursor encoding.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The current wall-clock time.
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Construct from milliseconds since the UNIX epoch.
    pub const fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    /// Milliseconds since the UNIX epoch.
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// This timestamp advanced by a duration (saturating).
    pub fn plus(&self, d: Duration) -> Self {
        Self(self.0.saturating_add(d.as_millis() as i64))
    }

    /// This timestamp moved back by a duration (saturating).
    pub fn minus(&self, d: Duration) -> Self {
        Self(self.0.saturating_sub(d.as_millis() as i64))
    }

    /// Returns `true` if `self` is strictly before `other`.
    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }

    /// Chrono view for formatting and calendar math.
    pub fn to_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.0)
            .single()
            .unwrap_or_default()
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_positive() {
        assert!(Timestamp::now().as_millis() > 0);
    }

    #[test]
    fn plus_and_minus() {
        let t = Timestamp::from_millis(10_000);
        assert_eq!(t.plus(Duration::from_secs(5)).as_millis(), 15_000);
        assert_eq!(t.minus(Duration::from_secs(5)).as_millis(), 5_000);
    }

    #[test]
    fn ordering() {
        let a = Timestamp::from_millis(1);
        let b = Timestamp::from_millis(2);
        assert!(a.is_before(&b));
        assert!(!b.is_before(&a));
    }

    #[test]
    fn datetime_roundtrip() {
        let t = Timestamp::from_millis(1_700_000_000_000);
        assert_eq!(t.to_datetime().timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn serde_is_plain_integer() {
        let t = Timestamp::from_millis(42);
        assert_eq!(serde_json::to_string(&t).unwrap(), "42");
    }
}
