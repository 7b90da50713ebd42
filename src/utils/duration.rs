use std::{fmt::Display, ops::Add, str::FromStr};

use chrono::Duration;

use crate::error::DurationParseError;

/// Whole seconds of tracked time. Rendered as `H:MM:SS`, where the hour field has no fixed width
/// and is allowed to go past 24.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackedDuration(u64);

impl TrackedDuration {
    pub const ZERO: TrackedDuration = TrackedDuration(0);

    pub fn from_seconds(seconds: u64) -> Self {
        Self(seconds)
    }

    /// Truncates to whole seconds. Negative values become zero.
    pub fn from_elapsed(elapsed: Duration) -> Self {
        Self(elapsed.num_seconds().max(0) as u64)
    }

    pub fn seconds(&self) -> u64 {
        self.0
    }
}

impl Add for TrackedDuration {
    type Output = TrackedDuration;

    fn add(self, rhs: Self) -> Self::Output {
        TrackedDuration(self.0.saturating_add(rhs.0))
    }
}

impl Display for TrackedDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hours = self.0 / 3600;
        let minutes = self.0 % 3600 / 60;
        let seconds = self.0 % 60;
        write!(f, "{hours}:{minutes:02}:{seconds:02}")
    }
}

impl FromStr for TrackedDuration {
    type Err = DurationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || DurationParseError::Malformed(s.to_string());

        let mut fields = s.split(':');
        let (Some(hours), Some(minutes), Some(seconds), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(malformed());
        };

        let hours = parse_field(hours, None).ok_or_else(malformed)?;
        let minutes = parse_field(minutes, Some(2)).ok_or_else(malformed)?;
        let seconds = parse_field(seconds, Some(2)).ok_or_else(malformed)?;
        if minutes > 59 || seconds > 59 {
            return Err(malformed());
        }

        hours
            .checked_mul(3600)
            .and_then(|v| v.checked_add(minutes * 60 + seconds))
            .map(TrackedDuration)
            .ok_or_else(malformed)
    }
}

/// Parses a field of ASCII digits. `str::parse` alone would let a leading `+` through.
fn parse_field(field: &str, width: Option<usize>) -> Option<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if width.is_some_and(|w| w != field.len()) {
        return None;
    }
    field.parse().ok()
}
