use std::fmt::Display;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl BookingStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    /// Pending requests already hold the resource so two people cannot
    /// request the same time.
    #[must_use]
    pub const fn blocks_resource(self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }
}

impl Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(DomainError::UnknownBookingStatus(other.to_owned())),
        }
    }
}

/// Half-open time range `[start, end)` within one day. There is no 24:00,
/// so the latest possible end is 23:59:59.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawTimeRange")]
pub struct TimeRange {
    start: NaiveTime,
    end: NaiveTime,
}

#[derive(Deserialize)]
struct RawTimeRange {
    start: NaiveTime,
    end: NaiveTime,
}

impl TryFrom<RawTimeRange> for TimeRange {
    type Error = DomainError;

    fn try_from(value: RawTimeRange) -> Result<Self, Self::Error> {
        Self::new(value.start, value.end)
    }
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, DomainError> {
        if end == NaiveTime::MIN && start != NaiveTime::MIN {
            return Err(DomainError::EndsAtMidnight);
        }
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(DomainError::InvalidTimeRange { start, end })
        }
    }

    #[must_use]
    pub const fn start(&self) -> NaiveTime {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> NaiveTime {
        self.end
    }

    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub date: NaiveDate,
    pub range: TimeRange,
    pub status: BookingStatus,
    pub series_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
}

/// A booking that is about to be created or moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingRequest {
    pub resource_id: Uuid,
    pub date: NaiveDate,
    pub range: TimeRange,
    /// The booking being edited, which must not conflict with itself.
    pub replaces: Option<Uuid>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn time(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    pub(crate) fn range(from: u32, to: u32) -> TimeRange {
        TimeRange::new(time(from, 0), time(to, 0)).unwrap()
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Approved,
            BookingStatus::Rejected,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<BookingStatus>(), Ok(status));
        }
        assert!("storniert".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn only_pending_and_approved_block() {
        assert!(BookingStatus::Pending.blocks_resource());
        assert!(BookingStatus::Approved.blocks_resource());
        assert!(!BookingStatus::Rejected.blocks_resource());
        assert!(!BookingStatus::Cancelled.blocks_resource());
    }

    #[test]
    fn empty_or_reversed_ranges_are_rejected() {
        assert!(TimeRange::new(time(18, 0), time(18, 0)).is_err());
        assert!(TimeRange::new(time(19, 0), time(18, 0)).is_err());
    }

    #[test]
    fn ranges_end_before_midnight() {
        assert_eq!(
            TimeRange::new(time(22, 0), time(0, 0)),
            Err(DomainError::EndsAtMidnight)
        );
        let late = TimeRange::new(time(22, 0), NaiveTime::from_hms_opt(23, 59, 59).unwrap()).unwrap();
        assert!(late.overlaps(&range(22, 23)));
    }

    #[test]
    fn back_to_back_ranges_do_not_overlap() {
        assert!(!range(17, 18).overlaps(&range(18, 19)));
        assert!(range(17, 19).overlaps(&range(18, 20)));
        assert!(range(17, 20).overlaps(&range(18, 19)));
        assert!(range(18, 19).overlaps(&range(17, 20)));
    }

    #[test]
    fn contains_includes_the_edges() {
        assert!(range(17, 20).contains(&range(17, 20)));
        assert!(range(17, 20).contains(&range(18, 19)));
        assert!(!range(17, 20).contains(&range(16, 18)));
    }

    #[test]
    fn deserializing_checks_the_range() {
        let ok: TimeRange = serde_json::from_str(r#"{"start":"17:00:00","end":"18:30:00"}"#).unwrap();
        assert_eq!(ok.to_string(), "17:00-18:30");
        assert!(serde_json::from_str::<TimeRange>(r#"{"start":"18:00:00","end":"17:00:00"}"#).is_err());
    }
}
