use chrono::{Days, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

use crate::availability::{check_booking, BookingRejection};
use crate::booking::{Booking, BookingRequest, TimeRange};
use crate::error::DomainError;
use crate::holiday::{holiday_on, Holiday};
use crate::resource::ResourceIndex;
use crate::slot::Slot;

/// Two seasons of weekly training.
pub const MAX_SERIES_OCCURRENCES: usize = 104;

/// Weekly recurrence on the weekday of `first_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPattern {
    first_date: NaiveDate,
    until: NaiveDate,
    interval_weeks: u32,
}

impl SeriesPattern {
    pub fn new(
        first_date: NaiveDate,
        until: NaiveDate,
        interval_weeks: u32,
    ) -> Result<Self, DomainError> {
        if interval_weeks == 0 {
            return Err(DomainError::SeriesIntervalZero);
        }
        if until < first_date {
            return Err(DomainError::SeriesEndsBeforeStart { first_date, until });
        }
        let pattern = Self {
            first_date,
            until,
            interval_weeks,
        };
        if pattern.dates().take(MAX_SERIES_OCCURRENCES + 1).count() > MAX_SERIES_OCCURRENCES {
            return Err(DomainError::SeriesTooLong);
        }
        Ok(pattern)
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let step = Days::new(7 * u64::from(self.interval_weeks));
        std::iter::successors(Some(self.first_date), move |date| date.checked_add_days(step))
            .take_while(move |date| *date <= self.until)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesRequest {
    pub series_id: Uuid,
    pub resource_id: Uuid,
    pub range: TimeRange,
    pub pattern: SeriesPattern,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedDate {
    pub date: NaiveDate,
    pub holiday: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPlan {
    pub series_id: Uuid,
    pub dates: Vec<NaiveDate>,
    pub skipped: Vec<SkippedDate>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{} of the series dates are not available", .conflicts.len())]
pub struct SeriesRejection {
    pub conflicts: Vec<(NaiveDate, BookingRejection)>,
}

/// Plans a booking series. Holiday dates are skipped, every other date has
/// to pass [`check_booking`], otherwise nothing is booked.
pub fn plan_series(
    request: &SeriesRequest,
    index: &ResourceIndex,
    existing: &[Booking],
    slots: &[Slot],
    holidays: &[Holiday],
) -> Result<SeriesPlan, SeriesRejection> {
    let mut dates = Vec::new();
    let mut skipped = Vec::new();
    let mut conflicts = Vec::new();

    for date in request.pattern.dates() {
        if let Some(holiday) = holiday_on(holidays, date) {
            skipped.push(SkippedDate {
                date,
                holiday: holiday.name.clone(),
            });
            continue;
        }
        let booking = BookingRequest {
            resource_id: request.resource_id,
            date,
            range: request.range,
            replaces: None,
        };
        match check_booking(&booking, index, existing, slots, holidays) {
            Ok(()) => dates.push(date),
            Err(rejection) => conflicts.push((date, rejection)),
        }
    }

    if conflicts.is_empty() {
        Ok(SeriesPlan {
            series_id: request.series_id,
            dates,
            skipped,
        })
    } else {
        Err(SeriesRejection { conflicts })
    }
}
