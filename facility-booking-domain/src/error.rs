use chrono::{NaiveDate, NaiveTime};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown booking mode {0:?}, expected \"free\" or \"slotOnly\"")]
    UnknownBookingMode(String),
    #[error("unknown booking status {0:?}")]
    UnknownBookingStatus(String),
    #[error("day of week must be between 1 (monday) and 7 (sunday), got {0}")]
    InvalidWeekday(i16),
    #[error("a time range cannot end at midnight, end it at 23:59 instead")]
    EndsAtMidnight,
    #[error("start time {start} must be before end time {end}")]
    InvalidTimeRange { start: NaiveTime, end: NaiveTime },
    #[error("series must end on or after {first_date}, got {until}")]
    SeriesEndsBeforeStart { first_date: NaiveDate, until: NaiveDate },
    #[error("series interval must be at least one week")]
    SeriesIntervalZero,
    #[error("a series has at most {max} occurrences", max = crate::series::MAX_SERIES_OCCURRENCES)]
    SeriesTooLong,
}
