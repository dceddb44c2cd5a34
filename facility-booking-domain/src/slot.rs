use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::TimeRange;
use crate::error::DomainError;
use crate::holiday::{holiday_on, Holiday};

/// Converts the stored day of week (1 = monday … 7 = sunday).
pub fn weekday_from_iso(day: i16) -> Result<Weekday, DomainError> {
    match day {
        1 => Ok(Weekday::Mon),
        2 => Ok(Weekday::Tue),
        3 => Ok(Weekday::Wed),
        4 => Ok(Weekday::Thu),
        5 => Ok(Weekday::Fri),
        6 => Ok(Weekday::Sat),
        7 => Ok(Weekday::Sun),
        other => Err(DomainError::InvalidWeekday(other)),
    }
}

/// Recurring weekly window in which a slot-only resource may be booked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub day_of_week: Weekday,
    pub range: TimeRange,
    pub valid_from: NaiveDate,
    pub valid_until: Option<NaiveDate>,
}

impl Slot {
    #[must_use]
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        date.weekday() == self.day_of_week
            && self.valid_from <= date
            && self.valid_until.map_or(true, |until| date <= until)
    }

    /// The booking must lie completely inside the slot window.
    #[must_use]
    pub fn matches(&self, date: NaiveDate, range: &TimeRange) -> bool {
        self.is_valid_on(date) && self.range.contains(range)
    }
}

/// Slots of `resource_id` offered on `date`, ordered by start time. Nothing
/// is offered on holidays.
#[must_use]
pub fn open_slots<'a>(
    slots: &'a [Slot],
    resource_id: Uuid,
    date: NaiveDate,
    holidays: &[Holiday],
) -> Vec<&'a Slot> {
    if holiday_on(holidays, date).is_some() {
        return Vec::new();
    }
    let mut open: Vec<&Slot> = slots
        .iter()
        .filter(|slot| slot.resource_id == resource_id && slot.is_valid_on(date))
        .collect();
    open.sort_by_key(|slot| slot.range);
    open
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::tests::range;

    fn date(day: u32) -> NaiveDate {
        // 2024-01-01 is a monday
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn slot(resource_id: Uuid, day_of_week: Weekday, from: u32, to: u32) -> Slot {
        Slot {
            id: Uuid::new_v4(),
            resource_id,
            day_of_week,
            range: range(from, to),
            valid_from: date(1),
            valid_until: Some(date(31)),
        }
    }

    #[test]
    fn iso_weekdays() {
        assert_eq!(weekday_from_iso(1), Ok(Weekday::Mon));
        assert_eq!(weekday_from_iso(7), Ok(Weekday::Sun));
        assert_eq!(weekday_from_iso(0), Err(DomainError::InvalidWeekday(0)));
        for weekday in [Weekday::Mon, Weekday::Wed, Weekday::Sun] {
            let iso = i16::try_from(weekday.number_from_monday()).unwrap();
            assert_eq!(weekday_from_iso(iso), Ok(weekday));
        }
    }

    #[test]
    fn slot_validity_respects_weekday_and_period() {
        let slot = slot(Uuid::new_v4(), Weekday::Tue, 17, 19);
        assert!(slot.is_valid_on(date(2)));
        assert!(!slot.is_valid_on(date(3)));
        assert!(slot.is_valid_on(date(30)));
        assert!(!slot.is_valid_on(NaiveDate::from_ymd_opt(2024, 2, 6).unwrap()));
        assert!(!slot.is_valid_on(NaiveDate::from_ymd_opt(2023, 12, 26).unwrap()));
    }

    #[test]
    fn open_ended_slot() {
        let mut slot = slot(Uuid::new_v4(), Weekday::Tue, 17, 19);
        slot.valid_until = None;
        assert!(slot.is_valid_on(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()));
    }

    #[test]
    fn booking_must_lie_inside_the_window() {
        let slot = slot(Uuid::new_v4(), Weekday::Tue, 17, 19);
        assert!(slot.matches(date(2), &range(17, 19)));
        assert!(slot.matches(date(2), &range(17, 18)));
        assert!(!slot.matches(date(2), &range(16, 18)));
        assert!(!slot.matches(date(3), &range(17, 19)));
    }

    #[test]
    fn open_slots_are_sorted_and_closed_on_holidays() {
        let resource_id = Uuid::new_v4();
        let late = slot(resource_id, Weekday::Tue, 19, 21);
        let early = slot(resource_id, Weekday::Tue, 17, 19);
        let other = slot(Uuid::new_v4(), Weekday::Tue, 17, 19);
        let slots = [late.clone(), other, early.clone()];

        let open = open_slots(&slots, resource_id, date(2), &[]);
        assert_eq!(open, vec![&early, &late]);

        let holidays = [Holiday {
            name: "Neujahr".to_owned(),
            start_date: date(1),
            end_date: date(6),
        }];
        assert!(open_slots(&slots, resource_id, date(2), &holidays).is_empty());
        assert_eq!(open_slots(&slots, resource_id, date(9), &holidays).len(), 2);
    }
}
