use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A closure period of the operator, e.g. school holidays during which the
/// shared halls are not available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holiday {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Holiday {
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[must_use]
pub fn holiday_on(holidays: &[Holiday], date: NaiveDate) -> Option<&Holiday> {
    holidays.iter().find(|holiday| holiday.contains(date))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_ends_are_inclusive() {
        let holiday = Holiday {
            name: "Herbstferien".to_owned(),
            start_date: NaiveDate::from_ymd_opt(2024, 10, 21).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 11, 2).unwrap(),
        };
        assert!(holiday.contains(NaiveDate::from_ymd_opt(2024, 10, 21).unwrap()));
        assert!(holiday.contains(NaiveDate::from_ymd_opt(2024, 11, 2).unwrap()));
        assert!(!holiday.contains(NaiveDate::from_ymd_opt(2024, 11, 3).unwrap()));

        let holidays = [holiday];
        assert_eq!(
            holiday_on(&holidays, NaiveDate::from_ymd_opt(2024, 10, 25).unwrap())
                .map(|holiday| holiday.name.as_str()),
            Some("Herbstferien")
        );
        assert!(holiday_on(&holidays, NaiveDate::from_ymd_opt(2024, 12, 1).unwrap()).is_none());
    }
}
