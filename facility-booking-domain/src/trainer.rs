use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainerStatus {
    Aktiv,
    Eingeladen,
    Passiv,
}

/// The profile flags the trainer status is derived from. Admins may set
/// each flag independently, there is no transition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrainerFlags {
    pub ist_trainer: bool,
    pub kann_buchen: bool,
    pub is_passive: bool,
    pub invited_at: Option<DateTime<Utc>>,
}

/// `None` for profiles that are not trainers at all.
#[must_use]
pub const fn trainer_status(flags: &TrainerFlags) -> Option<TrainerStatus> {
    if !flags.ist_trainer {
        return None;
    }
    if flags.kann_buchen && !flags.is_passive {
        Some(TrainerStatus::Aktiv)
    } else if flags.invited_at.is_some() {
        Some(TrainerStatus::Eingeladen)
    } else {
        Some(TrainerStatus::Passiv)
    }
}

/// Licenses and documents are flagged this many days before they expire.
pub const EXPIRY_WARNING_DAYS: i64 = 60;

/// Police clearance and conduct code have to be renewed after five years.
pub const DOCUMENT_VALIDITY_MONTHS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum Compliance {
    Valid { until: Option<NaiveDate> },
    ExpiringSoon { until: NaiveDate },
    Expired { since: NaiveDate },
    Missing,
}

impl Compliance {
    /// For licenses: `None` as expiry means the license does not expire.
    #[must_use]
    pub fn of_license(valid_until: Option<NaiveDate>, today: NaiveDate) -> Self {
        valid_until.map_or(Self::Valid { until: None }, |until| Self::until(until, today))
    }

    /// For documents that are valid for a fixed time after their issue date.
    #[must_use]
    pub fn of_document(issued_on: Option<NaiveDate>, today: NaiveDate) -> Self {
        issued_on
            .and_then(|issued_on| issued_on.checked_add_months(Months::new(DOCUMENT_VALIDITY_MONTHS)))
            .map_or(Self::Missing, |until| Self::until(until, today))
    }

    fn until(until: NaiveDate, today: NaiveDate) -> Self {
        if until < today {
            Self::Expired { since: until }
        } else if (until - today).num_days() <= EXPIRY_WARNING_DAYS {
            Self::ExpiringSoon { until }
        } else {
            Self::Valid { until: Some(until) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(ist_trainer: bool, kann_buchen: bool, is_passive: bool, invited: bool) -> TrainerFlags {
        TrainerFlags {
            ist_trainer,
            kann_buchen,
            is_passive,
            invited_at: invited.then(|| DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()),
        }
    }

    #[test]
    fn can_book_and_not_passive_is_active() {
        assert_eq!(
            trainer_status(&flags(true, true, false, false)),
            Some(TrainerStatus::Aktiv)
        );
        assert_eq!(
            trainer_status(&flags(true, true, false, true)),
            Some(TrainerStatus::Aktiv)
        );
    }

    #[test]
    fn invited_without_booking_rights_is_invited() {
        assert_eq!(
            trainer_status(&flags(true, false, false, true)),
            Some(TrainerStatus::Eingeladen)
        );
        assert_eq!(
            trainer_status(&flags(true, false, true, true)),
            Some(TrainerStatus::Eingeladen)
        );
    }

    #[test]
    fn passive_trainer_falls_back_to_invitation() {
        assert_eq!(
            trainer_status(&flags(true, true, true, true)),
            Some(TrainerStatus::Eingeladen)
        );
        assert_eq!(
            trainer_status(&flags(true, true, true, false)),
            Some(TrainerStatus::Passiv)
        );
    }

    #[test]
    fn everything_else_is_passive() {
        assert_eq!(
            trainer_status(&flags(true, false, false, false)),
            Some(TrainerStatus::Passiv)
        );
    }

    #[test]
    fn non_trainers_have_no_status_whatever_the_flags() {
        for kann_buchen in [false, true] {
            for is_passive in [false, true] {
                for invited in [false, true] {
                    assert_eq!(
                        trainer_status(&flags(false, kann_buchen, is_passive, invited)),
                        None
                    );
                }
            }
        }
    }

    #[test]
    fn status_serializes_to_the_german_names() {
        assert_eq!(
            serde_json::to_string(&TrainerStatus::Eingeladen).unwrap(),
            "\"eingeladen\""
        );
    }

    fn day(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn license_compliance() {
        let today = day(2024, 6, 1);
        assert_eq!(
            Compliance::of_license(None, today),
            Compliance::Valid { until: None }
        );
        assert_eq!(
            Compliance::of_license(Some(day(2025, 1, 1)), today),
            Compliance::Valid {
                until: Some(day(2025, 1, 1))
            }
        );
        assert_eq!(
            Compliance::of_license(Some(day(2024, 7, 1)), today),
            Compliance::ExpiringSoon {
                until: day(2024, 7, 1)
            }
        );
        assert_eq!(
            Compliance::of_license(Some(today), today),
            Compliance::ExpiringSoon { until: today }
        );
        assert_eq!(
            Compliance::of_license(Some(day(2024, 5, 31)), today),
            Compliance::Expired {
                since: day(2024, 5, 31)
            }
        );
    }

    #[test]
    fn documents_expire_five_years_after_issue() {
        let today = day(2024, 6, 1);
        assert_eq!(Compliance::of_document(None, today), Compliance::Missing);
        assert_eq!(
            Compliance::of_document(Some(day(2019, 5, 1)), today),
            Compliance::Expired {
                since: day(2024, 5, 1)
            }
        );
        assert_eq!(
            Compliance::of_document(Some(day(2022, 1, 1)), today),
            Compliance::Valid {
                until: Some(day(2027, 1, 1))
            }
        );
    }
}
