use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use facility_booking_domain::{
    Booking, DomainError, Holiday, Resource, Slot, TimeRange, TrainerFlags,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{
    bookings, clubs, departments, facilities, genehmiger_resources, holidays, operators, profiles,
    resource_groups, resources, sent_emails, slots, teams, trainer_assignments, trainer_erfolge,
    trainer_lizenzen, trainer_profile_details,
};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = operators)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Operator {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub contact_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, AsChangeset, Deserialize)]
#[diesel(table_name = operators)]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct OperatorData {
    pub name: String,
    pub contact_email: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub operator_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub ist_trainer: bool,
    pub kann_buchen: bool,
    pub is_passive: bool,
    pub invited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    #[must_use]
    pub const fn trainer_flags(&self) -> TrainerFlags {
        TrainerFlags {
            ist_trainer: self.ist_trainer,
            kann_buchen: self.kann_buchen,
            is_passive: self.is_passive,
            invited_at: self.invited_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = profiles)]
pub struct NewProfile {
    pub operator_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub ist_trainer: bool,
    pub invited_at: Option<DateTime<Utc>>,
}

/// What users may change about themselves.
#[derive(Debug, Clone, AsChangeset, Deserialize)]
#[diesel(table_name = profiles)]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct OwnProfileData {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

/// Role and trainer flags, only admins may change them. Absent fields stay
/// untouched.
#[derive(Debug, Clone, Default, AsChangeset, Deserialize)]
#[diesel(table_name = profiles)]
#[serde(rename_all = "camelCase")]
pub struct ProfileAdminData {
    pub role: Option<String>,
    pub ist_trainer: Option<bool>,
    pub kann_buchen: Option<bool>,
    pub is_passive: Option<bool>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = facilities)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    pub id: Uuid,
    pub operator_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Insertable, AsChangeset, Deserialize)]
#[diesel(table_name = facilities)]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct FacilityData {
    pub name: String,
    pub address: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = resource_groups)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    pub id: Uuid,
    pub operator_id: Uuid,
    pub facility_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Insertable, AsChangeset, Deserialize)]
#[diesel(table_name = resource_groups)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupData {
    pub facility_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = resources)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct ResourceRow {
    pub id: Uuid,
    pub operator_id: Uuid,
    pub facility_id: Uuid,
    pub resource_group_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub is_composite: bool,
    pub booking_mode: String,
}

impl TryFrom<&ResourceRow> for Resource {
    type Error = DomainError;

    fn try_from(row: &ResourceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name.clone(),
            parent_id: row.parent_id,
            is_composite: row.is_composite,
            booking_mode: row.booking_mode.parse()?,
        })
    }
}

#[derive(Debug, Clone, Insertable, AsChangeset, Deserialize)]
#[diesel(table_name = resources)]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct ResourceData {
    pub facility_id: Uuid,
    pub resource_group_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub is_composite: bool,
    pub booking_mode: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = slots)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct SlotRow {
    pub id: Uuid,
    pub operator_id: Uuid,
    pub resource_id: Uuid,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub valid_from: NaiveDate,
    pub valid_until: Option<NaiveDate>,
}

impl TryFrom<&SlotRow> for Slot {
    type Error = DomainError;

    fn try_from(row: &SlotRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            resource_id: row.resource_id,
            day_of_week: facility_booking_domain::slot::weekday_from_iso(row.day_of_week)?,
            range: TimeRange::new(row.start_time, row.end_time)?,
            valid_from: row.valid_from,
            valid_until: row.valid_until,
        })
    }
}

#[derive(Debug, Clone, Insertable, AsChangeset, Deserialize)]
#[diesel(table_name = slots)]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct SlotData {
    pub resource_id: Uuid,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub valid_from: NaiveDate,
    pub valid_until: Option<NaiveDate>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = bookings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct BookingRow {
    pub id: Uuid,
    pub operator_id: Uuid,
    pub resource_id: Uuid,
    pub booked_by: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: String,
    pub series_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<&BookingRow> for Booking {
    type Error = DomainError;

    fn try_from(row: &BookingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            resource_id: row.resource_id,
            date: row.date,
            range: TimeRange::new(row.start_time, row.end_time)?,
            status: row.status.parse()?,
            series_id: row.series_id,
            title: row.title.clone(),
            description: row.description.clone(),
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = bookings)]
pub struct NewBooking {
    pub id: Uuid,
    pub operator_id: Uuid,
    pub resource_id: Uuid,
    pub booked_by: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: String,
    pub series_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = clubs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Club {
    pub id: Uuid,
    pub operator_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Insertable, AsChangeset, Deserialize)]
#[diesel(table_name = clubs)]
#[serde(rename_all = "camelCase")]
pub struct ClubData {
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = departments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: Uuid,
    pub operator_id: Uuid,
    pub club_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Insertable, AsChangeset, Deserialize)]
#[diesel(table_name = departments)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentData {
    pub club_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = teams)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: Uuid,
    pub operator_id: Uuid,
    pub department_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Insertable, AsChangeset, Deserialize)]
#[diesel(table_name = teams)]
#[serde(rename_all = "camelCase")]
pub struct TeamData {
    pub department_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = trainer_assignments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct TrainerAssignment {
    pub id: Uuid,
    pub operator_id: Uuid,
    pub team_id: Uuid,
    pub profile_id: Uuid,
}

#[derive(Debug, Clone, Insertable, AsChangeset, Deserialize)]
#[diesel(table_name = trainer_assignments)]
#[serde(rename_all = "camelCase")]
pub struct TrainerAssignmentData {
    pub team_id: Uuid,
    pub profile_id: Uuid,
}

/// Approver of a resource.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = genehmiger_resources)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct GenehmigerResource {
    pub id: Uuid,
    pub operator_id: Uuid,
    pub profile_id: Uuid,
    pub resource_id: Uuid,
}

#[derive(Debug, Clone, Insertable, AsChangeset, Deserialize)]
#[diesel(table_name = genehmiger_resources)]
#[serde(rename_all = "camelCase")]
pub struct GenehmigerResourceData {
    pub profile_id: Uuid,
    pub resource_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = holidays)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct HolidayRow {
    pub id: Uuid,
    pub operator_id: Uuid,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl From<&HolidayRow> for Holiday {
    fn from(row: &HolidayRow) -> Self {
        Self {
            name: row.name.clone(),
            start_date: row.start_date,
            end_date: row.end_date,
        }
    }
}

#[derive(Debug, Clone, Insertable, AsChangeset, Deserialize)]
#[diesel(table_name = holidays)]
#[serde(rename_all = "camelCase")]
pub struct HolidayData {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = trainer_profile_details)]
#[diesel(primary_key(profile_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct TrainerProfileDetails {
    pub profile_id: Uuid,
    pub birth_date: Option<NaiveDate>,
    pub address: Option<String>,
    pub bio: Option<String>,
    pub photo_path: Option<String>,
    pub police_clearance_path: Option<String>,
    pub police_clearance_issued_on: Option<NaiveDate>,
    pub conduct_code_path: Option<String>,
    pub conduct_code_issued_on: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

/// The part of the trainer details that is edited as a form. Photo and
/// documents are set by their uploads.
#[derive(Debug, Clone, Insertable, AsChangeset, Deserialize)]
#[diesel(table_name = trainer_profile_details)]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct TrainerDetailsData {
    pub birth_date: Option<NaiveDate>,
    pub address: Option<String>,
    pub bio: Option<String>,
}

/// A coaching license.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = trainer_lizenzen)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct TrainerLizenz {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub name: String,
    pub issuer: Option<String>,
    pub license_number: Option<String>,
    pub valid_until: Option<NaiveDate>,
}

#[derive(Debug, Clone, Insertable, AsChangeset, Deserialize)]
#[diesel(table_name = trainer_lizenzen)]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct TrainerLizenzData {
    pub name: String,
    pub issuer: Option<String>,
    pub license_number: Option<String>,
    pub valid_until: Option<NaiveDate>,
}

/// A sporting achievement shown on the trainer profile.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = trainer_erfolge)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct TrainerErfolg {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub title: String,
    pub year: Option<i32>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Insertable, AsChangeset, Deserialize)]
#[diesel(table_name = trainer_erfolge)]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct TrainerErfolgData {
    pub title: String,
    pub year: Option<i32>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = sent_emails)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct SentEmail {
    pub id: Uuid,
    pub operator_id: Uuid,
    pub sent_by: Option<Uuid>,
    pub recipient: String,
    pub subject: String,
    pub kind: String,
    pub status: String,
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = sent_emails)]
pub struct NewSentEmail {
    pub operator_id: Uuid,
    pub sent_by: Option<Uuid>,
    pub recipient: String,
    pub subject: String,
    pub kind: String,
    pub status: String,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use chrono::Weekday;
    use facility_booking_domain::{BookingMode, BookingStatus};

    use super::*;

    fn time(hour: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, 0, 0).unwrap()
    }

    fn resource_row(booking_mode: &str) -> ResourceRow {
        ResourceRow {
            id: Uuid::nil(),
            operator_id: Uuid::nil(),
            facility_id: Uuid::nil(),
            resource_group_id: None,
            parent_id: None,
            name: "Platz 1".to_owned(),
            is_composite: true,
            booking_mode: booking_mode.to_owned(),
        }
    }

    #[test]
    fn resource_rows_convert_the_booking_mode() {
        let resource = Resource::try_from(&resource_row("slotOnly")).unwrap();
        assert_eq!(resource.booking_mode, BookingMode::SlotOnly);
        assert!(resource.is_composite);
        assert_eq!(
            Resource::try_from(&resource_row("sometimes")),
            Err(DomainError::UnknownBookingMode("sometimes".to_owned()))
        );
    }

    #[test]
    fn slot_rows_validate_weekday_and_times() {
        let mut row = SlotRow {
            id: Uuid::nil(),
            operator_id: Uuid::nil(),
            resource_id: Uuid::nil(),
            day_of_week: 2,
            start_time: time(17),
            end_time: time(19),
            valid_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            valid_until: None,
        };
        assert_eq!(Slot::try_from(&row).unwrap().day_of_week, Weekday::Tue);

        row.day_of_week = 8;
        assert_eq!(Slot::try_from(&row), Err(DomainError::InvalidWeekday(8)));

        row.day_of_week = 2;
        row.end_time = time(16);
        assert!(matches!(
            Slot::try_from(&row),
            Err(DomainError::InvalidTimeRange { .. })
        ));
    }

    #[test]
    fn booking_rows_convert_the_status() {
        let row = BookingRow {
            id: Uuid::nil(),
            operator_id: Uuid::nil(),
            resource_id: Uuid::nil(),
            booked_by: Uuid::nil(),
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            start_time: time(17),
            end_time: time(19),
            status: "approved".to_owned(),
            series_id: None,
            title: "Training".to_owned(),
            description: None,
            created_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        };
        let booking = Booking::try_from(&row).unwrap();
        assert_eq!(booking.status, BookingStatus::Approved);
        assert_eq!(booking.range.to_string(), "17:00-19:00");
    }
}
