//! The administration areas of an operator. They all work the same way:
//! everybody of the operator may list them, admins create, update and
//! delete. References to rows of other operators are refused by the
//! composite foreign keys of the database.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use facility_booking_database::models::{
    Club, ClubData, Department, DepartmentData, Facility, FacilityData, GenehmigerResource,
    GenehmigerResourceData, HolidayData, HolidayRow, ResourceData, ResourceGroup,
    ResourceGroupData, ResourceRow, SlotData, SlotRow, Team, TeamData, TrainerAssignment,
    TrainerAssignmentData,
};
use facility_booking_database::schema::{
    clubs, departments, facilities, genehmiger_resources, holidays, resource_groups, resources,
    slots, teams, trainer_assignments,
};
use facility_booking_database::Pool;
use facility_booking_domain::slot::weekday_from_iso;
use facility_booking_domain::{BookingMode, TimeRange};
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::routes::Payload;
use crate::AppState;

/// Checks on submitted rows that the database schema does not express.
pub trait Validate {
    fn validate(&self) -> Result<(), AppError> {
        Ok(())
    }
}

impl Validate for FacilityData {}
impl Validate for ResourceGroupData {}
impl Validate for ClubData {}
impl Validate for DepartmentData {}
impl Validate for TeamData {}
impl Validate for TrainerAssignmentData {}
impl Validate for GenehmigerResourceData {}

impl Validate for ResourceData {
    fn validate(&self) -> Result<(), AppError> {
        self.booking_mode.parse::<BookingMode>()?;
        if self.parent_id.is_some() && self.is_composite {
            return Err(AppError::BadRequest(
                "a part of a composite resource cannot be composite itself".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Validate for SlotData {
    fn validate(&self) -> Result<(), AppError> {
        weekday_from_iso(self.day_of_week)?;
        TimeRange::new(self.start_time, self.end_time)?;
        if self.valid_until.is_some_and(|until| until < self.valid_from) {
            return Err(AppError::BadRequest(
                "a slot cannot end before it becomes valid".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Validate for HolidayData {
    fn validate(&self) -> Result<(), AppError> {
        if self.end_date < self.start_date {
            return Err(AppError::BadRequest(
                "a holiday cannot end before it starts".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Generates list, create, update and delete handlers plus a router for a
/// table with `id` and `operator_id` columns.
macro_rules! operator_area {
    ($area:ident, $path:literal, $table:ident, $row:ty, $data:ty) => {
        paste::paste! {
            pub async fn [<list_ $area>](
                State(pool): State<Pool>,
                user: CurrentUser,
            ) -> Result<Json<Vec<$row>>, AppError> {
                let mut connection = pool.get().await?;
                let rows = $table::table
                    .filter($table::operator_id.eq(user.operator_id()))
                    .select(<$row>::as_select())
                    .load(&mut connection)
                    .await?;
                Ok(Json(rows))
            }

            pub async fn [<create_ $area>](
                State(pool): State<Pool>,
                user: CurrentUser,
                Payload(data): Payload<$data>,
            ) -> Result<(StatusCode, Json<$row>), AppError> {
                user.require_admin()?;
                data.validate()?;
                let mut connection = pool.get().await?;
                let row: $row = diesel::insert_into($table::table)
                    .values(($table::operator_id.eq(user.operator_id()), &data))
                    .returning(<$row>::as_returning())
                    .get_result(&mut connection)
                    .await?;
                info!("{} created {} {}", user.id(), stringify!($area), row.id);
                Ok((StatusCode::CREATED, Json(row)))
            }

            pub async fn [<update_ $area>](
                State(pool): State<Pool>,
                user: CurrentUser,
                Path(id): Path<Uuid>,
                Payload(data): Payload<$data>,
            ) -> Result<Json<$row>, AppError> {
                user.require_admin()?;
                data.validate()?;
                let mut connection = pool.get().await?;
                let row: $row = diesel::update(
                    $table::table
                        .filter($table::id.eq(id))
                        .filter($table::operator_id.eq(user.operator_id())),
                )
                .set(&data)
                .returning(<$row>::as_returning())
                .get_result(&mut connection)
                .await?;
                Ok(Json(row))
            }

            pub async fn [<delete_ $area>](
                State(pool): State<Pool>,
                user: CurrentUser,
                Path(id): Path<Uuid>,
            ) -> Result<StatusCode, AppError> {
                user.require_admin()?;
                let mut connection = pool.get().await?;
                let deleted = diesel::delete(
                    $table::table
                        .filter($table::id.eq(id))
                        .filter($table::operator_id.eq(user.operator_id())),
                )
                .execute(&mut connection)
                .await?;
                if deleted == 0 {
                    return Err(AppError::NotFound);
                }
                info!("{} deleted {} {}", user.id(), stringify!($area), id);
                Ok(StatusCode::NO_CONTENT)
            }

            fn [<$area _router>]() -> Router<AppState> {
                Router::new()
                    .route($path, get([<list_ $area>]).post([<create_ $area>]))
                    .route(
                        concat!($path, "/:id"),
                        put([<update_ $area>]).delete([<delete_ $area>]),
                    )
            }
        }
    };
}

operator_area!(facilities, "/api/facilities", facilities, Facility, FacilityData);
operator_area!(resource_groups, "/api/resource-groups", resource_groups, ResourceGroup, ResourceGroupData);
operator_area!(resources, "/api/resources", resources, ResourceRow, ResourceData);
operator_area!(slots, "/api/slots", slots, SlotRow, SlotData);
operator_area!(holidays, "/api/holidays", holidays, HolidayRow, HolidayData);
operator_area!(clubs, "/api/clubs", clubs, Club, ClubData);
operator_area!(departments, "/api/departments", departments, Department, DepartmentData);
operator_area!(teams, "/api/teams", teams, Team, TeamData);
operator_area!(
    trainer_assignments,
    "/api/trainer-assignments",
    trainer_assignments,
    TrainerAssignment,
    TrainerAssignmentData
);
operator_area!(
    approvers,
    "/api/approvers",
    genehmiger_resources,
    GenehmigerResource,
    GenehmigerResourceData
);

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(facilities_router())
        .merge(resource_groups_router())
        .merge(resources_router())
        .merge(slots_router())
        .merge(holidays_router())
        .merge(clubs_router())
        .merge(departments_router())
        .merge(teams_router())
        .merge(trainer_assignments_router())
        .merge(approvers_router())
}
