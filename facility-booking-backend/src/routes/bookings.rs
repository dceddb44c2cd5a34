//! Booking requests, series and their approval.
//!
//! Every write that can create an overlap runs in a transaction holding an
//! advisory lock of the operator, so two requests for the same time cannot
//! both pass the availability check.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use chrono::{NaiveDate, NaiveTime};
use diesel::prelude::*;
use diesel::sql_types::BigInt;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, AsyncPgConnection, RunQueryDsl};
use facility_booking_database::models::{BookingRow, HolidayRow, NewBooking, ResourceRow, SlotRow};
use facility_booking_database::schema::{bookings, holidays, resources, slots};
use facility_booking_database::Pool;
use facility_booking_domain::series::SkippedDate;
use facility_booking_domain::{
    check_booking, day_schedule, plan_series, Booking, BookingRequest, BookingStatus, DaySchedule,
    Holiday, Resource, ResourceIndex, SeriesPattern, SeriesRequest, Slot, TimeRange,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::routes::Payload;
use crate::AppState;

const BLOCKING_STATUSES: [&str; 2] = ["pending", "approved"];

/// Everything the availability rules need to judge bookings of one resource
/// between two dates.
pub struct Availability {
    pub index: ResourceIndex,
    pub existing: Vec<Booking>,
    pub slots: Vec<Slot>,
    pub holidays: Vec<Holiday>,
}

/// Advisory lock key of an operator.
#[must_use]
pub fn lock_key(operator_id: Uuid) -> i64 {
    let (high, _) = operator_id.as_u64_pair();
    i64::from_ne_bytes(high.to_ne_bytes())
}

/// Serializes booking writes of an operator until the transaction ends.
async fn lock_operator(connection: &mut AsyncPgConnection, operator_id: Uuid) -> Result<(), AppError> {
    diesel::sql_query("SELECT pg_advisory_xact_lock($1)")
        .bind::<BigInt, _>(lock_key(operator_id))
        .execute(connection)
        .await?;
    Ok(())
}

pub async fn load_resource_index(
    connection: &mut AsyncPgConnection,
    operator_id: Uuid,
) -> Result<ResourceIndex, AppError> {
    let rows: Vec<ResourceRow> = resources::table
        .filter(resources::operator_id.eq(operator_id))
        .select(ResourceRow::as_select())
        .load(connection)
        .await?;
    let resources = rows
        .iter()
        .map(Resource::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ResourceIndex::new(resources))
}

pub async fn load_holidays(
    connection: &mut AsyncPgConnection,
    operator_id: Uuid,
) -> Result<Vec<Holiday>, AppError> {
    let rows: Vec<HolidayRow> = holidays::table
        .filter(holidays::operator_id.eq(operator_id))
        .select(HolidayRow::as_select())
        .load(connection)
        .await?;
    Ok(rows.iter().map(Holiday::from).collect())
}

/// Bookings of `resource_ids` in `[from, until]` with the given statuses.
pub async fn load_bookings(
    connection: &mut AsyncPgConnection,
    operator_id: Uuid,
    resource_ids: &[Uuid],
    (from, until): (NaiveDate, NaiveDate),
    statuses: &[&str],
) -> Result<Vec<Booking>, AppError> {
    let rows: Vec<BookingRow> = bookings::table
        .filter(bookings::operator_id.eq(operator_id))
        .filter(bookings::resource_id.eq_any(resource_ids))
        .filter(bookings::date.between(from, until))
        .filter(bookings::status.eq_any(statuses.iter().copied()))
        .select(BookingRow::as_select())
        .load(connection)
        .await?;
    Ok(rows
        .iter()
        .map(Booking::try_from)
        .collect::<Result<Vec<_>, _>>()?)
}

pub async fn load_availability(
    connection: &mut AsyncPgConnection,
    operator_id: Uuid,
    resource_id: Uuid,
    dates: (NaiveDate, NaiveDate),
) -> Result<Availability, AppError> {
    let index = load_resource_index(connection, operator_id).await?;
    let blocking = index.blocking_resources(resource_id);
    let existing = load_bookings(connection, operator_id, &blocking, dates, &BLOCKING_STATUSES).await?;
    let slot_rows: Vec<SlotRow> = slots::table
        .filter(slots::operator_id.eq(operator_id))
        .filter(slots::resource_id.eq(resource_id))
        .select(SlotRow::as_select())
        .load(connection)
        .await?;
    let slots = slot_rows
        .iter()
        .map(Slot::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    let holidays = load_holidays(connection, operator_id).await?;
    Ok(Availability {
        index,
        existing,
        slots,
        holidays,
    })
}

impl Availability {
    pub fn check(&self, request: &BookingRequest) -> Result<(), AppError> {
        check_booking(
            request,
            &self.index,
            &self.existing,
            &self.slots,
            &self.holidays,
        )?;
        Ok(())
    }
}

async fn find_booking(
    connection: &mut AsyncPgConnection,
    user: &CurrentUser,
    id: Uuid,
) -> Result<BookingRow, AppError> {
    Ok(bookings::table
        .filter(bookings::id.eq(id))
        .filter(bookings::operator_id.eq(user.operator_id()))
        .select(BookingRow::as_select())
        .first(connection)
        .await?)
}

/// The status a new booking of `user` gets.
async fn initial_status(
    connection: &mut AsyncPgConnection,
    user: &CurrentUser,
    resource_id: Uuid,
) -> Result<BookingStatus, AppError> {
    if user.can_approve(connection, resource_id).await? {
        Ok(BookingStatus::Approved)
    } else {
        Ok(BookingStatus::Pending)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingFilter {
    pub resource_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    pub status: Option<BookingStatus>,
    pub series_id: Option<Uuid>,
}

pub async fn list_bookings(
    State(pool): State<Pool>,
    user: CurrentUser,
    Query(filter): Query<BookingFilter>,
) -> Result<Json<Vec<BookingRow>>, AppError> {
    let mut connection = pool.get().await?;
    let mut query = bookings::table
        .filter(bookings::operator_id.eq(user.operator_id()))
        .select(BookingRow::as_select())
        .order((bookings::date, bookings::start_time))
        .into_boxed();
    if let Some(resource_id) = filter.resource_id {
        query = query.filter(bookings::resource_id.eq(resource_id));
    }
    if let Some(from) = filter.from {
        query = query.filter(bookings::date.ge(from));
    }
    if let Some(until) = filter.until {
        query = query.filter(bookings::date.le(until));
    }
    if let Some(status) = filter.status {
        query = query.filter(bookings::status.eq(status.as_str()));
    }
    if let Some(series_id) = filter.series_id {
        query = query.filter(bookings::series_id.eq(series_id));
    }
    Ok(Json(query.load(&mut connection).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPayload {
    pub resource_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

pub async fn create_booking(
    State(pool): State<Pool>,
    user: CurrentUser,
    Payload(payload): Payload<BookingPayload>,
) -> Result<(StatusCode, Json<BookingRow>), AppError> {
    if !user.can_book() {
        return Err(AppError::Forbidden);
    }
    let range = TimeRange::new(payload.start_time, payload.end_time)?;
    let request = BookingRequest {
        resource_id: payload.resource_id,
        date: payload.date,
        range,
        replaces: None,
    };
    let operator_id = user.operator_id();
    let user = &user;

    let mut connection = pool.get().await?;
    let row = connection
        .transaction::<_, AppError, _>(|connection| {
            async move {
                lock_operator(connection, operator_id).await?;
                load_availability(
                    connection,
                    operator_id,
                    request.resource_id,
                    (request.date, request.date),
                )
                .await?
                .check(&request)?;
                let status = initial_status(connection, user, request.resource_id).await?;
                let row = diesel::insert_into(bookings::table)
                    .values(NewBooking {
                        id: Uuid::new_v4(),
                        operator_id,
                        resource_id: request.resource_id,
                        booked_by: user.id(),
                        date: request.date,
                        start_time: range.start(),
                        end_time: range.end(),
                        status: status.as_str().to_owned(),
                        series_id: None,
                        title: payload.title,
                        description: payload.description,
                    })
                    .returning(BookingRow::as_returning())
                    .get_result(connection)
                    .await?;
                Ok(row)
            }
            .scope_boxed()
        })
        .await?;
    info!(
        "{} booked {} on {} {range} ({})",
        user.id(),
        row.resource_id,
        row.date,
        row.status
    );
    Ok((StatusCode::CREATED, Json(row)))
}

/// Only users allowed to book may change their own bookings, admins may
/// change any.
fn authorize_edit(user: &CurrentUser, booking: &BookingRow) -> Result<(), AppError> {
    if user.can_book() && (booking.booked_by == user.id() || user.is_admin()) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Moves or renames a booking. Users who cannot approve the resource send
/// a moved booking back to `pending`.
pub async fn update_booking(
    State(pool): State<Pool>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Payload(payload): Payload<BookingPayload>,
) -> Result<Json<BookingRow>, AppError> {
    if !user.can_book() {
        return Err(AppError::Forbidden);
    }
    let range = TimeRange::new(payload.start_time, payload.end_time)?;
    let operator_id = user.operator_id();
    let user = &user;

    let mut connection = pool.get().await?;
    let row = connection
        .transaction::<_, AppError, _>(|connection| {
            async move {
                lock_operator(connection, operator_id).await?;
                let existing = find_booking(connection, user, id).await?;
                authorize_edit(user, &existing)?;
                let status: BookingStatus = existing.status.parse()?;
                if !status.blocks_resource() {
                    return Err(AppError::BadRequest(format!(
                        "a {status} booking cannot be changed"
                    )));
                }
                let request = BookingRequest {
                    resource_id: payload.resource_id,
                    date: payload.date,
                    range,
                    replaces: Some(id),
                };
                load_availability(connection, operator_id, request.resource_id, (request.date, request.date))
                    .await?
                    .check(&request)?;
                let moved = existing.resource_id != request.resource_id
                    || existing.date != request.date
                    || existing.start_time != range.start()
                    || existing.end_time != range.end();
                let status = if moved && !user.can_approve(connection, request.resource_id).await? {
                    BookingStatus::Pending
                } else {
                    status
                };
                let row = diesel::update(bookings::table.find(id))
                    .set((
                        bookings::resource_id.eq(request.resource_id),
                        bookings::date.eq(request.date),
                        bookings::start_time.eq(range.start()),
                        bookings::end_time.eq(range.end()),
                        bookings::status.eq(status.as_str()),
                        bookings::title.eq(payload.title),
                        bookings::description.eq(payload.description),
                    ))
                    .returning(BookingRow::as_returning())
                    .get_result(connection)
                    .await?;
                Ok(row)
            }
            .scope_boxed()
        })
        .await?;
    Ok(Json(row))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPayload {
    pub resource_id: Uuid,
    pub first_date: NaiveDate,
    pub until: NaiveDate,
    #[serde(default = "one_week")]
    pub interval_weeks: u32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

const fn one_week() -> u32 {
    1
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSeries {
    pub series_id: Uuid,
    pub bookings: Vec<BookingRow>,
    pub skipped: Vec<SkippedDate>,
}

/// Books every date of a weekly series or none of them.
pub async fn create_series(
    State(pool): State<Pool>,
    user: CurrentUser,
    Payload(payload): Payload<SeriesPayload>,
) -> Result<(StatusCode, Json<CreatedSeries>), AppError> {
    if !user.can_book() {
        return Err(AppError::Forbidden);
    }
    let request = SeriesRequest {
        series_id: Uuid::new_v4(),
        resource_id: payload.resource_id,
        range: TimeRange::new(payload.start_time, payload.end_time)?,
        pattern: SeriesPattern::new(payload.first_date, payload.until, payload.interval_weeks)?,
    };
    let operator_id = user.operator_id();
    let user = &user;

    let mut connection = pool.get().await?;
    let created = connection
        .transaction::<_, AppError, _>(|connection| {
            async move {
                lock_operator(connection, operator_id).await?;
                let availability = load_availability(
                    connection,
                    operator_id,
                    request.resource_id,
                    (payload.first_date, payload.until),
                )
                .await?;
                let plan = plan_series(
                    &request,
                    &availability.index,
                    &availability.existing,
                    &availability.slots,
                    &availability.holidays,
                )?;
                let status = initial_status(connection, user, request.resource_id).await?;
                let rows: Vec<NewBooking> = plan
                    .dates
                    .iter()
                    .map(|date| NewBooking {
                        id: Uuid::new_v4(),
                        operator_id,
                        resource_id: request.resource_id,
                        booked_by: user.id(),
                        date: *date,
                        start_time: request.range.start(),
                        end_time: request.range.end(),
                        status: status.as_str().to_owned(),
                        series_id: Some(plan.series_id),
                        title: payload.title.clone(),
                        description: payload.description.clone(),
                    })
                    .collect();
                let bookings = diesel::insert_into(bookings::table)
                    .values(&rows)
                    .returning(BookingRow::as_returning())
                    .get_results(connection)
                    .await?;
                Ok(CreatedSeries {
                    series_id: plan.series_id,
                    bookings,
                    skipped: plan.skipped,
                })
            }
            .scope_boxed()
        })
        .await?;
    info!(
        "{} booked series {} with {} dates, {} skipped",
        user.id(),
        created.series_id,
        created.bookings.len(),
        created.skipped.len()
    );
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Deserialize)]
pub struct StatusPayload {
    pub status: BookingStatus,
}

/// Approving, rejecting and reopening needs approval rights for the
/// resource, cancelling is up to the owner or an admin.
async fn authorize_status_change(
    connection: &mut AsyncPgConnection,
    user: &CurrentUser,
    resource_id: Uuid,
    rows: &[&BookingRow],
    status: BookingStatus,
) -> Result<(), AppError> {
    let allowed = match status {
        BookingStatus::Cancelled => {
            user.is_admin() || rows.iter().all(|row| row.booked_by == user.id())
        }
        BookingStatus::Approved | BookingStatus::Rejected | BookingStatus::Pending => {
            user.can_approve(connection, resource_id).await?
        }
    };
    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Rows that block their resource again once they get `status`.
fn reactivated(rows: &[BookingRow], status: BookingStatus) -> Vec<&BookingRow> {
    if !status.blocks_resource() {
        return Vec::new();
    }
    rows.iter()
        .filter(|row| {
            row.status
                .parse::<BookingStatus>()
                .is_ok_and(|current| !current.blocks_resource())
        })
        .collect()
}

/// Groups rows by resource. Members of a series can be moved one by one, so
/// a series may span several resources.
fn by_resource<'a, I>(rows: I) -> BTreeMap<Uuid, Vec<&'a BookingRow>>
where
    I: IntoIterator<Item = &'a BookingRow>,
{
    let mut groups: BTreeMap<Uuid, Vec<&BookingRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.resource_id).or_default().push(row);
    }
    groups
}

/// First and last date of `rows`.
fn date_span(rows: &[&BookingRow]) -> Option<(NaiveDate, NaiveDate)> {
    let from = rows.iter().map(|row| row.date).min()?;
    let until = rows.iter().map(|row| row.date).max()?;
    Some((from, until))
}

/// Applies `status` to `rows`. The user needs the right for every resource
/// involved, and a booking that blocks its resource again has to pass the
/// availability check of that resource like a new one.
///
/// The check runs after the update, so reactivated bookings are also checked
/// against each other. Callers hold a transaction that a failed check rolls
/// back.
async fn apply_status(
    connection: &mut AsyncPgConnection,
    user: &CurrentUser,
    rows: &[BookingRow],
    status: BookingStatus,
) -> Result<Vec<BookingRow>, AppError> {
    if rows.is_empty() {
        return Err(AppError::NotFound);
    }
    for (resource_id, group) in by_resource(rows) {
        authorize_status_change(connection, user, resource_id, &group, status).await?;
    }

    let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let updated = diesel::update(bookings::table.filter(bookings::id.eq_any(&ids)))
        .set(bookings::status.eq(status.as_str()))
        .returning(BookingRow::as_returning())
        .get_results(connection)
        .await?;

    for (resource_id, group) in by_resource(reactivated(rows, status)) {
        let Some(dates) = date_span(&group) else {
            continue;
        };
        let availability = load_availability(connection, user.operator_id(), resource_id, dates).await?;
        for row in group {
            availability.check(&BookingRequest {
                resource_id: row.resource_id,
                date: row.date,
                range: TimeRange::new(row.start_time, row.end_time)?,
                replaces: Some(row.id),
            })?;
        }
    }
    Ok(updated)
}

pub async fn change_status(
    State(pool): State<Pool>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Payload(payload): Payload<StatusPayload>,
) -> Result<Json<BookingRow>, AppError> {
    let operator_id = user.operator_id();
    let user = &user;
    let mut connection = pool.get().await?;
    let mut rows = connection
        .transaction::<_, AppError, _>(|connection| {
            async move {
                lock_operator(connection, operator_id).await?;
                let booking = find_booking(connection, user, id).await?;
                apply_status(connection, user, &[booking], payload.status).await
            }
            .scope_boxed()
        })
        .await?;
    let row = rows.pop().ok_or(AppError::NotFound)?;
    info!("{} set booking {} to {}", user.id(), row.id, row.status);
    Ok(Json(row))
}

pub async fn change_series_status(
    State(pool): State<Pool>,
    user: CurrentUser,
    Path(series_id): Path<Uuid>,
    Payload(StatusPayload { status }): Payload<StatusPayload>,
) -> Result<Json<Vec<BookingRow>>, AppError> {
    let operator_id = user.operator_id();
    let user = &user;
    let mut connection = pool.get().await?;
    let rows = connection
        .transaction::<_, AppError, _>(|connection| {
            async move {
                lock_operator(connection, operator_id).await?;
                let series: Vec<BookingRow> = bookings::table
                    .filter(bookings::operator_id.eq(operator_id))
                    .filter(bookings::series_id.eq(series_id))
                    .select(BookingRow::as_select())
                    .load(connection)
                    .await?;
                apply_status(connection, user, &series, status).await
            }
            .scope_boxed()
        })
        .await?;
    info!(
        "{} set {} bookings of series {series_id} to {status}",
        user.id(),
        rows.len(),
    );
    Ok(Json(rows))
}

pub async fn delete_booking(
    State(pool): State<Pool>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let mut connection = pool.get().await?;
    let booking = find_booking(&mut connection, &user, id).await?;
    if booking.booked_by != user.id() && !user.is_admin() {
        return Err(AppError::Forbidden);
    }
    diesel::delete(bookings::table.find(id))
        .execute(&mut connection)
        .await?;
    debug!("{} deleted booking {id}", user.id());
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ScheduleQuery {
    pub date: NaiveDate,
}

pub async fn schedule(
    State(pool): State<Pool>,
    user: CurrentUser,
    Path(resource_id): Path<Uuid>,
    Query(ScheduleQuery { date }): Query<ScheduleQuery>,
) -> Result<Json<DaySchedule>, AppError> {
    let mut connection = pool.get().await?;
    let availability =
        load_availability(&mut connection, user.operator_id(), resource_id, (date, date)).await?;
    Ok(Json(day_schedule(
        resource_id,
        date,
        &availability.index,
        &availability.existing,
        &availability.slots,
        &availability.holidays,
    )?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/bookings", get(list_bookings).post(create_booking))
        .route("/api/bookings/:id", put(update_booking).delete(delete_booking))
        .route("/api/bookings/:id/status", patch(change_status))
        .route("/api/series", post(create_series))
        .route("/api/series/:series_id/status", patch(change_series_status))
        .route("/api/resources/:id/schedule", get(schedule))
}
