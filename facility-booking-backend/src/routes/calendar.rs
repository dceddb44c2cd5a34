use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::{Days, Local, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use facility_booking_config::Config;
use facility_booking_database::models::ResourceRow;
use facility_booking_database::schema::resources;
use facility_booking_database::Pool;
use facility_booking_domain::ical::{render_calendar, CalendarSettings};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::routes::bookings::{load_bookings, load_resource_index};
use crate::AppState;

/// `{resource id}.ics`
fn resource_id_of(file: &str) -> Option<Uuid> {
    file.strip_suffix(".ics")?.parse().ok()
}

fn settings(config: &Config) -> CalendarSettings {
    let host = reqwest::Url::parse(&config.url)
        .ok()
        .and_then(|url| url.host_str().map(ToOwned::to_owned))
        .unwrap_or_else(|| "localhost".to_owned());
    CalendarSettings {
        product_id: config.calendar.product_id.clone(),
        host,
        timezone: config.calendar.timezone.clone(),
        window_days: u64::from(config.calendar.window_days),
    }
}

/// Public feed of the approved bookings of a resource and of the resources
/// it shares space with.
pub async fn feed(
    State(pool): State<Pool>,
    State(config): State<Arc<Config>>,
    Path(file): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let resource_id = resource_id_of(&file).ok_or(AppError::NotFound)?;
    let mut connection = pool.get().await?;
    let resource: ResourceRow = resources::table
        .find(resource_id)
        .select(ResourceRow::as_select())
        .first(&mut connection)
        .await?;
    let index = load_resource_index(&mut connection, resource.operator_id).await?;
    let settings = settings(&config);

    let today = Local::now().date_naive();
    let last_day = today
        .checked_add_days(Days::new(settings.window_days))
        .unwrap_or(today);
    let bookings = load_bookings(
        &mut connection,
        resource.operator_id,
        &index.blocking_resources(resource_id),
        (today, last_day),
        &["approved"],
    )
    .await?;
    debug!("calendar of {resource_id} with {} bookings", bookings.len());

    let body = render_calendar(&resource.name, &bookings, today, Utc::now(), &settings);
    Ok(([(CONTENT_TYPE, "text/calendar; charset=utf-8")], body))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/calendar/:file", get(feed))
}
