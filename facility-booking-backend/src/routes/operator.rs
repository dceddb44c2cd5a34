use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use facility_booking_database::models::{Operator, OperatorData};
use facility_booking_database::schema::operators;
use facility_booking_database::Pool;
use tracing::info;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::routes::Payload;
use crate::AppState;

pub async fn get_operator(
    State(pool): State<Pool>,
    user: CurrentUser,
) -> Result<Json<Operator>, AppError> {
    let mut connection = pool.get().await?;
    let operator = operators::table
        .find(user.operator_id())
        .select(Operator::as_select())
        .first(&mut connection)
        .await?;
    Ok(Json(operator))
}

pub async fn update_operator(
    State(pool): State<Pool>,
    user: CurrentUser,
    Payload(data): Payload<OperatorData>,
) -> Result<Json<Operator>, AppError> {
    user.require_admin()?;
    if data.name.trim().is_empty() {
        return Err(AppError::BadRequest("the name must not be empty".to_owned()));
    }
    let mut connection = pool.get().await?;
    let operator = diesel::update(operators::table.find(user.operator_id()))
        .set(&data)
        .returning(Operator::as_returning())
        .get_result(&mut connection)
        .await?;
    info!("{} renamed operator {} to {}", user.id(), operator.id, operator.name);
    Ok(Json(operator))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/operator", get(get_operator).patch(update_operator))
}
