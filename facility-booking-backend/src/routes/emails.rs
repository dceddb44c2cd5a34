use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use facility_booking_database::models::{NewSentEmail, SentEmail};
use facility_booking_database::schema::sent_emails;
use facility_booking_database::Pool;
use serde::Deserialize;
use tracing::warn;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::mailer::{MailError, Mailer, OutgoingEmail};
use crate::routes::Payload;
use crate::AppState;

/// Sends `email` and records the outcome in `sent_emails`. The log entry is
/// written even when sending fails.
pub async fn send_and_log(
    connection: &mut AsyncPgConnection,
    mailer: &Mailer,
    user: &CurrentUser,
    kind: &str,
    email: &OutgoingEmail,
) -> Result<(SentEmail, Result<(), MailError>), AppError> {
    let result = mailer.send(email).await;
    if let Err(error) = &result {
        warn!("sending {kind} email to {} failed: {error}", email.to);
    }
    let entry = diesel::insert_into(sent_emails::table)
        .values(NewSentEmail {
            operator_id: user.operator_id(),
            sent_by: Some(user.id()),
            recipient: email.to.clone(),
            subject: email.subject.clone(),
            kind: kind.to_owned(),
            status: if result.is_ok() { "sent" } else { "failed" }.to_owned(),
            error: result.as_ref().err().map(ToString::to_string),
        })
        .returning(SentEmail::as_returning())
        .get_result(connection)
        .await?;
    Ok((entry, result))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailPayload {
    pub to: String,
    pub subject: String,
    pub text: String,
    #[serde(default)]
    pub html: Option<String>,
}

pub async fn send_email(
    State(pool): State<Pool>,
    State(mailer): State<Arc<Mailer>>,
    user: CurrentUser,
    Payload(payload): Payload<EmailPayload>,
) -> Result<(StatusCode, Json<SentEmail>), AppError> {
    user.require_admin()?;
    if !payload.to.contains('@') {
        return Err(AppError::BadRequest(format!(
            "{:?} is not an email address",
            payload.to
        )));
    }
    let email = OutgoingEmail {
        to: payload.to,
        subject: payload.subject,
        text: payload.text,
        html: payload.html,
    };
    let mut connection = pool.get().await?;
    let (entry, result) = send_and_log(&mut connection, &mailer, &user, "transactional", &email).await?;
    result?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn list_emails(
    State(pool): State<Pool>,
    user: CurrentUser,
) -> Result<Json<Vec<SentEmail>>, AppError> {
    user.require_admin()?;
    let mut connection = pool.get().await?;
    Ok(Json(
        sent_emails::table
            .filter(sent_emails::operator_id.eq(user.operator_id()))
            .order(sent_emails::sent_at.desc())
            .select(SentEmail::as_select())
            .load(&mut connection)
            .await?,
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/emails", get(list_emails).post(send_email))
}
