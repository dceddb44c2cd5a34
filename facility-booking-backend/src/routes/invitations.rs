use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use facility_booking_config::Config;
use facility_booking_database::models::{NewProfile, Operator, Profile, SentEmail};
use facility_booking_database::schema::{operators, profiles};
use facility_booking_database::Pool;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{CurrentUser, Role};
use crate::error::AppError;
use crate::mailer::{invitation_email, Mailer};
use crate::routes::emails::send_and_log;
use crate::routes::Payload;
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationPayload {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub profile: Profile,
    pub email: SentEmail,
}

/// Invites a trainer. An existing profile with the address is marked as
/// trainer and gets a fresh invitation timestamp instead of a duplicate.
pub async fn invite(
    State(pool): State<Pool>,
    State(mailer): State<Arc<Mailer>>,
    State(config): State<Arc<Config>>,
    user: CurrentUser,
    Payload(payload): Payload<InvitationPayload>,
) -> Result<(StatusCode, Json<Invitation>), AppError> {
    user.require_admin()?;
    let email = payload.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AppError::BadRequest(format!("{email:?} is not an email address")));
    }

    let mut connection = pool.get().await?;
    let operator: Operator = operators::table
        .find(user.operator_id())
        .select(Operator::as_select())
        .first(&mut connection)
        .await?;
    let now = Utc::now();
    let existing: Option<Profile> = profiles::table
        .filter(profiles::operator_id.eq(operator.id))
        .filter(profiles::email.eq(&email))
        .select(Profile::as_select())
        .first(&mut connection)
        .await
        .optional()?;
    let profile = match existing {
        Some(profile) => {
            diesel::update(profiles::table.find(profile.id))
                .set((
                    profiles::ist_trainer.eq(true),
                    profiles::invited_at.eq(Some(now)),
                ))
                .returning(Profile::as_returning())
                .get_result(&mut connection)
                .await?
        }
        None => {
            diesel::insert_into(profiles::table)
                .values(NewProfile {
                    operator_id: operator.id,
                    email: email.clone(),
                    first_name: payload.first_name.clone(),
                    last_name: payload.last_name,
                    role: Role::Trainer.as_str().to_owned(),
                    ist_trainer: true,
                    invited_at: Some(now),
                })
                .returning(Profile::as_returning())
                .get_result(&mut connection)
                .await?
        }
    };

    let message = invitation_email(
        &email,
        &payload.first_name,
        &operator.name,
        &format!("{}/auth/login", config.url.trim_end_matches('/')),
    );
    let (entry, result) = send_and_log(&mut connection, &mailer, &user, "invitation", &message).await?;
    info!(
        "{} invited {} ({}), email {}",
        user.id(),
        profile.id,
        email,
        entry.status
    );
    // the invitation exists even if the email could not be delivered
    let status = if result.is_ok() {
        StatusCode::CREATED
    } else {
        StatusCode::ACCEPTED
    };
    Ok((
        status,
        Json(Invitation {
            profile,
            email: entry,
        }),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/invitations", post(invite))
}
