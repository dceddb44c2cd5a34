use axum::extract::{Path, State};
use axum::routing::{get, patch};
use axum::{Json, Router};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use facility_booking_database::models::{OwnProfileData, Profile, ProfileAdminData};
use facility_booking_database::schema::profiles;
use facility_booking_database::Pool;
use facility_booking_domain::{trainer_status, TrainerStatus};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{CurrentUser, Role};
use crate::error::AppError;
use crate::routes::Payload;
use crate::session::Session;
use crate::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub csrf_token: String,
    pub profile_id: Option<Uuid>,
}

/// Hands out the csrf token. Also sets the session cookie on the first
/// visit.
pub async fn session_info(session: Session) -> (Session, Json<SessionInfo>) {
    let info = SessionInfo {
        csrf_token: session.csrf_token().to_owned(),
        profile_id: session.profile_id(),
    };
    (session, Json(info))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: Profile,
    pub trainer_status: Option<TrainerStatus>,
}

impl From<Profile> for ProfileView {
    fn from(profile: Profile) -> Self {
        Self {
            trainer_status: trainer_status(&profile.trainer_flags()),
            profile,
        }
    }
}

pub async fn me(user: CurrentUser) -> Json<ProfileView> {
    Json(user.profile.into())
}

pub async fn update_me(
    State(pool): State<Pool>,
    user: CurrentUser,
    Payload(data): Payload<OwnProfileData>,
) -> Result<Json<ProfileView>, AppError> {
    let mut connection = pool.get().await?;
    let profile = diesel::update(profiles::table.find(user.id()))
        .set(&data)
        .returning(Profile::as_returning())
        .get_result(&mut connection)
        .await?;
    Ok(Json(profile.into()))
}

pub async fn list_profiles(
    State(pool): State<Pool>,
    user: CurrentUser,
) -> Result<Json<Vec<ProfileView>>, AppError> {
    user.require_admin()?;
    let mut connection = pool.get().await?;
    let rows = profiles::table
        .filter(profiles::operator_id.eq(user.operator_id()))
        .order((profiles::last_name, profiles::first_name))
        .select(Profile::as_select())
        .load(&mut connection)
        .await?;
    Ok(Json(rows.into_iter().map(ProfileView::from).collect()))
}

/// Admins set role and trainer flags in any combination.
pub async fn update_profile(
    State(pool): State<Pool>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Payload(data): Payload<ProfileAdminData>,
) -> Result<Json<ProfileView>, AppError> {
    user.require_admin()?;
    if let Some(role) = &data.role {
        role.parse::<Role>()?;
    }
    if data.role.is_none()
        && data.ist_trainer.is_none()
        && data.kann_buchen.is_none()
        && data.is_passive.is_none()
    {
        return Err(AppError::BadRequest("nothing to change".to_owned()));
    }
    let mut connection = pool.get().await?;
    let profile = diesel::update(
        profiles::table
            .filter(profiles::id.eq(id))
            .filter(profiles::operator_id.eq(user.operator_id())),
    )
    .set(&data)
    .returning(Profile::as_returning())
    .get_result(&mut connection)
    .await?;
    info!("{} updated role and flags of {}", user.id(), profile.id);
    Ok(Json(profile.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/session", get(session_info))
        .route("/api/profiles/me", get(me).patch(update_me))
        .route("/api/profiles", get(list_profiles))
        .route("/api/profiles/:id", patch(update_profile))
}
