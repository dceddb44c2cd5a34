use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::Router;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use facility_booking_config::Config;
use facility_booking_database::models::Profile;
use facility_booking_database::schema::profiles;
use facility_booking_database::Pool;
use facility_booking_openidconnect::{
    begin_authentication, finish_authentication, OpenIdRedirect, OpenIdRedirectInner,
    REDIRECT_PATH,
};
use tracing::{info, warn};

use crate::error::AppError;
use crate::session::Session;
use crate::AppState;

pub async fn login(
    State(config): State<Arc<Config>>,
    mut session: Session,
) -> Result<(Session, Redirect), AppError> {
    let openidconnect = config
        .openidconnect
        .as_ref()
        .ok_or(AppError::OpenIdNotConfigured)?;
    let (auth_url, openid_session) = begin_authentication(openidconnect, &config.url).await?;
    session.set_openidconnect(&openid_session)?;
    Ok((session, Redirect::to(&auth_url)))
}

pub async fn redirect(
    State(pool): State<Pool>,
    State(config): State<Arc<Config>>,
    mut session: Session,
    Query(input): Query<OpenIdRedirect<OpenIdRedirectInner>>,
) -> Result<(Session, Redirect), AppError> {
    let openidconnect = config
        .openidconnect
        .as_ref()
        .ok_or(AppError::OpenIdNotConfigured)?;
    let openid_session = session.take_openidconnect()?;

    let success = match input.inner {
        OpenIdRedirectInner::Success(success) => success,
        OpenIdRedirectInner::Error(error) => {
            warn!("identity provider returned {}", error.error);
            return Err(AppError::BadRequest(match error.error_description {
                Some(description) => format!("{}: {description}", error.error),
                None => error.error,
            }));
        }
    };
    let user = finish_authentication(
        openidconnect,
        &config.url,
        openid_session,
        OpenIdRedirect {
            state: input.state,
            inner: success,
        },
    )
    .await?;

    let mut connection = pool.get().await?;
    let profile: Profile = profiles::table
        .filter(profiles::email.eq(&user.email))
        .order(profiles::created_at)
        .select(Profile::as_select())
        .first(&mut connection)
        .await
        .optional()?
        .ok_or_else(|| AppError::NotInvited(user.email.clone()))?;

    info!("{} logged in as {}", user.email, profile.id);
    session.set_session(Some(profile.id));
    Ok((session, Redirect::to("/")))
}

pub async fn logout(mut session: Session) -> (Session, StatusCode) {
    session.set_session(None);
    (session, StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(login))
        .route(REDIRECT_PATH, get(redirect))
        .route("/auth/logout", post(logout))
}
