use std::convert::Infallible;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::async_trait;
use axum::response::{IntoResponseParts, ResponseParts};
use axum_extra::extract::cookie::{Cookie, Key, SameSite};
use axum_extra::extract::PrivateCookieJar;
use facility_booking_openidconnect::OpenIdSession;
use rand::{thread_rng, Rng as _};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;

pub const COOKIE_NAME_SESSION: &str = "__Host-session";
pub const COOKIE_NAME_OPENIDCONNECT: &str = "__Host-openidconnect";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SessionData {
    pub csrf_token: String,
    pub profile_id: Option<Uuid>,
}

fn random_token() -> String {
    thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(30)
        .map(char::from)
        .collect()
}

/// The encrypted session cookie. Handlers that change the session have to
/// return it so the cookie is written.
#[derive(Clone)]
#[must_use]
pub struct Session {
    private_cookies: PrivateCookieJar,
    data: SessionData,
}

impl Session {
    pub fn new(private_cookies: PrivateCookieJar) -> Self {
        let data = private_cookies
            .get(COOKIE_NAME_SESSION)
            .and_then(|cookie| serde_json::from_str(cookie.value()).ok());
        match data {
            Some(data) => Self {
                private_cookies,
                data,
            },
            None => {
                let mut session = Self {
                    private_cookies,
                    data: SessionData {
                        csrf_token: String::new(),
                        profile_id: None,
                    },
                };
                session.set_session(None);
                session
            }
        }
    }

    #[must_use]
    pub fn csrf_token(&self) -> &str {
        &self.data.csrf_token
    }

    #[must_use]
    pub const fn profile_id(&self) -> Option<Uuid> {
        self.data.profile_id
    }

    /// Starts a new session, which also rotates the csrf token.
    pub fn set_session(&mut self, profile_id: Option<Uuid>) {
        self.data = SessionData {
            csrf_token: random_token(),
            profile_id,
        };
        let value = serde_json::to_string(&self.data).unwrap_or_default();
        let cookie = Cookie::build((COOKIE_NAME_SESSION, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true);
        self.private_cookies = self.private_cookies.clone().add(cookie);
    }

    pub fn set_openidconnect(&mut self, input: &OpenIdSession) -> Result<(), AppError> {
        // the redirect back from the identity provider is a cross site top level navigation
        let cookie = Cookie::build((COOKIE_NAME_OPENIDCONNECT, serde_json::to_string(input)?))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(true);
        self.private_cookies = self.private_cookies.clone().add(cookie);
        Ok(())
    }

    pub fn take_openidconnect(&mut self) -> Result<OpenIdSession, AppError> {
        let state = self
            .private_cookies
            .get(COOKIE_NAME_OPENIDCONNECT)
            .ok_or(AppError::OpenIdTokenNotFound)?;
        let state = serde_json::from_str(state.value()).map_err(|error| {
            debug!("unreadable openid state: {error}");
            AppError::OpenIdTokenNotFound
        })?;
        self.private_cookies = self
            .private_cookies
            .clone()
            .remove(Cookie::build(COOKIE_NAME_OPENIDCONNECT).path("/"));
        Ok(state)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    Key: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::new(PrivateCookieJar::from_headers(
            &parts.headers,
            Key::from_ref(state),
        )))
    }
}

impl IntoResponseParts for Session {
    type Error = Infallible;

    fn into_response_parts(self, res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        self.private_cookies.into_response_parts(res)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::header::{COOKIE, SET_COOKIE};
    use axum::http::HeaderMap;
    use axum::response::IntoResponse;

    use super::*;

    fn cookies_of(session: Session) -> HeaderMap {
        let response = (session, ()).into_response();
        let mut headers = HeaderMap::new();
        for value in response.headers().get_all(SET_COOKIE) {
            let cookie = value.to_str().unwrap().split(';').next().unwrap().to_owned();
            headers.append(COOKIE, cookie.parse().unwrap());
        }
        headers
    }

    #[test]
    fn new_sessions_get_a_csrf_token_that_survives_the_round_trip() {
        let key = Key::generate();
        let session = Session::new(PrivateCookieJar::new(key.clone()));
        let token = session.csrf_token().to_owned();
        assert_eq!(token.len(), 30);
        assert_eq!(session.profile_id(), None);

        let headers = cookies_of(session);
        let restored = Session::new(PrivateCookieJar::from_headers(&headers, key));
        assert_eq!(restored.csrf_token(), token);
    }

    #[test]
    fn login_rotates_the_token() {
        let mut session = Session::new(PrivateCookieJar::new(Key::generate()));
        let before = session.csrf_token().to_owned();
        let profile_id = Uuid::new_v4();
        session.set_session(Some(profile_id));
        assert_ne!(session.csrf_token(), before);
        assert_eq!(session.profile_id(), Some(profile_id));
    }

    #[test]
    fn cookies_from_another_key_are_ignored() {
        let session = Session::new(PrivateCookieJar::new(Key::generate()));
        let mut with_profile = session;
        with_profile.set_session(Some(Uuid::new_v4()));
        let headers = cookies_of(with_profile);
        let restored = Session::new(PrivateCookieJar::from_headers(&headers, Key::generate()));
        assert_eq!(restored.profile_id(), None);
    }

    #[test]
    fn openid_state_can_be_taken_once() {
        let key = Key::generate();
        let mut session = Session::new(PrivateCookieJar::new(key.clone()));
        assert!(matches!(
            session.take_openidconnect(),
            Err(AppError::OpenIdTokenNotFound)
        ));
        let state: OpenIdSession = serde_json::from_str(
            r#"{"verifier":"verifier","nonce":"nonce","csrf_token":"state"}"#,
        )
        .unwrap();
        session.set_openidconnect(&state).unwrap();
        let headers = cookies_of(session);
        let mut restored = Session::new(PrivateCookieJar::from_headers(&headers, key));
        assert_eq!(restored.take_openidconnect().unwrap().csrf_token.secret(), "state");
    }
}
