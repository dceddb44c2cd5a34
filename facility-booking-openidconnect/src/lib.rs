pub mod error;

use facility_booking_config::OpenIdConnectConfig;
use openidconnect::core::{CoreAuthenticationFlow, CoreClient, CoreProviderMetadata};
use openidconnect::reqwest::async_http_client;
use openidconnect::{
    AccessTokenHash, AuthorizationCode, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce,
    OAuth2TokenResponse as _, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope,
    TokenResponse as _,
};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::OpenIdConnectError;

/// Path the identity provider redirects back to.
pub const REDIRECT_PATH: &str = "/auth/redirect";

#[derive(Deserialize)]
pub struct OpenIdRedirect<T> {
    pub state: String,
    #[serde(flatten)]
    pub inner: T,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub enum OpenIdRedirectInner {
    Success(OpenIdRedirectSuccess),
    Error(OpenIdRedirectError),
}

#[derive(Deserialize, Serialize)]
pub struct OpenIdRedirectError {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[derive(Deserialize, Serialize)]
pub struct OpenIdRedirectSuccess {
    pub code: String,
}

/// State between login and redirect, stored in the encrypted session cookie.
#[derive(Serialize, Deserialize)]
pub struct OpenIdSession {
    pub verifier: PkceCodeVerifier,
    pub nonce: Nonce,
    pub csrf_token: CsrfToken,
}

/// The verified identity of a user returning from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub email: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

static OPENID_CLIENT: OnceCell<CoreClient> = OnceCell::const_new();

pub async fn get_openid_client(
    config: &OpenIdConnectConfig,
    base_url: &str,
) -> Result<&'static CoreClient, OpenIdConnectError> {
    OPENID_CLIENT
        .get_or_try_init(|| async {
            info!("discovering openid provider {}", config.issuer_url);
            let provider_metadata = CoreProviderMetadata::discover_async(
                IssuerUrl::new(config.issuer_url.clone())?,
                async_http_client,
            )
            .await
            .map_err(|error| OpenIdConnectError::Discovery(error.to_string()))?;

            let client = CoreClient::from_provider_metadata(
                provider_metadata,
                ClientId::new(config.client_id.clone()),
                Some(ClientSecret::new(config.client_secret.clone())),
            )
            .set_redirect_uri(RedirectUrl::new(redirect_url(base_url))?);
            Ok(client)
        })
        .await
}

fn redirect_url(base_url: &str) -> String {
    format!("{}{REDIRECT_PATH}", base_url.trim_end_matches('/'))
}

pub async fn begin_authentication(
    config: &OpenIdConnectConfig,
    base_url: &str,
) -> Result<(String, OpenIdSession), OpenIdConnectError> {
    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let (auth_url, csrf_token, nonce) = get_openid_client(config, base_url)
        .await?
        .authorize_url(
            CoreAuthenticationFlow::AuthorizationCode,
            CsrfToken::new_random,
            Nonce::new_random,
        )
        .add_scope(Scope::new("email".to_owned()))
        .add_scope(Scope::new("profile".to_owned()))
        .set_pkce_challenge(pkce_challenge)
        .url();

    Ok((
        auth_url.to_string(),
        OpenIdSession {
            verifier: pkce_verifier,
            nonce,
            csrf_token,
        },
    ))
}

pub async fn finish_authentication(
    config: &OpenIdConnectConfig,
    base_url: &str,
    session: OpenIdSession,
    input: OpenIdRedirect<OpenIdRedirectSuccess>,
) -> Result<AuthenticatedUser, OpenIdConnectError> {
    if &input.state != session.csrf_token.secret() {
        return Err(OpenIdConnectError::WrongCsrfToken);
    };

    let client = get_openid_client(config, base_url).await?;

    let token_response = client
        .exchange_code(AuthorizationCode::new(input.inner.code))
        .set_pkce_verifier(session.verifier)
        .request_async(async_http_client)
        .await
        .map_err(|error| OpenIdConnectError::RequestToken(error.to_string()))?;

    let id_token = token_response
        .id_token()
        .ok_or(OpenIdConnectError::NoIdTokenReturned)?;
    let claims = id_token.claims(&client.id_token_verifier(), &session.nonce)?;

    // the access token must belong to this id token
    if let Some(expected_access_token_hash) = claims.access_token_hash() {
        let actual_access_token_hash =
            AccessTokenHash::from_token(token_response.access_token(), &id_token.signing_alg()?)?;
        if actual_access_token_hash != *expected_access_token_hash {
            return Err(OpenIdConnectError::InvalidAccessToken);
        }
    }

    let Some(email) = claims.email() else {
        return Err(OpenIdConnectError::MissingEmailAddress);
    };
    debug!("authenticated {}", email.as_str());

    Ok(AuthenticatedUser {
        email: email.as_str().to_lowercase(),
        given_name: claims
            .given_name()
            .and_then(|name| name.get(None))
            .map(|name| name.as_str().to_owned()),
        family_name: claims
            .family_name()
            .and_then(|name| name.get(None))
            .map(|name| name.as_str().to_owned()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_url_has_no_double_slash() {
        assert_eq!(
            redirect_url("https://booking.example.org/"),
            "https://booking.example.org/auth/redirect"
        );
        assert_eq!(
            redirect_url("http://localhost:3000"),
            "http://localhost:3000/auth/redirect"
        );
    }

    #[test]
    fn redirect_query_distinguishes_success_and_error() {
        let success: OpenIdRedirect<OpenIdRedirectInner> =
            serde_json::from_str(r#"{"state":"abc","code":"xyz","session_state":"s"}"#).unwrap();
        assert_eq!(success.state, "abc");
        assert!(matches!(success.inner, OpenIdRedirectInner::Success(ref s) if s.code == "xyz"));

        let error: OpenIdRedirect<OpenIdRedirectInner> =
            serde_json::from_str(r#"{"state":"abc","error":"access_denied"}"#).unwrap();
        assert!(matches!(error.inner, OpenIdRedirectInner::Error(ref e) if e.error == "access_denied"));
    }

    #[test]
    fn session_survives_the_cookie() {
        let session = OpenIdSession {
            verifier: PkceCodeVerifier::new("verifier".to_owned()),
            nonce: Nonce::new("nonce".to_owned()),
            csrf_token: CsrfToken::new("state".to_owned()),
        };
        let json = serde_json::to_string(&session).unwrap();
        let back: OpenIdSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back.verifier.secret(), "verifier");
        assert_eq!(back.nonce.secret(), "nonce");
        assert_eq!(back.csrf_token.secret(), "state");
    }
}
