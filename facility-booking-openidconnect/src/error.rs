use openidconnect::{ClaimsVerificationError, SigningError};

/// Transport errors are kept as text, they only end up in the log and the
/// error response.
#[derive(thiserror::Error, Debug)]
pub enum OpenIdConnectError {
    #[error("request token error: {0}")]
    RequestToken(String),
    #[error("claims verification error: {0}")]
    ClaimsVerification(#[from] ClaimsVerificationError),
    #[error("openid signing error: {0}")]
    Signing(#[from] SigningError),
    #[error("invalid url: {0}")]
    Url(#[from] openidconnect::url::ParseError),
    #[error("discovery error: {0}")]
    Discovery(String),
    #[error("wrong csrf token")]
    WrongCsrfToken,
    #[error("server did not return id token")]
    NoIdTokenReturned,
    #[error("invalid access token")]
    InvalidAccessToken,
    #[error("missing email address")]
    MissingEmailAddress,
}
