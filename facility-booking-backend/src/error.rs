use std::convert::Infallible;

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use diesel::result::DatabaseErrorKind;
use facility_booking_database::error::DatabaseError;
use facility_booking_domain::{BookingRejection, DomainError, SeriesRejection};
use facility_booking_openidconnect::error::OpenIdConnectError;
use serde_json::json;
use tracing::{debug, error};

use crate::mailer::MailError;
use crate::storage::StorageError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    File(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("upload error: {0}")]
    Multipart(#[from] MultipartError),
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("{0}")]
    Domain(#[from] DomainError),
    #[error("{0}")]
    BookingRejected(#[from] BookingRejection),
    #[error("{0}")]
    SeriesRejected(#[from] SeriesRejection),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("email error: {0}")]
    Mail(#[from] MailError),
    #[error("openid connect error: {0}")]
    OpenIdConnect(#[from] OpenIdConnectError),
    #[error("cookie secret must be at least 64 bytes long")]
    InvalidCookieSecret,
    #[error("wrong csrf token")]
    WrongCsrfToken,
    #[error("not logged in")]
    NotAuthenticated,
    #[error("you are not allowed to do this")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error("no profile has been created for {0}, ask an administrator for an invitation")]
    NotInvited(String),
    #[error(
        "Höchstwahrscheinlich ist deine Anmeldesession abgelaufen und du musst es erneut \
         versuchen. Wenn dies wieder auftritt, melde das Problem bitte an einen \
         Serveradministrator."
    )]
    OpenIdTokenNotFound,
    #[error("Der Serveradministrator hat OpenID nicht konfiguriert.")]
    OpenIdNotConfigured,
}

impl From<Infallible> for AppError {
    fn from(value: Infallible) -> Self {
        match value {}
    }
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for AppError {
    fn from(value: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        Self::Database(value.into())
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(value: diesel::result::Error) -> Self {
        Self::Database(value.into())
    }
}

impl AppError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::JsonRejection(rejection) => rejection.status(),
            Self::Json(_)
            | Self::Multipart(_)
            | Self::Domain(_)
            | Self::BadRequest(_)
            | Self::OpenIdTokenNotFound => StatusCode::BAD_REQUEST,
            Self::Database(DatabaseError::Database(diesel::result::Error::NotFound))
            | Self::NotFound
            | Self::BookingRejected(BookingRejection::UnknownResource(_)) => StatusCode::NOT_FOUND,
            Self::Database(DatabaseError::Database(diesel::result::Error::DatabaseError(
                kind,
                _,
            ))) => match kind {
                DatabaseErrorKind::UniqueViolation => StatusCode::CONFLICT,
                DatabaseErrorKind::ForeignKeyViolation
                | DatabaseErrorKind::CheckViolation
                | DatabaseErrorKind::NotNullViolation => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BookingRejected(_) | Self::SeriesRejected(_) => StatusCode::CONFLICT,
            Self::Storage(error) => error.status_code(),
            Self::Mail(_) => StatusCode::BAD_GATEWAY,
            Self::OpenIdConnect(
                OpenIdConnectError::Discovery(_) | OpenIdConnectError::RequestToken(_),
            ) => StatusCode::BAD_GATEWAY,
            Self::OpenIdConnect(_) | Self::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Self::WrongCsrfToken | Self::Forbidden | Self::NotInvited(_) => StatusCode::FORBIDDEN,
            Self::OpenIdNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::File(_) | Self::Database(_) | Self::InvalidCookieSecret => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{self}");
        } else {
            debug!("{status}: {self}");
        }
        let body = match &self {
            Self::SeriesRejected(rejection) => json!({
                "error": self.to_string(),
                "conflicts": rejection
                    .conflicts
                    .iter()
                    .map(|(date, reason)| json!({ "date": date, "reason": reason.to_string() }))
                    .collect::<Vec<_>>(),
            }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use http_body_util::BodyExt as _;
    use uuid::Uuid;

    use super::*;

    async fn body(error: AppError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn errors_are_reduced_to_their_message() {
        let (status, body) = body(AppError::Forbidden).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({ "error": "you are not allowed to do this" }));
    }

    #[tokio::test]
    async fn missing_rows_are_not_found() {
        let (status, _) = body(diesel::result::Error::NotFound.into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn domain_errors_are_bad_requests() {
        let (status, body) = body(DomainError::InvalidWeekday(9).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "day of week must be between 1 (monday) and 7 (sunday), got 9"
        );
    }

    #[tokio::test]
    async fn series_rejections_list_the_dates() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let rejection = SeriesRejection {
            conflicts: vec![(date, BookingRejection::UnknownResource(Uuid::nil()))],
        };
        let (status, body) = body(rejection.into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["conflicts"][0]["date"], "2024-01-02");
        assert_eq!(
            body["error"],
            "1 of the series dates are not available"
        );
    }

    #[tokio::test]
    async fn unknown_resources_are_not_found() {
        let (status, _) = body(BookingRejection::UnknownResource(Uuid::nil()).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
