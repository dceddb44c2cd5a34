pub mod auth;
pub mod bookings;
pub mod calendar;
pub mod crud;
pub mod emails;
pub mod files;
pub mod invitations;
pub mod operator;
pub mod organization;
pub mod profiles;
pub mod trainers;

use axum::extract::FromRequest;
use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;

use crate::error::AppError;
use crate::storage::{Bucket, Storage};
use crate::AppState;

/// `axum::Json` whose rejections are answered like every other error.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Payload<T>(pub T);

async fn health() -> &'static str {
    "ok"
}

pub fn routes(storage: &Storage) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(auth::router())
        .merge(profiles::router())
        .merge(operator::router())
        .merge(crud::router())
        .merge(organization::router())
        .merge(bookings::router())
        .merge(trainers::router())
        .merge(invitations::router())
        .merge(emails::router())
        .merge(calendar::router())
        .merge(files::router())
        .nest_service(
            "/storage/public",
            ServeDir::new(storage.directory(Bucket::Public)),
        )
}
