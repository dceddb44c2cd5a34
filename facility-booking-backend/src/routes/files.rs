use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;

use crate::error::AppError;
use crate::storage::{content_type_for, Bucket, Storage};
use crate::AppState;

#[derive(Deserialize)]
pub struct SignedQuery {
    pub expires: i64,
    pub signature: String,
}

/// Serves a private file to whoever holds a valid link.
pub async fn private_file(
    State(storage): State<Arc<Storage>>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Result<impl IntoResponse, AppError> {
    storage.verify(&key, query.expires, &query.signature, Utc::now())?;
    let bytes = storage.read(Bucket::Private, &key).await?;
    Ok((
        [
            (CONTENT_TYPE, content_type_for(&key).to_string()),
            (CACHE_CONTROL, "private, no-store".to_owned()),
        ],
        bytes,
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/storage/private/*key", get(private_file))
}
