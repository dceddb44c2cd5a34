pub mod auth;
pub mod csrf_protection;
pub mod error;
pub mod mailer;
pub mod routes;
pub mod session;
pub mod storage;

use std::sync::Arc;

use axum::extract::FromRef;
use axum::{middleware, Router};
use axum_extra::extract::cookie::Key;
use facility_booking_config::Config;
use facility_booking_database::{get_database_connection, Pool};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};

use crate::csrf_protection::csrf_protection;
use crate::error::AppError;
use crate::mailer::Mailer;
use crate::storage::Storage;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub pool: Pool,
    pub key: Key,
    pub config: Arc<Config>,
    pub storage: Arc<Storage>,
    pub mailer: Arc<Mailer>,
}

/// All routes with their middleware. The layers apply bottom to top.
pub fn router(state: AppState) -> Router {
    routes::routes(&state.storage)
        .layer(middleware::from_fn_with_state(
            state.key.clone(),
            csrf_protection,
        ))
        .with_state(state)
        .layer(CatchPanicLayer::new())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

fn cookie_key(config: &Config) -> Result<Key, AppError> {
    match &config.cookie_secret {
        Some(secret) => Key::try_from(secret.as_bytes()).map_err(|_| AppError::InvalidCookieSecret),
        None => {
            warn!("no cookie secret configured, sessions will not survive a restart");
            Ok(Key::generate())
        }
    }
}

pub fn setup_server(config: Config) -> Result<Router, AppError> {
    info!("starting up server...");

    let pool = get_database_connection(&config.database_url)?;
    let key = cookie_key(&config)?;
    let storage = Storage::new(&config.storage)?;
    let mailer = Mailer::new(config.email.clone());

    Ok(router(AppState {
        pool,
        key,
        config: Arc::new(config),
        storage: Arc::new(storage),
        mailer: Arc::new(mailer),
    }))
}

pub async fn run_server(config: Config) -> Result<(), AppError> {
    let listen_address = config.listen_address.clone();
    let app = setup_server(config)?;

    let listener = TcpListener::bind(listen_address.as_str()).await?;
    info!("listening on {listen_address}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server shut down");
    Ok(())
}

#[allow(clippy::redundant_pub_crate)]
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
