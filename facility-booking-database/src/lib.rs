pub mod error;
pub mod models;
pub mod schema;

use diesel_async::pooled_connection::deadpool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use error::DatabaseError;

// https://github.com/tokio-rs/axum/tree/main/examples/diesel-async-postgres

pub type Pool = deadpool::Pool<AsyncPgConnection>;

/// Builds the pool. No connection is opened until the first checkout.
pub fn get_database_connection(database_url: &str) -> Result<Pool, DatabaseError> {
    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    Ok(Pool::builder(config).build()?)
}
