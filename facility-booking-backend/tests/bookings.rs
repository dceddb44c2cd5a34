//! Booking writes against a real database. Set `FB_TEST_DATABASE_URL` to a
//! postgres database the tests may create tables in, otherwise they are
//! skipped. Every test works in its own operator.

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Method, Request, StatusCode};
use axum::response::IntoResponse as _;
use axum::Router;
use axum_extra::extract::cookie::Key;
use axum_extra::extract::PrivateCookieJar;
use diesel::dsl::sql;
use diesel::sql_types::Bool;
use diesel_async::{RunQueryDsl as _, SimpleAsyncConnection as _};
use facility_booking_backend::mailer::Mailer;
use facility_booking_backend::session::Session;
use facility_booking_backend::storage::Storage;
use facility_booking_backend::{router, AppState};
use facility_booking_config::{CalendarConfig, Config, StorageConfig};
use facility_booking_database::{get_database_connection, Pool};
use http_body_util::BodyExt as _;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt as _;
use uuid::Uuid;

const SCHEMA: &str = include_str!("../../migrations/2024-01-01-000000_create_tables/up.sql");
const MIGRATION_LOCK: i64 = 0x6662_7465_7374;

struct Login {
    cookie: String,
    csrf_token: String,
}

struct Fixture {
    app: Router,
    pool: Pool,
    key: Key,
    operator: Uuid,
    facility: Uuid,
    _storage_root: TempDir,
}

async fn migrate(pool: &Pool) {
    let mut connection = pool.get().await.unwrap();
    diesel::sql_query(format!("SELECT pg_advisory_lock({MIGRATION_LOCK})"))
        .execute(&mut connection)
        .await
        .unwrap();
    let migrated: bool = diesel::select(sql::<Bool>("to_regclass('operators') IS NOT NULL"))
        .get_result(&mut connection)
        .await
        .unwrap();
    if !migrated {
        connection.batch_execute(SCHEMA).await.unwrap();
    }
    diesel::sql_query(format!("SELECT pg_advisory_unlock({MIGRATION_LOCK})"))
        .execute(&mut connection)
        .await
        .unwrap();
}

impl Fixture {
    async fn new() -> Option<Self> {
        let Ok(database_url) = std::env::var("FB_TEST_DATABASE_URL") else {
            eprintln!("FB_TEST_DATABASE_URL is not set, skipping");
            return None;
        };
        let storage_root = tempfile::tempdir().unwrap();
        let config = Config {
            url: "http://localhost:3000".to_owned(),
            listen_address: "127.0.0.1:0".to_owned(),
            database_url,
            cookie_secret: None,
            openidconnect: None,
            storage: StorageConfig {
                root: storage_root.path().to_owned(),
                signing_secret: "test secret".to_owned(),
                signed_url_ttl_secs: 300,
            },
            email: None,
            calendar: CalendarConfig::default(),
        };
        let pool = get_database_connection(&config.database_url).unwrap();
        migrate(&pool).await;

        let key = Key::generate();
        let state = AppState {
            pool: pool.clone(),
            key: key.clone(),
            storage: Arc::new(Storage::new(&config.storage).unwrap()),
            config: Arc::new(config),
            mailer: Arc::new(Mailer::new(None)),
        };
        let fixture = Self {
            app: router(state),
            pool,
            key,
            operator: Uuid::new_v4(),
            facility: Uuid::new_v4(),
            _storage_root: storage_root,
        };
        (&fixture)
            .execute(&format!(
                "INSERT INTO operators (id, name, slug) VALUES ('{0}', 'Test', '{0}');
                 INSERT INTO facilities (id, operator_id, name) VALUES ('{1}', '{0}', 'Halle');",
                fixture.operator, fixture.facility
            ))
            .await;
        Some(fixture)
    }

    async fn execute(&self, statements: &str) {
        let mut connection = self.pool.get().await.unwrap();
        connection.batch_execute(statements).await.unwrap();
    }

    async fn count(&self, condition: &str) -> i64 {
        let mut connection = self.pool.get().await.unwrap();
        diesel::select(sql::<diesel::sql_types::BigInt>(&format!(
            "(SELECT count(*) FROM bookings WHERE operator_id = '{}' AND {condition})",
            self.operator
        )))
        .get_result(&mut connection)
        .await
        .unwrap()
    }

    async fn resource(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.execute(&format!(
            "INSERT INTO resources (id, operator_id, facility_id, name) VALUES ('{id}', '{}', '{}', '{name}')",
            self.operator, self.facility
        ))
        .await;
        id
    }

    async fn profile(&self, role: &str, kann_buchen: bool, is_passive: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.execute(&format!(
            "INSERT INTO profiles (id, operator_id, email, role, ist_trainer, kann_buchen, is_passive)
             VALUES ('{id}', '{}', '{id}@example.org', '{role}', {}, {kann_buchen}, {is_passive})",
            self.operator,
            role == "trainer"
        ))
        .await;
        id
    }

    async fn approver_of(&self, profile: Uuid, resource: Uuid) {
        self.execute(&format!(
            "INSERT INTO genehmiger_resources (operator_id, profile_id, resource_id)
             VALUES ('{}', '{profile}', '{resource}')",
            self.operator
        ))
        .await;
    }

    async fn booking(
        &self,
        resource: Uuid,
        booked_by: Uuid,
        date: &str,
        (start, end): (&str, &str),
        status: &str,
        series: Option<Uuid>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let series = series.map_or_else(|| "NULL".to_owned(), |series| format!("'{series}'"));
        self.execute(&format!(
            "INSERT INTO bookings (id, operator_id, resource_id, booked_by, date, start_time, end_time, status, series_id, title)
             VALUES ('{id}', '{}', '{resource}', '{booked_by}', '{date}', '{start}', '{end}', '{status}', {series}, 'Training')",
            self.operator
        ))
        .await;
        id
    }

    fn login(&self, profile: Uuid) -> Login {
        let mut session = Session::new(PrivateCookieJar::new(self.key.clone()));
        session.set_session(Some(profile));
        let csrf_token = session.csrf_token().to_owned();
        let response = (session, ()).into_response();
        let cookie = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|value| value.to_str().unwrap().split(';').next().unwrap().to_owned())
            .collect::<Vec<_>>()
            .join("; ");
        Login { cookie, csrf_token }
    }

    async fn send(&self, login: &Login, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header(COOKIE, &login.cookie)
                    .header("x-csrf-token", &login.csrf_token)
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}

fn booking_payload(resource: Uuid, date: &str, start: &str, end: &str) -> Value {
    json!({
        "resourceId": resource,
        "date": date,
        "startTime": start,
        "endTime": end,
        "title": "Training",
    })
}

#[tokio::test]
async fn overlapping_requests_conflict_and_approvers_book_directly() {
    let Some(fixture) = Fixture::new().await else {
        return;
    };
    let hall = fixture.resource("Halle 1").await;
    let admin = fixture.login(fixture.profile("admin", false, false).await);
    let trainer = fixture.login(fixture.profile("trainer", true, false).await);

    let (status, body) = fixture
        .send(&admin, Method::POST, "/api/bookings", booking_payload(hall, "2030-06-03", "17:00:00", "19:00:00"))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "approved");

    let (status, body) = fixture
        .send(&trainer, Method::POST, "/api/bookings", booking_payload(hall, "2030-06-03", "18:00:00", "20:00:00"))
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, body) = fixture
        .send(&trainer, Method::POST, "/api/bookings", booking_payload(hall, "2030-06-03", "19:00:00", "20:00:00"))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn moved_bookings_of_trainers_need_approval_again() {
    let Some(fixture) = Fixture::new().await else {
        return;
    };
    let hall = fixture.resource("Halle 1").await;
    let trainer_id = fixture.profile("trainer", true, false).await;
    let trainer = fixture.login(trainer_id);
    let id = fixture
        .booking(hall, trainer_id, "2030-06-03", ("17:00:00", "19:00:00"), "approved", None)
        .await;
    let uri = format!("/api/bookings/{id}");

    let mut renamed = booking_payload(hall, "2030-06-03", "17:00:00", "19:00:00");
    renamed["title"] = json!("Jugendtraining");
    let (status, body) = fixture.send(&trainer, Method::PUT, &uri, renamed).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "approved");

    let (status, body) = fixture
        .send(&trainer, Method::PUT, &uri, booking_payload(hall, "2030-06-03", "18:00:00", "20:00:00"))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn passive_trainers_cannot_move_their_bookings() {
    let Some(fixture) = Fixture::new().await else {
        return;
    };
    let hall = fixture.resource("Halle 1").await;
    let trainer_id = fixture.profile("trainer", true, true).await;
    let trainer = fixture.login(trainer_id);
    let id = fixture
        .booking(hall, trainer_id, "2030-06-03", ("17:00:00", "19:00:00"), "pending", None)
        .await;

    let (status, _) = fixture
        .send(
            &trainer,
            Method::PUT,
            &format!("/api/bookings/{id}"),
            booking_payload(hall, "2030-06-04", "17:00:00", "19:00:00"),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(fixture.count("date = '2030-06-03'").await, 1);
}

#[tokio::test]
async fn series_approval_needs_every_resource_of_the_series() {
    let Some(fixture) = Fixture::new().await else {
        return;
    };
    let hall_a = fixture.resource("Halle A").await;
    let hall_b = fixture.resource("Halle B").await;
    let trainer = fixture.profile("trainer", true, false).await;
    let approver_id = fixture.profile("genehmiger", false, false).await;
    fixture.approver_of(approver_id, hall_a).await;
    let approver = fixture.login(approver_id);

    let series = Uuid::new_v4();
    for date in ["2030-06-03", "2030-06-10"] {
        fixture
            .booking(hall_a, trainer, date, ("17:00:00", "19:00:00"), "pending", Some(series))
            .await;
    }
    fixture
        .booking(hall_b, trainer, "2030-06-17", ("17:00:00", "19:00:00"), "pending", Some(series))
        .await;

    let (status, _) = fixture
        .send(
            &approver,
            Method::PATCH,
            &format!("/api/series/{series}/status"),
            json!({ "status": "approved" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(fixture.count("status = 'approved'").await, 0);
}

#[tokio::test]
async fn reactivated_series_members_are_checked_on_their_own_resource() {
    let Some(fixture) = Fixture::new().await else {
        return;
    };
    let hall_a = fixture.resource("Halle A").await;
    let hall_b = fixture.resource("Halle B").await;
    let trainer = fixture.profile("trainer", true, false).await;
    let other = fixture.profile("trainer", true, false).await;
    let admin = fixture.login(fixture.profile("admin", false, false).await);

    let series = Uuid::new_v4();
    fixture
        .booking(hall_a, trainer, "2030-06-03", ("17:00:00", "19:00:00"), "cancelled", Some(series))
        .await;
    fixture
        .booking(hall_b, trainer, "2030-06-10", ("17:00:00", "19:00:00"), "cancelled", Some(series))
        .await;
    // took the free time on hall B after the series was cancelled
    fixture
        .booking(hall_b, other, "2030-06-10", ("18:00:00", "20:00:00"), "approved", None)
        .await;

    let (status, body) = fixture
        .send(
            &admin,
            Method::PATCH,
            &format!("/api/series/{series}/status"),
            json!({ "status": "approved" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(fixture.count(&format!("series_id = '{series}' AND status = 'cancelled'")).await, 2);
}

#[tokio::test]
async fn series_are_booked_completely_or_not_at_all() {
    let Some(fixture) = Fixture::new().await else {
        return;
    };
    let hall = fixture.resource("Halle 1").await;
    let admin = fixture.profile("admin", false, false).await;
    let trainer = fixture.login(fixture.profile("trainer", true, false).await);
    fixture
        .booking(hall, admin, "2030-06-17", ("18:00:00", "19:00:00"), "approved", None)
        .await;

    let (status, body) = fixture
        .send(
            &trainer,
            Method::POST,
            "/api/series",
            json!({
                "resourceId": hall,
                "firstDate": "2030-06-03",
                "until": "2030-07-01",
                "startTime": "17:00:00",
                "endTime": "19:00:00",
                "title": "Serie",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["conflicts"][0]["date"], "2030-06-17");
    assert_eq!(fixture.count("series_id IS NOT NULL").await, 0);

    let (status, body) = fixture
        .send(
            &trainer,
            Method::POST,
            "/api/series",
            json!({
                "resourceId": hall,
                "firstDate": "2030-06-03",
                "until": "2030-06-10",
                "startTime": "17:00:00",
                "endTime": "19:00:00",
                "title": "Serie",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["bookings"].as_array().unwrap().len(), 2);
}
