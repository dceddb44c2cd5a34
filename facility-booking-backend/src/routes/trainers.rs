use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use bytes::Bytes;
use chrono::{Local, NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use facility_booking_config::Config;
use facility_booking_database::models::{
    Profile, TrainerDetailsData, TrainerErfolg, TrainerErfolgData, TrainerLizenz,
    TrainerLizenzData, TrainerProfileDetails,
};
use facility_booking_database::schema::{
    profiles, trainer_erfolge, trainer_lizenzen, trainer_profile_details,
};
use facility_booking_database::Pool;
use facility_booking_domain::{trainer_status, Compliance, TrainerStatus};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::routes::Payload;
use crate::storage::{extension_for, Bucket, SignedUrl, Storage};
use crate::AppState;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseCompliance {
    pub id: Uuid,
    pub name: String,
    pub compliance: Compliance,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainerCompliance {
    pub police_clearance: Compliance,
    pub conduct_code: Compliance,
    pub licenses: Vec<LicenseCompliance>,
}

impl TrainerCompliance {
    #[must_use]
    pub fn new(
        details: Option<&TrainerProfileDetails>,
        licenses: &[TrainerLizenz],
        today: NaiveDate,
    ) -> Self {
        Self {
            police_clearance: Compliance::of_document(
                details.and_then(|details| {
                    details
                        .police_clearance_path
                        .as_ref()
                        .and(details.police_clearance_issued_on)
                }),
                today,
            ),
            conduct_code: Compliance::of_document(
                details.and_then(|details| {
                    details
                        .conduct_code_path
                        .as_ref()
                        .and(details.conduct_code_issued_on)
                }),
                today,
            ),
            licenses: licenses
                .iter()
                .map(|license| LicenseCompliance {
                    id: license.id,
                    name: license.name.clone(),
                    compliance: Compliance::of_license(license.valid_until, today),
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainerSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub status: Option<TrainerStatus>,
    pub photo_path: Option<String>,
    pub compliance: TrainerCompliance,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

async fn load_details(
    connection: &mut AsyncPgConnection,
    profile_ids: &[Uuid],
) -> Result<Vec<TrainerProfileDetails>, AppError> {
    Ok(trainer_profile_details::table
        .filter(trainer_profile_details::profile_id.eq_any(profile_ids))
        .select(TrainerProfileDetails::as_select())
        .load(connection)
        .await?)
}

async fn load_licenses(
    connection: &mut AsyncPgConnection,
    profile_ids: &[Uuid],
) -> Result<Vec<TrainerLizenz>, AppError> {
    Ok(trainer_lizenzen::table
        .filter(trainer_lizenzen::profile_id.eq_any(profile_ids))
        .order(trainer_lizenzen::name)
        .select(TrainerLizenz::as_select())
        .load(connection)
        .await?)
}

/// All trainers of the operator with their derived status and the state of
/// their documents.
pub async fn list_trainers(
    State(pool): State<Pool>,
    user: CurrentUser,
) -> Result<Json<Vec<TrainerSummary>>, AppError> {
    let mut connection = pool.get().await?;
    let trainers: Vec<Profile> = profiles::table
        .filter(profiles::operator_id.eq(user.operator_id()))
        .filter(profiles::ist_trainer.eq(true))
        .order((profiles::last_name, profiles::first_name))
        .select(Profile::as_select())
        .load(&mut connection)
        .await?;
    let ids: Vec<Uuid> = trainers.iter().map(|trainer| trainer.id).collect();
    let details: HashMap<Uuid, TrainerProfileDetails> = load_details(&mut connection, &ids)
        .await?
        .into_iter()
        .map(|details| (details.profile_id, details))
        .collect();
    let mut licenses: HashMap<Uuid, Vec<TrainerLizenz>> = HashMap::new();
    for license in load_licenses(&mut connection, &ids).await? {
        licenses.entry(license.profile_id).or_default().push(license);
    }

    let today = today();
    Ok(Json(
        trainers
            .into_iter()
            .map(|trainer| {
                let details = details.get(&trainer.id);
                TrainerSummary {
                    status: trainer_status(&trainer.trainer_flags()),
                    photo_path: details.and_then(|details| details.photo_path.clone()),
                    compliance: TrainerCompliance::new(
                        details,
                        licenses.get(&trainer.id).map(Vec::as_slice).unwrap_or_default(),
                        today,
                    ),
                    id: trainer.id,
                    first_name: trainer.first_name,
                    last_name: trainer.last_name,
                    email: trainer.email,
                }
            })
            .collect(),
    ))
}

pub async fn compliance(
    State(pool): State<Pool>,
    user: CurrentUser,
    Path(profile_id): Path<Uuid>,
) -> Result<Json<TrainerCompliance>, AppError> {
    let mut connection = pool.get().await?;
    let profile = user.trainer_profile(&mut connection, profile_id).await?;
    let details = load_details(&mut connection, &[profile.id]).await?;
    let licenses = load_licenses(&mut connection, &[profile.id]).await?;
    Ok(Json(TrainerCompliance::new(
        details.as_slice().first(),
        &licenses,
        today(),
    )))
}

pub async fn get_details(
    State(pool): State<Pool>,
    user: CurrentUser,
    Path(profile_id): Path<Uuid>,
) -> Result<Json<Option<TrainerProfileDetails>>, AppError> {
    let mut connection = pool.get().await?;
    let profile = user.trainer_profile(&mut connection, profile_id).await?;
    Ok(Json(
        trainer_profile_details::table
            .find(profile.id)
            .select(TrainerProfileDetails::as_select())
            .first(&mut connection)
            .await
            .optional()?,
    ))
}

pub async fn put_details(
    State(pool): State<Pool>,
    user: CurrentUser,
    Path(profile_id): Path<Uuid>,
    Payload(data): Payload<TrainerDetailsData>,
) -> Result<Json<TrainerProfileDetails>, AppError> {
    let mut connection = pool.get().await?;
    let profile = user.trainer_profile(&mut connection, profile_id).await?;
    let now = Utc::now();
    let details = diesel::insert_into(trainer_profile_details::table)
        .values((
            trainer_profile_details::profile_id.eq(profile.id),
            &data,
            trainer_profile_details::updated_at.eq(now),
        ))
        .on_conflict(trainer_profile_details::profile_id)
        .do_update()
        .set((&data, trainer_profile_details::updated_at.eq(now)))
        .returning(TrainerProfileDetails::as_returning())
        .get_result(&mut connection)
        .await?;
    Ok(Json(details))
}

/// Generates list, create, update and delete handlers for a table owned by
/// a trainer profile.
macro_rules! trainer_area {
    ($area:ident, $path:literal, $table:ident, $row:ty, $data:ty) => {
        paste::paste! {
            pub async fn [<list_ $area>](
                State(pool): State<Pool>,
                user: CurrentUser,
                Path(profile_id): Path<Uuid>,
            ) -> Result<Json<Vec<$row>>, AppError> {
                let mut connection = pool.get().await?;
                let profile = user.trainer_profile(&mut connection, profile_id).await?;
                let rows = $table::table
                    .filter($table::profile_id.eq(profile.id))
                    .select(<$row>::as_select())
                    .load(&mut connection)
                    .await?;
                Ok(Json(rows))
            }

            pub async fn [<create_ $area>](
                State(pool): State<Pool>,
                user: CurrentUser,
                Path(profile_id): Path<Uuid>,
                Payload(data): Payload<$data>,
            ) -> Result<(StatusCode, Json<$row>), AppError> {
                let mut connection = pool.get().await?;
                let profile = user.trainer_profile(&mut connection, profile_id).await?;
                let row = diesel::insert_into($table::table)
                    .values(($table::profile_id.eq(profile.id), &data))
                    .returning(<$row>::as_returning())
                    .get_result(&mut connection)
                    .await?;
                Ok((StatusCode::CREATED, Json(row)))
            }

            pub async fn [<update_ $area>](
                State(pool): State<Pool>,
                user: CurrentUser,
                Path((profile_id, id)): Path<(Uuid, Uuid)>,
                Payload(data): Payload<$data>,
            ) -> Result<Json<$row>, AppError> {
                let mut connection = pool.get().await?;
                let profile = user.trainer_profile(&mut connection, profile_id).await?;
                let row = diesel::update(
                    $table::table
                        .filter($table::id.eq(id))
                        .filter($table::profile_id.eq(profile.id)),
                )
                .set(&data)
                .returning(<$row>::as_returning())
                .get_result(&mut connection)
                .await?;
                Ok(Json(row))
            }

            pub async fn [<delete_ $area>](
                State(pool): State<Pool>,
                user: CurrentUser,
                Path((profile_id, id)): Path<(Uuid, Uuid)>,
            ) -> Result<StatusCode, AppError> {
                let mut connection = pool.get().await?;
                let profile = user.trainer_profile(&mut connection, profile_id).await?;
                let deleted = diesel::delete(
                    $table::table
                        .filter($table::id.eq(id))
                        .filter($table::profile_id.eq(profile.id)),
                )
                .execute(&mut connection)
                .await?;
                if deleted == 0 {
                    return Err(AppError::NotFound);
                }
                Ok(StatusCode::NO_CONTENT)
            }

            fn [<$area _router>]() -> Router<AppState> {
                Router::new()
                    .route($path, get([<list_ $area>]).post([<create_ $area>]))
                    .route(
                        concat!($path, "/:id"),
                        put([<update_ $area>]).delete([<delete_ $area>]),
                    )
            }
        }
    };
}

trainer_area!(
    lizenzen,
    "/api/trainers/:profile_id/lizenzen",
    trainer_lizenzen,
    TrainerLizenz,
    TrainerLizenzData
);
trainer_area!(
    erfolge,
    "/api/trainers/:profile_id/erfolge",
    trainer_erfolge,
    TrainerErfolg,
    TrainerErfolgData
);

struct Upload {
    bytes: Bytes,
    extension: &'static str,
    issued_on: Option<NaiveDate>,
}

/// Reads the `file` part and an optional `issuedOn` date.
async fn read_upload(mut multipart: Multipart) -> Result<Upload, AppError> {
    let mut file = None;
    let mut issued_on = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(ToOwned::to_owned);
        match name.as_deref() {
            Some("file") => {
                let content_type = field.content_type().unwrap_or_default().to_owned();
                let extension = extension_for(&content_type)?;
                file = Some((field.bytes().await?, extension));
            }
            Some("issuedOn") => {
                let text = field.text().await?;
                issued_on = Some(text.parse::<NaiveDate>().map_err(|error| {
                    AppError::BadRequest(format!("invalid issue date {text:?}: {error}"))
                })?);
            }
            _ => {}
        }
    }
    let (bytes, extension) = file.ok_or_else(|| AppError::BadRequest("no file uploaded".to_owned()))?;
    Ok(Upload {
        bytes,
        extension,
        issued_on,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedPhoto {
    pub photo_path: String,
    pub url: String,
}

pub async fn upload_photo(
    State(pool): State<Pool>,
    State(storage): State<Arc<Storage>>,
    user: CurrentUser,
    Path(profile_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<UploadedPhoto>, AppError> {
    let mut connection = pool.get().await?;
    let profile = user.trainer_profile(&mut connection, profile_id).await?;
    let upload = read_upload(multipart).await?;
    if upload.extension == "pdf" {
        return Err(AppError::BadRequest("a photo has to be an image".to_owned()));
    }
    let key = format!("photos/{}/{}.{}", profile.id, Uuid::new_v4(), upload.extension);
    let previous = load_details(&mut connection, &[profile.id])
        .await?
        .pop()
        .and_then(|details| details.photo_path);
    storage.store(Bucket::Public, &key, &upload.bytes).await?;

    let now = Utc::now();
    diesel::insert_into(trainer_profile_details::table)
        .values((
            trainer_profile_details::profile_id.eq(profile.id),
            trainer_profile_details::photo_path.eq(&key),
            trainer_profile_details::updated_at.eq(now),
        ))
        .on_conflict(trainer_profile_details::profile_id)
        .do_update()
        .set((
            trainer_profile_details::photo_path.eq(&key),
            trainer_profile_details::updated_at.eq(now),
        ))
        .execute(&mut connection)
        .await?;
    storage
        .discard_replaced(Bucket::Public, previous.as_deref(), &key)
        .await;
    info!("{} uploaded a photo for {}", user.id(), profile.id);
    Ok(Json(UploadedPhoto {
        url: format!("/storage/public/{key}"),
        photo_path: key,
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PoliceClearance,
    ConductCode,
}

impl DocumentKind {
    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "police-clearance" => Ok(Self::PoliceClearance),
            "conduct-code" => Ok(Self::ConductCode),
            _ => Err(AppError::NotFound),
        }
    }

    const fn slug(self) -> &'static str {
        match self {
            Self::PoliceClearance => "police-clearance",
            Self::ConductCode => "conduct-code",
        }
    }
}

pub async fn upload_document(
    State(pool): State<Pool>,
    State(storage): State<Arc<Storage>>,
    user: CurrentUser,
    Path((profile_id, kind)): Path<(Uuid, String)>,
    multipart: Multipart,
) -> Result<Json<TrainerProfileDetails>, AppError> {
    let kind = DocumentKind::parse(&kind)?;
    let mut connection = pool.get().await?;
    let profile = user.trainer_profile(&mut connection, profile_id).await?;
    let upload = read_upload(multipart).await?;
    let issued_on = upload
        .issued_on
        .ok_or_else(|| AppError::BadRequest("the issue date is missing".to_owned()))?;
    let key = format!(
        "documents/{}/{}-{}.{}",
        profile.id,
        kind.slug(),
        Uuid::new_v4(),
        upload.extension
    );
    let previous = load_details(&mut connection, &[profile.id])
        .await?
        .pop()
        .and_then(|details| match kind {
            DocumentKind::PoliceClearance => details.police_clearance_path,
            DocumentKind::ConductCode => details.conduct_code_path,
        });
    storage.store(Bucket::Private, &key, &upload.bytes).await?;

    let now = Utc::now();
    let details = match kind {
        DocumentKind::PoliceClearance => {
            diesel::insert_into(trainer_profile_details::table)
                .values((
                    trainer_profile_details::profile_id.eq(profile.id),
                    trainer_profile_details::police_clearance_path.eq(&key),
                    trainer_profile_details::police_clearance_issued_on.eq(issued_on),
                    trainer_profile_details::updated_at.eq(now),
                ))
                .on_conflict(trainer_profile_details::profile_id)
                .do_update()
                .set((
                    trainer_profile_details::police_clearance_path.eq(&key),
                    trainer_profile_details::police_clearance_issued_on.eq(issued_on),
                    trainer_profile_details::updated_at.eq(now),
                ))
                .returning(TrainerProfileDetails::as_returning())
                .get_result(&mut connection)
                .await?
        }
        DocumentKind::ConductCode => {
            diesel::insert_into(trainer_profile_details::table)
                .values((
                    trainer_profile_details::profile_id.eq(profile.id),
                    trainer_profile_details::conduct_code_path.eq(&key),
                    trainer_profile_details::conduct_code_issued_on.eq(issued_on),
                    trainer_profile_details::updated_at.eq(now),
                ))
                .on_conflict(trainer_profile_details::profile_id)
                .do_update()
                .set((
                    trainer_profile_details::conduct_code_path.eq(&key),
                    trainer_profile_details::conduct_code_issued_on.eq(issued_on),
                    trainer_profile_details::updated_at.eq(now),
                ))
                .returning(TrainerProfileDetails::as_returning())
                .get_result(&mut connection)
                .await?
        }
    };
    storage
        .discard_replaced(Bucket::Private, previous.as_deref(), &key)
        .await;
    info!("{} uploaded the {} of {}", user.id(), kind.slug(), profile.id);
    Ok(Json(details))
}

/// A short lived link to a private document.
pub async fn document_url(
    State(pool): State<Pool>,
    State(storage): State<Arc<Storage>>,
    State(config): State<Arc<Config>>,
    user: CurrentUser,
    Path((profile_id, kind)): Path<(Uuid, String)>,
) -> Result<Json<SignedUrl>, AppError> {
    let kind = DocumentKind::parse(&kind)?;
    let mut connection = pool.get().await?;
    let profile = user.trainer_profile(&mut connection, profile_id).await?;
    let details: TrainerProfileDetails = trainer_profile_details::table
        .find(profile.id)
        .select(TrainerProfileDetails::as_select())
        .first(&mut connection)
        .await
        .optional()?
        .ok_or(AppError::NotFound)?;
    let key = match kind {
        DocumentKind::PoliceClearance => details.police_clearance_path,
        DocumentKind::ConductCode => details.conduct_code_path,
    }
    .ok_or(AppError::NotFound)?;
    Ok(Json(storage.signed_url(&config.url, &key, Utc::now())?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/trainers", get(list_trainers))
        .route("/api/trainers/:profile_id/compliance", get(compliance))
        .route(
            "/api/trainers/:profile_id/details",
            get(get_details).put(put_details),
        )
        .route(
            "/api/trainers/:profile_id/photo",
            post(upload_photo).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/api/trainers/:profile_id/documents/:kind",
            get(document_url)
                .post(upload_document)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .merge(lizenzen_router())
        .merge(erfolge_router())
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn details(police_clearance_issued_on: Option<NaiveDate>) -> TrainerProfileDetails {
        TrainerProfileDetails {
            profile_id: Uuid::nil(),
            birth_date: None,
            address: None,
            bio: None,
            photo_path: None,
            police_clearance_path: Some("documents/x/police-clearance-1.pdf".to_owned()),
            police_clearance_issued_on,
            conduct_code_path: None,
            conduct_code_issued_on: Some(date(2023, 1, 1)),
            updated_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        }
    }

    #[test]
    fn documents_without_a_file_are_missing() {
        let today = date(2024, 6, 1);
        let compliance = TrainerCompliance::new(Some(&details(Some(date(2020, 1, 1)))), &[], today);
        assert_eq!(
            compliance.police_clearance,
            Compliance::Valid {
                until: Some(date(2025, 1, 1))
            }
        );
        // an issue date alone does not count
        assert_eq!(compliance.conduct_code, Compliance::Missing);

        let nothing = TrainerCompliance::new(None, &[], today);
        assert_eq!(nothing.police_clearance, Compliance::Missing);
    }

    #[test]
    fn licenses_are_judged_individually() {
        let license = |name: &str, valid_until| TrainerLizenz {
            id: Uuid::nil(),
            profile_id: Uuid::nil(),
            name: name.to_owned(),
            issuer: None,
            license_number: None,
            valid_until,
        };
        let today = date(2024, 6, 1);
        let compliance = TrainerCompliance::new(
            None,
            &[
                license("C-Lizenz", Some(date(2024, 5, 31))),
                license("B-Lizenz", Some(date(2024, 7, 1))),
                license("Erste Hilfe", None),
            ],
            today,
        );
        assert_eq!(
            compliance.licenses[0].compliance,
            Compliance::Expired {
                since: date(2024, 5, 31)
            }
        );
        assert_eq!(
            compliance.licenses[1].compliance,
            Compliance::ExpiringSoon {
                until: date(2024, 7, 1)
            }
        );
        assert_eq!(
            compliance.licenses[2].compliance,
            Compliance::Valid { until: None }
        );
    }

    #[test]
    fn document_kinds() {
        assert_eq!(
            DocumentKind::parse("police-clearance").unwrap(),
            DocumentKind::PoliceClearance
        );
        assert_eq!(DocumentKind::ConductCode.slug(), "conduct-code");
        assert!(matches!(
            DocumentKind::parse("passport"),
            Err(AppError::NotFound)
        ));
    }
}
