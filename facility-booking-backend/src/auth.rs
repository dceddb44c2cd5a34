use core::fmt;
use core::str::FromStr;

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::cookie::Key;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use facility_booking_database::models::Profile;
use facility_booking_database::schema::{genehmiger_resources, profiles};
use facility_booking_database::Pool;
use facility_booking_domain::{trainer_status, TrainerStatus};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Genehmiger,
    Trainer,
    Member,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Genehmiger => "genehmiger",
            Self::Trainer => "trainer",
            Self::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Self::Admin),
            "genehmiger" => Ok(Self::Genehmiger),
            "trainer" => Ok(Self::Trainer),
            "member" => Ok(Self::Member),
            other => Err(AppError::BadRequest(format!("unknown role {other:?}"))),
        }
    }
}

/// The logged in profile, loaded for every request that needs it.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub profile: Profile,
    pub role: Role,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    Key: FromRef<S>,
    Pool: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        let profile_id = session.profile_id().ok_or(AppError::NotAuthenticated)?;
        let pool = Pool::from_ref(state);
        let mut connection = pool.get().await?;
        let profile = profiles::table
            .find(profile_id)
            .select(Profile::as_select())
            .first(&mut connection)
            .await
            .optional()?
            .ok_or_else(|| {
                debug!("session refers to deleted profile {profile_id}");
                AppError::NotAuthenticated
            })?;
        // unknown roles have no rights
        let role = profile.role.parse().unwrap_or(Role::Member);
        Ok(Self { profile, role })
    }
}

impl CurrentUser {
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.profile.id
    }

    #[must_use]
    pub const fn operator_id(&self) -> Uuid {
        self.profile.operator_id
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    /// Admins and approvers book directly, trainers only while active.
    #[must_use]
    pub fn can_book(&self) -> bool {
        match self.role {
            Role::Admin | Role::Genehmiger => true,
            Role::Trainer => {
                trainer_status(&self.profile.trainer_flags()) == Some(TrainerStatus::Aktiv)
            }
            Role::Member => false,
        }
    }

    /// Whether the user may approve or reject bookings of the resource.
    pub async fn can_approve(
        &self,
        connection: &mut AsyncPgConnection,
        resource_id: Uuid,
    ) -> Result<bool, AppError> {
        match self.role {
            Role::Admin => Ok(true),
            Role::Genehmiger => {
                let assigned: i64 = genehmiger_resources::table
                    .filter(genehmiger_resources::operator_id.eq(self.operator_id()))
                    .filter(genehmiger_resources::profile_id.eq(self.id()))
                    .filter(genehmiger_resources::resource_id.eq(resource_id))
                    .count()
                    .get_result(connection)
                    .await?;
                Ok(assigned > 0)
            }
            Role::Trainer | Role::Member => Ok(false),
        }
    }

    /// Trainer data is edited by the trainer or by an admin of the same
    /// operator. `Ok(true)` means the user edits their own data.
    pub fn trainer_access(&self, profile_id: Uuid) -> Result<bool, AppError> {
        if profile_id == self.id() && (self.profile.ist_trainer || self.is_admin()) {
            return Ok(true);
        }
        self.require_admin()?;
        Ok(false)
    }

    /// Returns the profile whose trainer data the user may edit.
    pub async fn trainer_profile(
        &self,
        connection: &mut AsyncPgConnection,
        profile_id: Uuid,
    ) -> Result<Profile, AppError> {
        if self.trainer_access(profile_id)? {
            return Ok(self.profile.clone());
        }
        profiles::table
            .filter(profiles::id.eq(profile_id))
            .filter(profiles::operator_id.eq(self.operator_id()))
            .select(Profile::as_select())
            .first(connection)
            .await
            .optional()?
            .ok_or(AppError::NotFound)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{DateTime, Utc};

    use super::*;

    pub(crate) fn user(role: Role, kann_buchen: bool, is_passive: bool) -> CurrentUser {
        CurrentUser {
            profile: Profile {
                id: Uuid::nil(),
                operator_id: Uuid::nil(),
                email: "a@example.org".to_owned(),
                first_name: "Anna".to_owned(),
                last_name: "Berg".to_owned(),
                phone: None,
                role: role.to_string(),
                ist_trainer: role == Role::Trainer,
                kann_buchen,
                is_passive,
                invited_at: None,
                created_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
            },
            role,
        }
    }

    #[test]
    fn roles_parse_their_own_names() {
        for role in [Role::Admin, Role::Genehmiger, Role::Trainer, Role::Member] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("root".parse::<Role>().is_err());
        assert_eq!(serde_json::to_string(&Role::Genehmiger).unwrap(), "\"genehmiger\"");
    }

    #[test]
    fn only_active_trainers_book() {
        assert!(user(Role::Admin, false, false).can_book());
        assert!(user(Role::Genehmiger, false, false).can_book());
        assert!(user(Role::Trainer, true, false).can_book());
        assert!(!user(Role::Trainer, true, true).can_book());
        assert!(!user(Role::Trainer, false, false).can_book());
        assert!(!user(Role::Member, true, false).can_book());
    }

    #[test]
    fn admin_gate() {
        assert!(user(Role::Admin, false, false).require_admin().is_ok());
        assert!(matches!(
            user(Role::Genehmiger, false, false).require_admin(),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn trainer_data_belongs_to_trainers_and_admins() {
        let trainer = user(Role::Trainer, true, false);
        assert!(trainer.trainer_access(trainer.id()).unwrap());
        assert!(matches!(
            trainer.trainer_access(Uuid::from_u128(7)),
            Err(AppError::Forbidden)
        ));

        let member = user(Role::Member, true, false);
        assert!(matches!(
            member.trainer_access(member.id()),
            Err(AppError::Forbidden)
        ));

        let admin = user(Role::Admin, false, false);
        assert!(admin.trainer_access(admin.id()).unwrap());
        assert!(!admin.trainer_access(Uuid::from_u128(7)).unwrap());
    }
}
