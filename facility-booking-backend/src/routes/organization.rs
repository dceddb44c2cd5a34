use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use facility_booking_database::models::{Club, Department, Team, TrainerAssignment};
use facility_booking_database::schema::{clubs, departments, teams, trainer_assignments};
use facility_booking_database::Pool;
use facility_booking_domain::organization::{self, OrganizationTree, TeamNode};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::AppState;

pub async fn load_tree(
    connection: &mut AsyncPgConnection,
    operator_id: Uuid,
) -> Result<OrganizationTree, AppError> {
    let club_rows: Vec<Club> = clubs::table
        .filter(clubs::operator_id.eq(operator_id))
        .select(Club::as_select())
        .load(connection)
        .await?;
    let department_rows: Vec<Department> = departments::table
        .filter(departments::operator_id.eq(operator_id))
        .select(Department::as_select())
        .load(connection)
        .await?;
    let team_rows: Vec<Team> = teams::table
        .filter(teams::operator_id.eq(operator_id))
        .select(Team::as_select())
        .load(connection)
        .await?;
    let assignment_rows: Vec<TrainerAssignment> = trainer_assignments::table
        .filter(trainer_assignments::operator_id.eq(operator_id))
        .select(TrainerAssignment::as_select())
        .load(connection)
        .await?;

    Ok(OrganizationTree::build(
        &club_rows
            .into_iter()
            .map(|club| organization::Club {
                id: club.id,
                name: club.name,
            })
            .collect::<Vec<_>>(),
        &department_rows
            .into_iter()
            .map(|department| organization::Department {
                id: department.id,
                club_id: department.club_id,
                name: department.name,
            })
            .collect::<Vec<_>>(),
        &team_rows
            .into_iter()
            .map(|team| organization::Team {
                id: team.id,
                department_id: team.department_id,
                name: team.name,
            })
            .collect::<Vec<_>>(),
        &assignment_rows
            .into_iter()
            .map(|assignment| organization::TrainerAssignment {
                team_id: assignment.team_id,
                profile_id: assignment.profile_id,
            })
            .collect::<Vec<_>>(),
    ))
}

pub async fn tree(
    State(pool): State<Pool>,
    user: CurrentUser,
) -> Result<Json<OrganizationTree>, AppError> {
    let mut connection = pool.get().await?;
    Ok(Json(load_tree(&mut connection, user.operator_id()).await?))
}

pub async fn teams_of_trainer(
    State(pool): State<Pool>,
    user: CurrentUser,
    Path(profile_id): Path<Uuid>,
) -> Result<Json<Vec<TeamNode>>, AppError> {
    let mut connection = pool.get().await?;
    let tree = load_tree(&mut connection, user.operator_id()).await?;
    Ok(Json(tree.teams_of(profile_id).into_iter().cloned().collect()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/organization", get(tree))
        .route("/api/trainers/:profile_id/teams", get(teams_of_trainer))
}
