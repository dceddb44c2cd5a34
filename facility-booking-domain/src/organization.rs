use std::collections::HashMap;

use itertools::Itertools;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Club {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Department {
    pub id: Uuid,
    pub club_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Team {
    pub id: Uuid,
    pub department_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Copy)]
pub struct TrainerAssignment {
    pub team_id: Uuid,
    pub profile_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamNode {
    pub id: Uuid,
    pub name: String,
    pub trainer_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentNode {
    pub id: Uuid,
    pub name: String,
    pub teams: Vec<TeamNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubNode {
    pub id: Uuid,
    pub name: String,
    pub departments: Vec<DepartmentNode>,
}

/// clubs → departments → teams → trainers, every level sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrganizationTree {
    pub clubs: Vec<ClubNode>,
}

impl OrganizationTree {
    #[must_use]
    pub fn build(
        clubs: &[Club],
        departments: &[Department],
        teams: &[Team],
        assignments: &[TrainerAssignment],
    ) -> Self {
        let mut trainers_by_team: HashMap<Uuid, Vec<Uuid>> = assignments
            .iter()
            .map(|assignment| (assignment.team_id, assignment.profile_id))
            .into_group_map();
        let mut teams_by_department: HashMap<Uuid, Vec<&Team>> = teams
            .iter()
            .into_group_map_by(|team| team.department_id);
        let mut departments_by_club: HashMap<Uuid, Vec<&Department>> = departments
            .iter()
            .into_group_map_by(|department| department.club_id);

        let clubs = clubs
            .iter()
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .map(|club| ClubNode {
                id: club.id,
                name: club.name.clone(),
                departments: departments_by_club
                    .remove(&club.id)
                    .unwrap_or_default()
                    .into_iter()
                    .sorted_by(|a, b| a.name.cmp(&b.name))
                    .map(|department| DepartmentNode {
                        id: department.id,
                        name: department.name.clone(),
                        teams: teams_by_department
                            .remove(&department.id)
                            .unwrap_or_default()
                            .into_iter()
                            .sorted_by(|a, b| a.name.cmp(&b.name))
                            .map(|team| TeamNode {
                                id: team.id,
                                name: team.name.clone(),
                                trainer_ids: trainers_by_team
                                    .remove(&team.id)
                                    .unwrap_or_default()
                                    .into_iter()
                                    .sorted()
                                    .dedup()
                                    .collect(),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        let orphans = departments_by_club.values().map(Vec::len).sum::<usize>()
            + teams_by_department.values().map(Vec::len).sum::<usize>()
            + trainers_by_team.values().map(Vec::len).sum::<usize>();
        if orphans > 0 {
            warn!("dropped {orphans} organization entries with unknown parents");
        }

        Self { clubs }
    }

    /// Teams a trainer is assigned to.
    #[must_use]
    pub fn teams_of(&self, profile_id: Uuid) -> Vec<&TeamNode> {
        self.clubs
            .iter()
            .flat_map(|club| &club.departments)
            .flat_map(|department| &department.teams)
            .filter(|team| team.trainer_ids.contains(&profile_id))
            .collect()
    }
}
