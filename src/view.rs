//! Renderer-agnostic view models.
//!
//! [`render`] picks the role view for a user and derives statistics from the
//! current dashboard state. Surfaces call it again after every mutation.

use crate::activity::ActivityEntry;
use crate::dashboard::Dashboard;
use crate::error::Result;
use crate::models::{Document, Project, ProjectStatus, StatusFilter};
use crate::policy::{self, Action};
use crate::user_models::{Role, User, UserSummary};
use crate::user_storage::CredentialStore;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Admin,
    Lead,
    Developer,
}

impl From<Role> for ViewKind {
    fn from(role: Role) -> Self {
        match role {
            Role::Admin => ViewKind::Admin,
            Role::ProjectLead => ViewKind::Lead,
            Role::Developer => ViewKind::Developer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub deadline: NaiveDate,
    pub status: ProjectStatus,
    pub created_by: String,
    pub member_count: usize,
    pub document_count: usize,
    pub actions: Vec<Action>,
}

impl ProjectView {
    fn new(project: &Project, user: &User) -> Self {
        Self {
            id: project.id.clone(),
            name: project.name.clone(),
            description: project.description.clone(),
            deadline: project.deadline,
            status: project.status,
            created_by: project.created_by.clone(),
            member_count: project.assigned_members.len(),
            document_count: project.documents.len(),
            actions: policy::permitted_actions(user.role, project, &user.username),
        }
    }
}

/// Everything the "view details" panel shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDetail {
    pub id: String,
    pub name: String,
    pub description: String,
    pub deadline: NaiveDate,
    pub status: ProjectStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub assigned_members: BTreeSet<String>,
    pub documents: Vec<Document>,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoleShare {
    pub count: usize,
    pub percent: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoleDistribution {
    pub admins: RoleShare,
    pub project_leads: RoleShare,
    pub developers: RoleShare,
}

impl RoleDistribution {
    pub fn from_users(users: &CredentialStore) -> Self {
        let counts = users.count_by_role();
        let total = users.len();
        let share = |role: Role| {
            let count = counts.get(&role).copied().unwrap_or(0);
            RoleShare {
                count,
                percent: percent(count, total),
            }
        };

        Self {
            admins: share(Role::Admin),
            project_leads: share(Role::ProjectLead),
            developers: share(Role::Developer),
        }
    }
}

fn percent(count: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((count as f64 / total as f64) * 100.0).round() as u32
}

/// Aggregate counts. Zero is reported as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_projects: usize,
    pub active_projects: usize,
    pub completed_projects: usize,
    pub on_hold_projects: usize,
    pub total_users: usize,
}

impl Statistics {
    pub fn compute<'a, I>(projects: I, total_users: usize) -> Self
    where
        I: IntoIterator<Item = &'a Project>,
    {
        let mut stats = Statistics {
            total_projects: 0,
            active_projects: 0,
            completed_projects: 0,
            on_hold_projects: 0,
            total_users,
        };
        for project in projects {
            stats.total_projects += 1;
            match project.status {
                ProjectStatus::Active => stats.active_projects += 1,
                ProjectStatus::Completed => stats.completed_projects += 1,
                ProjectStatus::OnHold => stats.on_hold_projects += 1,
            }
        }
        stats
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub kind: ViewKind,
    pub user: UserSummary,
    pub filter: StatusFilter,
    pub projects: Vec<ProjectView>,
    pub statistics: Statistics,
    /// Present only in the admin view.
    pub users: Option<Vec<UserSummary>>,
    pub role_distribution: Option<RoleDistribution>,
    pub activity: Vec<ActivityEntry>,
}

/// Builds the role-specific view for `user`.
///
/// Statistics cover every project visible to the user; `filter` only narrows
/// the listed projects.
pub fn render(dashboard: &Dashboard, user: &User, filter: StatusFilter) -> DashboardView {
    let visible = dashboard.projects().list_visible(user);
    let kind = ViewKind::from(user.role);
    let users = dashboard.users();

    let statistics = Statistics::compute(visible.iter().copied(), users.len());
    let projects: Vec<ProjectView> = visible
        .iter()
        .filter(|p| filter.matches(p.status))
        .map(|p| ProjectView::new(p, user))
        .collect();

    let (user_list, role_distribution) = if kind == ViewKind::Admin {
        (
            Some(users.list().iter().map(UserSummary::from).collect()),
            Some(RoleDistribution::from_users(users)),
        )
    } else {
        (None, None)
    };

    debug!(
        username = %user.username,
        view = ?kind,
        projects = projects.len(),
        "rendered dashboard"
    );

    DashboardView {
        kind,
        user: UserSummary::from(user),
        filter,
        projects,
        statistics,
        users: user_list,
        role_distribution,
        activity: dashboard.activity().entries().cloned().collect(),
    }
}

pub fn project_detail(dashboard: &Dashboard, user: &User, id: &str) -> Result<ProjectDetail> {
    let project = dashboard.project(user, id)?;
    Ok(ProjectDetail {
        id: project.id.clone(),
        name: project.name.clone(),
        description: project.description.clone(),
        deadline: project.deadline,
        status: project.status,
        created_by: project.created_by.clone(),
        created_at: project.created_at,
        assigned_members: project.assigned_members.clone(),
        documents: project.documents.clone(),
        actions: policy::permitted_actions(user.role, project, &user.username),
    })
}
