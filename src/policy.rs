//! Role-based access rules.
//!
//! Everything here is a pure function of the acting user and the project under
//! consideration. Nothing is cached; callers re-evaluate on every render.
//!
//! | Role         | Visible projects            | Actions                                   |
//! |--------------|-----------------------------|-------------------------------------------|
//! | Admin        | all                         | all                                       |
//! | Project Lead | `created_by == username`    | view, assign, upload, remove, complete    |
//! | Developer    | `username ∈ assigned_members` | view                                    |

use crate::error::{DashboardError, Result};
use crate::models::Project;
use crate::user_models::{Role, User};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Edit,
    AssignMembers,
    UploadDocument,
    RemoveDocument,
    MarkCompleted,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::View => "view",
            Action::Edit => "edit",
            Action::AssignMembers => "assign members",
            Action::UploadDocument => "upload document",
            Action::RemoveDocument => "remove document",
            Action::MarkCompleted => "mark complete",
            Action::Delete => "delete",
        })
    }
}

/// Whether `username` with `role` can see `project` at all.
pub fn can_view(role: Role, project: &Project, username: &str) -> bool {
    match role {
        Role::Admin => true,
        Role::ProjectLead => project.created_by == username,
        Role::Developer => project.has_member(username),
    }
}

/// Every action a role may take on a project it can see, regardless of status.
pub fn role_actions(role: Role) -> &'static [Action] {
    match role {
        Role::Admin => &[
            Action::View,
            Action::Edit,
            Action::AssignMembers,
            Action::UploadDocument,
            Action::RemoveDocument,
            Action::MarkCompleted,
            Action::Delete,
        ],
        Role::ProjectLead => &[
            Action::View,
            Action::AssignMembers,
            Action::UploadDocument,
            Action::RemoveDocument,
            Action::MarkCompleted,
        ],
        Role::Developer => &[Action::View],
    }
}

/// Actions offered to the user on this project, in display order.
///
/// Empty when the project is not visible to the user. Completing is only
/// offered while the project is still active.
pub fn permitted_actions(role: Role, project: &Project, username: &str) -> Vec<Action> {
    if !can_view(role, project, username) {
        return Vec::new();
    }

    role_actions(role)
        .iter()
        .copied()
        .filter(|a| *a != Action::MarkCompleted || project.is_active())
        .collect()
}

/// Checks `action` and maps a denial to an error.
///
/// A project the user cannot see is reported as missing so its existence is
/// not leaked.
pub fn require(user: &User, project: &Project, action: Action) -> Result<()> {
    if !can_view(user.role, project, &user.username) {
        return Err(DashboardError::project_not_found(&project.id));
    }
    if role_actions(user.role).contains(&action) {
        Ok(())
    } else {
        Err(DashboardError::Forbidden(format!(
            "{} cannot {} on project '{}'",
            user.role, action, project.name
        )))
    }
}

pub fn visible<'a, I>(user: &User, projects: I) -> Vec<&'a Project>
where
    I: IntoIterator<Item = &'a Project>,
{
    projects
        .into_iter()
        .filter(|p| can_view(user.role, p, &user.username))
        .collect()
}

pub fn can_create_project(user: &User) -> bool {
    matches!(user.role, Role::Admin | Role::ProjectLead)
}

pub fn can_manage_users(user: &User) -> bool {
    user.role == Role::Admin
}

pub fn require_project_creator(user: &User) -> Result<()> {
    if can_create_project(user) {
        Ok(())
    } else {
        Err(DashboardError::Forbidden(format!(
            "{} cannot create projects",
            user.role
        )))
    }
}

pub fn require_user_manager(user: &User) -> Result<()> {
    if can_manage_users(user) {
        Ok(())
    } else {
        Err(DashboardError::Forbidden(format!(
            "{} cannot manage users",
            user.role
        )))
    }
}
