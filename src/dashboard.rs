//! Application context that owns all dashboard state.
//!
//! Every user action takes the acting [`User`], checks it against the access
//! policy, mutates the owned stores and records an activity entry.

use crate::activity::ActivityLog;
use crate::error::{DashboardError, Result};
use crate::models::{parse_deadline, Document, Project};
use crate::policy::{self, Action};
use crate::storage::ProjectRepository;
use crate::user_models::{Role, User};
use crate::user_storage::CredentialStore;
use std::collections::BTreeSet;
use tracing::info;

pub fn confirm_new_password(new: &str, confirm: &str) -> Result<()> {
    if new != confirm {
        return Err(DashboardError::validation("New passwords do not match"));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    users: CredentialStore,
    projects: ProjectRepository,
    activity: ActivityLog,
}

impl Dashboard {
    pub fn new(users: CredentialStore, projects: ProjectRepository) -> Self {
        Self {
            users,
            projects,
            activity: ActivityLog::new(),
        }
    }

    pub fn with_default_accounts(hash_cost: u32) -> Result<Self> {
        Ok(Self::new(
            CredentialStore::with_default_accounts(hash_cost)?,
            ProjectRepository::new(),
        ))
    }

    pub fn with_activity(mut self, activity: ActivityLog) -> Self {
        self.activity = activity;
        self
    }

    pub fn users(&self) -> &CredentialStore {
        &self.users
    }

    pub fn projects(&self) -> &ProjectRepository {
        &self.projects
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn create_project(&mut self, actor: &User, name: &str, description: &str, deadline: &str) -> Result<Project> {
        policy::require_project_creator(actor)?;
        let deadline = parse_deadline(deadline)?;

        let project = self
            .projects
            .create(name, description, deadline, &actor.username)?;
        self.activity.record(
            &actor.username,
            format!("{} created new project \"{}\"", actor.username, project.name),
        );
        Ok(project)
    }

    pub fn update_project(
        &mut self,
        actor: &User,
        id: &str,
        name: &str,
        description: &str,
        deadline: &str,
    ) -> Result<Project> {
        policy::require(actor, self.projects.get(id)?, Action::Edit)?;
        let deadline = parse_deadline(deadline)?;

        let project = self.projects.update_details(id, name, description, deadline)?;
        self.activity.record(
            &actor.username,
            format!("{} updated project \"{}\"", actor.username, project.name),
        );
        Ok(project)
    }

    pub fn delete_project(&mut self, actor: &User, id: &str) -> Result<()> {
        let project = self.projects.get(id)?;
        policy::require(actor, project, Action::Delete)?;
        let name = project.name.clone();

        self.projects.delete(id)?;
        self.activity
            .record(&actor.username, format!("{} deleted project \"{}\"", actor.username, name));
        Ok(())
    }

    pub fn mark_completed(&mut self, actor: &User, id: &str) -> Result<()> {
        let project = self.projects.get(id)?;
        policy::require(actor, project, Action::MarkCompleted)?;
        if !project.is_active() {
            return Ok(());
        }
        let name = project.name.clone();

        self.projects.mark_completed(id)?;
        self.activity
            .record(&actor.username, format!("{} completed project \"{}\"", actor.username, name));
        Ok(())
    }

    /// Replaces the project's members. Every name must belong to an existing
    /// developer at the time of the call.
    pub fn assign_members<I, S>(&mut self, actor: &User, id: &str, usernames: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        policy::require(actor, self.projects.get(id)?, Action::AssignMembers)?;

        let mut members = BTreeSet::new();
        for name in usernames {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            match self.users.get(name) {
                Some(user) if user.role == Role::Developer => {
                    members.insert(name.to_string());
                }
                Some(user) => {
                    return Err(DashboardError::validation(format!(
                        "'{}' is a {} and cannot be assigned; only developers can",
                        name, user.role
                    )))
                }
                None => return Err(DashboardError::user_not_found(name)),
            }
        }

        let count = members.len();
        self.projects.assign_members(id, members)?;
        let project_name = self.projects.get(id)?.name.clone();
        self.activity.record(
            &actor.username,
            format!(
                "{} assigned {} member(s) to \"{}\"",
                actor.username, count, project_name
            ),
        );
        Ok(())
    }

    pub fn upload_document(&mut self, actor: &User, project_id: &str, name: &str, size: u64) -> Result<Document> {
        policy::require(actor, self.projects.get(project_id)?, Action::UploadDocument)?;

        let document = self
            .projects
            .add_document(project_id, name, size, &actor.username)?;
        self.activity.record(
            &actor.username,
            format!("{} uploaded \"{}\"", actor.username, document.name),
        );
        Ok(document)
    }

    pub fn remove_document(&mut self, actor: &User, project_id: &str, document_id: &str) -> Result<()> {
        let project = self.projects.get(project_id)?;
        policy::require(actor, project, Action::RemoveDocument)?;
        let removed = project
            .documents
            .iter()
            .find(|d| d.id == document_id)
            .map(|d| d.name.clone());

        self.projects.remove_document(project_id, document_id)?;
        if let Some(name) = removed {
            self.activity
                .record(&actor.username, format!("{} removed \"{}\"", actor.username, name));
        }
        Ok(())
    }

    pub fn project(&self, actor: &User, id: &str) -> Result<&Project> {
        let project = self.projects.get(id)?;
        policy::require(actor, project, Action::View)?;
        Ok(project)
    }

    pub fn add_user(&mut self, actor: &User, username: &str, password: &str, role: Role) -> Result<User> {
        policy::require_user_manager(actor)?;

        let user = self.users.add_user(username, password, role)?;
        self.record_user_added(actor, &user);
        Ok(user)
    }

    /// [`Dashboard::add_user`] with a password hashed ahead of time.
    pub fn add_hashed_user(&mut self, actor: &User, username: &str, password_hash: String, role: Role) -> Result<User> {
        policy::require_user_manager(actor)?;

        let user = self.users.insert_hashed(username, password_hash, role)?;
        self.record_user_added(actor, &user);
        Ok(user)
    }

    fn record_user_added(&mut self, actor: &User, user: &User) {
        self.activity.record(
            &actor.username,
            format!("{} added {} \"{}\"", actor.username, user.role, user.username),
        );
    }

    pub fn delete_user(&mut self, actor: &User, username: &str) -> Result<()> {
        policy::require_user_manager(actor)?;
        if actor.username == username {
            return Err(DashboardError::SelfDeletion);
        }

        self.users.delete_user(username)?;
        self.activity
            .record(&actor.username, format!("{} deleted user \"{}\"", actor.username, username));
        Ok(())
    }

    pub fn set_role(&mut self, actor: &User, username: &str, role: Role) -> Result<User> {
        policy::require_user_manager(actor)?;
        if actor.username == username {
            return Err(DashboardError::Forbidden(
                "you cannot change your own role".to_string(),
            ));
        }

        let user = self.users.set_role(username, role)?;
        self.activity.record(
            &actor.username,
            format!("{} made \"{}\" a {}", actor.username, username, role),
        );
        Ok(user)
    }

    pub fn change_password(&mut self, actor: &User, current: &str, new: &str, confirm: &str) -> Result<()> {
        confirm_new_password(new, confirm)?;
        self.users.change_password(&actor.username, current, new)
    }

    /// Stores a hash from [`rehash_password`](crate::user_storage::rehash_password)
    /// computed against `previous_hash`.
    pub fn apply_password_change(&mut self, actor: &User, previous_hash: &str, new_hash: String) -> Result<()> {
        self.users
            .replace_password_hash(&actor.username, previous_hash, new_hash)
    }

    /// Self-service registration. New accounts are developers.
    pub fn signup(&mut self, username: &str, password: &str) -> Result<User> {
        let user = self.users.add_user(username, password, Role::Developer)?;
        self.record_signup(&user);
        Ok(user)
    }

    /// [`Dashboard::signup`] with a password hashed ahead of time.
    pub fn signup_hashed(&mut self, username: &str, password_hash: String) -> Result<User> {
        let user = self
            .users
            .insert_hashed(username, password_hash, Role::Developer)?;
        self.record_signup(&user);
        Ok(user)
    }

    fn record_signup(&mut self, user: &User) {
        self.activity
            .record(&user.username, format!("{} signed up", user.username));
    }

    /// Adds the demonstration projects when the repository is empty.
    pub fn seed_sample_projects(&mut self) -> Result<()> {
        if !self.projects.is_empty() {
            return Ok(());
        }

        let game = self.projects.create(
            "Pixel Adventure Game",
            "A 2D pixel art adventure game with RPG elements",
            parse_deadline("2024-06-15")?,
            "admin1",
        )?;
        let members = self
            .users
            .get("dev1")
            .map(|u| BTreeSet::from([u.username.clone()]))
            .unwrap_or_default();
        self.projects.assign_members(&game.id, members)?;
        self.projects
            .add_document(&game.id, "Game Design Document.pdf", 1_024_000, "admin1")?;

        self.projects.create(
            "Mobile Puzzle Game",
            "Casual puzzle game for mobile platforms",
            parse_deadline("2024-08-30")?,
            "lead1",
        )?;

        info!(projects = self.projects.len(), "sample projects seeded");
        Ok(())
    }
}
