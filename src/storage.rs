use crate::error::{DashboardError, Result};
use crate::models::{Document, Project, ProjectStatus, StatusFilter};
use crate::policy;
use crate::user_models::User;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// In-memory collection of projects, in creation order.
#[derive(Debug, Clone, Default)]
pub struct ProjectRepository {
    projects: Vec<Project>,
}

impl ProjectRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_projects(projects: Vec<Project>) -> Self {
        Self { projects }
    }

    pub fn create(
        &mut self,
        name: &str,
        description: &str,
        deadline: NaiveDate,
        created_by: &str,
    ) -> Result<Project> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DashboardError::validation("Project name cannot be empty"));
        }

        let project = Project::new(
            name.to_string(),
            description.trim().to_string(),
            deadline,
            created_by.to_string(),
        );
        self.projects.push(project.clone());

        info!(project_id = %project.id, name, created_by, "project created");
        Ok(project)
    }

    pub fn update_details(
        &mut self,
        id: &str,
        name: &str,
        description: &str,
        deadline: NaiveDate,
    ) -> Result<Project> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DashboardError::validation("Project name cannot be empty"));
        }

        let project = self.get_mut(id)?;
        project.name = name.to_string();
        project.description = description.trim().to_string();
        project.deadline = deadline;

        info!(project_id = %id, "project updated");
        Ok(project.clone())
    }

    pub fn delete(&mut self, id: &str) -> Result<()> {
        let before = self.projects.len();
        self.projects.retain(|p| p.id != id);

        if self.projects.len() == before {
            return Err(DashboardError::project_not_found(id));
        }

        info!(project_id = %id, "project deleted");
        Ok(())
    }

    pub fn mark_completed(&mut self, id: &str) -> Result<()> {
        let project = self.get_mut(id)?;
        if project.status != ProjectStatus::Completed {
            project.status = ProjectStatus::Completed;
            info!(project_id = %id, "project completed");
        }
        Ok(())
    }

    /// Replaces the whole membership set.
    pub fn assign_members(&mut self, id: &str, usernames: BTreeSet<String>) -> Result<()> {
        let project = self.get_mut(id)?;
        info!(project_id = %id, members = usernames.len(), "members assigned");
        project.assigned_members = usernames;
        Ok(())
    }

    pub fn add_document(&mut self, project_id: &str, name: &str, size: u64, uploaded_by: &str) -> Result<Document> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DashboardError::validation("Please select a file to upload"));
        }

        let project = self.get_mut(project_id)?;
        let document = Document::new(name.to_string(), size, uploaded_by.to_string());
        project.documents.push(document.clone());

        info!(project_id, document_id = %document.id, size, "document uploaded");
        Ok(document)
    }

    /// Removes one document. Unknown document ids on an existing project are ignored.
    pub fn remove_document(&mut self, project_id: &str, document_id: &str) -> Result<()> {
        let project = self.get_mut(project_id)?;
        let before = project.documents.len();
        project.documents.retain(|d| d.id != document_id);

        if project.documents.len() == before {
            debug!(project_id, document_id, "document already absent");
        } else {
            info!(project_id, document_id, "document removed");
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&Project> {
        self.projects
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| DashboardError::project_not_found(id))
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Project> {
        self.projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| DashboardError::project_not_found(id))
    }

    pub fn list(&self) -> &[Project] {
        &self.projects
    }

    pub fn list_visible(&self, user: &User) -> Vec<&Project> {
        policy::visible(user, &self.projects)
    }

    pub fn filter_by_status(&self, filter: StatusFilter) -> Vec<&Project> {
        self.projects.iter().filter(|p| filter.matches(p.status)).collect()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}
