use crate::activity::ActivityLog;
use crate::dashboard::Dashboard;
use crate::error::Result;
use crate::models::Project;
use crate::storage::ProjectRepository;
use crate::user_models::User;
use crate::user_storage::CredentialStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// On-disk form of a [`Dashboard`], used by the CLI between invocations.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub users: Vec<User>,
    pub projects: Vec<Project>,
    #[serde(default)]
    pub activity: ActivityLog,
}

impl Snapshot {
    pub fn capture(dashboard: &Dashboard) -> Self {
        Self {
            users: dashboard.users().list().to_vec(),
            projects: dashboard.projects().list().to_vec(),
            activity: dashboard.activity().clone(),
        }
    }

    pub fn into_dashboard(self, hash_cost: u32) -> Dashboard {
        Dashboard::new(
            CredentialStore::from_users(self.users, hash_cost),
            ProjectRepository::from_projects(self.projects),
        )
        .with_activity(self.activity)
    }
}

/// Loads the dashboard at `path`, or starts a fresh one with the default
/// accounts when no file exists yet.
pub fn load(path: &Path, hash_cost: u32) -> Result<Dashboard> {
    if !path.exists() {
        debug!(path = %path.display(), "no saved state, starting fresh");
        return Dashboard::with_default_accounts(hash_cost);
    }

    let data = fs::read_to_string(path)?;
    let snapshot: Snapshot = serde_json::from_str(&data)?;
    Ok(snapshot.into_dashboard(hash_cost))
}

pub fn save(dashboard: &Dashboard, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&Snapshot::capture(dashboard))?;
    fs::write(path, json)?;
    debug!(path = %path.display(), "state saved");
    Ok(())
}
