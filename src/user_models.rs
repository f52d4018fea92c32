use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Admin,
    #[serde(rename = "Project Lead", alias = "ProjectLead")]
    ProjectLead,
    Developer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::ProjectLead, Role::Developer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::ProjectLead => "Project Lead",
            Role::Developer => "Developer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "admin" => Ok(Role::Admin),
            "projectlead" | "lead" => Ok(Role::ProjectLead),
            "developer" | "dev" => Ok(Role::Developer),
            _ => Err(format!(
                "Unknown role '{}'. Use 'admin', 'lead' or 'developer'",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    /// Bumped on every password change; older session tokens stop resolving.
    #[serde(default)]
    pub session_generation: u32,
}

impl User {
    pub fn new(username: String, password_hash: String, role: Role) -> Self {
        Self {
            username,
            password_hash,
            role,
            created_at: Utc::now(),
            session_generation: 0,
        }
    }
}

/// The parts of a [`User`] a rendering surface is allowed to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}
