use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::DashboardError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectStatus {
    Active,
    Completed,
    /// Part of the status vocabulary, but no operation moves a project here.
    #[serde(rename = "On Hold", alias = "OnHold")]
    OnHold,
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProjectStatus::Active => "Active",
            ProjectStatus::Completed => "Completed",
            ProjectStatus::OnHold => "On Hold",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
    OnHold,
}

impl StatusFilter {
    pub fn matches(&self, status: ProjectStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => status == ProjectStatus::Active,
            StatusFilter::Completed => status == ProjectStatus::Completed,
            StatusFilter::OnHold => status == ProjectStatus::OnHold,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "all" => Ok(StatusFilter::All),
            "active" => Ok(StatusFilter::Active),
            "completed" => Ok(StatusFilter::Completed),
            "on_hold" | "onhold" => Ok(StatusFilter::OnHold),
            _ => Err(format!(
                "Invalid status filter '{}'. Use 'all', 'active', 'completed' or 'on-hold'",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
}

impl Document {
    pub fn new(name: String, size: u64, uploaded_by: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            size,
            uploaded_by,
            uploaded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: String,
    pub deadline: NaiveDate,
    pub status: ProjectStatus,
    #[serde(default)]
    pub assigned_members: BTreeSet<String>,
    #[serde(default)]
    pub documents: Vec<Document>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: String, description: String, deadline: NaiveDate, created_by: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            description,
            deadline,
            status: ProjectStatus::Active,
            assigned_members: BTreeSet::new(),
            documents: Vec::new(),
            created_by,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ProjectStatus::Active
    }

    pub fn has_member(&self, username: &str) -> bool {
        self.assigned_members.contains(username)
    }
}

/// Parses a project deadline in `YYYY-MM-DD` form.
pub fn parse_deadline(input: &str) -> Result<NaiveDate, DashboardError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| {
        DashboardError::validation(format!(
            "Invalid deadline '{}'. Use the YYYY-MM-DD format (e.g., 2025-01-01)",
            input
        ))
    })
}
