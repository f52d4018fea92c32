//! Runtime configuration read from `DASHBOARD_*` environment variables.

use crate::error::{DashboardError, Result};
use chrono::Duration;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_DATA_DIR: &str = ".dashboard";
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
/// Ten years.
pub const MAX_SESSION_TTL_HOURS: i64 = 87_600;

const STATE_FILE: &str = "state.json";
const SESSION_FILE: &str = "session.json";
const SECRET_FILE: &str = "session.key";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub session_secret: Option<String>,
    pub session_ttl_hours: i64,
    pub bcrypt_cost: u32,
    pub seed_demo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            session_secret: None,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            seed_demo: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(addr) = lookup("DASHBOARD_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(dir) = lookup("DASHBOARD_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        config.session_secret = lookup("DASHBOARD_SESSION_SECRET").filter(|s| !s.is_empty());

        if let Some(hours) = lookup("DASHBOARD_SESSION_TTL_HOURS") {
            config.session_ttl_hours = match hours.trim().parse::<i64>() {
                Ok(h) if (1..=MAX_SESSION_TTL_HOURS).contains(&h) => h,
                _ => {
                    return Err(DashboardError::validation(format!(
                        "DASHBOARD_SESSION_TTL_HOURS must be between 1 and {} hours, got '{}'",
                        MAX_SESSION_TTL_HOURS, hours
                    )))
                }
            };
        }
        if let Some(cost) = lookup("DASHBOARD_BCRYPT_COST") {
            config.bcrypt_cost = match cost.trim().parse::<u32>() {
                Ok(c) if (4..=31).contains(&c) => c,
                _ => {
                    return Err(DashboardError::validation(format!(
                        "DASHBOARD_BCRYPT_COST must be between 4 and 31, got '{}'",
                        cost
                    )))
                }
            };
        }
        if let Some(seed) = lookup("DASHBOARD_SEED_DEMO") {
            config.seed_demo = matches!(seed.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }

        Ok(config)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::hours(self.session_ttl_hours)
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(STATE_FILE)
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join(SESSION_FILE)
    }

    pub fn secret_path(&self) -> PathBuf {
        self.data_dir.join(SECRET_FILE)
    }

    /// The configured secret, or one persisted in the data directory.
    pub fn load_or_create_secret(&self) -> Result<String> {
        if let Some(secret) = &self.session_secret {
            return Ok(secret.clone());
        }
        load_or_create_secret_file(&self.secret_path())
    }

    /// The configured secret, or a fresh one that lives only as long as the process.
    pub fn secret_or_ephemeral(&self) -> String {
        self.session_secret.clone().unwrap_or_else(random_secret)
    }
}

fn random_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn load_or_create_secret_file(path: &Path) -> Result<String> {
    if path.exists() {
        let secret = fs::read_to_string(path)?;
        let secret = secret.trim();
        if !secret.is_empty() {
            return Ok(secret.to_string());
        }
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let secret = random_secret();
    fs::write(path, &secret)?;
    info!(path = %path.display(), "created session signing key");
    Ok(secret)
}
