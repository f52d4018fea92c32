//! Role-based project dashboard.
//!
//! Users authenticate against a [`user_storage::CredentialStore`], the
//! [`session::SessionManager`] keeps the active user, and
//! [`dashboard::Dashboard`] applies every action through the rules in
//! [`policy`]. [`view::render`] turns the current state into a role-specific
//! view model for whichever surface draws it.

pub mod activity;
pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod kv;
pub mod models;
pub mod policy;
pub mod session;
pub mod snapshot;
pub mod storage;
pub mod user_models;
pub mod user_storage;
pub mod view;

pub use error::{DashboardError, Result};
