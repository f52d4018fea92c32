//! JSON HTTP surface over the dashboard.
//!
//! Clients log in once and send the returned token as `Authorization: Bearer`.
//! The dashboard and the revoked-token set are each behind their own lock.

use crate::dashboard::{self, Dashboard};
use crate::error::DashboardError;
use crate::models::{Document, Project, StatusFilter};
use crate::policy;
use crate::session::{SessionClaims, SessionSigner};
use crate::user_models::{Role, User, UserSummary};
use crate::user_storage::{hash_password, rehash_password, verify_password};
use crate::view::{self, DashboardView, ProjectDetail};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

pub struct AppState {
    pub dashboard: RwLock<Dashboard>,
    pub signer: SessionSigner,
    /// Logged-out tokens and when they would have expired anyway.
    revoked: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl AppState {
    pub fn new(dashboard: Dashboard, signer: SessionSigner) -> Self {
        Self {
            dashboard: RwLock::new(dashboard),
            signer,
            revoked: RwLock::new(HashMap::new()),
        }
    }

    /// Revokes `token`, dropping entries that have expired since.
    async fn revoke(&self, token: String, expires_at: DateTime<Utc>) {
        let now = Utc::now();
        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, expiry| *expiry > now);
        revoked.insert(token, expires_at);
    }

    async fn is_revoked(&self, token: &str) -> bool {
        self.revoked.read().await.contains_key(token)
    }
}

pub struct ApiError(DashboardError);

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        Self(err)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DashboardError::InvalidCredentials | DashboardError::SessionInvalid(_) => StatusCode::UNAUTHORIZED,
            DashboardError::Forbidden(_) | DashboardError::SelfDeletion => StatusCode::FORBIDDEN,
            DashboardError::NotFound { .. } => StatusCode::NOT_FOUND,
            DashboardError::DuplicateUsername(_) => StatusCode::CONFLICT,
            DashboardError::WrongOldPassword | DashboardError::ValidationFailure(_) => StatusCode::BAD_REQUEST,
            DashboardError::Storage(_)
            | DashboardError::Serialization(_)
            | DashboardError::PasswordHash(_)
            | DashboardError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            warn!(error = %self.0, "request failed");
        }

        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub deadline: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssignMembersRequest {
    pub members: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadDocumentRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddUserRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/dashboard", get(get_dashboard))
        .route("/projects", post(create_project))
        .route(
            "/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/projects/:id/complete", post(complete_project))
        .route("/projects/:id/members", put(assign_members))
        .route("/projects/:id/documents", post(upload_document))
        .route("/projects/:id/documents/:document_id", delete(remove_document))
        .route("/users", post(add_user))
        .route("/users/:username", delete(delete_user))
        .route("/users/:username/role", put(set_role))
        .route("/account/password", post(change_password))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn bearer_token(headers: &HeaderMap) -> ApiResult<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError(DashboardError::SessionInvalid("missing bearer token".to_string())))
}

/// Runs bcrypt work on the blocking pool, outside any dashboard lock.
async fn run_blocking<T, F>(task: F) -> ApiResult<T>
where
    F: FnOnce() -> crate::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| DashboardError::Internal(format!("password task failed: {}", err)))?
        .map_err(ApiError::from)
}

/// Resolves the request's token to its claims and the account it was issued for.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> ApiResult<(String, SessionClaims, User)> {
    let token = bearer_token(headers)?;
    if state.is_revoked(&token).await {
        return Err(DashboardError::SessionInvalid("session has been logged out".to_string()).into());
    }

    let claims = state.signer.verify(&token)?;
    let user = claims.resolve(state.dashboard.read().await.users())?.clone();
    Ok((token, claims, user))
}

async fn current_user(state: &AppState, headers: &HeaderMap) -> ApiResult<User> {
    let (_, _, user) = authenticate(state, headers).await?;
    Ok(user)
}

async fn signup(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CredentialsRequest>,
) -> ApiResult<(StatusCode, Json<UserSummary>)> {
    let cost = {
        let dashboard = state.dashboard.read().await;
        dashboard.users().check_available(&payload.username)?;
        dashboard.users().hash_cost()
    };

    let password = payload.password;
    let password_hash = run_blocking(move || hash_password(&password, cost)).await?;
    let user = state
        .dashboard
        .write()
        .await
        .signup_hashed(&payload.username, password_hash)?;
    Ok((StatusCode::CREATED, Json(UserSummary::from(&user))))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CredentialsRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let candidate = state
        .dashboard
        .read()
        .await
        .users()
        .get(&payload.username)
        .cloned();

    let password = payload.password;
    let user = run_blocking(move || {
        Ok(candidate.filter(|user| verify_password(&password, &user.password_hash)))
    })
    .await?
    .ok_or_else(|| {
        warn!(username = %payload.username, "login rejected");
        DashboardError::InvalidCredentials
    })?;

    let token = state.signer.issue(&user)?;
    info!(username = %user.username, role = %user.role, "logged in");

    Ok(Json(LoginResponse {
        token,
        user: UserSummary::from(&user),
    }))
}

async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<StatusCode> {
    let (token, claims, user) = authenticate(&state, &headers).await?;
    state.revoke(token, claims.expires_at).await;
    info!(username = %user.username, "logged out");
    Ok(StatusCode::NO_CONTENT)
}

async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Json<DashboardView>> {
    let user = current_user(&state, &headers).await?;
    let filter = match query.status {
        Some(status) => status
            .parse::<StatusFilter>()
            .map_err(DashboardError::ValidationFailure)?,
        None => StatusFilter::All,
    };

    let dashboard = state.dashboard.read().await;
    Ok(Json(view::render(&dashboard, &user, filter)))
}

async fn create_project(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<ProjectRequest>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let user = current_user(&state, &headers).await?;
    let project = state.dashboard.write().await.create_project(
        &user,
        &payload.name,
        &payload.description,
        &payload.deadline,
    )?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn get_project(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<ProjectDetail>> {
    let user = current_user(&state, &headers).await?;
    let dashboard = state.dashboard.read().await;
    Ok(Json(view::project_detail(&dashboard, &user, &id)?))
}

async fn update_project(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<ProjectRequest>,
) -> ApiResult<Json<Project>> {
    let user = current_user(&state, &headers).await?;
    let project = state.dashboard.write().await.update_project(
        &user,
        &id,
        &payload.name,
        &payload.description,
        &payload.deadline,
    )?;
    Ok(Json(project))
}

async fn delete_project(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let user = current_user(&state, &headers).await?;
    state.dashboard.write().await.delete_project(&user, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn complete_project(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<ProjectDetail>> {
    let user = current_user(&state, &headers).await?;
    let mut dashboard = state.dashboard.write().await;
    dashboard.mark_completed(&user, &id)?;
    Ok(Json(view::project_detail(&dashboard, &user, &id)?))
}

async fn assign_members(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<AssignMembersRequest>,
) -> ApiResult<Json<ProjectDetail>> {
    let user = current_user(&state, &headers).await?;
    let mut dashboard = state.dashboard.write().await;
    dashboard.assign_members(&user, &id, &payload.members)?;
    Ok(Json(view::project_detail(&dashboard, &user, &id)?))
}

async fn upload_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<UploadDocumentRequest>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let user = current_user(&state, &headers).await?;
    let document = state
        .dashboard
        .write()
        .await
        .upload_document(&user, &id, &payload.name, payload.size)?;
    Ok((StatusCode::CREATED, Json(document)))
}

async fn remove_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((id, document_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let user = current_user(&state, &headers).await?;
    state
        .dashboard
        .write()
        .await
        .remove_document(&user, &id, &document_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<AddUserRequest>,
) -> ApiResult<(StatusCode, Json<UserSummary>)> {
    let user = current_user(&state, &headers).await?;
    policy::require_user_manager(&user)?;
    let cost = {
        let dashboard = state.dashboard.read().await;
        dashboard.users().check_available(&payload.username)?;
        dashboard.users().hash_cost()
    };

    let password = payload.password;
    let password_hash = run_blocking(move || hash_password(&password, cost)).await?;
    let created = state.dashboard.write().await.add_hashed_user(
        &user,
        &payload.username,
        password_hash,
        payload.role,
    )?;
    Ok((StatusCode::CREATED, Json(UserSummary::from(&created))))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> ApiResult<StatusCode> {
    let user = current_user(&state, &headers).await?;
    state.dashboard.write().await.delete_user(&user, &username)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_role(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(username): Path<String>,
    Json(payload): Json<SetRoleRequest>,
) -> ApiResult<Json<UserSummary>> {
    let user = current_user(&state, &headers).await?;
    let updated = state
        .dashboard
        .write()
        .await
        .set_role(&user, &username, payload.role)?;
    Ok(Json(UserSummary::from(&updated)))
}

/// Existing tokens for the account stop working once the password changes.
async fn change_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    let user = current_user(&state, &headers).await?;
    dashboard::confirm_new_password(&payload.new_password, &payload.confirm_password)?;
    let cost = state.dashboard.read().await.users().hash_cost();

    let previous_hash = user.password_hash.clone();
    let ChangePasswordRequest {
        current_password,
        new_password,
        ..
    } = payload;
    let new_hash = run_blocking(move || {
        rehash_password(&previous_hash, &current_password, &new_password, cost)
    })
    .await?;

    state
        .dashboard
        .write()
        .await
        .apply_password_change(&user, &user.password_hash, new_hash)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn revoking_prunes_expired_entries() {
        let dashboard = Dashboard::with_default_accounts(4).unwrap();
        let state = AppState::new(dashboard, SessionSigner::new("secret", Duration::hours(1)));

        state.revoke("stale".into(), Utc::now() - Duration::minutes(1)).await;
        state.revoke("fresh".into(), Utc::now() + Duration::hours(1)).await;

        let revoked = state.revoked.read().await;
        assert_eq!(revoked.len(), 1);
        assert!(revoked.contains_key("fresh"));
    }
}
