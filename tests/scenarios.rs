use project_dashboard::dashboard::Dashboard;
use project_dashboard::kv::MemoryStore;
use project_dashboard::models::{ProjectStatus, StatusFilter};
use project_dashboard::session::{SessionManager, SessionSigner};
use project_dashboard::user_models::Role;
use project_dashboard::view;
use project_dashboard::DashboardError;

const TEST_COST: u32 = 4;

fn sessions() -> SessionManager<MemoryStore> {
    SessionManager::new(
        MemoryStore::new(),
        SessionSigner::new("scenario-secret", chrono::Duration::hours(1)),
    )
}

#[test]
fn admin_creates_completes_and_deletes_a_project() {
    let mut dashboard = Dashboard::with_default_accounts(TEST_COST).unwrap();
    let mut sessions = sessions();

    let admin = sessions
        .login(dashboard.users(), "admin1", "Admin@123")
        .unwrap();
    assert_eq!(admin.role, Role::Admin);

    let before = dashboard.projects().len();
    let project = dashboard
        .create_project(&admin, "Demo", "d", "2025-01-01")
        .unwrap();
    assert_eq!(dashboard.projects().len(), before + 1);
    assert_eq!(project.status, ProjectStatus::Active);

    dashboard.mark_completed(&admin, &project.id).unwrap();
    assert_eq!(
        dashboard.projects().get(&project.id).unwrap().status,
        ProjectStatus::Completed
    );

    dashboard.delete_project(&admin, &project.id).unwrap();
    assert_eq!(dashboard.projects().len(), before);
}

#[test]
fn adding_a_duplicate_user_fails_and_changes_nothing() {
    let mut dashboard = Dashboard::with_default_accounts(TEST_COST).unwrap();
    let admin = dashboard.users().get("admin1").unwrap().clone();

    dashboard
        .add_user(&admin, "dev2", "X@1", Role::Developer)
        .unwrap();
    let users_before = dashboard.users().list().to_vec();

    let err = dashboard
        .add_user(&admin, "dev2", "X@1", Role::Developer)
        .unwrap_err();
    assert!(matches!(err, DashboardError::DuplicateUsername(_)));
    assert_eq!(dashboard.users().list(), users_before.as_slice());
}

#[test]
fn assigned_developer_sees_the_project_and_others_do_not() {
    let mut dashboard = Dashboard::with_default_accounts(TEST_COST).unwrap();
    let admin = dashboard.users().get("admin1").unwrap().clone();
    dashboard
        .add_user(&admin, "dev2", "X@1", Role::Developer)
        .unwrap();

    let project = dashboard
        .create_project(&admin, "Demo", "d", "2025-01-01")
        .unwrap();
    dashboard
        .assign_members(&admin, &project.id, ["dev1"])
        .unwrap();

    let dev1 = dashboard.users().get("dev1").unwrap().clone();
    let dev2 = dashboard.users().get("dev2").unwrap().clone();

    let dev1_view = view::render(&dashboard, &dev1, StatusFilter::All);
    assert!(dev1_view.projects.iter().any(|p| p.id == project.id));

    let dev2_view = view::render(&dashboard, &dev2, StatusFilter::All);
    assert!(dev2_view.projects.iter().all(|p| p.id != project.id));

    let admin_view = view::render(&dashboard, &admin, StatusFilter::All);
    assert_eq!(admin_view.projects.len(), dashboard.projects().len());
}

#[test]
fn completion_cannot_be_undone_by_any_operation() {
    let mut dashboard = Dashboard::with_default_accounts(TEST_COST).unwrap();
    let admin = dashboard.users().get("admin1").unwrap().clone();
    let project = dashboard
        .create_project(&admin, "Demo", "d", "2025-01-01")
        .unwrap();
    dashboard.mark_completed(&admin, &project.id).unwrap();

    dashboard
        .update_project(&admin, &project.id, "Renamed", "x", "2026-01-01")
        .unwrap();
    dashboard
        .assign_members(&admin, &project.id, ["dev1"])
        .unwrap();
    let doc = dashboard
        .upload_document(&admin, &project.id, "notes.txt", 3)
        .unwrap();
    dashboard
        .remove_document(&admin, &project.id, &doc.id)
        .unwrap();
    dashboard.mark_completed(&admin, &project.id).unwrap();

    assert_eq!(
        dashboard.projects().get(&project.id).unwrap().status,
        ProjectStatus::Completed
    );
}

#[test]
fn session_restores_across_manager_instances() {
    let dashboard = Dashboard::with_default_accounts(TEST_COST).unwrap();
    let mut first = sessions();
    first.login(dashboard.users(), "lead1", "Lead@123").unwrap();

    let mut second = SessionManager::new(
        first.store().clone(),
        SessionSigner::new("scenario-secret", chrono::Duration::hours(1)),
    );
    let restored = second.restore(dashboard.users()).unwrap().unwrap();
    assert_eq!(restored.username, "lead1");
    assert_eq!(restored.role, Role::ProjectLead);

    second.logout().unwrap();
    assert!(second.current().is_none());
}

#[test]
fn lead_view_lists_only_own_projects() {
    let mut dashboard = Dashboard::with_default_accounts(TEST_COST).unwrap();
    dashboard.seed_sample_projects().unwrap();
    let lead = dashboard.users().get("lead1").unwrap().clone();

    let view = view::render(&dashboard, &lead, StatusFilter::All);
    assert_eq!(view.projects.len(), 1);
    assert_eq!(view.projects[0].name, "Mobile Puzzle Game");
    assert_eq!(view.statistics.total_projects, 1);
}
