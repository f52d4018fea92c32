use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use prettytable::{Cell, Row, Table};
use project_dashboard::config::Config;
use project_dashboard::dashboard::Dashboard;
use project_dashboard::kv::FileStore;
use project_dashboard::models::StatusFilter;
use project_dashboard::session::{SessionManager, SessionSigner};
use project_dashboard::snapshot;
use project_dashboard::user_models::{Role, User};
use project_dashboard::view::{self, DashboardView, ProjectView, ViewKind};
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dashboard")]
#[command(about = "A CLI for the role-based project dashboard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create a new developer account")]
    Signup {
        #[arg(short, long, help = "Username")]
        username: String,

        #[arg(short, long, help = "Password")]
        password: String,
    },

    #[command(about = "Log in to your account")]
    Login {
        #[arg(short, long, help = "Username")]
        username: String,

        #[arg(short, long, help = "Password")]
        password: String,
    },

    #[command(about = "Log out of your account")]
    Logout,

    #[command(about = "Show current user")]
    Whoami,

    #[command(about = "Show your dashboard")]
    Show {
        #[arg(short, long, default_value = "all", help = "Filter: all, active, completed, on-hold")]
        status: StatusFilter,
    },

    #[command(about = "Show the details of a project")]
    Project {
        #[arg(short, long, help = "Project ID")]
        id: String,
    },

    #[command(about = "Create a new project")]
    CreateProject {
        #[arg(short, long, help = "Project name")]
        name: String,

        #[arg(short, long, default_value = "", help = "Project description")]
        description: String,

        #[arg(short = 't', long, help = "Deadline (YYYY-MM-DD)")]
        deadline: String,
    },

    #[command(about = "Edit a project's name, description and deadline")]
    EditProject {
        #[arg(short, long, help = "Project ID")]
        id: String,

        #[arg(short, long, help = "Project name")]
        name: String,

        #[arg(short, long, default_value = "", help = "Project description")]
        description: String,

        #[arg(short = 't', long, help = "Deadline (YYYY-MM-DD)")]
        deadline: String,
    },

    #[command(about = "Delete a project")]
    DeleteProject {
        #[arg(short, long, help = "Project ID")]
        id: String,
    },

    #[command(about = "Mark a project as completed")]
    Complete {
        #[arg(short, long, help = "Project ID")]
        id: String,
    },

    #[command(about = "Replace the developers assigned to a project")]
    Assign {
        #[arg(short, long, help = "Project ID")]
        id: String,

        #[arg(short, long, default_value = "", help = "Developer usernames (comma-separated, empty to clear)")]
        members: String,
    },

    #[command(about = "Attach a document's metadata to a project")]
    Upload {
        #[arg(short, long, help = "Project ID")]
        id: String,

        #[arg(short, long, help = "Path to the document")]
        file: String,
    },

    #[command(about = "Remove a document from a project")]
    RemoveDocument {
        #[arg(short, long, help = "Project ID")]
        id: String,

        #[arg(short, long, help = "Document ID")]
        document_id: String,
    },

    #[command(about = "Add a user (admin only)")]
    AddUser {
        #[arg(short, long, help = "Username")]
        username: String,

        #[arg(short, long, help = "Password")]
        password: String,

        #[arg(short, long, help = "Role: admin, lead or developer")]
        role: Role,
    },

    #[command(about = "Delete a user (admin only)")]
    DeleteUser {
        #[arg(short, long, help = "Username")]
        username: String,
    },

    #[command(about = "Change a user's role (admin only)")]
    SetRole {
        #[arg(short, long, help = "Username")]
        username: String,

        #[arg(short, long, help = "Role: admin, lead or developer")]
        role: Role,
    },

    #[command(about = "Change your password")]
    Passwd {
        #[arg(short, long, help = "Current password")]
        current: String,

        #[arg(short, long, help = "New password")]
        new: String,

        #[arg(short = 'C', long, help = "Confirm new password")]
        confirm: String,
    },

    #[command(about = "Show project and user statistics")]
    Stats,
}

struct Workspace {
    config: Config,
    dashboard: Dashboard,
    sessions: SessionManager<FileStore>,
}

impl Workspace {
    fn open(config: Config) -> Result<Self> {
        let fresh = !config.state_path().exists();
        let dashboard = snapshot::load(&config.state_path(), config.bcrypt_cost)
            .context("Failed to load dashboard state")?;
        let secret = config
            .load_or_create_secret()
            .context("Failed to load session key")?;
        let sessions = SessionManager::new(
            FileStore::new(config.session_path()),
            SessionSigner::new(secret, config.session_ttl()),
        );

        let mut ws = Self {
            config,
            dashboard,
            sessions,
        };
        if fresh && ws.config.seed_demo {
            ws.dashboard
                .seed_sample_projects()
                .context("Failed to seed sample projects")?;
            ws.save()?;
        }
        Ok(ws)
    }

    fn require_login(&mut self) -> Result<User> {
        self.sessions
            .restore(self.dashboard.users())?
            .ok_or_else(|| anyhow::anyhow!("You must be logged in. Use: dashboard login -u <username> -p <password>"))
    }

    fn save(&self) -> Result<()> {
        snapshot::save(&self.dashboard, &self.config.state_path()).context("Failed to save dashboard state")
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run_command(cli.command) {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn run_command(command: Commands) -> Result<()> {
    let config = Config::from_env()?;
    let mut ws = Workspace::open(config)?;

    match command {
        Commands::Signup { username, password } => {
            let user = ws.dashboard.signup(&username, &password)?;
            ws.save()?;
            println!("✅ Account created successfully!");
            println!("👤 Username: {} ({})", user.username, user.role);
            println!("\n💡 You can now log in using: dashboard login -u {} -p <password>", user.username);
        }
        Commands::Login { username, password } => {
            let user = ws.sessions.login(ws.dashboard.users(), &username, &password)?;
            println!("✅ Login successful!");
            println!("👤 Welcome, {} ({})", user.username, user.role);
        }
        Commands::Logout => {
            ws.sessions.logout()?;
            println!("✅ Logged out successfully!");
        }
        Commands::Whoami => match ws.sessions.restore(ws.dashboard.users())? {
            Some(user) => {
                println!("👤 Logged in as: {}", user.username);
                println!("🎭 Role: {}", user.role);
            }
            None => {
                println!("❌ Not logged in");
                println!("💡 Use 'dashboard login -u <username> -p <password>' to log in");
            }
        },
        Commands::Show { status } => {
            let user = ws.require_login()?;
            print_dashboard(&view::render(&ws.dashboard, &user, status));
        }
        Commands::Project { id } => {
            let user = ws.require_login()?;
            print_project(&ws.dashboard, &user, &id)?;
        }
        Commands::CreateProject {
            name,
            description,
            deadline,
        } => {
            let user = ws.require_login()?;
            let project = ws
                .dashboard
                .create_project(&user, &name, &description, &deadline)?;
            ws.save()?;
            println!("✅ Project added successfully!");
            println!("📁 Name: {}", project.name);
            println!("📅 Deadline: {}", project.deadline);
            println!("🆔 Project ID: {}", project.id);
        }
        Commands::EditProject {
            id,
            name,
            description,
            deadline,
        } => {
            let user = ws.require_login()?;
            let project = ws
                .dashboard
                .update_project(&user, &id, &name, &description, &deadline)?;
            ws.save()?;
            println!("✅ Project '{}' updated!", project.name);
        }
        Commands::DeleteProject { id } => {
            let user = ws.require_login()?;
            ws.dashboard.delete_project(&user, &id)?;
            ws.save()?;
            println!("✅ Project deleted successfully!");
        }
        Commands::Complete { id } => {
            let user = ws.require_login()?;
            ws.dashboard.mark_completed(&user, &id)?;
            ws.save()?;
            println!("✅ Project marked as completed!");
        }
        Commands::Assign { id, members } => {
            let user = ws.require_login()?;
            let names: Vec<&str> = members
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            ws.dashboard.assign_members(&user, &id, &names)?;
            ws.save()?;
            println!("✅ Member assignments updated!");
            if names.is_empty() {
                println!("👥 No members assigned");
            } else {
                println!("👥 Members: {}", names.join(", "));
            }
        }
        Commands::Upload { id, file } => {
            let user = ws.require_login()?;
            let (name, size) = document_metadata(&file)?;
            let document = ws.dashboard.upload_document(&user, &id, &name, size)?;
            ws.save()?;
            println!("✅ Document uploaded successfully!");
            println!("📄 Name: {}", document.name);
            println!("📊 Size: {} bytes", document.size);
            println!("🆔 Document ID: {}", document.id);
        }
        Commands::RemoveDocument { id, document_id } => {
            let user = ws.require_login()?;
            ws.dashboard.remove_document(&user, &id, &document_id)?;
            ws.save()?;
            println!("✅ Document removed successfully!");
        }
        Commands::AddUser {
            username,
            password,
            role,
        } => {
            let user = ws.require_login()?;
            let created = ws.dashboard.add_user(&user, &username, &password, role)?;
            ws.save()?;
            println!("✅ User added successfully!");
            println!("👤 {} ({})", created.username, created.role);
        }
        Commands::DeleteUser { username } => {
            let user = ws.require_login()?;
            ws.dashboard.delete_user(&user, &username)?;
            ws.save()?;
            println!("✅ User deleted successfully!");
        }
        Commands::SetRole { username, role } => {
            let user = ws.require_login()?;
            let updated = ws.dashboard.set_role(&user, &username, role)?;
            ws.save()?;
            println!("✅ {} is now a {}", updated.username, updated.role);
        }
        Commands::Passwd {
            current,
            new,
            confirm,
        } => {
            let user = ws.require_login()?;
            ws.dashboard.change_password(&user, &current, &new, &confirm)?;
            ws.save()?;
            ws.sessions.refresh(ws.dashboard.users())?;
            println!("✅ Password changed successfully!");
        }
        Commands::Stats => {
            let user = ws.require_login()?;
            print_statistics(&view::render(&ws.dashboard, &user, StatusFilter::All));
        }
    }

    Ok(())
}

/// Only the name and size of the file are recorded; its bytes are never read.
fn document_metadata(file: &str) -> Result<(String, u64)> {
    let path = Path::new(file);
    if !path.is_file() {
        bail!("Please select a file to upload (not found: {})", file);
    }

    let metadata = fs::metadata(path).context("Failed to read file metadata")?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    Ok((name, metadata.len()))
}

fn print_dashboard(view: &DashboardView) {
    let title = match view.kind {
        ViewKind::Admin => "🛡️  Admin Dashboard",
        ViewKind::Lead => "🧭 Project Lead Dashboard",
        ViewKind::Developer => "💻 Developer Dashboard",
    };
    println!("\n{}", title);
    println!("👤 Welcome, {} ({})\n", view.user.username, view.user.role);

    if view.projects.is_empty() {
        println!("📭 No projects assigned to you yet.");
    } else {
        project_table(&view.projects).printstd();
    }

    if let Some(users) = &view.users {
        println!("\n👥 Users ({})\n", users.len());
        let mut table = Table::new();
        table.add_row(Row::new(vec![Cell::new("Username"), Cell::new("Role")]));
        for user in users {
            table.add_row(Row::new(vec![
                Cell::new(&user.username),
                Cell::new(user.role.as_str()),
            ]));
        }
        table.printstd();
    }

    print_statistics(view);

    if !view.activity.is_empty() {
        println!("\n🕒 Recent Activity");
        for entry in &view.activity {
            println!("   {} - {}", entry.at.format("%Y-%m-%d %H:%M"), entry.message);
        }
    }
    println!();
}

/// Lists full project ids; every id-taking command matches them exactly.
fn project_table(projects: &[ProjectView]) -> Table {
    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("ID"),
        Cell::new("Name"),
        Cell::new("Deadline"),
        Cell::new("Status"),
        Cell::new("Members"),
        Cell::new("Documents"),
        Cell::new("Actions"),
    ]));

    for project in projects {
        let actions: Vec<String> = project.actions.iter().map(|a| a.to_string()).collect();
        table.add_row(Row::new(vec![
            Cell::new(&project.id),
            Cell::new(&project.name),
            Cell::new(&project.deadline.to_string()),
            Cell::new(&project.status.to_string()),
            Cell::new(&project.member_count.to_string()),
            Cell::new(&project.document_count.to_string()),
            Cell::new(&actions.join(", ")),
        ]));
    }
    table
}

fn print_statistics(view: &DashboardView) {
    let stats = &view.statistics;
    println!("\n📊 Statistics");
    println!("   📁 Total projects: {}", stats.total_projects);
    println!("   🚧 Active: {}", stats.active_projects);
    println!("   ✅ Completed: {}", stats.completed_projects);
    println!("   👥 Total users: {}", stats.total_users);

    if let Some(dist) = &view.role_distribution {
        println!("\n🎭 User Role Distribution");
        println!("   Developers: {} users ({}%)", dist.developers.count, dist.developers.percent);
        println!("   Project Leads: {} users ({}%)", dist.project_leads.count, dist.project_leads.percent);
        println!("   Admins: {} users ({}%)", dist.admins.count, dist.admins.percent);
    }
}

fn print_project(dashboard: &Dashboard, user: &User, id: &str) -> Result<()> {
    let detail = view::project_detail(dashboard, user, id)?;

    println!("\n📁 {}", detail.name);
    println!("═══════════════════════════════════════");
    println!("📝 Description: {}", detail.description);
    println!("📅 Deadline: {}", detail.deadline);
    println!("📊 Status: {}", detail.status);
    println!("👤 Created by: {}", detail.created_by);
    if detail.assigned_members.is_empty() {
        println!("👥 Assigned Members: No members assigned");
    } else {
        let members: Vec<&str> = detail.assigned_members.iter().map(String::as_str).collect();
        println!("👥 Assigned Members: {}", members.join(", "));
    }

    println!("\n📚 Project Documents:");
    if detail.documents.is_empty() {
        println!("   No documents uploaded");
    }
    for (i, doc) in detail.documents.iter().enumerate() {
        println!("{}. 📄 {}", i + 1, doc.name);
        println!("   🆔 ID: {}", doc.id);
        println!("   📊 Size: {} bytes", doc.size);
        println!("   ⏰ Uploaded: {} by {}", doc.uploaded_at.format("%Y-%m-%d %H:%M:%S UTC"), doc.uploaded_by);
    }
    println!();

    Ok(())
}
