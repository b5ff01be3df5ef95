use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

mod api;
mod config;
mod dashboard;
mod export;
mod models;
mod report;
mod session;
mod totals;

use api::ApiClient;
use config::{Config, DEFAULT_API_BASE};
use dashboard::Dashboard;
use session::{FileStorage, SessionStore};

#[derive(Parser)]
#[command(name = "teacher-insights")]
#[command(about = "Principal dashboard for teacher activity insights", long_about = None)]
struct Cli {
    /// Base URL of the teacher metrics API
    #[arg(long, global = true, env = "TEACHER_INSIGHTS_API_BASE_URL", default_value = DEFAULT_API_BASE)]
    api_base: String,
    /// File holding the signed-in session
    #[arg(long, global = true, env = "TEACHER_INSIGHTS_SESSION_FILE")]
    session_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with an admin account
    Login {
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, env = "TEACHER_INSIGHTS_PASSWORD", default_value = "", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List teachers in the current summary
    Teachers,
    /// Print the dashboard
    Dashboard {
        #[arg(long)]
        teacher: Option<String>,
    },
    /// Write the dashboard as a markdown report
    Report {
        #[arg(long)]
        teacher: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export a teacher's weekly series or breakdown as CSV
    Export {
        #[arg(long)]
        teacher: String,
        #[arg(long, value_enum, default_value_t = export::ExportKind::Weekly)]
        kind: export::ExportKind,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Restores the session and loads the summary plus the requested teacher.
async fn load(
    dashboard: &mut Dashboard<FileStorage>,
    api: &ApiClient,
    teacher: Option<String>,
) -> bool {
    dashboard.restore();
    if !dashboard::refresh_summary(dashboard, api).await {
        return false;
    }
    if teacher.is_some() && dashboard.is_authenticated() {
        dashboard::load_teacher(dashboard, api, teacher).await;
    }
    log::debug!(
        "dashboard {:?}, teacher data {:?}",
        dashboard.phase(),
        dashboard.teacher_phase()
    );
    dashboard.is_authenticated()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = Config::new(&cli.api_base, cli.session_file);
    log::debug!(
        "using API {} and session file {}",
        config.api_base,
        config.session_file.display()
    );

    let api = ApiClient::new(&config.api_base)?;
    let mut dashboard = Dashboard::new(SessionStore::new(FileStorage::new(&config.session_file)));

    match cli.command {
        Commands::Login { email, password } => {
            dashboard.restore();
            if !dashboard::login(&mut dashboard, &api, &email, &password).await {
                let message = dashboard
                    .auth_error()
                    .unwrap_or(dashboard::SIGN_IN_FAILED)
                    .to_string();
                anyhow::bail!(message);
            }
            let email = dashboard
                .user()
                .and_then(|user| user.email.as_deref())
                .unwrap_or(email.trim());
            println!("Signed in as {email}.");
        }
        Commands::Logout => {
            dashboard.sign_out();
            println!("Signed out.");
        }
        Commands::Whoami => {
            dashboard.restore();
            if !dashboard.is_authenticated() {
                println!("Not signed in.");
                return Ok(());
            }
            let user = dashboard.user();
            println!(
                "{} ({})",
                user.and_then(|u| u.email.as_deref()).unwrap_or("Principal"),
                user.and_then(|u| u.role.as_deref()).unwrap_or("admin")
            );
        }
        Commands::Teachers => {
            if load(&mut dashboard, &api, None).await {
                if let Some(error) = dashboard.error() {
                    println!("> {error}");
                }
                print!(
                    "{}",
                    report::render_teacher_selector(dashboard.teachers(), None)
                );
            } else {
                print!("{}", report::build_report(&dashboard));
            }
        }
        Commands::Dashboard { teacher } => {
            load(&mut dashboard, &api, teacher).await;
            print!("{}", report::build_report(&dashboard));
        }
        Commands::Report { teacher, out } => {
            if !load(&mut dashboard, &api, teacher).await {
                print!("{}", report::build_report(&dashboard));
                return Ok(());
            }
            std::fs::write(&out, report::build_report(&dashboard))
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { teacher, kind, out } => {
            if !load(&mut dashboard, &api, Some(teacher)).await {
                print!("{}", report::build_report(&dashboard));
                return Ok(());
            }
            if let Some(error) = dashboard.error() {
                anyhow::bail!(error.to_string());
            }
            let weekly = dashboard.weekly();
            let details = dashboard.details();
            match out {
                Some(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    let rows = export::write_csv(file, kind, weekly, details)?;
                    println!("Exported {rows} rows to {}.", path.display());
                }
                None => {
                    export::write_csv(std::io::stdout().lock(), kind, weekly, details)?;
                }
            }
        }
    }

    Ok(())
}
