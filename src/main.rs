use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hospital_records::{
    config::Config,
    handlers::routes::route_table,
    models::{doctor::NewDoctor, ids::ExternalId},
    repositories::doctor as doctor_repo,
    server::{self, Gateway},
    services::auth,
    state::AppState,
    validation::auth::{validate_password, validate_required},
};

#[derive(Parser, Debug)]
#[command(name = "hospital-records", version, about = "Hospital records backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON API over HTTP (default).
    Serve {
        /// Overrides BIND_ADDR.
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Dispatch one request envelope read from a file.
    Process {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Apply the bundled database schema.
    InitDb,
    /// Create a doctor and their login account.
    AddDoctor {
        #[arg(long)]
        username: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        department: String,
        #[arg(long, env = "DOCTOR_PASSWORD")]
        password: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, default_value = "08:00-17:00")]
        working_hours: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let state = AppState::new(&config).await;

    match cli.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            let gateway = Gateway::new(state, route_table()?);
            tracing::info!("✅ All systems operational");
            server::serve(gateway, bind.unwrap_or(config.bind_addr)).await?;
        }
        Command::Process { input, output } => {
            let gateway = Gateway::new(state.clone(), route_table()?);
            let envelope = server::process_file(&gateway, &input, &output)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            tracing::info!(
                "✅ Response written to {} (code {})",
                output.display(),
                envelope.code
            );
            state.pool.shutdown();
        }
        Command::InitDb => {
            server::init_db(&state.pool).await?;
            state.pool.shutdown();
        }
        Command::AddDoctor {
            username,
            name,
            department,
            password,
            title,
            working_hours,
        } => {
            validate_required("username", &username)?;
            validate_required("name", &name)?;
            validate_required("department", &department)?;
            validate_password(&password)?;

            let new_doctor = NewDoctor {
                username,
                password_hash: auth::hash_password(&password)?,
                name,
                department,
                title,
                working_hours,
            };
            let doctor = doctor_repo::create_with_account(&state.pool, &new_doctor).await?;
            println!("Employee ID: {}", ExternalId::Employee.format(doctor.doctor_id));
            state.pool.shutdown();
        }
    }

    Ok(())
}
