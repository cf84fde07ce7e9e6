use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use peopledesk::{api, report};
use peopledesk_core::maintenance::{
    ChecklistProgress, Projection, RebuildOptions, Rebuilder, SurveyResponses,
};
use peopledesk_core::{Config, Database};

#[derive(Parser)]
#[command(name = "pdesk")]
#[command(about = "Maintenance tooling for the PeopleDesk HR database")]
struct Cli {
    /// Path to the SQLite database (defaults to the platform data directory)
    #[arg(long, global = true, env = "PEOPLEDESK_DB")]
    db: Option<PathBuf>,

    /// How long to wait for another writer's lock, in milliseconds
    #[arg(long, global = true, env = "PEOPLEDESK_BUSY_TIMEOUT_MS")]
    busy_timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update the database schema
    Migrate,
    /// Reconcile checklist progress rows with checklist assignments
    RebuildProgress {
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete survey responses and their answers
    ResetSurveys {
        /// Only reset responses to this survey
        #[arg(long)]
        survey: Option<Uuid>,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show recently committed maintenance runs
    Runs {
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Print the runs as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the admin HTTP API
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "peopledesk=info,peopledesk_core=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(report::exit_code(&err))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::resolve(cli.db, cli.busy_timeout_ms)?;
    let db = Database::open_with(&config)?;

    match cli.command {
        Commands::Migrate => {
            db.migrate()?;
            println!("schema up to date at {}", config.db_path.display());
        }
        Commands::RebuildProgress { dry_run, json } => {
            rebuild(&db, &ChecklistProgress, dry_run, json)?;
        }
        Commands::ResetSurveys {
            survey,
            dry_run,
            json,
        } => {
            let projection = SurveyResponses { survey_id: survey };
            rebuild(&db, &projection, dry_run, json)?;
        }
        Commands::Runs { limit, json } => {
            let runs = db.get_recent_runs(limit)?;
            println!("{}", report::render_runs(&runs, json)?);
        }
        Commands::Serve { port } => {
            db.migrate()?;
            let app = api::create_router(db);

            let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
            tracing::info!("PeopleDesk admin API listening on http://127.0.0.1:{}", port);

            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

fn rebuild(
    db: &Database,
    projection: &dyn Projection,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<()> {
    let outcome = Rebuilder::new(db).run(projection, RebuildOptions { dry_run })?;
    println!("{}", report::render_report(&outcome, json)?);
    Ok(())
}
