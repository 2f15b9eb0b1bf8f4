use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod config;
mod dashboard;
mod db;
mod error;
mod models;
mod report;
mod summary;

use config::Config;
use dashboard::{DashboardState, GrantSource};
use db::PgGrantStore;
use models::{GrantStatus, Priority};

#[derive(Parser)]
#[command(name = "grant-pipeline")]
#[command(about = "Grant pipeline dashboard for Group Scholar", long_about = None)]
struct Cli {
    /// Postgres connection string
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import grants from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show headline statistics
    Summary {
        #[arg(long)]
        json: bool,
    },
    /// List grants, optionally filtered by status and priority
    List {
        #[arg(long, value_delimiter = ',')]
        status: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        priority: Vec<Priority>,
    },
    /// List grants with deadlines coming up
    Upcoming {
        #[arg(long)]
        window_days: Option<i64>,
    },
    /// Show a single grant
    Show {
        #[arg(long)]
        id: Uuid,
    },
    /// List active templates, most used first
    Templates,
    /// Generate a markdown report
    Report {
        #[arg(long)]
        window_days: Option<i64>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::from_env().context("invalid configuration")?;
    if cli.database_url.is_some() {
        config.database_url = cli.database_url.clone();
    }
    debug!(
        max_connections = config.max_connections,
        window = config.deadline_window_days,
        "configuration loaded"
    );

    let store = PgGrantStore::from_config(&config).context("failed to set up Postgres pool")?;
    let now = Utc::now();

    match cli.command {
        Commands::InitDb => {
            store.init_db().await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            store.seed().await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = store.import_csv(&csv).await?;
            println!("Inserted {inserted} grants from {}.", csv.display());
        }
        Commands::Summary { json } => {
            let state = load_state(&store, now).await?;
            let Some(stats) = state.summary() else {
                return Ok(());
            };

            if json {
                println!("{}", serde_json::to_string_pretty(stats)?);
                return Ok(());
            }

            println!("Grants tracked:      {}", stats.total_grants);
            println!("Active applications: {}", stats.active_applications);
            println!("Requested:           {}", report::format_amount(stats.total_requested));
            println!("Awarded:             {}", report::format_amount(stats.total_awarded));
            println!(
                "Success rate:        {:.1}% ({} of {} decided)",
                stats.success_rate, stats.awarded_count, stats.decided_count
            );
            println!("Due in 30 days:      {}", stats.upcoming_deadlines);
        }
        Commands::List { status, priority } => {
            let state = load_state(&store, now).await?;
            let mut grants: Vec<models::Grant> = state.grants().to_vec();

            if !status.is_empty() {
                let statuses: Vec<GrantStatus> =
                    status.iter().map(|value| GrantStatus::from(value.as_str())).collect();
                grants = summary::filter_by_status(&grants, statuses)
                    .into_iter()
                    .cloned()
                    .collect();
            }
            if !priority.is_empty() {
                grants = summary::filter_by_priority(&grants, priority)
                    .into_iter()
                    .cloned()
                    .collect();
            }

            if grants.is_empty() {
                println!("No grants match these filters.");
                return Ok(());
            }

            for grant in &grants {
                print_grant_line(grant);
            }
        }
        Commands::Upcoming { window_days } => {
            let window_days = window_days.unwrap_or(config.deadline_window_days);
            let state = load_state(&store, now).await?;
            let upcoming = summary::upcoming_deadlines(state.grants(), now, window_days);

            if upcoming.is_empty() {
                println!("No deadlines in the next {window_days} days.");
                return Ok(());
            }

            println!("Deadlines in the next {window_days} days:");
            for grant in upcoming {
                print_grant_line(grant);
            }
        }
        Commands::Show { id } => match dashboard::lookup_grant(&store, id).await? {
            Some(grant) => println!("{}", serde_json::to_string_pretty(&grant)?),
            None => println!("No grant with id {id}."),
        },
        Commands::Templates => {
            let templates = store.fetch_active_templates().await?;

            if templates.is_empty() {
                println!("No active templates.");
                return Ok(());
            }

            for template in templates {
                println!(
                    "- {} ({}) used {} times",
                    template.name, template.category, template.usage_count
                );
            }
        }
        Commands::Report { window_days, out } => {
            let window_days = window_days.unwrap_or(config.deadline_window_days);
            let state = load_state(&store, now).await?;
            let Some(snapshot) = state.snapshot.as_ref() else {
                return Ok(());
            };
            let report = report::build_report(snapshot, now, window_days);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn load_state<S>(source: &S, now: chrono::DateTime<Utc>) -> anyhow::Result<DashboardState>
where
    S: GrantSource + ?Sized,
{
    let mut state = DashboardState::default();
    state.refresh(source, now).await;

    if let Some(message) = state.error.as_deref() {
        tracing::error!(%message, "dashboard refresh failed");
        anyhow::bail!("{message}");
    }

    Ok(state)
}

fn print_grant_line(grant: &models::Grant) {
    let deadline = grant
        .deadline_date
        .map(|date| date.to_string())
        .unwrap_or_else(|| "no deadline".to_string());
    println!(
        "- {} ({}) {} [{}] requested {} due {}",
        grant.title,
        grant.funder,
        grant.status,
        grant.priority,
        report::format_amount(summary::amount_or_zero(grant.amount_requested)),
        deadline
    );
}
