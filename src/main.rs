use clap::Parser;
use clap_derive::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use tributary::providers::ChangesProvider;
use tributary::types::{Account, ChangeId, SubmitOptions};
use tributary::{Config, Database, ProjectsConfig, Submitter};

#[derive(Parser, Debug)]
#[command(name = "tributary", about = "Change submission engine worker")]
struct Args {
    #[arg(long, help = "Database directory (overrides TRIBUTARY_DB_PATH)")]
    db_path: Option<PathBuf>,

    #[arg(long, help = "YAML file with per-project integration settings")]
    projects_file: Option<PathBuf>,

    #[arg(long, help = "Account id to act as", default_value = "admin")]
    actor: String,

    #[arg(long, help = "Enable debug logging", default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List changes and their statuses
    Status,
    /// Show which changes would be submitted together with a change
    SubmittedTogether { change_id: String },
    /// Predict the resulting tree per branch without touching any ref
    Preview { change_id: String },
    /// Submit a change and everything that must land with it
    Submit {
        change_id: String,
        #[arg(long, help = "Submit the whole topic")]
        whole_topic: bool,
    },
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), eyre::Error> {
    color_eyre::install()?;
    let args: Args = Args::parse();

    let filter = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let mut config = Config::from_env();
    if let Some(db_path) = args.db_path {
        config.db_path = db_path;
    }

    let projects = match &args.projects_file {
        Some(path) => ProjectsConfig::load(path)?,
        None => ProjectsConfig::new(),
    };

    let db = Arc::new(Database::new(&config)?);
    let submitter = Submitter::new(Arc::clone(&db), config).with_projects(projects);
    let actor = Account::new(
        args.actor.clone(),
        args.actor.clone(),
        format!("{}@localhost", args.actor),
    );

    match args.command {
        Command::Status => {
            let mut changes = db.changes().list_changes()?;
            changes.sort_by_key(|c| c.created_at);
            for change in changes {
                println!(
                    "{}  {:9}  {}  {}",
                    change.id.short(),
                    change.status.to_string(),
                    change.branch_key(),
                    change.subject
                );
            }
        }
        Command::SubmittedTogether { change_id } => {
            let ids = submitter.submitted_together(&ChangeId::new(change_id))?;
            for id in ids {
                println!("{id}");
            }
        }
        Command::Preview { change_id } => {
            let trees =
                submitter.preview(&ChangeId::new(change_id), &actor, &SubmitOptions::default())?;
            for (branch, tree) in trees {
                println!("{branch}  {tree}");
            }
        }
        Command::Submit {
            change_id,
            whole_topic,
        } => {
            let options = SubmitOptions {
                whole_topic: if whole_topic { Some(true) } else { None },
                ..SubmitOptions::default()
            };
            let report = submitter
                .submit(&ChangeId::new(change_id), &actor, options)
                .await?;
            info!("Submission {} complete", report.submission_id);
            for result in report.results {
                println!(
                    "{}  {}  {}",
                    result.change_id.short(),
                    result.branch,
                    result.message
                );
            }
        }
    }

    Ok(())
}
