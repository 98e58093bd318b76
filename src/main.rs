use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jobtrack::gateway::{AttachmentSource, Gateway};
use jobtrack::local::LocalStore;
use jobtrack::models::{JobDraft, RecordId, Session, Status, currency_symbol};
use jobtrack::sync;
use jobtrack::tui;
use jobtrack::view::{StatusFilter, derive_view};

#[derive(Parser)]
#[command(name = "jobtrack")]
#[command(about = "Track job applications - add, edit, and watch them live in a dashboard")]
struct Cli {
    /// Act as this user; defaults to $USER
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a job application
    Add {
        /// Company name
        company: String,

        /// Role / job title
        role: String,

        /// City, state or "Remote"
        #[arg(short, long, default_value = "")]
        location: String,

        /// Free-form salary text, e.g. "80,000 - 100,000"
        #[arg(short, long, default_value = "")]
        salary: String,

        /// Currency code (PHP, USD, EUR, ...); anything is accepted
        #[arg(short, long, default_value = "PHP")]
        currency: String,

        /// Status (applied, interview, offer, rejected, withdrawn)
        #[arg(long, default_value = "applied")]
        status: Status,

        /// Job posting URL
        #[arg(short, long, default_value = "")]
        url: String,

        /// Notes about this application
        #[arg(short, long, default_value = "")]
        notes: String,

        /// Files to attach (resume, cover letter, ...); may repeat
        #[arg(short, long)]
        attach: Vec<PathBuf>,
    },

    /// Edit an application (unspecified fields keep their current value)
    Edit {
        /// Record id
        id: String,

        #[arg(long)]
        company: Option<String>,

        #[arg(long)]
        role: Option<String>,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(short, long)]
        salary: Option<String>,

        #[arg(short, long)]
        currency: Option<String>,

        #[arg(long)]
        status: Option<Status>,

        #[arg(short, long)]
        url: Option<String>,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Delete an application
    Delete {
        /// Record id
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List applications
    List {
        /// Filter by status, or "all"
        #[arg(short = 'f', long, default_value = "all")]
        status: StatusFilter,

        /// Show only records whose company or role contains this
        #[arg(short, long, default_value = "")]
        search: String,
    },

    /// Open the live dashboard
    Browse {
        /// Initial status filter
        #[arg(short = 'f', long, default_value = "all")]
        status: StatusFilter,

        /// Initial search term
        #[arg(short, long, default_value = "")]
        search: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let session = resolve_session(cli.user)?;
    let store = LocalStore::open()?;
    let gateway = Gateway::new(&store, &store);

    match cli.command {
        Commands::Add {
            company,
            role,
            location,
            salary,
            currency,
            status,
            url,
            notes,
            attach,
        } => {
            let draft = JobDraft {
                company,
                role,
                location,
                salary,
                currency,
                status,
                job_url: url,
                notes,
            };
            let files = read_attachments(&attach)?;
            let id = gateway
                .create(&session, draft, files)
                .await
                .map_err(|e| anyhow!("{}", e))?;
            println!("Added job application {}", id);
        }

        Commands::Edit {
            id,
            company,
            role,
            location,
            salary,
            currency,
            status,
            url,
            notes,
        } => {
            let id = RecordId::new(id);
            let record = find_record(&store, &session, &id).await?;

            let mut draft = record.to_draft();
            if let Some(v) = company {
                draft.company = v;
            }
            if let Some(v) = role {
                draft.role = v;
            }
            if let Some(v) = location {
                draft.location = v;
            }
            if let Some(v) = salary {
                draft.salary = v;
            }
            if let Some(v) = currency {
                draft.currency = v;
            }
            if let Some(v) = status {
                draft.status = v;
            }
            if let Some(v) = url {
                draft.job_url = v;
            }
            if let Some(v) = notes {
                draft.notes = v;
            }

            gateway
                .update(&id, draft)
                .await
                .map_err(|e| anyhow!("{}", e))?;
            println!("Updated job application {}", id);
        }

        Commands::Delete { id, yes } => {
            let id = RecordId::new(id);
            let record = find_record(&store, &session, &id).await?;

            if !yes {
                print!(
                    "Delete application for {} at {}? [y/N] ",
                    record.role, record.company
                );
                std::io::stdout().flush()?;
                let mut answer = String::new();
                std::io::stdin().read_line(&mut answer)?;
                if !answer.trim().eq_ignore_ascii_case("y") {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            gateway
                .delete(&id)
                .await
                .map_err(|e| anyhow!("{}", e))?;
            println!("Deleted job application {}", id);
        }

        Commands::List { status, search } => {
            let handle = sync::start(&store, &session).await;
            let state = handle.ready().await;
            if let Some(err) = &state.error {
                eprintln!("{}", err);
            }

            let view = derive_view(&state.records, &search, status);
            if view.visible.is_empty() {
                if state.records.is_empty() {
                    println!("No job applications yet. Add one with 'jobtrack add'.");
                } else {
                    println!("No applications match the current search or filter.");
                }
            } else {
                println!(
                    "{:<6} {:<10} {:<24} {:<24} {:<16} {:>14}",
                    "ID", "STATUS", "COMPANY", "ROLE", "LOCATION", "SALARY"
                );
                println!("{}", "-".repeat(98));
                for record in &view.visible {
                    let salary = if record.salary.is_empty() {
                        "-".to_string()
                    } else {
                        format!("{}{}", currency_symbol(&record.currency), record.salary)
                    };
                    println!(
                        "{:<6} {:<10} {:<24} {:<24} {:<16} {:>14}",
                        record.id,
                        record.status,
                        truncate(&record.company, 22),
                        truncate(&record.role, 22),
                        truncate(&record.location, 14),
                        truncate(&salary, 14),
                    );
                }
            }

            let c = view.counts;
            println!(
                "\nTotal: {}  Applied: {}  Interview: {}  Offers: {}  Rejected: {}",
                c.total, c.applied, c.interview, c.offer, c.rejected
            );
        }

        Commands::Browse { status, search } => {
            tui::run_dashboard(&store, &session, search, status).await?;
        }
    }

    Ok(())
}

fn resolve_session(user: Option<String>) -> Result<Session> {
    let user_id = match user {
        Some(u) if !u.trim().is_empty() => u,
        Some(_) => return Err(anyhow!("--user must not be empty")),
        None => std::env::var("USER").unwrap_or_else(|_| "default".to_string()),
    };
    Ok(Session::new(user_id))
}

fn read_attachments(paths: &[PathBuf]) -> Result<Vec<AttachmentSource>> {
    paths
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read attachment {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| anyhow!("Attachment path {} has no file name", path.display()))?;
            Ok(AttachmentSource { name, bytes })
        })
        .collect()
}

/// One synchronized snapshot, scanned for the record. The store has no
/// point-read; everything goes through the live query, same as the
/// dashboard.
async fn find_record(
    store: &LocalStore,
    session: &Session,
    id: &RecordId,
) -> Result<jobtrack::models::JobRecord> {
    let handle = sync::start(store, session).await;
    let state = handle.ready().await;
    if let Some(err) = &state.error {
        return Err(anyhow!("{}", err));
    }
    state
        .records
        .iter()
        .find(|r| &r.id == id)
        .cloned()
        .ok_or_else(|| anyhow!("Record {} not found", id))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
