//! `fhir-admin` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`        start the API server.
//! - `migrate`      run pending database migrations.
//! - `import`       load resources from a JSON file into Postgres.
//! - `quick-status` render the QuickStatus dropdown for a ValueSet file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use db::{MemoryRepository, PgRepository, Repository};
use fhir::Reference;
use ui::{QuickStatus, RepositoryResolver};

#[derive(Parser)]
#[command(
    name = "fhir-admin",
    about = "Project administration service for a FHIR resource store",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    Memory,
    Postgres,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long, env = "FHIR_ADMIN_BIND", default_value = "0.0.0.0:8080")]
        bind: String,
        #[arg(long, value_enum, default_value_t = StoreKind::Memory)]
        store: StoreKind,
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
        #[arg(long, default_value_t = 10)]
        max_connections: u32,
        /// Accepted access token, as `token=userId`. Repeatable.
        #[arg(long = "token", env = "FHIR_ADMIN_TOKENS", value_delimiter = ',')]
        tokens: Vec<String>,
        /// JSON file (resource, array or Bundle) loaded before serving.
        #[arg(long)]
        seed: Option<PathBuf>,
    },
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Upsert every resource in a JSON file (resource, array or Bundle).
    Import {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
        path: PathBuf,
    },
    /// Print the QuickStatus dropdown for a ValueSet JSON file.
    QuickStatus {
        path: PathBuf,
        #[arg(long)]
        default: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            bind,
            store,
            database_url,
            max_connections,
            tokens,
            seed,
        } => {
            let repo = open_repository(store, database_url.as_deref(), max_connections).await?;
            if let Some(path) = seed {
                let count = import_resources(repo.as_ref(), read_resources(&path)?).await?;
                info!("Seeded {count} resources from {}", path.display());
            }

            let tokens = api::auth::parse_token_pairs(&tokens).map_err(anyhow::Error::msg)?;
            let config = api::ServerConfig { bind, tokens };
            info!("Starting API server on {} ({:?} store)", config.bind, store);
            api::serve(config, repo).await?;
        }
        Command::Migrate { database_url } => {
            info!("Running migrations");
            let pool = db::pool::create_pool(&database_url, 2).await?;
            db::pool::run_migrations(&pool).await?;
            info!("Migrations applied successfully");
        }
        Command::Import { database_url, path } => {
            let repo = PgRepository::connect(&database_url, 2).await?;
            let count = import_resources(&repo, read_resources(&path)?).await?;
            info!("Imported {count} resources from {}", path.display());
        }
        Command::QuickStatus { path, default } => {
            println!("{}", render_quick_status(&path, default).await?);
        }
    }

    Ok(())
}

async fn open_repository(
    store: StoreKind,
    database_url: Option<&str>,
    max_connections: u32,
) -> anyhow::Result<Arc<dyn Repository>> {
    match store {
        StoreKind::Memory => Ok(Arc::new(MemoryRepository::new())),
        StoreKind::Postgres => {
            let url = database_url.context("--database-url (or DATABASE_URL) is required for the postgres store")?;
            Ok(Arc::new(PgRepository::connect(url, max_connections).await?))
        }
    }
}

fn read_resources(path: &Path) -> anyhow::Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    parse_resources(&content)
}

/// Accepts a single resource, a JSON array of resources, or a Bundle.
fn parse_resources(content: &str) -> anyhow::Result<Vec<Value>> {
    let value: Value = serde_json::from_str(content).context("invalid JSON")?;
    let value = match value {
        Value::Array(items) => return Ok(items),
        other @ Value::Object(_) => other,
        _ => bail!("expected a resource, an array of resources, or a Bundle"),
    };

    if value.get("resourceType").and_then(Value::as_str) != Some("Bundle") {
        return Ok(vec![value]);
    }
    let entries = value
        .get("entry")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    Ok(entries
        .into_iter()
        .filter_map(|mut e| e.get_mut("resource").map(Value::take))
        .collect())
}

/// Store every resource: update when it carries an id, create otherwise.
async fn import_resources(repo: &dyn Repository, resources: Vec<Value>) -> anyhow::Result<usize> {
    let mut count = 0;
    for resource in resources {
        let has_id = resource.get("id").and_then(Value::as_str).is_some();
        let (outcome, _) = if has_id {
            repo.update_resource(resource).await
        } else {
            repo.create_resource(resource).await
        };
        if !outcome.is_ok() {
            bail!("resource #{count} rejected: {}", outcome.to_operation_outcome());
        }
        count += 1;
    }
    Ok(count)
}

async fn render_quick_status(path: &Path, default: Option<String>) -> anyhow::Result<String> {
    let repo = MemoryRepository::new();
    let value_set = read_resources(path)?
        .into_iter()
        .next()
        .context("file holds no resources")?;
    let (outcome, stored) = repo.create_resource(value_set).await;
    let id = match stored {
        Some(stored) if outcome.is_ok() => stored["id"].as_str().unwrap_or_default().to_string(),
        _ => bail!("value set rejected: {}", outcome.to_operation_outcome()),
    };

    let resolver = RepositoryResolver::new(Arc::new(repo));
    let mut control = QuickStatus::new(Reference::new("ValueSet", &id).into(), |code| {
        info!("selected {code}");
    });
    control.default_value = default;

    match control.render(&resolver).await {
        Some(view) => Ok(view.to_html()),
        None => bail!("value set could not be resolved"),
    }
}
