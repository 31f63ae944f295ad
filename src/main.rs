//! Terminal admin console for the remote integration platform.
//!
//! Lists integrations and connections, runs the authorization flow, browses
//! entity schemas, and searches objects. Headless: the authorization URL is
//! printed for the user to open, and completion is observed by polling the
//! status endpoint.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use connect_console::auth::attempt::AttemptOutcome;
use connect_console::auth::launcher::FormData;
use connect_console::auth::surface::TerminalSurface;
use connect_console::auth::DetectionStrategy;
use connect_console::config::{load_config, ConsoleConfig};
use connect_console::Session;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "connect-console", about = "Admin console for the integration platform")]
struct Cli {
    /// Base URL of the remote integration API
    #[arg(long, env = "CONNECT_API_URL")]
    api_url: Option<String>,

    /// Path to a TOML config file
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available integrations
    Integrations,
    /// List active connections
    Connections,
    /// Show details for one integration
    Info { integration: String },
    /// Authorize an integration
    Connect {
        integration: String,
        /// Credential fields as id=value pairs
        #[arg(short, long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    /// Archive a connection
    Disconnect {
        integration: String,
        connection_id: String,
    },
    /// List entities for an integration
    Entities { integration: String },
    /// Show the schema for an entity
    Schema { integration: String, entity: String },
    /// Search objects of an entity
    Search {
        integration: String,
        entity: String,
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Show one object
    Object {
        integration: String,
        entity: String,
        object: String,
    },
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected id=value, got '{}'", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "connect_console=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => ConsoleConfig::default(),
    };

    if let Some(api_url) = cli.api_url {
        config.api.base_url = api_url;
    }

    // The terminal cannot observe window closure or cross-window messages;
    // completion is always detected by polling
    if config.auth.strategy != DetectionStrategy::Poll {
        debug!(
            configured = %config.auth.strategy,
            "Overriding detection strategy to poll for terminal use"
        );
        config.auth.strategy = DetectionStrategy::Poll;
    }

    info!(base_url = %config.api.base_url, "Console starting");
    let session = Session::new(config, Arc::new(TerminalSurface));

    match cli.command {
        Command::Integrations => {
            let integrations = session
                .client()
                .list_integrations()
                .await
                .context("Failed to list integrations")?;
            for integration in integrations {
                let status = match &integration.connection {
                    Some(c) => format!("{}", c.state),
                    None => "not connected".to_string(),
                };
                println!("{:<24} {:<32} {}", integration.key, integration.name, status);
            }
        }
        Command::Connections => {
            let connections = session
                .client()
                .list_connections()
                .await
                .context("Failed to list connections")?;
            for connection in connections {
                let last_active = connection
                    .last_active_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{:<28} {:<24} {:<12} last active {}",
                    connection.id, connection.key, connection.state, last_active
                );
            }
        }
        Command::Info { integration } => {
            let info = session
                .client()
                .integration_info(&integration)
                .await
                .context("Failed to fetch integration details")?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Connect {
            integration,
            fields,
        } => {
            let mut form = FormData::new();
            for (id, value) in fields {
                form.insert(id, serde_json::Value::String(value));
            }

            let attempt = session
                .connect(&integration, form)
                .await
                .with_context(|| format!("Failed to start authorization for {}", integration))?;

            println!("Waiting for authorization to complete...");
            match attempt.wait().await {
                AttemptOutcome::Success => {
                    println!("Connected.");
                    if let Some(connection) = session.connection_state(&integration).await? {
                        println!("Connection {} is {}", connection.id, connection.state);
                    }
                }
                AttemptOutcome::Failed(e) => {
                    anyhow::bail!("Authorization failed: {}", e);
                }
            }
        }
        Command::Disconnect {
            integration,
            connection_id,
        } => {
            session
                .disconnect(&integration, &connection_id)
                .await
                .context("Failed to archive connection")?;
            println!("Disconnected {}", connection_id);
        }
        Command::Entities { integration } => {
            let entities = session
                .client()
                .list_entities(&integration)
                .await
                .context("Failed to list entities")?;
            for entity in entities {
                println!("{:<24} {}", entity.key, entity.name);
            }
        }
        Command::Schema {
            integration,
            entity,
        } => {
            let schema = session
                .client()
                .entity_schema(&integration, &entity)
                .await
                .context("Failed to fetch entity schema")?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Command::Search {
            integration,
            entity,
            query,
        } => {
            let records = session
                .client()
                .search_objects(&integration, &entity, query.as_deref())
                .await
                .context("Failed to search objects")?;
            if records.is_empty() {
                println!("No objects found");
            }
            for record in records {
                println!(
                    "{:<28} {}",
                    record.id,
                    record.name.as_deref().unwrap_or("")
                );
            }
        }
        Command::Object {
            integration,
            entity,
            object,
        } => {
            let record = session
                .client()
                .get_object(&integration, &entity, &object)
                .await
                .context("Failed to fetch object")?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}
