//! CMDB server and command-line tools

use anyhow::Context;
use clap::{Parser, Subcommand};
use cmdb_api::{build_app, build_state, logging, shutdown_signal, AppConfig};
use cmdb_core::{
    templates, AttributeValidator, Schema, SchemaDefinitionValidator, SchemaDraft, SchemaKind,
    Store, ValidationResult,
};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cmdb")]
#[command(about = "Schema-driven configuration management database")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Path to a TOML config file
        #[arg(short, long, env = "CMDB_CONFIG")]
        config: Option<PathBuf>,

        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate an attribute payload against a schema file
    Validate {
        /// Schema definition (JSON/YAML)
        #[arg(short, long)]
        schema: PathBuf,

        /// Attribute payload (JSON/YAML)
        #[arg(short, long)]
        payload: PathBuf,

        /// Output format (json|text)
        #[arg(short, long, default_value = "text")]
        output: String,
    },

    /// Check a schema definition for authoring mistakes
    CheckSchema {
        /// Schema definition (JSON/YAML)
        #[arg(short, long)]
        file: PathBuf,

        /// Output format (json|text)
        #[arg(short, long, default_value = "text")]
        output: String,
    },

    /// List built-in schema templates
    Templates {
        /// Only templates of this kind (ci|relationship)
        #[arg(short, long)]
        kind: Option<SchemaKind>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, host, port } => {
            let mut config = AppConfig::load(config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate()?;

            logging::init(&config.logging)
                .map_err(|e| anyhow::anyhow!("failed to initialise logging: {}", e))?;

            let state = build_state(&config.storage)?;
            let store = state.store.clone();
            let app = build_app(state, &config.server);

            let addr = config.bind_address();
            tracing::info!(
                address = %addr,
                version = env!("CARGO_PKG_VERSION"),
                "Starting CMDB server"
            );

            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {}", addr))?;
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            store.flush().await?;
            tracing::info!("CMDB server stopped");
        }

        Commands::Validate {
            schema,
            payload,
            output,
        } => {
            let draft: SchemaDraft = serde_json::from_value(read_document(&schema)?)
                .with_context(|| format!("{} is not a schema definition", schema.display()))?;
            let schema = Schema::from_draft(SchemaKind::Ci, draft, "cli");
            let payload = read_document(&payload)?;

            let result = AttributeValidator::new().validate(&payload, &schema);
            report(&result, &output)?;
            if !result.is_valid {
                std::process::exit(1);
            }
        }

        Commands::CheckSchema { file, output } => {
            let draft: SchemaDraft = serde_json::from_value(read_document(&file)?)
                .with_context(|| format!("{} is not a schema definition", file.display()))?;

            let result = SchemaDefinitionValidator::new().validate_draft(&draft);
            report(&result, &output)?;
            if !result.is_valid {
                std::process::exit(1);
            }
        }

        Commands::Templates { kind } => {
            let catalog = match kind {
                Some(kind) => templates::catalog_for(kind),
                None => templates::catalog(),
            };
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        }
    }

    Ok(())
}

/// Read a JSON or YAML document, chosen by file extension
fn read_document(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );

    let value = if is_yaml {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    Ok(value)
}

fn report(result: &ValidationResult, output: &str) -> anyhow::Result<()> {
    match output {
        "json" => println!("{}", serde_json::to_string_pretty(result)?),
        _ => {
            if result.is_valid {
                println!("Valid");
            } else {
                println!("Invalid: {} error(s)", result.error_count());
                for error in &result.errors {
                    println!("  error   {}", error);
                }
            }
            for warning in &result.warnings {
                println!("  warning {}", warning);
            }
        }
    }
    Ok(())
}
