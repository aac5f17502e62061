//! labtrack: command-line tool for the labtrack record store.
//!
//! Runs migrations and offers offline checks of validator lists, field
//! values, and sample slug candidates.
//!
//! Logging goes to stderr and is configured with:
//!   LOG_FORMAT  - "json" or "text" (default: "text")
//!   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
//!   RUST_LOG    - standard env filter (default: "labtrack_core=info,labtrack_db=info")

use std::process::ExitCode;

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use labtrack_db::{new_v7, LabConfig, SlugSource, SystemClock, ValidatorRegistry};

#[derive(Parser)]
#[command(name = "labtrack")]
#[command(author, version, about = "Sample and measurement tracking for the lab")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations (uses DATABASE_URL)
    Migrate,

    /// Check that a JSON validator list resolves
    CheckValidators {
        /// JSON list of validator references, e.g. '["validate_numeric"]'
        validators: String,
    },

    /// Run a value through a JSON validator list
    ValidateValue {
        /// JSON list of validator references
        #[arg(short, long)]
        validators: String,

        /// Value to check
        value: String,
    },

    /// Show the slug candidates a new sample would probe, in order
    SlugPreview {
        /// Creating user
        #[arg(short, long)]
        user: Option<String>,

        /// Sample name
        #[arg(short, long)]
        name: Option<String>,

        /// Location slug
        #[arg(short, long)]
        location: Option<String>,

        /// Collection time (RFC 3339 or YYYY-MM-DD); defaults to now
        #[arg(short, long)]
        collected: Option<String>,
    },
}

fn init_logging() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "labtrack_core=info,labtrack_db=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    if log_format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
        if let Some(ansi) = log_ansi {
            layer = layer.with_ansi(ansi);
        }
        registry.with(layer).init();
    }
}

fn parse_collected(text: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .with_context(|| format!("invalid --collected value: {}", text))?;
    match date.and_hms_opt(0, 0, 0) {
        Some(naive) => Ok(naive.and_utc()),
        None => bail!("invalid --collected value: {}", text),
    }
}

#[cfg(feature = "migrations")]
async fn migrate(config: &LabConfig) -> anyhow::Result<()> {
    let db = labtrack_db::Database::connect_from_config(config).await?;
    db.migrate().await.context("migration failed")?;
    labtrack_db::log_pool_metrics(db.pool());
    info!(subsystem = "cli", op = "migrate", "Migrations applied");
    Ok(())
}

#[cfg(not(feature = "migrations"))]
async fn migrate(_config: &LabConfig) -> anyhow::Result<()> {
    bail!("labtrack was built without the `migrations` feature")
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let _ = dotenvy::dotenv();
    init_logging();

    let cli = Cli::parse();
    let config = LabConfig::from_env()?;
    let registry = ValidatorRegistry::with_builtins();

    match cli.command {
        Commands::Migrate => {
            migrate(&config).await?;
            println!("ok");
        }

        Commands::CheckValidators { validators } => {
            match registry.validate_references(Some(&validators)) {
                Ok(resolved) => {
                    for v in &resolved {
                        println!("{}", v.reference());
                    }
                    info!(
                        subsystem = "cli",
                        op = "check_validators",
                        count = resolved.len(),
                        "Validator list resolved"
                    );
                }
                Err(e) => {
                    eprintln!("{}", e);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }

        Commands::ValidateValue { validators, value } => {
            if let Err(e) = registry.apply(&validators, &value) {
                eprintln!("{}", e);
                return Ok(ExitCode::FAILURE);
            }
            println!("ok");
        }

        Commands::SlugPreview {
            user,
            name,
            location,
            collected,
        } => {
            let collected_at = collected.as_deref().map(parse_collected).transpose()?;
            let source = SlugSource {
                id: new_v7(),
                user: user.as_deref(),
                name: name.as_deref(),
                location_slug: location.as_deref(),
                collected_at,
                created_at: None,
            };
            for candidate in source.candidates(&SystemClock, &config.slug) {
                println!("{}", candidate);
            }
            println!("{}", source.fallback());
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_collected_date_only() {
        assert_eq!(
            parse_collected("2024-03-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_collected_rfc3339() {
        assert_eq!(
            parse_collected("2024-03-01T14:22:09+02:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 22, 9).unwrap()
        );
    }

    #[test]
    fn test_parse_collected_rejects_garbage() {
        assert!(parse_collected("yesterday").is_err());
    }

    #[test]
    fn test_cli_parses_validate_value() {
        let cli = Cli::try_parse_from([
            "labtrack",
            "validate-value",
            "--validators",
            r#"["validate_numeric"]"#,
            "4.5",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::ValidateValue { .. }));
    }
}
