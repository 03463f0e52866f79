use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use annotation_retention::{
    config::AppConfig,
    db::DbPool,
    observability,
    retention::{AnnotationCleanup, DeleteExpiredAnnotationsCommand, start_retention_worker},
};
use clap::{Parser, Subcommand};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

const DEFAULT_CONFIG_PATH: &str = "annotation-retention.toml";

#[derive(Parser, Debug)]
#[command(version, about = "Annotation retention cleanup", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the retention worker until interrupted (default)
    Serve,
    /// Run a single cleanup pass and exit
    Cleanup {
        /// Days of annotations to keep (defaults to retention.days_to_keep)
        #[arg(long)]
        days_to_keep: Option<u32>,
        /// Only clean up annotations of this organization
        #[arg(long)]
        org_id: Option<i64>,
        /// Only clean up annotations of this dashboard
        #[arg(long)]
        dashboard_id: Option<i64>,
        /// Report what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },
    /// Run database migrations and exit
    ///
    /// Useful for Kubernetes init containers or CI/CD pipelines.
    Migrate,
    /// Export the JSON schema for the configuration file
    Schema {
        /// Output file path (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::Schema { output }) => {
            #[cfg(feature = "json-schema")]
            run_schema_export(output);
            #[cfg(not(feature = "json-schema"))]
            {
                let _ = output;
                eprintln!("Error: JSON schema export requires the 'json-schema' feature");
                std::process::exit(1);
            }
        }
        Some(Command::Migrate) => {
            run_migrate(&args.config).await;
        }
        Some(Command::Cleanup {
            days_to_keep,
            org_id,
            dashboard_id,
            dry_run,
        }) => {
            let command = DeleteExpiredAnnotationsCommand {
                days_to_keep,
                org_id,
                dashboard_id,
            };
            run_cleanup(&args.config, command, dry_run).await;
        }
        Some(Command::Serve) | None => {
            run_server(&args.config).await;
        }
    }
}

/// Load the config file and initialize logging, exiting on failure.
fn load_config(config_path: &Path) -> AppConfig {
    let config = match AppConfig::from_file(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!(
                "Failed to load config from {}: {}",
                config_path.display(),
                e
            );
            std::process::exit(1);
        }
    };

    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    config
}

/// Connect to the configured database, running migrations if enabled.
async fn connect(config: &AppConfig) -> Arc<DbPool> {
    if config.database.is_none() {
        eprintln!("Error: Database is not configured.");
        std::process::exit(1);
    }

    let pool = match DbPool::from_config(&config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            eprintln!("Error: Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if config.database.run_migrations()
        && let Err(e) = pool.run_migrations().await
    {
        tracing::error!(error = %e, "Database migrations failed");
        eprintln!("Error: Database migrations failed: {}", e);
        std::process::exit(1);
    }

    Arc::new(pool)
}

async fn run_server(config_path: &Path) {
    let config = load_config(config_path);

    if let Err(e) = config.validate_for_serve() {
        tracing::error!(error = %e, "Refusing to start");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = observability::metrics::init_metrics(&config.observability.metrics) {
        tracing::error!(error = %e, "Failed to initialize metrics");
        std::process::exit(1);
    }

    tracing::info!(
        config_file = %config_path.display(),
        version = env!("CARGO_PKG_VERSION"),
        "Starting annotation retention service"
    );

    let db = connect(&config).await;

    let shutdown = CancellationToken::new();
    let task_tracker = TaskTracker::new();
    task_tracker.spawn(start_retention_worker(
        db.clone(),
        config.retention.clone(),
        shutdown.clone(),
    ));
    task_tracker.close();

    tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received, waiting for the retention worker to stop...");
            shutdown.cancel();
        }
        _ = task_tracker.wait() => {}
    }

    let wait_result =
        tokio::time::timeout(std::time::Duration::from_secs(30), task_tracker.wait()).await;
    if wait_result.is_err() {
        tracing::warn!("Timeout waiting for the retention worker to stop");
    }

    db.close().await;
    tracing::info!("Shutdown complete");
}

async fn run_cleanup(
    config_path: &Path,
    command: DeleteExpiredAnnotationsCommand,
    dry_run: bool,
) {
    let mut config = load_config(config_path);
    config.retention.safety.dry_run |= dry_run;

    let db = connect(&config).await;
    let cleanup = AnnotationCleanup::new(db.clone(), config.retention);

    // Ctrl+C abandons the run; its transaction rolls back.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    let result = cleanup.delete_expired_annotations(command, &cancel).await;
    signal_task.abort();
    db.close().await;

    match result {
        Ok(outcome) => {
            let verb = if outcome.dry_run {
                "Would delete"
            } else {
                "Deleted"
            };
            let count = if outcome.dry_run {
                let cap = cleanup.config().safety.max_deletes_per_run;
                outcome
                    .expired_before
                    .min(i64::try_from(cap).unwrap_or(i64::MAX))
            } else {
                i64::try_from(outcome.deleted).unwrap_or(i64::MAX)
            };
            println!(
                "{} {} of {} annotations created before {} ({} days kept)",
                verb,
                count,
                outcome.expired_before,
                outcome.cutoff.to_rfc3339(),
                outcome.days_to_keep
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Annotation cleanup failed");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_migrate(config_path: &Path) {
    let config = load_config(config_path);

    tracing::info!(
        config_file = %config_path.display(),
        "Running database migrations"
    );

    if config.database.is_none() {
        eprintln!("Error: Database is not configured. Nothing to migrate.");
        std::process::exit(1);
    }

    match DbPool::from_config(&config.database).await {
        Ok(pool) => match pool.run_migrations().await {
            Ok(()) => {
                tracing::info!("Database migrations completed successfully");
                pool.close().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Database migrations failed");
                eprintln!("Error: Database migrations failed: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            eprintln!("Error: Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    }
}

/// Export the config JSON schema to file or stdout
#[cfg(feature = "json-schema")]
fn run_schema_export(output: Option<String>) {
    let content = match AppConfig::json_schema_string() {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error: Failed to serialize config schema: {}", e);
            std::process::exit(1);
        }
    };

    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, &content) {
                eprintln!("Failed to write to {}: {}", path, e);
                std::process::exit(1);
            }
            eprintln!("Config JSON schema written to {}", path);
        }
        None => {
            println!("{}", content);
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
