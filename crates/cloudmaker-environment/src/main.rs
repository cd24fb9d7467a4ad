// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! cloudmaker - launch instances and archive their launch metadata.
//!
//! ```text
//! cloudmaker launch web1.yaml
//! cloudmaker info i-1a2b3c4d
//! cloudmaker terminate i-1a2b3c4d
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use cloudmaker_archive::{ArchiveFactory, InstanceProperties, LaunchConfig};
use serde::Serialize;
use tracing::{info, warn};

use cloudmaker_environment::config::Config;
use cloudmaker_environment::lifecycle::LifecycleManager;
use cloudmaker_environment::provider::{LxcProvider, LxcProviderConfig, Provider};

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "cloudmaker_environment=info,cloudmaker_archive=info";

#[derive(Parser)]
#[command(
    name = "cloudmaker",
    version,
    about = "Launch instances and archive their launch metadata"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Launch an instance from a launch configuration file.
    Launch {
        /// YAML launch configuration.
        config: PathBuf,
    },
    /// Print the archived launch metadata of an instance.
    Info {
        /// Instance ID.
        instance_id: String,
    },
    /// Terminate an instance. Its archive is kept.
    Terminate {
        /// Instance ID.
        instance_id: String,
    },
}

#[derive(Serialize)]
struct LaunchReport<'a> {
    instance: &'a InstanceProperties,
    #[serde(skip_serializing_if = "Option::is_none")]
    archive_warning: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the YAML output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let provider = Arc::new(LxcProvider::new(LxcProviderConfig::from_config(&config)).await?);
    info!(
        provider = provider.provider_type(),
        data_dir = %config.data_dir.display(),
        "Provider initialized"
    );

    let manager = LifecycleManager::new(provider, ArchiveFactory::new(config.archive.clone()));

    match cli.command {
        Command::Launch { config: path } => {
            let launch_config = LaunchConfig::from_yaml_file(&path).await?;
            let launched = manager.launch(&launch_config).await?;

            let report = LaunchReport {
                instance: &launched.instance.properties,
                archive_warning: launched.archive_warning.map(|e| e.to_string()),
            };
            print!("{}", serde_yaml::to_string(&report)?);
        }
        Command::Info { instance_id } => {
            let contents = manager.info(&instance_id).await?;
            print!("{}", serde_yaml::to_string(&contents)?);
        }
        Command::Terminate { instance_id } => {
            manager.terminate(&instance_id).await?;
        }
    }

    Ok(())
}
