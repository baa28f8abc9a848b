// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Canis Fabric CLI
//!
//! The `canis` binary runs each fabric service as its own process.
//!
//! ## Commands
//!
//! - `canis ingress start` - DIDComm HTTP/WebSocket edge
//! - `canis notifier start` - webhook fan-out
//! - `canis scheduler start` - agent container lifecycle
//! - `canis control-plane start` - Admin gRPC service
//! - `canis agent list|create|remove` - Admin client
//! - `canis config show|validate|generate` - Configuration management
//! - `canis db migrate` - PostgreSQL schema migrations

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use canis_fabric::commands::{
    self, AgentCommand, ConfigCommand, ControlPlaneCommand, DbCommand, IngressCommand,
    NotifierCommand, SchedulerCommand,
};
use canis_fabric::shutdown::shutdown_token;
use canis_fabric::telemetry::{init_logging, install_metrics_exporter, LogFormat};
use canis_fabric_core::FabricConfigManifest;

/// Canis fabric - DIDComm ingress, notifier, scheduler and control plane
#[derive(Parser)]
#[command(name = "canis")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "CANIS_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the config file
    #[arg(long, global = true, env = "CANIS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output format; defaults to the config file
    #[arg(long, global = true, env = "CANIS_LOG_FORMAT", value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// DIDComm ingress gateway
    #[command(name = "ingress")]
    Ingress {
        #[command(subcommand)]
        command: IngressCommand,
    },

    /// Webhook notifier
    #[command(name = "notifier")]
    Notifier {
        #[command(subcommand)]
        command: NotifierCommand,
    },

    /// Agent scheduler
    #[command(name = "scheduler")]
    Scheduler {
        #[command(subcommand)]
        command: SchedulerCommand,
    },

    /// Control-plane gRPC server
    #[command(name = "control-plane")]
    ControlPlane {
        #[command(subcommand)]
        command: ControlPlaneCommand,
    },

    /// Agent management
    #[command(name = "agent")]
    Agent {
        #[command(subcommand)]
        command: AgentCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Database management
    #[command(name = "db")]
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
}

impl Commands {
    /// Long-running services get the metrics exporter.
    fn is_service(&self) -> bool {
        matches!(
            self,
            Commands::Ingress { .. }
                | Commands::Notifier { .. }
                | Commands::Scheduler { .. }
                | Commands::ControlPlane { .. }
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        eprintln!("{}", "No command specified. Use --help for usage.".yellow());
        std::process::exit(1);
    };

    // Config commands must work even when the discovered file is broken
    if let Commands::Config { command } = command {
        init_logging(
            cli.log_level.as_deref().unwrap_or("warn"),
            cli.log_format.unwrap_or_default(),
        )?;
        return commands::config::handle_command(command, cli.config).await;
    }

    let config = FabricConfigManifest::load_or_default(cli.config.clone())
        .context("Failed to load configuration")?;
    let observability = &config.spec.observability;
    init_logging(
        cli.log_level.as_deref().unwrap_or(&observability.log_level),
        cli.log_format
            .unwrap_or_else(|| LogFormat::from_config(&observability.log_format)),
    )?;
    config
        .validate()
        .context("Configuration validation failed")?;
    info!(name = %config.metadata.name, "Configuration loaded");

    if command.is_service() {
        if let Some(port) = observability.metrics_port {
            install_metrics_exporter(port)?;
        }
    }
    let shutdown = shutdown_token();

    match command {
        Commands::Ingress { command } => {
            commands::ingress::handle_command(command, &config, shutdown).await
        }
        Commands::Notifier { command } => {
            commands::notifier::handle_command(command, &config, shutdown).await
        }
        Commands::Scheduler { command } => {
            commands::scheduler::handle_command(command, &config, shutdown).await
        }
        Commands::ControlPlane { command } => {
            commands::control_plane::handle_command(command, &config, shutdown).await
        }
        Commands::Agent { command } => commands::agent::handle_command(command, &config).await,
        Commands::Db { command } => commands::db::handle_command(command, &config).await,
        // Handled before the configuration is loaded
        Commands::Config { .. } => Ok(()),
    }
}
