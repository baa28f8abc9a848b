// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use canis_fabric_core::domain::config::FabricConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate a configuration file with the built-in defaults
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./canis-config.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output } => generate(&output),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = FabricConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. CANIS_CONFIG_PATH: {}",
            std::env::var("CANIS_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./canis-config.yaml");
        println!("  4. ~/.canis/config.yaml");
        println!("  5. /etc/canis/config.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    println!("{}", "Broker:".bold());
    println!("  AMQP: {}:{} (user {})", spec.amqp.host, spec.amqp.port, spec.amqp.user);
    println!();

    println!("{}", "Ingress:".bold());
    println!("  HTTP: {}", config.http_address());
    println!("  WS:   {}", config.ws_address());
    println!();

    println!("{}", "Datastore:".bold());
    println!("  Backend: {:?}", spec.datastore.database);
    println!();

    println!("{}", "Control plane:".bold());
    println!("  Endpoint: {}", spec.controlplane.endpoint);
    println!("  Listen:   {}", spec.controlplane.listen);
    println!();

    println!("{}", "Scheduler:".bold());
    println!("  Image: {}", spec.scheduler.image);
    println!("  Launch timeout: {}s", spec.scheduler.launch_timeout_secs);
    println!();

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = FabricConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());
    Ok(())
}

fn generate(output: &Path) -> Result<()> {
    FabricConfigManifest::default()
        .to_yaml_file(output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_config_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("canis-config.yaml");

        generate(&path).unwrap();
        validate(Some(path.clone())).unwrap();

        let loaded = FabricConfigManifest::from_yaml_file(&path).unwrap();
        assert_eq!(loaded.spec, FabricConfigManifest::default().spec);
    }

    #[test]
    fn test_validate_rejects_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "apiVersion: other/v1\nkind: FabricConfig\n").unwrap();

        assert!(validate(Some(path)).is_err());
    }
}
