// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Database Migration Command
//!
//! Applies the bundled schema migrations to the PostgreSQL datastore named
//! in the configuration (or `CANIS_DATABASE_URL`).
//!
//! ```bash
//! canis db migrate
//! canis db migrate --dry-run
//! ```

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use canis_fabric_core::domain::config::FabricConfigManifest;
use canis_fabric_core::domain::repository::StorageBackend;
use canis_fabric_core::infrastructure::db::{Database, MIGRATOR};

#[derive(Subcommand)]
pub enum DbCommand {
    /// Apply pending migrations
    Migrate {
        /// List pending migrations without applying them
        #[arg(long)]
        dry_run: bool,
    },
}

pub async fn handle_command(command: DbCommand, config: &FabricConfigManifest) -> Result<()> {
    match command {
        DbCommand::Migrate { dry_run } => migrate(config, dry_run).await,
    }
}

async fn migrate(config: &FabricConfigManifest, dry_run: bool) -> Result<()> {
    let connection_string = match config.storage_backend() {
        StorageBackend::PostgreSQL(pg) => pg.connection_string,
        StorageBackend::InMemory => {
            anyhow::bail!("Datastore is in-memory; set datastore.url or CANIS_DATABASE_URL")
        }
    };

    println!("Connecting to database...");
    let database = Database::new(&connection_string)
        .await
        .context("Failed to connect to database")?;

    let applied = database.applied_migrations().await;
    let total = MIGRATOR.iter().count();
    println!("Migration status: {} applied, {} total available.", applied, total);

    if applied >= total {
        println!("{}", "✓ Database is up to date.".green());
        return Ok(());
    }

    if dry_run {
        println!("Pending migrations:");
        for migration in MIGRATOR.iter().skip(applied) {
            println!(" - {} {}", migration.version, migration.description);
        }
        return Ok(());
    }

    database.migrate().await?;
    println!("{}", "✓ Database updated successfully.".green());
    Ok(())
}
