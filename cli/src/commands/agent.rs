// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use canis_fabric_core::domain::config::FabricConfigManifest;
use canis_fabric_sdk::CanisClient;

#[derive(Subcommand)]
pub enum AgentCommand {
    /// List declared agents
    List,

    /// Declare a new agent
    Create {
        #[arg(value_name = "AGENT_ID")]
        id: String,

        /// Display name
        #[arg(long, default_value = "")]
        name: String,

        /// Register the agent's DID on the ledger
        #[arg(long)]
        public_did: bool,
    },

    /// Remove a declared agent
    Remove {
        #[arg(value_name = "AGENT_ID")]
        id: String,
    },
}

pub async fn handle_command(command: AgentCommand, config: &FabricConfigManifest) -> Result<()> {
    let client = CanisClient::from_config(config)?;

    match command {
        AgentCommand::List => list_agents(&client).await,
        AgentCommand::Create {
            id,
            name,
            public_did,
        } => {
            let agent = client.create_agent(&id, &name, public_did).await?;
            println!("{}", format!("✓ Agent {} created", agent.id).green());
            Ok(())
        }
        AgentCommand::Remove { id } => {
            client.delete_agent(&id).await?;
            println!("{}", format!("✓ Agent {} removed", id).green());
            Ok(())
        }
    }
}

async fn list_agents(client: &CanisClient) -> Result<()> {
    let agents = client.list_agents().await?;

    if agents.is_empty() {
        println!("{}", "No agents found".yellow());
        return Ok(());
    }

    println!("{} agents found:", agents.len());
    println!("{:<24} {:<20} {:<14} {}", "ID", "NAME", "STATUS", "PID");
    for agent in agents {
        let pid = if agent.pid.is_empty() { "-".to_string() } else { agent.pid };
        println!(
            "{:<24} {:<20} {:<14} {}",
            agent.id,
            agent.name.bold(),
            agent.status,
            pid
        );
    }

    Ok(())
}
