//! CLI definitions and command handlers.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use serde_json::json;

use crate::domain::models::Task;
use crate::orchestration::OrchestrationController;
use crate::protocol::TextProtocolHandler;

/// Distributed multi-instance orchestration controller.
#[derive(Parser, Debug)]
#[command(name = "hivemind", version, about)]
pub struct Cli {
    /// Emit machine-readable JSON instead of human-readable text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse, validate, and execute a protocol command
    Exec {
        /// Command text, e.g. `run task beast-mode task_id=auth-123`
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },
    /// Parse a protocol command and print its canonical form
    Parse {
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },
    /// Validate a protocol command against its registered pattern
    Validate {
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },
    /// List registered command patterns
    Patterns,
    /// Launch a small demo swarm and walk it through its lifecycle
    Demo,
}

pub async fn handle_exec(
    protocol: &TextProtocolHandler,
    text: &str,
    json_output: bool,
) -> Result<()> {
    let command = protocol.parse(text)?;
    let result = protocol.execute(&command).await;
    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.to_response_string());
    }
    Ok(())
}

pub fn handle_parse(
    protocol: &TextProtocolHandler,
    text: &str,
    json_output: bool,
) -> Result<()> {
    let command = protocol.parse(text)?;
    if json_output {
        println!("{}", serde_json::to_string_pretty(&command)?);
    } else {
        println!("{}", command.to_command_string());
    }
    Ok(())
}

pub fn handle_validate(
    protocol: &TextProtocolHandler,
    text: &str,
    json_output: bool,
) -> Result<()> {
    let command = protocol.parse(text)?;
    let result = protocol.validate(&command);
    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.to_display_string());
    }
    Ok(())
}

pub fn handle_patterns(protocol: &TextProtocolHandler, json_output: bool) -> Result<()> {
    let patterns = protocol.registered_patterns();
    if json_output {
        println!("{}", serde_json::to_string_pretty(&patterns)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["Command", "Modifiers", "Required", "Optional", "Description"]);
    for pattern in patterns {
        table.add_row([
            format!("{} {}", pattern.verb, pattern.noun),
            pattern
                .allowed_modifiers
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
            pattern
                .required_parameters
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
            pattern
                .optional_parameters
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
            pattern.description.clone(),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn handle_demo(
    protocol: &TextProtocolHandler,
    controller: &Arc<OrchestrationController>,
    json_output: bool,
) -> Result<()> {
    let tasks = vec![
        Task::new("auth-1", "Implement authentication service"),
        Task::new("auth-2", "Add session handling").with_dependency("auth-1"),
        Task::new("auth-3", "Wire login UI").with_dependency("auth-2"),
        Task::new("docs-1", "Write API documentation"),
    ];
    let swarm = controller.launch(tasks).await?;

    for text in [
        "run task task_id=auth-1",
        "run task task_id=docs-1",
        "status swarm detailed",
    ] {
        let command = protocol.parse(text)?;
        let result = protocol.execute(&command).await;
        if !json_output {
            println!("$ {text}");
            println!("{}\n", result.to_response_string());
        }
    }

    let monitored = controller.monitor(Some(&swarm.swarm_id)).await?;
    let report = controller.integrate(Some(&swarm.swarm_id)).await?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "swarm_id": monitored.swarm_id,
                "status": monitored.status.as_str(),
                "instances": monitored.instances.len(),
                "integration_summary": report.summary,
            }))?
        );
    } else {
        println!(
            "Swarm {} is {} with {} instances",
            monitored.swarm_id,
            monitored.status.as_str(),
            monitored.instances.len()
        );
        println!("Integration: {}", report.summary);
    }
    Ok(())
}
