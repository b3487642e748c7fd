//! Command-line front end for the project tracker.
//!
//! `run` holds all the behavior and writes to any `io::Write`, so the binary
//! is a thin wrapper and tests can capture output.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracker_core::settings::{BASE_URL_VAR, TIMEOUT_VAR};
use tracker_core::{parse_import, Network, ProjectInput, ProjectService, Settings};

#[derive(Debug, Parser)]
#[command(name = "tracker", version, about = "Create and list projects on a tracker backend")]
pub struct Cli {
    /// Backend origin, e.g. http://localhost:4000 (the /api/ prefix is added).
    #[arg(long, env = "TRACKER_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Per-request timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List all projects.
    List,
    /// Create a single project.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        status: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        stack: Option<String>,
    },
    /// Create every project in a JSON file (object or array); `-` reads stdin.
    Import { path: PathBuf },
}

impl Cli {
    /// Settings from the process environment, with command-line flags taking
    /// priority.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.settings_from(|key| std::env::var(key).ok())
    }

    /// Like `settings`, reading variables the flags leave unset from `env`.
    pub fn settings_from(&self, env: impl Fn(&str) -> Option<String>) -> anyhow::Result<Settings> {
        let settings = Settings::from_lookup(|key| match key {
            BASE_URL_VAR => self.base_url.clone().or_else(|| env(key)),
            TIMEOUT_VAR => self.timeout_ms.map(|ms| ms.to_string()).or_else(|| env(key)),
            _ => env(key),
        })?;
        Ok(settings)
    }
}

async fn read_input(path: &PathBuf) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("failed to read stdin")?;
        return Ok(text);
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

/// Executes the command. Returns `false` when some work item failed but the
/// command itself ran to completion (a partial import).
pub async fn run(cli: Cli, out: &mut impl Write) -> anyhow::Result<bool> {
    let settings = cli.settings()?;
    tracing::debug!(api_url = %settings.api_url(), mode = ?settings.mode, "resolved settings");
    let projects = ProjectService::new(Network::with_config(settings.client_config()));

    match cli.command {
        Command::List => {
            let listed = projects
                .list()
                .await
                .map_err(|e| anyhow::anyhow!(e.describe()))?;
            for project in &listed {
                writeln!(out, "{}\t{}\t{}", project.id, project.name, project.status)?;
            }
            writeln!(out, "{} projects", listed.len())?;
            Ok(true)
        }
        Command::Add {
            name,
            status,
            description,
            stack,
        } => {
            let input = ProjectInput {
                description,
                stack,
                ..ProjectInput::new(name, status)
            };
            let project = projects.create(&input).await.map_err(|e| {
                anyhow::anyhow!("Failed to submit project. Status: {}: {}", e.status, e.describe())
            })?;
            writeln!(out, "Created project {}: {}", project.id, project.name)?;
            Ok(true)
        }
        Command::Import { path } => {
            let text = read_input(&path).await?;
            let inputs = parse_import(&text)?;
            let report = projects.bulk_import(&inputs).await;
            for failure in &report.failures {
                writeln!(
                    out,
                    "item {}: status {}: {}",
                    failure.index, failure.status, failure.message
                )?;
            }
            writeln!(
                out,
                "Imported {}/{} projects",
                report.success_count,
                report.total()
            )?;
            Ok(report.is_complete_success())
        }
    }
}
