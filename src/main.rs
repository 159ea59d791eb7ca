use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cloakgate::cli;
use cloakgate::config::DEFAULT_CONFIG_FILE;

#[derive(Parser)]
#[command(name = "cloakgate", version, about = "PII-masking HTTP gateway")]
struct Cli {
    /// Log filter, e.g. `info` or `cloakgate=debug`. Overridden by RUST_LOG.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway.
    Serve {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },

    /// Run a response body through the masking pipeline offline.
    Mask {
        /// Caller role.
        #[arg(long)]
        role: String,

        /// Caller subject id.
        #[arg(long, default_value = "cli")]
        subject: String,

        #[arg(long, default_value = "application/json")]
        content_type: String,

        #[arg(long, default_value = "GET")]
        method: String,

        #[arg(long, default_value = "/")]
        endpoint: String,

        /// Roles that get masked responses.
        #[arg(long = "masked-role", default_values_t = vec!["Analyst".to_string()])]
        masked_roles: Vec<String>,

        /// Append the decision to this audit log.
        #[arg(long)]
        audit: Option<PathBuf>,

        /// Body file; stdin when omitted.
        file: Option<PathBuf>,
    },

    /// Inspect the audit log.
    Audit {
        #[command(subcommand)]
        action: AuditAction,
    },
}

#[derive(Subcommand)]
enum AuditAction {
    /// Print recorded decisions.
    List {
        #[arg(long, default_value = "audit/decisions.jsonl")]
        path: PathBuf,

        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Check the hash chain.
    Verify {
        #[arg(long, default_value = "audit/decisions.jsonl")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Serve { config } => cli::serve::run_serve(&config)
            .await
            .context("gateway failed")?,
        Command::Mask {
            role,
            subject,
            content_type,
            method,
            endpoint,
            masked_roles,
            audit,
            file,
        } => cli::mask::run_mask(cli::mask::MaskArgs {
            role: &role,
            subject: &subject,
            content_type: &content_type,
            method: &method,
            endpoint: &endpoint,
            masked_roles,
            input: file.as_deref(),
            audit_path: audit.as_deref(),
        })
        .await
        .context("mask failed")?,
        Command::Audit { action } => match action {
            AuditAction::List { path, limit } => cli::audit::run_list(&path, limit)?,
            AuditAction::Verify { path } => cli::audit::run_verify(&path)?,
        },
    }

    Ok(())
}
