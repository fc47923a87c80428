//! # Loopwise - learning loops with a knowledge graph
//!
//! Run task → solution → verification → reflection → mutation loops per
//! domain, grow a knowledge graph from what each reflection teaches, and
//! sync everything to a hosted backend in small batches.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod app_state;
mod cli;
mod config;
mod db;
mod error;
mod knowledge;
mod layout;
mod logging;
mod models;
mod pipeline;
mod remote;
mod storage;
mod sync;

use cli::{domain_cmd, graph_cmd, loop_cmd, sync_cmd, AppContext};
use pipeline::LoopInputs;

#[derive(Parser)]
#[command(name = "loopwise")]
#[command(about = "Learning loops that grow a knowledge graph")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage learning domains
    Domain {
        #[command(subcommand)]
        command: DomainCommands,
    },
    /// Run a learning loop or review past ones
    Loop {
        #[command(subcommand)]
        command: LoopCommands,
    },
    /// Inspect and lay out a domain's knowledge graph
    Graph {
        #[command(subcommand)]
        command: GraphCommands,
    },
    /// Remote sync controls
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
}

#[derive(Subcommand)]
enum DomainCommands {
    /// Create a domain
    Add {
        name: String,
        /// Short description
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List domains with loop and graph counts
    List,
    /// Delete a domain and everything recorded in it
    Remove {
        /// Domain name or id
        domain: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum LoopCommands {
    /// Run one loop; stages not passed as flags are prompted for
    Run {
        /// Domain name or id
        domain: String,
        #[arg(long)]
        task: Option<String>,
        #[arg(long)]
        solution: Option<String>,
        #[arg(long)]
        verification: Option<String>,
        #[arg(long)]
        reflection: Option<String>,
        #[arg(long)]
        mutation: Option<String>,
        /// Id of an existing node this loop's insights build on (repeatable)
        #[arg(long = "builds-on", value_name = "NODE_ID")]
        builds_on: Vec<String>,
    },
    /// Show recent loops, newest first
    History {
        domain: String,
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum GraphCommands {
    /// Print nodes and edges
    Show { domain: String },
    /// Recalculate node positions
    Relayout {
        domain: String,
        #[arg(short, long, default_value_t = 1)]
        passes: usize,
    },
}

#[derive(Subcommand)]
enum SyncCommands {
    /// Show queue size and sync health
    Status,
    /// Flush the queue now
    Now {
        /// Queue every local record that is not already pending first
        #[arg(long)]
        all: bool,
    },
    /// Turn remote sync on
    Enable,
    /// Turn remote sync off
    Disable,
    /// Drop everything queued
    Clear {
        #[arg(long, short)]
        yes: bool,
    },
    /// Run the periodic sync in the foreground
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    let mut ctx = AppContext::open()?;

    match cli.command {
        Commands::Domain { command } => match command {
            DomainCommands::Add { name, description } => {
                domain_cmd::add(&mut ctx, &name, description).await?;
            }
            DomainCommands::List => {
                domain_cmd::list(&ctx)?;
            }
            DomainCommands::Remove { domain, yes } => {
                domain_cmd::remove(&mut ctx, &domain, yes)?;
            }
        },
        Commands::Loop { command } => match command {
            LoopCommands::Run {
                domain,
                task,
                solution,
                verification,
                reflection,
                mutation,
                builds_on,
            } => {
                let inputs = LoopInputs {
                    task: task.unwrap_or_default(),
                    solution: solution.unwrap_or_default(),
                    verification: verification.unwrap_or_default(),
                    reflection: reflection.unwrap_or_default(),
                    mutation: mutation.unwrap_or_default(),
                    builds_on,
                };
                loop_cmd::run(&mut ctx, &domain, inputs).await?;
            }
            LoopCommands::History { domain, limit } => {
                loop_cmd::history(&ctx, &domain, limit)?;
            }
        },
        Commands::Graph { command } => match command {
            GraphCommands::Show { domain } => {
                graph_cmd::show(&ctx, &domain)?;
            }
            GraphCommands::Relayout { domain, passes } => {
                graph_cmd::relayout(&mut ctx, &domain, passes).await?;
            }
        },
        Commands::Sync { command } => match command {
            SyncCommands::Status => sync_cmd::status(&ctx).await?,
            SyncCommands::Now { all } => sync_cmd::now(&ctx, all).await?,
            SyncCommands::Enable => sync_cmd::enable(&ctx).await?,
            SyncCommands::Disable => sync_cmd::disable(&ctx).await?,
            SyncCommands::Clear { yes } => sync_cmd::clear(&ctx, yes).await?,
            SyncCommands::Watch => sync_cmd::watch(&ctx).await?,
        },
    }

    Ok(())
}
