//! `loopwise sync status|now|enable|disable|clear|watch`

use super::{confirm, AppContext};
use crate::error::Result;
use crate::sync::{FlushOutcome, SyncEvent, SyncRecord, SyncScheduler, ToggleOutcome};
use console::style;
use tokio::sync::broadcast::error::RecvError;

pub async fn status(ctx: &AppContext) -> Result<()> {
    let status = ctx.sync.status().await;

    println!("{}", style("Sync status").bold().cyan());
    println!("  {}", status.format_summary());
    println!(
        "  queued: {} loops, {} nodes, {} edges, {} domains",
        status.pending.loops, status.pending.nodes, status.pending.edges, status.pending.domains
    );
    if !ctx.config.remote.is_configured() {
        println!(
            "  {}",
            style("remote not configured: set [remote] in config.toml").yellow()
        );
    }
    if let Ok(dir) = crate::logging::log_dir() {
        println!("  {}", style(format!("logs: {}", dir.display())).dim());
    }
    Ok(())
}

/// Flush until the queue drains or a flush fails. `all` first queues every
/// local record that is not already pending.
pub async fn now(ctx: &AppContext, all: bool) -> Result<()> {
    if !ctx.sync.is_remote_enabled().await {
        println!(
            "Remote sync is off. Enable it with {}.",
            style("loopwise sync enable").cyan()
        );
        return Ok(());
    }

    if all {
        let mut records: Vec<SyncRecord> = Vec::new();
        records.extend(ctx.app.domains.iter().cloned().map(SyncRecord::Domain));
        records.extend(ctx.app.loops.iter().cloned().map(SyncRecord::Loop));
        records.extend(ctx.app.nodes.iter().cloned().map(SyncRecord::Node));
        records.extend(ctx.app.edges.iter().cloned().map(SyncRecord::Edge));
        let queued = ctx.sync.enqueue_missing(records).await;
        println!("Queued {} local records", queued);
    }

    let mut accepted_total = 0;
    loop {
        match ctx.sync.flush().await {
            FlushOutcome::Empty => break,
            FlushOutcome::Synced { accepted, .. } => accepted_total += accepted,
            FlushOutcome::Failed { reason } => {
                println!("{}", style(format!("❌ Sync failed: {}", reason)).red());
                return Ok(());
            }
            FlushOutcome::InProgress => {
                println!("Another sync is already running.");
                return Ok(());
            }
        }
    }

    println!(
        "{}",
        style(format!("✅ Synced {} records", accepted_total)).green()
    );
    Ok(())
}

pub async fn enable(ctx: &AppContext) -> Result<()> {
    match ctx.sync.toggle_remote(true, &ctx.app.domains).await {
        ToggleOutcome::Enabled { seeded } => {
            println!("{}", style("✅ Remote sync enabled").green());
            if seeded > 0 {
                println!("  {} domains queued for upload", seeded);
            }
        }
        ToggleOutcome::Unconfigured => {
            println!(
                "{}",
                style("❌ Remote is not configured; sync stays off").red()
            );
            println!(
                "Set url and api_key under [remote] in {}",
                style("~/.loopwise/config.toml").cyan()
            );
        }
        ToggleOutcome::Disabled => {}
    }
    Ok(())
}

pub async fn disable(ctx: &AppContext) -> Result<()> {
    ctx.sync.toggle_remote(false, &[]).await;
    println!("Remote sync disabled. Queued records are kept.");
    Ok(())
}

pub async fn clear(ctx: &AppContext, yes: bool) -> Result<()> {
    let pending = ctx.sync.status().await.pending.total();
    if !confirm(
        &format!("Drop {} queued records and reset sync stats?", pending),
        yes,
    )? {
        println!("Cancelled.");
        return Ok(());
    }
    ctx.sync.clear_queue().await;
    println!("🗑  Sync queue cleared");
    Ok(())
}

/// Run the background scheduler in the foreground and print its events until ctrl-c.
pub async fn watch(ctx: &AppContext) -> Result<()> {
    let mut events = ctx.sync.subscribe();
    let scheduler = SyncScheduler::spawn(ctx.sync.clone());
    let config = ctx.sync.config();

    println!(
        "{}",
        style(format!(
            "Watching sync (first flush in {}s, then every {}s). Ctrl-C to stop.",
            config.initial_delay_secs, config.interval_secs
        ))
        .dim()
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            event = events.recv() => match event {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(n)) => println!("{}", style(format!("({} events skipped)", n)).dim()),
                Err(RecvError::Closed) => break,
            },
        }
    }

    scheduler.shutdown().await;
    println!("Stopped.");
    Ok(())
}

fn print_event(event: &SyncEvent) {
    let now = chrono::Local::now().format("%H:%M:%S");
    let line = match event {
        SyncEvent::QueueChanged { pending } => format!("queue changed · {} pending", pending),
        SyncEvent::Synced { accepted, pending } => style(format!(
            "synced {} records · {} pending",
            accepted, pending
        ))
        .green()
        .to_string(),
        SyncEvent::SyncFailed { reason } => style(format!("sync failed: {}", reason)).red().to_string(),
        SyncEvent::QuotaWarning { message } => style(message).yellow().to_string(),
        SyncEvent::RemoteDisabled { reason } => {
            style(format!("remote disabled: {}", reason)).yellow().to_string()
        }
    };
    println!("{} {}", style(now).dim(), line);
}
