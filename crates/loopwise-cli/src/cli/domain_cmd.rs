//! `loopwise domain add|list|remove`

use super::{confirm, AppContext};
use crate::error::Result;
use crate::sync::SyncRecord;
use console::style;

/// `loopwise domain add <name>`
pub async fn add(ctx: &mut AppContext, name: &str, description: Option<String>) -> Result<()> {
    let domain = ctx
        .app
        .add_domain(name, description.as_deref().unwrap_or_default())?;
    ctx.save()?;
    ctx.sync.enqueue(SyncRecord::Domain(domain.clone())).await;

    println!(
        "✅ Added domain '{}' {}",
        style(&domain.name).cyan(),
        style(&domain.id).dim()
    );
    Ok(())
}

/// `loopwise domain list`
pub fn list(ctx: &AppContext) -> Result<()> {
    if ctx.app.domains.is_empty() {
        println!("No domains yet.");
        println!("Create one with {}.", style("loopwise domain add <name>").cyan());
        return Ok(());
    }

    println!("{}", style("Domains:").bold());
    for d in &ctx.app.domains {
        let (nodes, edges) = ctx.app.graph_for(&d.id);
        println!(
            "  {} — {} loops, {} nodes, {} edges",
            style(&d.name).cyan(),
            ctx.app.loops_for(&d.id).len(),
            nodes.len(),
            edges.len()
        );
        if !d.description.is_empty() {
            println!("    {}", style(&d.description).dim());
        }
    }
    Ok(())
}

/// `loopwise domain remove <name>`
pub fn remove(ctx: &mut AppContext, key: &str, yes: bool) -> Result<()> {
    let domain = ctx.resolve_domain(key)?;
    let prompt = format!(
        "Delete '{}' and all of its loops and knowledge?",
        domain.name
    );
    if !confirm(&prompt, yes)? {
        println!("Cancelled.");
        return Ok(());
    }

    let removed = ctx.app.remove_domain(&domain.id)?;
    ctx.save()?;

    println!(
        "🗑  Removed '{}' ({} loops, {} nodes, {} edges)",
        style(&domain.name).cyan(),
        removed.loops,
        removed.nodes,
        removed.edges
    );
    Ok(())
}
