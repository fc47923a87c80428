//! `loopwise graph show|relayout`

use super::AppContext;
use crate::error::Result;
use crate::layout::relax;
use crate::models::KnowledgeNode;
use crate::sync::SyncRecord;
use console::style;
use std::collections::HashMap;

/// Print a domain's nodes and edges.
pub fn show(ctx: &AppContext, domain: &str) -> Result<()> {
    let domain = ctx.resolve_domain(domain)?;
    let (nodes, edges) = ctx.app.graph_for(&domain.id);

    println!("{}", style(format!("Knowledge graph: {}", domain.name)).bold().cyan());
    if nodes.is_empty() {
        println!("  (empty)");
        return Ok(());
    }

    let titles: HashMap<&str, &str> = nodes
        .iter()
        .map(|n| (n.id.as_str(), n.title.as_str()))
        .collect();

    println!("{}", style("Nodes").bold());
    for n in &nodes {
        println!(
            "  {} {} {}",
            style(format!("[{}]", n.node_type)).green(),
            n.title,
            style(format!(
                "{} · loop {} · conf {:.2} · ({:.1}, {:.1})",
                n.id, n.discovered_in_loop, n.confidence, n.position.x, n.position.y
            ))
            .dim()
        );
    }

    println!();
    println!("{}", style("Edges").bold());
    if edges.is_empty() {
        println!("  (none)");
    }
    for e in &edges {
        let label = |id: &str| titles.get(id).copied().unwrap_or("?").to_string();
        println!(
            "  {} {} {} {}",
            label(&e.source),
            style(format!("-{}->", e.edge_type)).yellow(),
            label(&e.target),
            style(format!("({:.2})", e.strength)).dim()
        );
    }
    Ok(())
}

/// Run `passes` layout passes over a domain's graph and save the positions.
pub async fn relayout(ctx: &mut AppContext, domain: &str, passes: usize) -> Result<()> {
    let domain = ctx.resolve_domain(domain)?;

    let updated: Vec<KnowledgeNode> = {
        let (nodes, edges) = ctx.app.graph_for_mut(&domain.id);
        let mut working: Vec<KnowledgeNode> = nodes.iter().map(|n| (**n).clone()).collect();
        relax(&mut working, &edges, passes);
        for (slot, moved) in nodes.into_iter().zip(&working) {
            slot.position = moved.position;
        }
        working
    };
    ctx.save()?;

    let queued = ctx
        .sync
        .enqueue_all(updated.iter().cloned().map(SyncRecord::Node).collect())
        .await;

    println!(
        "✅ Re-laid out {} nodes in {} ({} passes)",
        updated.len(),
        style(&domain.name).cyan(),
        passes
    );
    if queued > 0 {
        println!("{}", style(format!("{} nodes queued for sync", queued)).dim());
    }
    Ok(())
}
