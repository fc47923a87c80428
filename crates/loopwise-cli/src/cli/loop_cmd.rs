use super::AppContext;
use crate::error::Result;
use crate::pipeline::{run_loop, LoopInputs, Stage};
use console::style;
use dialoguer::Input;

/// `loopwise loop run <domain>`. Stages not given as flags are prompted for.
pub async fn run(ctx: &mut AppContext, domain: &str, mut inputs: LoopInputs) -> Result<()> {
    let domain = ctx.resolve_domain(domain)?;
    let next = ctx.app.next_loop_number(&domain.id);

    println!(
        "{}",
        style(format!("🔁 Loop {} in {}", next, domain.name)).bold().blue()
    );

    for stage in Stage::ALL {
        if !inputs.get(stage).trim().is_empty() {
            continue;
        }
        let value: String = Input::new()
            .with_prompt(format!("[{}] {}", stage, stage.prompt()))
            .interact_text()?;
        inputs.set(stage, value);
    }

    let outcome = run_loop(&mut ctx.app, &domain.id, inputs)?;
    ctx.save()?;
    let queued = ctx.sync.enqueue_all(outcome.records()).await;

    println!(
        "\n{}",
        style(format!(
            "✅ Loop {} complete: {} insights, {} connections",
            outcome.loop_result.loop_number,
            outcome.nodes.len(),
            outcome.edges.len()
        ))
        .green()
    );
    for node in &outcome.nodes {
        println!(
            "  {} {} {}",
            style(format!("[{}]", node.node_type)).yellow(),
            node.title,
            style(format!("({:.2})", node.confidence)).dim()
        );
    }
    if queued > 0 {
        println!("{}", style(format!("{} records queued for sync", queued)).dim());
    }
    Ok(())
}

/// `loopwise loop history <domain>`
pub fn history(ctx: &AppContext, domain: &str, limit: usize) -> Result<()> {
    let domain = ctx.resolve_domain(domain)?;
    let loops = ctx.app.loops_for(&domain.id);

    if loops.is_empty() {
        println!("No loops in {} yet.", style(&domain.name).cyan());
        return Ok(());
    }

    println!("{}", style(format!("History for {}", domain.name)).bold());
    for l in loops.iter().rev().take(limit) {
        println!(
            "  {} {} {}",
            style(format!("#{}", l.loop_number)).cyan(),
            l.task,
            style(format!(
                "· {} insights · {}",
                l.insights_found,
                l.created_at.format("%Y-%m-%d %H:%M")
            ))
            .dim()
        );
    }
    Ok(())
}
