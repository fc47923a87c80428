//! The five-stage learning loop.

use crate::app_state::AppState;
use crate::error::{LoopError, Result};
use crate::knowledge::{create_edges_between_nodes, create_knowledge_node, extract_insights};
use crate::models::{KnowledgeEdge, KnowledgeNode, LoopResult};
use crate::sync::SyncRecord;
use chrono::Utc;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Task,
    Solution,
    Verification,
    Reflection,
    Mutation,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Task,
        Stage::Solution,
        Stage::Verification,
        Stage::Reflection,
        Stage::Mutation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Task => "task",
            Stage::Solution => "solution",
            Stage::Verification => "verification",
            Stage::Reflection => "reflection",
            Stage::Mutation => "mutation",
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self {
            Stage::Task => "What is the task for this loop?",
            Stage::Solution => "How did you solve it?",
            Stage::Verification => "How did you verify the solution?",
            Stage::Reflection => "What did you learn?",
            Stage::Mutation => "What will you change next time?",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of each stage, as entered by the learner.
#[derive(Debug, Clone, Default)]
pub struct LoopInputs {
    pub task: String,
    pub solution: String,
    pub verification: String,
    pub reflection: String,
    pub mutation: String,
    /// Ids of existing nodes every insight of this loop builds on.
    pub builds_on: Vec<String>,
}

impl LoopInputs {
    pub fn get(&self, stage: Stage) -> &str {
        match stage {
            Stage::Task => &self.task,
            Stage::Solution => &self.solution,
            Stage::Verification => &self.verification,
            Stage::Reflection => &self.reflection,
            Stage::Mutation => &self.mutation,
        }
    }

    pub fn set(&mut self, stage: Stage, value: String) {
        let slot = match stage {
            Stage::Task => &mut self.task,
            Stage::Solution => &mut self.solution,
            Stage::Verification => &mut self.verification,
            Stage::Reflection => &mut self.reflection,
            Stage::Mutation => &mut self.mutation,
        };
        *slot = value;
    }
}

#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub loop_result: LoopResult,
    pub nodes: Vec<KnowledgeNode>,
    pub edges: Vec<KnowledgeEdge>,
}

impl LoopOutcome {
    /// Everything the loop produced, in the order it should be synced.
    pub fn records(&self) -> Vec<SyncRecord> {
        let mut records = vec![SyncRecord::Loop(self.loop_result.clone())];
        records.extend(self.nodes.iter().cloned().map(SyncRecord::Node));
        records.extend(self.edges.iter().cloned().map(SyncRecord::Edge));
        records
    }
}

/// Complete one loop for `domain_id` and record what it discovered.
pub fn run_loop(app: &mut AppState, domain_id: &str, inputs: LoopInputs) -> Result<LoopOutcome> {
    if app.domain(domain_id).is_none() {
        return Err(LoopError::NotFound(format!("domain {}", domain_id)));
    }
    if let Some(stage) = Stage::ALL
        .iter()
        .find(|s| inputs.get(**s).trim().is_empty())
    {
        return Err(LoopError::Pipeline(format!("stage '{}' has no output", stage)));
    }
    if let Some(unknown) = inputs
        .builds_on
        .iter()
        .find(|id| !app.nodes.iter().any(|n| &n.id == *id && n.domain_id == domain_id))
    {
        return Err(LoopError::Validation(format!(
            "node {} is not part of this domain",
            unknown
        )));
    }

    let loop_number = app.next_loop_number(domain_id);

    // Candidates grow as nodes are created so later insights can link to earlier ones.
    let mut candidates: Vec<KnowledgeNode> = app
        .nodes
        .iter()
        .filter(|n| n.domain_id == domain_id)
        .cloned()
        .collect();
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    for insight in extract_insights(&inputs.reflection) {
        let mut node = create_knowledge_node(&insight, domain_id, loop_number);
        node.source_insights = inputs.builds_on.clone();
        edges.extend(create_edges_between_nodes(&node, &candidates));
        candidates.push(node.clone());
        nodes.push(node);
    }

    let loop_result = LoopResult {
        id: uuid::Uuid::new_v4().to_string(),
        domain_id: domain_id.to_string(),
        loop_number,
        task: inputs.task.trim().to_string(),
        solution: inputs.solution.trim().to_string(),
        verification: inputs.verification.trim().to_string(),
        reflection: inputs.reflection.trim().to_string(),
        mutation: inputs.mutation.trim().to_string(),
        insights_found: nodes.len(),
        created_at: Utc::now(),
    };

    info!(
        domain = %domain_id,
        loop_number,
        nodes = nodes.len(),
        edges = edges.len(),
        "Loop completed"
    );

    app.record_loop(loop_result.clone(), nodes.clone(), edges.clone())?;

    Ok(LoopOutcome {
        loop_result,
        nodes,
        edges,
    })
}
