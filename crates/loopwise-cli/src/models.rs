//! Record types shared by the app state, the pipeline and the sync queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ────────────────────────────────────────────────────────────────────
// Domains and loops
// ────────────────────────────────────────────────────────────────────

/// A named subject area owning its own loop history and knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Domain {
    pub fn new(name: &str, description: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One completed pass through task → solution → verification → reflection → mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopResult {
    pub id: String,
    pub domain_id: String,
    pub loop_number: u64,
    pub task: String,
    pub solution: String,
    pub verification: String,
    pub reflection: String,
    pub mutation: String,
    #[serde(default)]
    pub insights_found: usize,
    pub created_at: DateTime<Utc>,
}

// ────────────────────────────────────────────────────────────────────
// Knowledge graph
// ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    Rule,
    Concept,
    Pattern,
    Insight,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Rule => "rule",
            NodeType::Concept => "concept",
            NodeType::Pattern => "pattern",
            NodeType::Insight => "insight",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeType {
    BuildsOn,
    Contradicts,
    RelatedTo,
    Generalizes,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::BuildsOn => "builds-on",
            EdgeType::Contradicts => "contradicts",
            EdgeType::RelatedTo => "related-to",
            EdgeType::Generalizes => "generalizes",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percentage-space coordinate (0–100 on each axis).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeNode {
    pub id: String,
    pub domain_id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub discovered_in_loop: u64,
    pub position: Position,
    #[serde(default)]
    pub size: Option<u32>,
    pub confidence: f64,
    /// Ids of nodes this one explicitly derives from.
    #[serde(default)]
    pub source_insights: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEdge {
    pub id: String,
    pub domain_id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub strength: f64,
    /// `false` for edges declared through `source_insights`.
    #[serde(default = "default_auto_generated")]
    pub auto_generated: bool,
    pub created_at: DateTime<Utc>,
}

fn default_auto_generated() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names_serialize_kebab_case() {
        assert_eq!(serde_json::to_string(&EdgeType::BuildsOn).unwrap(), "\"builds-on\"");
        assert_eq!(serde_json::to_string(&EdgeType::RelatedTo).unwrap(), "\"related-to\"");
        assert_eq!(serde_json::to_string(&NodeType::Pattern).unwrap(), "\"pattern\"");
        assert_eq!(EdgeType::Generalizes.to_string(), "generalizes");
    }

    #[test]
    fn test_position_distance() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-9);
    }
}
