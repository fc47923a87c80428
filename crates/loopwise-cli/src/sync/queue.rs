//! The sync queue: records produced locally that have not been written remotely yet.
//!
//! Each category is a FIFO list capped at `max_items`. Overflow evicts the
//! oldest entries. Domains are deduplicated by id first, so the queue holds
//! at most one copy of each domain and it is always the newest one.

use crate::error::Result;
use crate::models::{Domain, KnowledgeEdge, KnowledgeNode, LoopResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Loops,
    Nodes,
    Edges,
    Domains,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Loops => "loops",
            Category::Nodes => "nodes",
            Category::Edges => "edges",
            Category::Domains => "domains",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record waiting for remote persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", content = "record", rename_all = "snake_case")]
pub enum SyncRecord {
    Loop(LoopResult),
    Node(KnowledgeNode),
    Edge(KnowledgeEdge),
    Domain(Domain),
}

impl SyncRecord {
    pub fn category(&self) -> Category {
        match self {
            SyncRecord::Loop(_) => Category::Loops,
            SyncRecord::Node(_) => Category::Nodes,
            SyncRecord::Edge(_) => Category::Edges,
            SyncRecord::Domain(_) => Category::Domains,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            SyncRecord::Loop(r) => &r.id,
            SyncRecord::Node(r) => &r.id,
            SyncRecord::Edge(r) => &r.id,
            SyncRecord::Domain(r) => &r.id,
        }
    }
}

/// Per-category record counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub loops: usize,
    pub nodes: usize,
    pub edges: usize,
    pub domains: usize,
}

impl CategoryCounts {
    pub fn set(&mut self, category: Category, count: usize) {
        match category {
            Category::Loops => self.loops = count,
            Category::Nodes => self.nodes = count,
            Category::Edges => self.edges = count,
            Category::Domains => self.domains = count,
        }
    }

    pub fn total(&self) -> usize {
        self.loops + self.nodes + self.edges + self.domains
    }
}

/// Upper bound on how many records of each category go into one remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSizes {
    pub loops: usize,
    pub nodes: usize,
    pub edges: usize,
    pub domains: usize,
}

impl Default for BatchSizes {
    fn default() -> Self {
        Self {
            loops: 5,
            nodes: 5,
            edges: 5,
            domains: 3,
        }
    }
}

/// The records selected for one flush, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncBatch {
    pub loops: Vec<LoopResult>,
    pub nodes: Vec<KnowledgeNode>,
    pub edges: Vec<KnowledgeEdge>,
    pub domains: Vec<Domain>,
}

impl SyncBatch {
    pub fn counts(&self) -> CategoryCounts {
        CategoryCounts {
            loops: self.loops.len(),
            nodes: self.nodes.len(),
            edges: self.edges.len(),
            domains: self.domains.len(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncQueue {
    #[serde(default)]
    pub loops: Vec<LoopResult>,
    #[serde(default)]
    pub nodes: Vec<KnowledgeNode>,
    #[serde(default)]
    pub edges: Vec<KnowledgeEdge>,
    #[serde(default)]
    pub domains: Vec<Domain>,
}

/// Drop the oldest entries so that at most `max` remain.
fn trim_oldest<T>(items: &mut Vec<T>, max: usize) {
    if items.len() > max {
        let excess = items.len() - max;
        items.drain(..excess);
    }
}

fn take_front<T: Clone>(items: &[T], n: usize) -> Vec<T> {
    items.iter().take(n).cloned().collect()
}

fn drain_front<T>(items: &mut Vec<T>, n: usize) {
    let n = n.min(items.len());
    items.drain(..n);
}

impl SyncQueue {
    /// Append a record, evicting the oldest entries of its category beyond `max_items`.
    pub fn push(&mut self, record: SyncRecord, max_items: usize) {
        match record {
            SyncRecord::Loop(r) => {
                self.loops.push(r);
                trim_oldest(&mut self.loops, max_items);
            }
            SyncRecord::Node(r) => {
                self.nodes.push(r);
                trim_oldest(&mut self.nodes, max_items);
            }
            SyncRecord::Edge(r) => {
                self.edges.push(r);
                trim_oldest(&mut self.edges, max_items);
            }
            SyncRecord::Domain(r) => {
                self.domains.retain(|d| d.id != r.id);
                self.domains.push(r);
                trim_oldest(&mut self.domains, max_items);
            }
        }
    }

    pub fn counts(&self) -> CategoryCounts {
        CategoryCounts {
            loops: self.loops.len(),
            nodes: self.nodes.len(),
            edges: self.edges.len(),
            domains: self.domains.len(),
        }
    }

    pub fn total_len(&self) -> usize {
        self.counts().total()
    }

    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    pub fn ids(&self, category: Category) -> HashSet<&str> {
        match category {
            Category::Loops => self.loops.iter().map(|r| r.id.as_str()).collect(),
            Category::Nodes => self.nodes.iter().map(|r| r.id.as_str()).collect(),
            Category::Edges => self.edges.iter().map(|r| r.id.as_str()).collect(),
            Category::Domains => self.domains.iter().map(|r| r.id.as_str()).collect(),
        }
    }

    pub fn contains(&self, record: &SyncRecord) -> bool {
        self.ids(record.category()).contains(record.id())
    }

    /// Copy the oldest records of each category, up to the batch sizes.
    pub fn batch(&self, sizes: &BatchSizes) -> SyncBatch {
        SyncBatch {
            loops: take_front(&self.loops, sizes.loops),
            nodes: take_front(&self.nodes, sizes.nodes),
            edges: take_front(&self.edges, sizes.edges),
            domains: take_front(&self.domains, sizes.domains),
        }
    }

    /// Remove `sent` records from the front of each category.
    ///
    /// Count-based so that records appended while a flush was in flight stay queued.
    pub fn remove_sent(&mut self, sent: &CategoryCounts) {
        drain_front(&mut self.loops, sent.loops);
        drain_front(&mut self.nodes, sent.nodes);
        drain_front(&mut self.edges, sent.edges);
        drain_front(&mut self.domains, sent.domains);
    }

    pub fn trim_all(&mut self, max_items: usize) {
        trim_oldest(&mut self.loops, max_items);
        trim_oldest(&mut self.nodes, max_items);
        trim_oldest(&mut self.edges, max_items);
        trim_oldest(&mut self.domains, max_items);
    }

    /// Keep only the newest half of every category.
    pub fn halve(&mut self) {
        let keep = self.counts();
        trim_oldest(&mut self.loops, keep.loops / 2);
        trim_oldest(&mut self.nodes, keep.nodes / 2);
        trim_oldest(&mut self.edges, keep.edges / 2);
        trim_oldest(&mut self.domains, keep.domains / 2);
    }

    pub fn clear(&mut self) {
        *self = SyncQueue::default();
    }

    pub fn to_blob(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    #[cfg(test)]
    pub fn from_blob(blob: &str) -> Result<Self> {
        Ok(serde_json::from_str(blob)?)
    }

    pub fn byte_size(&self) -> usize {
        serde_json::to_string(self).map(|s| s.len()).unwrap_or(0)
    }
}

/// Records from `candidates` whose id is not already queued in their category.
pub fn missing_from_queue(queue: &SyncQueue, candidates: Vec<SyncRecord>) -> Vec<SyncRecord> {
    let mut seen: HashSet<(Category, String)> = HashSet::new();
    candidates
        .into_iter()
        .filter(|r| !queue.contains(r))
        .filter(|r| seen.insert((r.category(), r.id().to_string())))
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::models::{EdgeType, NodeType, Position};
    use chrono::Utc;

    pub fn loop_result(id: &str) -> LoopResult {
        LoopResult {
            id: id.to_string(),
            domain_id: "math".to_string(),
            loop_number: 1,
            task: "task".to_string(),
            solution: "solution".to_string(),
            verification: "verification".to_string(),
            reflection: "reflection".to_string(),
            mutation: "mutation".to_string(),
            insights_found: 0,
            created_at: Utc::now(),
        }
    }

    pub fn node(id: &str) -> KnowledgeNode {
        KnowledgeNode {
            id: id.to_string(),
            domain_id: "math".to_string(),
            title: id.to_string(),
            description: format!("description of {}", id),
            node_type: NodeType::Insight,
            discovered_in_loop: 1,
            position: Position::new(10.0, 10.0),
            size: Some(10),
            confidence: 0.7,
            source_insights: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn edge(id: &str) -> KnowledgeEdge {
        KnowledgeEdge {
            id: id.to_string(),
            domain_id: "math".to_string(),
            source: "a".to_string(),
            target: "b".to_string(),
            edge_type: EdgeType::BuildsOn,
            strength: 0.4,
            auto_generated: true,
            created_at: Utc::now(),
        }
    }

    pub fn domain(id: &str, name: &str) -> Domain {
        let now = Utc::now();
        Domain {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_category_never_exceeds_max() {
        let mut queue = SyncQueue::default();
        for i in 0..40 {
            queue.push(SyncRecord::Loop(loop_result(&format!("l{}", i))), 15);
            assert!(queue.loops.len() <= 15);
        }
        // oldest evicted first
        assert_eq!(queue.loops.first().unwrap().id, "l25");
        assert_eq!(queue.loops.last().unwrap().id, "l39");
    }

    #[test]
    fn test_overflow_only_trims_own_category() {
        let mut queue = SyncQueue::default();
        for i in 0..3 {
            queue.push(SyncRecord::Node(node(&format!("n{}", i))), 2);
        }
        queue.push(SyncRecord::Edge(edge("e0")), 2);
        assert_eq!(queue.nodes.len(), 2);
        assert_eq!(queue.edges.len(), 1);
    }

    #[test]
    fn test_domain_dedupe_keeps_newest() {
        let mut queue = SyncQueue::default();
        queue.push(SyncRecord::Domain(domain("d1", "Math")), 15);
        queue.push(SyncRecord::Domain(domain("d2", "Logic")), 15);
        queue.push(SyncRecord::Domain(domain("d1", "Mathematics")), 15);
        queue.push(SyncRecord::Domain(domain("d1", "Maths")), 15);

        assert_eq!(queue.domains.len(), 2);
        let d1: Vec<_> = queue.domains.iter().filter(|d| d.id == "d1").collect();
        assert_eq!(d1.len(), 1);
        assert_eq!(d1[0].name, "Maths");
        assert_eq!(queue.domains.last().unwrap().id, "d1");
    }

    #[test]
    fn test_batch_and_remove_sent_preserve_later_items() {
        let mut queue = SyncQueue::default();
        for i in 0..7 {
            queue.push(SyncRecord::Loop(loop_result(&format!("l{}", i))), 15);
        }
        let batch = queue.batch(&BatchSizes::default());
        assert_eq!(batch.loops.len(), 5);
        assert_eq!(batch.loops[0].id, "l0");

        // items appended while the batch is in flight
        queue.push(SyncRecord::Loop(loop_result("late")), 15);

        queue.remove_sent(&batch.counts());
        let ids: Vec<&str> = queue.loops.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["l5", "l6", "late"]);
    }

    #[test]
    fn test_remove_sent_tolerates_shorter_queue() {
        let mut queue = SyncQueue::default();
        queue.push(SyncRecord::Node(node("n0")), 15);
        queue.remove_sent(&CategoryCounts {
            nodes: 5,
            ..Default::default()
        });
        assert!(queue.is_empty());
    }

    #[test]
    fn test_halve_keeps_newest() {
        let mut queue = SyncQueue::default();
        for i in 0..5 {
            queue.push(SyncRecord::Edge(edge(&format!("e{}", i))), 15);
        }
        queue.push(SyncRecord::Domain(domain("d1", "Math")), 15);
        queue.halve();
        let ids: Vec<&str> = queue.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e3", "e4"]);
        assert!(queue.domains.is_empty());
    }

    #[test]
    fn test_halve_trims_every_category() {
        let mut queue = SyncQueue::default();
        for i in 0..5 {
            queue.push(SyncRecord::Loop(loop_result(&format!("l{}", i))), 15);
            queue.push(SyncRecord::Node(node(&format!("n{}", i))), 15);
        }
        for i in 0..4 {
            queue.push(SyncRecord::Domain(domain(&format!("d{}", i), "Math")), 15);
        }
        queue.halve();

        let loops: Vec<&str> = queue.loops.iter().map(|l| l.id.as_str()).collect();
        let domains: Vec<&str> = queue.domains.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(loops, vec!["l3", "l4"]);
        assert_eq!(queue.nodes.len(), 2);
        assert_eq!(domains, vec!["d2", "d3"]);
        assert!(queue.edges.is_empty());
    }

    #[test]
    fn test_blob_roundtrip_preserves_order() {
        let mut queue = SyncQueue::default();
        queue.push(SyncRecord::Loop(loop_result("l0")), 15);
        queue.push(SyncRecord::Loop(loop_result("l1")), 15);
        queue.push(SyncRecord::Node(node("n0")), 15);
        queue.push(SyncRecord::Edge(edge("e0")), 15);
        queue.push(SyncRecord::Domain(domain("d0", "Math")), 15);

        let restored = SyncQueue::from_blob(&queue.to_blob().unwrap()).unwrap();
        assert_eq!(restored, queue);
        assert_eq!(restored.loops[1].id, "l1");
    }

    #[test]
    fn test_missing_from_queue() {
        let mut queue = SyncQueue::default();
        queue.push(SyncRecord::Loop(loop_result("l0")), 15);

        let candidates = vec![
            SyncRecord::Loop(loop_result("l0")),
            SyncRecord::Loop(loop_result("l1")),
            SyncRecord::Loop(loop_result("l1")),
            // same id in another category is a different record
            SyncRecord::Node(node("l0")),
        ];
        let missing = missing_from_queue(&queue, candidates);
        assert_eq!(missing.len(), 2);
        assert_eq!(missing[0].id(), "l1");
        assert_eq!(missing[1].category(), Category::Nodes);
    }
}
