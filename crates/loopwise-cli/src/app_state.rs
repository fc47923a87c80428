//! Application state: domains, loop history and knowledge graphs.
//!
//! A plain value owned by the caller. Actions mutate it through `&mut self`
//! and it is saved as one JSON blob in the local store.

use crate::error::{LoopError, Result};
use crate::models::{Domain, KnowledgeEdge, KnowledgeNode, LoopResult};
use crate::storage::{LocalStore, APP_STATE_KEY};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default)]
    pub domains: Vec<Domain>,
    #[serde(default)]
    pub loops: Vec<LoopResult>,
    #[serde(default)]
    pub nodes: Vec<KnowledgeNode>,
    #[serde(default)]
    pub edges: Vec<KnowledgeEdge>,
}

/// Counts removed by a domain deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovedDomain {
    pub loops: usize,
    pub nodes: usize,
    pub edges: usize,
}

impl AppState {
    pub fn load(store: &dyn LocalStore) -> Result<Self> {
        match store.get(APP_STATE_KEY)? {
            Some(blob) => Ok(serde_json::from_str(&blob)?),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, store: &mut dyn LocalStore) -> Result<()> {
        let blob = serde_json::to_string(self)?;
        store.set(APP_STATE_KEY, &blob)?;
        Ok(())
    }

    // ────────────────────────────────────────────────────────────
    // Domains
    // ────────────────────────────────────────────────────────────

    pub fn add_domain(&mut self, name: &str, description: &str) -> Result<Domain> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LoopError::Validation("domain name cannot be empty".to_string()));
        }
        if self.find_domain(name).is_some() {
            return Err(LoopError::Validation(format!("domain '{}' already exists", name)));
        }

        let domain = Domain::new(name, description);
        self.domains.push(domain.clone());
        Ok(domain)
    }

    pub fn domain(&self, id: &str) -> Option<&Domain> {
        self.domains.iter().find(|d| d.id == id)
    }

    /// Look a domain up by id, then by case-insensitive name.
    pub fn find_domain(&self, key: &str) -> Option<&Domain> {
        self.domain(key).or_else(|| {
            self.domains
                .iter()
                .find(|d| d.name.eq_ignore_ascii_case(key.trim()))
        })
    }

    /// Delete a domain together with its loops, nodes and edges.
    pub fn remove_domain(&mut self, id: &str) -> Result<RemovedDomain> {
        let before = self.domains.len();
        self.domains.retain(|d| d.id != id);
        if self.domains.len() == before {
            return Err(LoopError::NotFound(format!("domain {}", id)));
        }

        let (loops, nodes, edges) = (self.loops.len(), self.nodes.len(), self.edges.len());
        self.loops.retain(|l| l.domain_id != id);
        self.nodes.retain(|n| n.domain_id != id);
        self.edges.retain(|e| e.domain_id != id);

        Ok(RemovedDomain {
            loops: loops - self.loops.len(),
            nodes: nodes - self.nodes.len(),
            edges: edges - self.edges.len(),
        })
    }

    // ────────────────────────────────────────────────────────────
    // Loops and graph
    // ────────────────────────────────────────────────────────────

    pub fn loops_for(&self, domain_id: &str) -> Vec<&LoopResult> {
        self.loops.iter().filter(|l| l.domain_id == domain_id).collect()
    }

    pub fn next_loop_number(&self, domain_id: &str) -> u64 {
        self.loops_for(domain_id)
            .iter()
            .map(|l| l.loop_number)
            .max()
            .unwrap_or(0)
            + 1
    }

    pub fn graph_for(&self, domain_id: &str) -> (Vec<&KnowledgeNode>, Vec<&KnowledgeEdge>) {
        (
            self.nodes.iter().filter(|n| n.domain_id == domain_id).collect(),
            self.edges.iter().filter(|e| e.domain_id == domain_id).collect(),
        )
    }

    /// Owned copy of a domain's nodes and edges, for layout passes.
    pub fn graph_for_mut(&mut self, domain_id: &str) -> (Vec<&mut KnowledgeNode>, Vec<KnowledgeEdge>) {
        let edges = self
            .edges
            .iter()
            .filter(|e| e.domain_id == domain_id)
            .cloned()
            .collect();
        let nodes = self
            .nodes
            .iter_mut()
            .filter(|n| n.domain_id == domain_id)
            .collect();
        (nodes, edges)
    }

    /// Append a finished loop and what it discovered.
    pub fn record_loop(
        &mut self,
        result: LoopResult,
        nodes: Vec<KnowledgeNode>,
        edges: Vec<KnowledgeEdge>,
    ) -> Result<()> {
        let domain = self
            .domains
            .iter_mut()
            .find(|d| d.id == result.domain_id)
            .ok_or_else(|| LoopError::NotFound(format!("domain {}", result.domain_id)))?;
        domain.updated_at = Utc::now();

        self.loops.push(result);
        self.nodes.extend(nodes);
        self.edges.extend(edges);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::MemoryStore;
    use crate::sync::queue::fixtures::{edge, loop_result, node};

    #[test]
    fn test_add_and_find_domain() {
        let mut app = AppState::default();
        let math = app.add_domain("Math", "numbers").unwrap();
        assert!(matches!(
            app.add_domain("math", ""),
            Err(LoopError::Validation(msg)) if msg.contains("already exists")
        ));
        assert!(matches!(app.add_domain("  ", ""), Err(LoopError::Validation(_))));

        assert_eq!(app.find_domain("MATH").unwrap().id, math.id);
        assert_eq!(app.find_domain(&math.id).unwrap().name, "Math");
        assert!(app.find_domain("logic").is_none());
    }

    #[test]
    fn test_remove_domain_deletes_graph() {
        let mut app = AppState::default();
        let math = app.add_domain("Math", "").unwrap();
        let logic = app.add_domain("Logic", "").unwrap();

        let mut l = loop_result("l0");
        l.domain_id = math.id.clone();
        let mut n = node("n0");
        n.domain_id = math.id.clone();
        let mut e = edge("e0");
        e.domain_id = math.id.clone();
        app.record_loop(l, vec![n], vec![e]).unwrap();

        let mut other = loop_result("l1");
        other.domain_id = logic.id.clone();
        app.record_loop(other, vec![], vec![]).unwrap();

        let removed = app.remove_domain(&math.id).unwrap();
        assert_eq!(removed, RemovedDomain { loops: 1, nodes: 1, edges: 1 });
        assert_eq!(app.loops.len(), 1);
        assert!(app.nodes.is_empty());
        assert!(app.remove_domain(&math.id).is_err());
    }

    #[test]
    fn test_loop_numbers_are_per_domain() {
        let mut app = AppState::default();
        let math = app.add_domain("Math", "").unwrap();
        assert_eq!(app.next_loop_number(&math.id), 1);

        let mut l = loop_result("l0");
        l.domain_id = math.id.clone();
        l.loop_number = 1;
        app.record_loop(l, vec![], vec![]).unwrap();
        assert_eq!(app.next_loop_number(&math.id), 2);
        assert_eq!(app.next_loop_number("other"), 1);
    }

    #[test]
    fn test_record_loop_requires_domain() {
        let mut app = AppState::default();
        assert!(app.record_loop(loop_result("l0"), vec![], vec![]).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let mut store = MemoryStore::new(1024 * 1024);
        assert!(AppState::load(&store).unwrap().domains.is_empty());

        let mut app = AppState::default();
        app.add_domain("Math", "").unwrap();
        app.save(&mut store).unwrap();

        let loaded = AppState::load(&store).unwrap();
        assert_eq!(loaded.domains.len(), 1);
        assert_eq!(loaded.domains[0].name, "Math");
    }
}
