//! Force-directed layout for a domain's knowledge graph.
//!
//! One call is one relaxation step: a repulsion pass over every pair of
//! nodes, an attraction pass over every edge, then a clamp into the visible
//! area. There is no cooling schedule and no convergence check; callers
//! invoke it repeatedly to let the graph settle.

use crate::models::{KnowledgeEdge, KnowledgeNode};
use std::collections::HashMap;

const REPULSION_RADIUS: f64 = 30.0;
const REST_LENGTH: f64 = 15.0;
const ATTRACTION_DIVISOR: f64 = 10.0;
const STEP: f64 = 0.05;
const ATTRACTION_DAMPING: f64 = 0.5;
const MIN_COORD: f64 = 5.0;
const MAX_COORD: f64 = 95.0;

/// Run a single relaxation step over `nodes` in place.
pub fn calculate_graph_layout(nodes: &mut [KnowledgeNode], edges: &[KnowledgeEdge]) {
    if nodes.len() < 2 {
        return;
    }

    apply_repulsion(nodes);
    apply_attraction(nodes, edges);

    for node in nodes.iter_mut() {
        node.position.x = node.position.x.clamp(MIN_COORD, MAX_COORD);
        node.position.y = node.position.y.clamp(MIN_COORD, MAX_COORD);
    }
}

/// Run `passes` relaxation steps.
pub fn relax(nodes: &mut [KnowledgeNode], edges: &[KnowledgeEdge], passes: usize) {
    for _ in 0..passes {
        calculate_graph_layout(nodes, edges);
    }
}

fn apply_repulsion(nodes: &mut [KnowledgeNode]) {
    let n = nodes.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let (a, b) = (nodes[i].position, nodes[j].position);
            let mut dx = b.x - a.x;
            let mut dy = b.y - a.y;
            let distance = a.distance_to(&b);
            if distance >= REPULSION_RADIUS {
                continue;
            }
            // Coincident nodes have no direction; split them along x.
            if distance < f64::EPSILON {
                dx = 1.0;
                dy = 0.0;
            }

            let force = (REPULSION_RADIUS - distance) / REPULSION_RADIUS;
            let shift_x = dx * force * STEP;
            let shift_y = dy * force * STEP;

            nodes[i].position.x -= shift_x;
            nodes[i].position.y -= shift_y;
            nodes[j].position.x += shift_x;
            nodes[j].position.y += shift_y;
        }
    }
}

fn apply_attraction(nodes: &mut [KnowledgeNode], edges: &[KnowledgeEdge]) {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.id.as_str(), i))
        .collect();

    let pairs: Vec<(usize, usize)> = edges
        .iter()
        .filter_map(|edge| {
            let source = *index.get(edge.source.as_str())?;
            let target = *index.get(edge.target.as_str())?;
            (source != target).then_some((source, target))
        })
        .collect();

    for (s, t) in pairs {
        let (a, b) = (nodes[s].position, nodes[t].position);
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let distance = a.distance_to(&b);

        // Positive beyond the rest length (pull together), negative inside it (push apart).
        let force = (distance - REST_LENGTH) / ATTRACTION_DIVISOR;
        let shift_x = dx * force * STEP * ATTRACTION_DAMPING;
        let shift_y = dy * force * STEP * ATTRACTION_DAMPING;

        nodes[s].position.x += shift_x;
        nodes[s].position.y += shift_y;
        nodes[t].position.x -= shift_x;
        nodes[t].position.y -= shift_y;
    }
}
