//! Knowledge graph construction for Loopwise.
//!
//! Turns reflection text into knowledge nodes and links nodes of the same
//! domain together. Everything here is keyword and word-overlap heuristics
//! over English text; text that matches nothing falls back to
//! `NodeType::Insight` and `EdgeType::BuildsOn`.

use crate::models::{EdgeType, KnowledgeEdge, KnowledgeNode, NodeType, Position};
use chrono::Utc;
use rand::Rng;
use std::collections::HashSet;

/// Similarity must be strictly above this to synthesize an edge.
pub const SIMILARITY_THRESHOLD: f64 = 0.2;
/// Strength of an edge declared through `source_insights`.
pub const DECLARED_EDGE_STRENGTH: f64 = 0.9;

const BASE_CONFIDENCE: f64 = 0.7;
const CONFIDENCE_STEP: f64 = 0.2;
const MIN_CONFIDENCE: f64 = 0.3;
const MAX_CONFIDENCE: f64 = 1.0;

const RULE_KEYWORDS: &[&str] = &["rule", "should", "must"];
const PATTERN_KEYWORDS: &[&str] = &["pattern", "common", "recurring"];
const CONCEPT_KEYWORDS: &[&str] = &["concept", "understand", "idea"];

const HIGH_CERTAINTY: &[&str] = &[
    "clearly",
    "always",
    "definitely",
    "certainly",
    "proven",
    "established",
];
const LOW_CERTAINTY: &[&str] = &["might", "could", "perhaps", "possibly", "sometimes", "may"];

// Trailing spaces are intentional: "but " must not match "button".
const CONTRADICTS_KEYWORDS: &[&str] = &["contrary", "however", "but ", "unlike"];
const RELATED_KEYWORDS: &[&str] = &["similar", "related", "like ", "as in"];
const GENERALIZES_KEYWORDS: &[&str] = &["broader", "general", "overall"];

const INSIGHT_MARKERS: &[&str] = &[
    "learned",
    "realized",
    "discovered",
    "noticed",
    "insight",
    "important",
    "key",
    "should",
    "must",
    "always",
    "never",
    "pattern",
    "rule",
    "principle",
];
const MIN_INSIGHT_CHARS: usize = 15;
const TITLE_MAX_WORDS: usize = 8;

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ────────────────────────────────────────────────────────────────────
// Classification
// ────────────────────────────────────────────────────────────────────

/// Classify an insight by keyword. Rule keywords win over pattern, pattern over concept.
pub fn classify_node_type(text: &str) -> NodeType {
    let lower = text.to_lowercase();
    if contains_any(&lower, RULE_KEYWORDS) {
        NodeType::Rule
    } else if contains_any(&lower, PATTERN_KEYWORDS) {
        NodeType::Pattern
    } else if contains_any(&lower, CONCEPT_KEYWORDS) {
        NodeType::Concept
    } else {
        NodeType::Insight
    }
}

/// Confidence from linguistic certainty markers, in [0.3, 1.0].
///
/// Starts at 0.7. A high-certainty marker adds 0.2; otherwise a
/// low-certainty marker subtracts 0.2. Adjustments never stack.
pub fn estimate_confidence(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let confidence = if contains_any(&lower, HIGH_CERTAINTY) {
        (BASE_CONFIDENCE + CONFIDENCE_STEP).min(MAX_CONFIDENCE)
    } else if contains_any(&lower, LOW_CERTAINTY) {
        (BASE_CONFIDENCE - CONFIDENCE_STEP).max(MIN_CONFIDENCE)
    } else {
        BASE_CONFIDENCE
    };
    round2(confidence)
}

/// Relation type implied by the wording of the newer node's description.
pub fn classify_edge_type(description: &str) -> EdgeType {
    let lower = description.to_lowercase();
    if contains_any(&lower, CONTRADICTS_KEYWORDS) {
        EdgeType::Contradicts
    } else if contains_any(&lower, RELATED_KEYWORDS) {
        EdgeType::RelatedTo
    } else if contains_any(&lower, GENERALIZES_KEYWORDS) {
        EdgeType::Generalizes
    } else {
        EdgeType::BuildsOn
    }
}

// ────────────────────────────────────────────────────────────────────
// Similarity
// ────────────────────────────────────────────────────────────────────

/// Lower-cased words longer than three characters, with surrounding punctuation stripped.
pub fn significant_words(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.chars().count() > 3)
        .map(String::from)
        .collect()
}

/// Jaccard overlap of the significant words of two texts. 0.0 when both are empty.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let words_a = significant_words(a);
    let words_b = significant_words(b);

    let union = words_a.union(&words_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = words_a.intersection(&words_b).count();
    intersection as f64 / union as f64
}

// ────────────────────────────────────────────────────────────────────
// Node and edge creation
// ────────────────────────────────────────────────────────────────────

/// Short display title: the first few words of the insight.
pub fn derive_title(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= TITLE_MAX_WORDS {
        return words.join(" ");
    }
    format!("{}...", words[..TITLE_MAX_WORDS].join(" "))
}

pub fn create_knowledge_node(insight: &str, domain_id: &str, loop_number: u64) -> KnowledgeNode {
    create_knowledge_node_with_rng(insight, domain_id, loop_number, &mut rand::thread_rng())
}

/// Build a node from insight text. Position is uniform in [0, 80]² and size in [10, 20).
pub fn create_knowledge_node_with_rng<R: Rng + ?Sized>(
    insight: &str,
    domain_id: &str,
    loop_number: u64,
    rng: &mut R,
) -> KnowledgeNode {
    let description = insight.trim().to_string();
    KnowledgeNode {
        id: uuid::Uuid::new_v4().to_string(),
        domain_id: domain_id.to_string(),
        title: derive_title(&description),
        node_type: classify_node_type(&description),
        confidence: estimate_confidence(&description),
        description,
        discovered_in_loop: loop_number,
        position: Position::new(rng.gen_range(0.0..=80.0), rng.gen_range(0.0..=80.0)),
        size: Some(rng.gen_range(10..20)),
        source_insights: Vec::new(),
        created_at: Utc::now(),
    }
}

fn new_edge(
    new_node: &KnowledgeNode,
    source: &str,
    edge_type: EdgeType,
    strength: f64,
    auto_generated: bool,
) -> KnowledgeEdge {
    KnowledgeEdge {
        id: uuid::Uuid::new_v4().to_string(),
        domain_id: new_node.domain_id.clone(),
        source: source.to_string(),
        target: new_node.id.clone(),
        edge_type,
        strength,
        auto_generated,
        created_at: Utc::now(),
    }
}

/// Link `new_node` to the nodes it resembles and to the insights it declares.
///
/// Only nodes of the same domain are candidates. A candidate whose
/// description overlaps by more than `SIMILARITY_THRESHOLD` gets an
/// automatic edge whose type comes from the new node's wording. Every id in
/// `source_insights` gets a `builds-on` edge of strength 0.9 regardless of
/// similarity; such a candidate gets no additional automatic edge.
pub fn create_edges_between_nodes(
    new_node: &KnowledgeNode,
    existing: &[KnowledgeNode],
) -> Vec<KnowledgeEdge> {
    let declared: HashSet<&str> = new_node.source_insights.iter().map(String::as_str).collect();
    let edge_type = classify_edge_type(&new_node.description);
    let mut edges = Vec::new();

    for candidate in existing {
        if candidate.id == new_node.id || candidate.domain_id != new_node.domain_id {
            continue;
        }
        if declared.contains(candidate.id.as_str()) {
            continue;
        }

        let similarity = jaccard_similarity(&candidate.description, &new_node.description);
        if similarity > SIMILARITY_THRESHOLD {
            edges.push(new_edge(new_node, &candidate.id, edge_type, similarity, true));
        }
    }

    for source_id in &new_node.source_insights {
        edges.push(new_edge(
            new_node,
            source_id,
            EdgeType::BuildsOn,
            DECLARED_EDGE_STRENGTH,
            false,
        ));
    }

    edges
}

// ────────────────────────────────────────────────────────────────────
// Insight extraction
// ────────────────────────────────────────────────────────────────────

/// Sentences of a reflection that read like a takeaway.
pub fn extract_insights(reflection: &str) -> Vec<String> {
    reflection
        .split(|c: char| matches!(c, '.' | '!' | '?' | '\n'))
        .map(|s| s.trim().trim_start_matches(|c: char| c == '-' || c == '*').trim())
        .filter(|s| s.chars().count() >= MIN_INSIGHT_CHARS)
        .filter(|s| contains_any(&s.to_lowercase(), INSIGHT_MARKERS))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn node(id: &str, domain: &str, description: &str) -> KnowledgeNode {
        let mut rng = StdRng::seed_from_u64(7);
        let mut n = create_knowledge_node_with_rng(description, domain, 1, &mut rng);
        n.id = id.to_string();
        n
    }

    #[test]
    fn test_rule_with_high_certainty() {
        let n = create_knowledge_node("This is a rule: always validate input", "math", 3);
        assert_eq!(n.node_type, NodeType::Rule);
        assert_eq!(n.confidence, 0.9);
        assert_eq!(n.discovered_in_loop, 3);
    }

    #[test]
    fn test_classify_node_type_priority() {
        assert_eq!(classify_node_type("You must check edge cases"), NodeType::Rule);
        assert_eq!(classify_node_type("A recurring mistake in proofs"), NodeType::Pattern);
        assert_eq!(classify_node_type("The idea of induction"), NodeType::Concept);
        assert_eq!(classify_node_type("Le résultat était faux"), NodeType::Insight);
        // rule keywords are checked before pattern keywords
        assert_eq!(classify_node_type("A common rule of thumb"), NodeType::Rule);
    }

    #[test]
    fn test_confidence_markers() {
        assert_eq!(estimate_confidence("Plain statement"), 0.7);
        assert_eq!(estimate_confidence("This is CLEARLY true"), 0.9);
        assert_eq!(estimate_confidence("It might be true"), 0.5);
        // high marker wins, no stacking
        assert_eq!(estimate_confidence("It is proven that it might fail"), 0.9);
    }

    #[test]
    fn test_initial_placement_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let n = create_knowledge_node_with_rng("x", "d", 1, &mut rng);
            assert!((0.0..=80.0).contains(&n.position.x));
            assert!((0.0..=80.0).contains(&n.position.y));
            let size = n.size.unwrap();
            assert!((10..20).contains(&size));
        }
    }

    #[test]
    fn test_jaccard_similarity() {
        assert_eq!(jaccard_similarity("", ""), 0.0);
        assert_eq!(jaccard_similarity("a an the", "of to it"), 0.0);
        assert_eq!(jaccard_similarity("check input values", "check input values"), 1.0);
        // {check, input} ∩ {check, output} = {check}; union has 3 words
        let s = jaccard_similarity("check input", "check output");
        assert!((s - 1.0 / 3.0).abs() < 1e-9);
        // punctuation and case are ignored
        assert_eq!(jaccard_similarity("Validate, INPUT!", "validate input"), 1.0);
    }

    #[test]
    fn test_no_edge_without_shared_long_words() {
        let old = node("a", "math", "Sum the odd numbers first");
        let new = node("b", "math", "Check each proof step twice");
        assert!(create_edges_between_nodes(&new, &[old]).is_empty());
    }

    #[test]
    fn test_edge_for_similar_same_domain_node() {
        let old = node("a", "math", "Always check boundary values in proofs");
        let new = node("b", "math", "However boundary values in proofs hide errors");
        let edges = create_edges_between_nodes(&new, &[old.clone()]);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, "a");
        assert_eq!(edges[0].target, "b");
        assert_eq!(edges[0].edge_type, EdgeType::Contradicts);
        assert!(edges[0].strength > SIMILARITY_THRESHOLD);
        assert!(edges[0].auto_generated);

        // different domain: never linked
        let mut other = old;
        other.domain_id = "logic".to_string();
        assert!(create_edges_between_nodes(&new, &[other]).is_empty());
    }

    #[test]
    fn test_declared_source_insights() {
        let old = node("a", "math", "Totally unrelated words here");
        let mut new = node("b", "math", "Induction needs base cases");
        new.source_insights = vec!["a".to_string()];

        let edges = create_edges_between_nodes(&new, &[old]);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].edge_type, EdgeType::BuildsOn);
        assert_eq!(edges[0].strength, DECLARED_EDGE_STRENGTH);
        assert!(!edges[0].auto_generated);
    }

    #[test]
    fn test_classify_edge_type() {
        assert_eq!(classify_edge_type("This is unlike the last one"), EdgeType::Contradicts);
        assert_eq!(classify_edge_type("Works like recursion"), EdgeType::RelatedTo);
        assert_eq!(classify_edge_type("A broader view"), EdgeType::Generalizes);
        assert_eq!(classify_edge_type("Press the button"), EdgeType::BuildsOn);
    }

    #[test]
    fn test_extract_insights() {
        let reflection = "The task went fine. I learned that small steps reduce errors!\n\
                          - You should always restate the problem\nOk.";
        let insights = extract_insights(reflection);
        assert_eq!(
            insights,
            vec![
                "I learned that small steps reduce errors".to_string(),
                "You should always restate the problem".to_string(),
            ]
        );
    }

    #[test]
    fn test_derive_title() {
        assert_eq!(derive_title("short insight"), "short insight");
        assert_eq!(
            derive_title("one two three four five six seven eight nine ten"),
            "one two three four five six seven eight..."
        );
    }
}
