//! Composite candidate scoring.
//!
//! ```text
//! score = lexical_weight · lexical + tag_weight · tags
//!       + graph_weight · graph + topic_weight · topic
//! ```
//!
//! Every signal lies in `[0, 1]`:
//!
//! - **lexical**: cosine of title + description term vectors (1.0 for an
//!   explicit inline mention).
//! - **tags**: Jaccard of the two tag sets.
//! - **graph**: `1 / (d - 1)` for an undirected hop distance `d` of 2 up to
//!   `proximity_max_hops`, so a shared neighbour scores 1.0. A direct edge
//!   is never counted.
//! - **topic**: 1.0 for the same topic path, otherwise the share of leading
//!   `/`-segments in common.

use std::collections::{BTreeSet, VecDeque};

use petgraph::graph::NodeIndex;
use serde::Serialize;
use weft_core::config::DensifyConfig;
use weft_core::model::{ContentType, Node};
use weft_graph::VaultGraph;

use crate::text::{TermVector, cosine, term_vector};

/// Per-signal breakdown of a candidate's score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub lexical: f64,
    pub tags: f64,
    pub graph: f64,
    pub topic: f64,
    pub total: f64,
}

/// The parts of a node the scorer reads.
#[derive(Debug, Clone)]
pub struct Profile {
    pub id: String,
    pub title: String,
    pub content_type: ContentType,
    terms: TermVector,
    tags: BTreeSet<String>,
    topic: Vec<String>,
}

impl Profile {
    #[must_use]
    pub fn of(node: &Node) -> Self {
        let text = std::iter::once(node.title.as_str()).chain(node.description.as_deref());
        Self {
            id: node.id.clone(),
            title: node.title.clone(),
            content_type: node.content_type,
            terms: term_vector(text),
            tags: node.tags.iter().map(|t| t.to_lowercase()).collect(),
            topic: topic_segments(node.topic.as_deref()),
        }
    }
}

fn topic_segments(topic: Option<&str>) -> Vec<String> {
    topic
        .unwrap_or_default()
        .split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// `|A ∩ B| / |A ∪ B|`, or 0 when both sets are empty.
#[must_use]
pub fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

fn topic_match(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let shared = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    shared as f64 / a.len().max(b.len()) as f64
}

/// Graph-proximity signal for an indirect hop distance.
#[must_use]
pub fn proximity(hops: Option<usize>, max_hops: usize) -> f64 {
    match hops {
        Some(d) if (2..=max_hops).contains(&d) => 1.0 / (d - 1) as f64,
        _ => 0.0,
    }
}

/// Hop distance between `a` and `b` ignoring direction and ignoring any
/// direct `a`–`b` edge, up to `max_hops`.
#[must_use]
pub fn indirect_hops(g: &VaultGraph, a: NodeIndex, b: NodeIndex, max_hops: usize) -> Option<usize> {
    if a == b {
        return None;
    }
    let mut dist: Vec<Option<usize>> = vec![None; g.node_count()];
    dist[a.index()] = Some(0);
    let mut queue = VecDeque::from([a]);
    while let Some(u) = queue.pop_front() {
        let du = dist[u.index()].unwrap_or_default();
        if du >= max_hops {
            continue;
        }
        for v in g.undirected_neighbours(u) {
            if u == a && v == b {
                continue;
            }
            if dist[v.index()].is_none() {
                if v == b {
                    return Some(du + 1);
                }
                dist[v.index()] = Some(du + 1);
                queue.push_back(v);
            }
        }
    }
    None
}

/// Score `candidate` against `source`.
///
/// `hops` is the indirect hop distance between them; `mentioned` marks an
/// inline reference from the source body.
#[must_use]
pub fn score_pair(
    source: &Profile,
    candidate: &Profile,
    hops: Option<usize>,
    mentioned: bool,
    config: &DensifyConfig,
) -> ScoreBreakdown {
    let lexical = if mentioned {
        1.0
    } else {
        cosine(&source.terms, &candidate.terms)
    };
    let tags = jaccard(&source.tags, &candidate.tags);
    let graph = proximity(hops, config.proximity_max_hops);
    let topic = topic_match(&source.topic, &candidate.topic);
    let total = config.topic_weight.mul_add(
        topic,
        config.graph_weight.mul_add(
            graph,
            config
                .tag_weight
                .mul_add(tags, config.lexical_weight * lexical),
        ),
    );
    ScoreBreakdown {
        lexical,
        tags,
        graph,
        topic,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_graph::graph::graph_from_pairs;

    fn node(id: &str, title: &str, tags: &[&str], topic: Option<&str>) -> Node {
        Node {
            id: id.to_string(),
            content_type: ContentType::Note,
            subtype: None,
            status: "draft".to_string(),
            maturity: None,
            title: title.to_string(),
            description: None,
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            topic: topic.map(str::to_string),
            created_at_us: 0,
            updated_at_us: 0,
            archived: false,
            analytics: weft_core::model::AnalyticsSnapshot::default(),
        }
    }

    #[test]
    fn topic_match_gives_partial_credit_for_shared_prefix() {
        let seg = |t: &str| topic_segments(Some(t));
        assert!((topic_match(&seg("lang/rust"), &seg("lang/rust")) - 1.0).abs() < 1e-12);
        assert!((topic_match(&seg("lang/rust"), &seg("lang/go")) - 0.5).abs() < 1e-12);
        assert!((topic_match(&seg("lang/rust/async"), &seg("lang")) - 1.0 / 3.0).abs() < 1e-12);
        assert!(topic_match(&seg("garden"), &seg("lang")).abs() < f64::EPSILON);
        assert!(topic_match(&seg(""), &seg("")).abs() < f64::EPSILON);
    }

    #[test]
    fn jaccard_handles_empty_sets() {
        let empty: BTreeSet<&str> = BTreeSet::new();
        let ab: BTreeSet<&str> = ["a", "b"].into_iter().collect();
        let bc: BTreeSet<&str> = ["b", "c"].into_iter().collect();
        assert!(jaccard(&empty, &empty).abs() < f64::EPSILON);
        assert!((jaccard(&ab, &bc) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn proximity_decays_with_distance() {
        assert!(proximity(Some(1), 5).abs() < f64::EPSILON);
        assert!((proximity(Some(2), 5) - 1.0).abs() < 1e-12);
        assert!((proximity(Some(3), 5) - 0.5).abs() < 1e-12);
        assert!(proximity(Some(6), 5).abs() < f64::EPSILON);
        assert!(proximity(None, 5).abs() < f64::EPSILON);
    }

    #[test]
    fn indirect_hops_skip_the_direct_edge() {
        let g = graph_from_pairs(&["a", "b", "c"], &[("a", "b"), ("a", "c"), ("c", "b")]);
        let a = g.node_index("a").expect("a");
        let b = g.node_index("b").expect("b");
        assert_eq!(indirect_hops(&g, a, b, 5), Some(2));

        let lone = graph_from_pairs(&["a", "b"], &[("a", "b")]);
        let (a, b) = (
            lone.node_index("a").expect("a"),
            lone.node_index("b").expect("b"),
        );
        assert_eq!(indirect_hops(&lone, a, b, 5), None);
    }

    #[test]
    fn identical_profiles_score_the_non_graph_weights() {
        let cfg = DensifyConfig::default();
        let a = Profile::of(&node("note-0000000a", "Rust ownership", &["rust"], Some("lang/rust")));
        let b = Profile::of(&node("note-0000000b", "rust OWNERSHIP", &["Rust"], Some("lang/rust")));
        let s = score_pair(&a, &b, None, false, &cfg);
        assert!((s.lexical - 1.0).abs() < 1e-12);
        assert!((s.tags - 1.0).abs() < 1e-12);
        assert!((s.total - 0.8).abs() < 1e-12);
    }

    #[test]
    fn mentions_force_full_lexical_credit() {
        let cfg = DensifyConfig::default();
        let a = Profile::of(&node("note-0000000a", "Tomatoes", &[], None));
        let b = Profile::of(&node("note-0000000b", "Compilers", &[], None));
        let s = score_pair(&a, &b, None, true, &cfg);
        assert!((s.total - cfg.lexical_weight).abs() < 1e-12);
    }
}
