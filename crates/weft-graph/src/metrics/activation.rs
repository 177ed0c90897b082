//! Bounded spreading activation.
//!
//! The source starts with activation 1.0. Each hop pushes activation along
//! every edge in both directions, scaled by `decay × weight`:
//!
//! ```text
//! a_k(v) = Σ a_{k-1}(u) · decay · w(u, v)     over edges u → v and v → u
//! total(v) = Σ_{k=1..depth} a_k(v)
//! ```
//!
//! Negative weights contribute nothing, so `total` never decreases as
//! `depth` grows.

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef as _;

use crate::graph::VaultGraph;

/// Allowed hop range for [`spread_activation`].
pub const MIN_DEPTH: usize = 1;
pub const MAX_DEPTH: usize = 5;

/// Total activation per node index after `depth` hops from `source`.
///
/// The source's own entry includes activation that flowed back to it;
/// callers exclude it from rankings.
#[must_use]
pub fn spread_activation(g: &VaultGraph, source: NodeIndex, depth: usize, decay: f64) -> Vec<f64> {
    let n = g.node_count();
    let mut total = vec![0.0_f64; n];
    if source.index() >= n {
        return total;
    }

    let mut current = vec![0.0_f64; n];
    current[source.index()] = 1.0;
    let mut next = vec![0.0_f64; n];

    for _ in 0..depth {
        next.iter_mut().for_each(|a| *a = 0.0);
        for edge in g.graph.edge_references() {
            let w = edge.weight().weight.max(0.0) * decay;
            let (u, v) = (edge.source().index(), edge.target().index());
            next[v] += current[u] * w;
            next[u] += current[v] * w;
        }
        for (t, a) in total.iter_mut().zip(&next) {
            *t += a;
        }
        std::mem::swap(&mut current, &mut next);
    }

    total
}
