//! Single-Source Bellman-Ford with Cycle Recovery
//!
//! Step 2.2: The Pathfinder
//!
//! Relaxes every finite edge N-1 times from the base token, then makes one
//! more pass. Any edge that still improves proves a negative cycle reachable
//! from the base token; the predecessor chain is walked back to recover it.
//!
//! Edges are visited in row-major order on every pass, so the same snapshot
//! always yields the same cycle.

use petgraph::visit::EdgeRef;
use std::collections::HashSet;
use tracing::debug;

use super::WeightMatrix;
use crate::error::TickError;

/// A negative cycle as recovered from the predecessor chain.
///
/// `walk` is closed (first == last == `cycle_node`) and listed backwards:
/// `walk[k + 1]` is the predecessor of `walk[k]`, so every hop of the trade
/// goes from `walk[k + 1]` to `walk[k]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegativeCycle {
    walk: Vec<usize>,
}

impl NegativeCycle {
    pub fn walk(&self) -> &[usize] {
        &self.walk
    }

    /// Length of the closed walk, including the repeated closing vertex
    pub fn len(&self) -> usize {
        self.walk.len()
    }

    /// The vertex reached after walking N predecessors back
    pub fn cycle_node(&self) -> usize {
        self.walk[0]
    }

    /// Distinct vertices of the cycle, backwards, without the closing repeat
    pub fn vertices(&self) -> &[usize] {
        &self.walk[..self.walk.len() - 1]
    }

    pub fn contains(&self, vertex: usize) -> bool {
        self.vertices().contains(&vertex)
    }
}

/// Negative cycle detector over one tick's weight matrix
pub struct NegativeCycleDetector<'a> {
    weights: &'a WeightMatrix,
    src: usize,
}

impl<'a> NegativeCycleDetector<'a> {
    pub fn new(weights: &'a WeightMatrix, src: usize) -> Result<Self, TickError> {
        if src >= weights.size() {
            return Err(TickError::InvalidSource {
                src,
                size: weights.size(),
            });
        }
        Ok(Self { weights, src })
    }

    /// Find one negative cycle reachable from the source, if any.
    ///
    /// `Ok(None)` is the normal "nothing this tick" outcome. Distances and
    /// predecessors live only inside this call.
    pub fn detect(&self) -> Result<Option<NegativeCycle>, TickError> {
        let size = self.weights.size();
        let graph = self.weights.to_graph();

        // Self-loops can never be part of a multi-hop trade
        let edges: Vec<(usize, usize, f64)> = graph
            .edge_references()
            .filter(|e| e.source() != e.target())
            .map(|e| (graph[e.source()], graph[e.target()], *e.weight()))
            .collect();

        let mut distance = vec![f64::INFINITY; size];
        let mut predecessor: Vec<Option<usize>> = vec![None; size];
        distance[self.src] = 0.0;

        debug!(
            "Bellman-Ford from {} over {} tokens, {} edges",
            self.src,
            size,
            edges.len()
        );

        // Relax edges |V|-1 times
        for pass in 1..size {
            let mut changed = false;
            for &(u, v, w) in &edges {
                if distance[u].is_finite() && distance[u] + w < distance[v] {
                    distance[v] = distance[u] + w;
                    predecessor[v] = Some(u);
                    changed = true;
                }
            }
            // A quiet pass means every later pass is quiet too
            if !changed {
                debug!("Bellman-Ford converged after pass {}", pass);
                return Ok(None);
            }
        }

        // One more pass: the first edge that still improves proves a cycle
        let Some(&(u, v, _)) = edges
            .iter()
            .find(|&&(u, v, w)| distance[u].is_finite() && distance[u] + w < distance[v])
        else {
            return Ok(None);
        };

        debug!("Edge {} -> {} still relaxes: negative cycle", u, v);

        // Walk the chain as relaxation left it. Only if that runs into an
        // undefined link, route it through the improving edge and retry.
        match extract_cycle(&predecessor, v) {
            Err(TickError::BrokenPredecessorChain { vertex }) => {
                debug!("Chain from {} undefined at {}, retrying via {} -> {}", v, vertex, u, v);
                predecessor[v] = Some(u);
                extract_cycle(&predecessor, v).map(Some)
            }
            found => found.map(Some),
        }
    }
}

/// Walk back N steps from `start` to land on the cycle, then walk around it
/// once.
fn extract_cycle(predecessor: &[Option<usize>], start: usize) -> Result<NegativeCycle, TickError> {
    let mut vertex = start;
    for _ in 0..predecessor.len() {
        vertex = predecessor[vertex].ok_or(TickError::BrokenPredecessorChain { vertex })?;
    }
    close_cycle(predecessor, vertex)
}

/// Collect the cycle through `cycle_node`, backwards and closed.
/// A visited set bounds the walk so a malformed chain errors instead of
/// spinning.
fn close_cycle(predecessor: &[Option<usize>], cycle_node: usize) -> Result<NegativeCycle, TickError> {
    let step = |vertex: usize| {
        predecessor[vertex].ok_or(TickError::BrokenPredecessorChain { vertex })
    };

    let mut walk = vec![cycle_node];
    let mut visited = HashSet::from([cycle_node]);
    let mut current = step(cycle_node)?;
    loop {
        walk.push(current);
        if current == cycle_node {
            break;
        }
        if !visited.insert(current) {
            return Err(TickError::BrokenPredecessorChain { vertex: current });
        }
        current = step(current)?;
    }

    Ok(NegativeCycle { walk })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartographer::RateMatrix;
    use petgraph::algo::find_negative_cycle;
    use petgraph::graph::NodeIndex;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const NO: f64 = f64::INFINITY;

    fn weights(rows: Vec<Vec<f64>>) -> WeightMatrix {
        WeightMatrix::from_rates(&RateMatrix::from_rows(rows).unwrap()).unwrap()
    }

    fn profitable_triangle() -> WeightMatrix {
        weights(vec![
            vec![1.0, 2.0, NO],
            vec![NO, 1.0, 2.0],
            vec![0.5, NO, 1.0],
        ])
    }

    #[test]
    fn test_triangle_through_source() {
        let w = profitable_triangle();
        let cycle = NegativeCycleDetector::new(&w, 0).unwrap().detect().unwrap().unwrap();

        // closed backwards walk: 1 <- 0 <- 2 <- 1
        assert_eq!(cycle.walk(), &[1, 0, 2, 1]);
        assert_eq!(cycle.len(), 4);
        assert_eq!(cycle.cycle_node(), 1);
        assert!(cycle.contains(0));
    }

    #[test]
    fn test_consistent_market_has_no_cycle() {
        // fair prices minus a 1% spread on every hop
        let w = weights(vec![
            vec![1.0, 1.98, 3.96],
            vec![0.495, 1.0, 1.98],
            vec![0.2475, 0.495, 1.0],
        ]);
        assert!(NegativeCycleDetector::new(&w, 0).unwrap().detect().unwrap().is_none());
    }

    #[test]
    fn test_lossy_triangle_has_no_cycle() {
        // every loop returns 0.99 or less
        let w = weights(vec![
            vec![1.0, 2.0, NO],
            vec![NO, 1.0, 2.0],
            vec![0.2475, NO, 1.0],
        ]);
        assert!(NegativeCycleDetector::new(&w, 0).unwrap().detect().unwrap().is_none());
    }

    #[test]
    fn test_unreachable_cycle_is_not_reported() {
        // 1 <-> 2 is profitable but 0 has no way in
        let w = weights(vec![
            vec![1.0, NO, NO],
            vec![NO, 1.0, 2.0],
            vec![NO, 0.6, 1.0],
        ]);
        assert!(NegativeCycleDetector::new(&w, 0).unwrap().detect().unwrap().is_none());

        // from 1 it is found
        let cycle = NegativeCycleDetector::new(&w, 1).unwrap().detect().unwrap().unwrap();
        let mut vertices = cycle.vertices().to_vec();
        vertices.sort();
        assert_eq!(vertices, vec![1, 2]);
    }

    #[test]
    fn test_cycle_reachable_but_off_source() {
        // 0 -> 1 one way, 1 <-> 2 profitable
        let w = weights(vec![
            vec![1.0, 1.0, NO],
            vec![NO, 1.0, 2.0],
            vec![NO, 0.6, 1.0],
        ]);
        let cycle = NegativeCycleDetector::new(&w, 0).unwrap().detect().unwrap().unwrap();
        assert!(!cycle.contains(0));
        assert_eq!(cycle.vertices().len(), 2);
        assert_eq!(cycle.walk().first(), cycle.walk().last());
    }

    #[test]
    fn test_walk_follows_chain_as_relaxed() {
        // The first improving edge on the extra pass is 0 -> 1, but the
        // relaxed chain already runs 1 <- 2 <- 1, so that is the cycle.
        let w = weights(vec![
            vec![1.0, 1.25, NO],
            vec![1.25, 1.0, 1.25],
            vec![2.0, 1.25, 1.0],
        ]);
        let cycle = NegativeCycleDetector::new(&w, 0).unwrap().detect().unwrap().unwrap();
        assert_eq!(cycle.walk(), &[2, 1, 2]);
        assert_eq!(cycle.cycle_node(), 2);
        assert!(!cycle.contains(0));
    }

    #[test]
    fn test_undefined_predecessor_is_broken_chain() {
        // 2 <- 1 <- 0 <- ?
        let predecessor = vec![None, Some(0), Some(1)];
        assert_eq!(
            extract_cycle(&predecessor, 2),
            Err(TickError::BrokenPredecessorChain { vertex: 0 })
        );
    }

    #[test]
    fn test_chain_that_never_closes_is_broken() {
        // 0 leads into the 1 <-> 2 loop and is never revisited
        let predecessor = vec![Some(1), Some(2), Some(1)];
        assert_eq!(
            close_cycle(&predecessor, 0),
            Err(TickError::BrokenPredecessorChain { vertex: 1 })
        );

        // walking back first lands on the loop, which does close
        let cycle = extract_cycle(&predecessor, 0).unwrap();
        assert_eq!(cycle.walk().first(), cycle.walk().last());
        assert_eq!(cycle.vertices().len(), 2);
    }

    #[test]
    fn test_invalid_source() {
        let w = profitable_triangle();
        assert!(matches!(
            NegativeCycleDetector::new(&w, 3),
            Err(TickError::InvalidSource { src: 3, size: 3 })
        ));
    }

    #[test]
    fn test_single_token_market() {
        let w = weights(vec![vec![1.0]]);
        assert!(NegativeCycleDetector::new(&w, 0).unwrap().detect().unwrap().is_none());
    }

    #[test]
    fn test_detection_is_deterministic() {
        let w = weights(vec![
            vec![1.0, 2.0, 1.0, NO],
            vec![NO, 1.0, 2.0, 1.1],
            vec![0.5, 0.6, 1.0, NO],
            vec![1.0, NO, NO, 1.0],
        ]);
        let detector = NegativeCycleDetector::new(&w, 0).unwrap();
        let first = detector.detect().unwrap();
        assert!(first.is_some());
        for _ in 0..5 {
            assert_eq!(detector.detect().unwrap(), first);
        }
    }

    #[test]
    fn test_recovered_cycle_is_negative() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let n = rng.gen_range(3..9);
            let rows: Vec<Vec<f64>> = (0..n)
                .map(|i| {
                    (0..n)
                        .map(|j| {
                            if i == j {
                                1.0
                            } else if rng.gen_bool(0.3) {
                                NO
                            } else {
                                rng.gen_range(0.5..1.6)
                            }
                        })
                        .collect()
                })
                .collect();
            let w = weights(rows);

            let found = NegativeCycleDetector::new(&w, 0).unwrap().detect().unwrap();

            let graph = w.to_graph();
            let oracle = find_negative_cycle(&graph, NodeIndex::new(0));
            assert_eq!(found.is_some(), oracle.is_some());

            if let Some(cycle) = found {
                // hops go walk[k + 1] -> walk[k]
                let forward: Vec<usize> = cycle.walk().iter().rev().copied().collect();
                let total = w.path_weight(&forward).expect("every hop is an edge");
                assert!(total < 0.0);
            }
        }
    }
}
