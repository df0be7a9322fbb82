//! Weight Transform
//!
//! Step 2.1: The Log Map
//!
//! Multiplicative rates become additive path costs: w = -ln(rate).
//! A profitable loop (product of rates > 1) is then a negative cycle.
//! Unquoted pairs (+inf rate) become +inf weight, i.e. no edge.

use petgraph::graph::{DiGraph, NodeIndex};

use crate::cartographer::RateMatrix;
use crate::error::TickError;

/// Row-major N×N additive weights derived from one tick's rates
#[derive(Debug, Clone, PartialEq)]
pub struct WeightMatrix {
    size: usize,
    weights: Vec<f64>,
}

impl WeightMatrix {
    /// Transform every rate independently.
    ///
    /// Fails on the first zero, negative or NaN rate in row-major order.
    /// A zero rate must not silently become +inf: that would hide a broken
    /// quote as "no edge".
    pub fn from_rates(rates: &RateMatrix) -> Result<Self, TickError> {
        let size = rates.size();
        let weights = rates
            .entries()
            .iter()
            .enumerate()
            .map(|(k, &rate)| negate_log(rate).ok_or(TickError::DataFault {
                row: k / size,
                col: k % size,
                rate,
            }))
            .collect::<Result<Vec<f64>, TickError>>()?;

        Ok(Self { size, weights })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, from: usize, to: usize) -> f64 {
        self.weights[from * self.size + to]
    }

    /// Finite edges as (from, to, weight), row-major.
    ///
    /// This order is the relaxation order, which makes detection deterministic.
    pub fn edges(&self) -> Vec<(usize, usize, f64)> {
        self.weights
            .iter()
            .enumerate()
            .filter(|(_, w)| w.is_finite())
            .map(|(k, &w)| (k / self.size, k % self.size, w))
            .collect()
    }

    /// Sum of weights along consecutive hops of `path`.
    /// Returns `None` if any hop has no edge.
    pub fn path_weight(&self, path: &[usize]) -> Option<f64> {
        path.windows(2).try_fold(0.0, |acc, hop| {
            let w = self.get(hop[0], hop[1]);
            w.is_finite().then_some(acc + w)
        })
    }

    /// petgraph view the detector relaxes over: node weight is the token
    /// index, edges added (and iterated) in row-major order
    pub fn to_graph(&self) -> DiGraph<usize, f64> {
        let mut graph = DiGraph::with_capacity(self.size, self.weights.len());
        let nodes: Vec<NodeIndex> = (0..self.size).map(|i| graph.add_node(i)).collect();
        for (from, to, w) in self.edges() {
            graph.add_edge(nodes[from], nodes[to], w);
        }
        graph
    }
}

/// -ln(rate), +inf for +inf, `None` for rates that are not positive
fn negate_log(rate: f64) -> Option<f64> {
    if rate.is_nan() || rate <= 0.0 {
        return None;
    }
    if rate == f64::INFINITY {
        return Some(f64::INFINITY);
    }
    Some(-rate.ln())
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::visit::EdgeRef;

    fn market() -> RateMatrix {
        RateMatrix::from_rows(vec![
            vec![1.0, 0.000_556_317_723_762_039_2, f64::INFINITY, 1.889_798_833_599_567_5],
            vec![1825.981_256_105_2, 1.0, 446.380_763_367_6, f64::INFINITY],
            vec![f64::INFINITY, 0.0025, 1.0, 2.059_639_980_4],
            vec![0.637_557_754_5, f64::INFINITY, 2.310_948_608_491_644_4, 1.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_weights_are_negated_logs() {
        let rates = market();
        let weights = WeightMatrix::from_rates(&rates).unwrap();

        for i in 0..4 {
            assert_eq!(weights.get(i, i), 0.0);
            for j in 0..4 {
                let rate = rates.get(i, j);
                if rate.is_finite() {
                    assert_eq!(weights.get(i, j), -rate.ln());
                } else {
                    assert_eq!(weights.get(i, j), f64::INFINITY);
                }
            }
        }
    }

    #[test]
    fn test_zero_rate_is_data_fault() {
        let mut rates = market();
        rates.set(2, 1, 0.0);
        let err = WeightMatrix::from_rates(&rates).unwrap_err();
        assert_eq!(err, TickError::DataFault { row: 2, col: 1, rate: 0.0 });
    }

    #[test]
    fn test_negative_and_nan_rates_are_data_faults() {
        let mut rates = market();
        rates.set(0, 3, -1.5);
        assert!(WeightMatrix::from_rates(&rates).unwrap_err().is_data_fault());

        let mut rates = market();
        rates.set(1, 0, f64::NAN);
        assert!(matches!(
            WeightMatrix::from_rates(&rates),
            Err(TickError::DataFault { row: 1, col: 0, .. })
        ));
    }

    #[test]
    fn test_edges_skip_unquoted_pairs() {
        let weights = WeightMatrix::from_rates(&market()).unwrap();
        let edges = weights.edges();

        // 16 entries, 4 unquoted
        assert_eq!(edges.len(), 12);
        assert!(edges.iter().all(|(_, _, w)| w.is_finite()));
        assert!(!edges.iter().any(|&(u, v, _)| (u, v) == (0, 2)));

        let graph = weights.to_graph();
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 12);

        // graph iteration keeps the row-major relaxation order
        let ordered: Vec<(usize, usize)> = graph
            .edge_references()
            .map(|e| (graph[e.source()], graph[e.target()]))
            .collect();
        let expected: Vec<(usize, usize)> = edges.iter().map(|&(u, v, _)| (u, v)).collect();
        assert_eq!(ordered, expected);
    }

    #[test]
    fn test_path_weight() {
        let weights = WeightMatrix::from_rates(&market()).unwrap();
        assert!(weights.path_weight(&[0, 2, 0]).is_none());

        let w = weights.path_weight(&[0, 1, 0]).unwrap();
        let expected = -(0.000_556_317_723_762_039_2_f64.ln() + 1825.981_256_105_2_f64.ln());
        assert!((w - expected).abs() < 1e-12);
    }
}
