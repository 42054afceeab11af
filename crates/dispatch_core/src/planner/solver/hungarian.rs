//! Hungarian (Kuhn-Munkres) solver tier.
//!
//! Direct adaptation of the teacher's `matching::hungarian::I64Weights`
//! scaling trick: costs are scaled to `i64` and the assignment problem is
//! solved as a square, padded matrix (unmatched routes left unassigned by
//! trimming padding-only rows/columns from the result).

use pathfinding::kuhn_munkres::{kuhn_munkres, Weights};

const SCALE: f64 = 1_000_000.0;
const PADDING_COST: i64 = 1_000_000_000; // 1e9, per §4.3 solver contract

struct I64Weights(Vec<Vec<i64>>);

impl Weights<i64> for I64Weights {
    fn rows(&self) -> usize {
        self.0.len()
    }

    fn columns(&self) -> usize {
        self.0.first().map_or(0, |r| r.len())
    }

    fn at(&self, row: usize, col: usize) -> i64 {
        self.0[row][col]
    }

    fn neg(&self) -> Self {
        I64Weights(self.0.iter().map(|r| r.iter().map(|&x| x.saturating_neg()).collect()).collect())
    }
}

fn cost_to_weight(cost: f64) -> i64 {
    let scaled = cost * SCALE;
    if scaled >= i64::MAX as f64 {
        i64::MAX
    } else {
        scaled as i64
    }
}

/// Solves the rectangular assignment problem for `cost[driver][route]`,
/// minimizing total cost with each route covered at most once and each
/// driver at most once. Returns `(driver_idx, route_idx)` pairs.
///
/// Kuhn-Munkres requires rows ≤ columns internally; the smaller dimension
/// is always padded to square with `PADDING_COST`, and any pair landing
/// entirely in padding is dropped from the result.
pub fn solve(cost: &[Vec<f64>]) -> Vec<(usize, usize)> {
    let num_drivers = cost.len();
    let num_routes = cost.first().map_or(0, |r| r.len());
    if num_drivers == 0 || num_routes == 0 {
        return Vec::new();
    }

    let n = num_drivers.max(num_routes);
    let mut matrix = vec![vec![cost_to_weight(PADDING_COST as f64); n]; n];
    for (d, row) in cost.iter().enumerate() {
        for (r, &c) in row.iter().enumerate() {
            matrix[d][r] = cost_to_weight(c);
        }
    }

    // kuhn_munkres maximizes; negate to minimize.
    let negated: Vec<Vec<i64>> = matrix
        .iter()
        .map(|row| row.iter().map(|&v| v.saturating_neg()).collect())
        .collect();
    let weights = I64Weights(negated);
    let (_total, assignment) = kuhn_munkres(&weights);

    assignment
        .into_iter()
        .enumerate()
        .filter(|&(d, r)| d < num_drivers && r < num_routes)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_each_row_to_its_cheapest_distinct_column() {
        let cost = vec![vec![1.0, 10.0], vec![10.0, 1.0]];
        let mut result = solve(&cost);
        result.sort();
        assert_eq!(result, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn rectangular_matrix_leaves_extra_drivers_unassigned() {
        let cost = vec![vec![1.0], vec![2.0], vec![3.0]];
        let result = solve(&cost);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].1, 0);
    }

    #[test]
    fn empty_input_yields_empty_assignment() {
        assert!(solve(&[]).is_empty());
    }
}
