//! Greedy fallback solver tier (§4.3 tier 3).
//!
//! Sorts all (driver, route) pairs by cost ascending and assigns
//! first-come-first-served, mirroring the teacher's
//! `matching::hungarian::greedy_batch_matches` shape.

use std::collections::HashSet;

pub fn solve(cost: &[Vec<f64>]) -> Vec<(usize, usize)> {
    let num_drivers = cost.len();
    let num_routes = cost.first().map_or(0, |r| r.len());
    if num_drivers == 0 || num_routes == 0 {
        return Vec::new();
    }

    let mut pairs: Vec<(usize, usize, f64)> = Vec::with_capacity(num_drivers * num_routes);
    for (d, row) in cost.iter().enumerate() {
        for (r, &c) in row.iter().enumerate() {
            pairs.push((d, r, c));
        }
    }
    pairs.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

    let mut used_drivers = HashSet::new();
    let mut used_routes = HashSet::new();
    let mut result = Vec::new();

    for (d, r, _) in pairs {
        if used_drivers.contains(&d) || used_routes.contains(&r) {
            continue;
        }
        used_drivers.insert(d);
        used_routes.insert(r);
        result.push((d, r));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_cheapest_pairs_first() {
        let cost = vec![vec![5.0, 1.0], vec![2.0, 9.0]];
        let mut result = solve(&cost);
        result.sort();
        assert_eq!(result, vec![(0, 1), (1, 0)]);
    }
}
