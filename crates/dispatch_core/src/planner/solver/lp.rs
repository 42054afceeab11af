//! Integer LP solver tier (§4.3 tier 1), feature-gated behind `lp_solver`.
//!
//! No example in the corpus depends on an LP crate; `good_lp` is the
//! standard Rust MILP-modeling facade and is pulled in only when this
//! feature is enabled (see DESIGN.md).

#[cfg(feature = "lp_solver")]
pub fn solve(cost: &[Vec<f64>]) -> Option<Vec<(usize, usize)>> {
    use good_lp::{constraint, default_solver, variable, Expression, SolverModel, Variable};

    let num_drivers = cost.len();
    let num_routes = cost.first().map_or(0, |r| r.len());
    if num_drivers == 0 || num_routes == 0 {
        return Some(Vec::new());
    }

    let mut vars = good_lp::variables!();
    let mut x: Vec<Vec<Variable>> = Vec::with_capacity(num_drivers);
    for _ in 0..num_drivers {
        let mut row = Vec::with_capacity(num_routes);
        for _ in 0..num_routes {
            row.push(vars.add(variable().binary()));
        }
        x.push(row);
    }

    let objective: Expression = (0..num_drivers)
        .flat_map(|d| (0..num_routes).map(move |r| (d, r)))
        .map(|(d, r)| cost[d][r] * x[d][r])
        .sum();

    let mut problem = vars.minimise(objective).using(default_solver);

    for d in 0..num_drivers {
        let sum: Expression = x[d].iter().map(|&v| 1.0 * v).sum();
        problem = problem.with(constraint!(sum <= 1));
    }
    for r in 0..num_routes {
        let sum: Expression = (0..num_drivers).map(|d| 1.0 * x[d][r]).sum();
        problem = problem.with(constraint!(sum == 1));
    }

    let solution = problem.solve().ok()?;

    let mut result = Vec::new();
    for d in 0..num_drivers {
        for r in 0..num_routes {
            if solution.value(x[d][r]) > 0.5 {
                result.push((d, r));
            }
        }
    }
    Some(result)
}

#[cfg(not(feature = "lp_solver"))]
pub fn solve(_cost: &[Vec<f64>]) -> Option<Vec<(usize, usize)>> {
    None
}
