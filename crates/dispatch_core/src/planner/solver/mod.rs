//! Polymorphic solver interface (§9 redesign flag: "Optional third-party
//! solver"). Availability of each tier is detected once, at construction,
//! never re-probed per call.

pub mod greedy;
pub mod hungarian;
pub mod lp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverTier {
    Lp,
    Hungarian,
    Greedy,
}

/// Fixed fallback chain: LP → Hungarian → greedy. Constructed once per
/// `RoutePlanner` instance.
pub struct SolverChain {
    lp_available: bool,
}

impl SolverChain {
    pub fn new() -> Self {
        Self { lp_available: cfg!(feature = "lp_solver") }
    }

    /// Returns the assignment and which tier produced it.
    pub fn solve(&self, cost: &[Vec<f64>]) -> (Vec<(usize, usize)>, SolverTier) {
        if self.lp_available {
            if let Some(result) = lp::solve(cost) {
                return (result, SolverTier::Lp);
            }
        }
        let hungarian_result = hungarian::solve(cost);
        if covers_every_route(cost, &hungarian_result) {
            return (hungarian_result, SolverTier::Hungarian);
        }
        (greedy::solve(cost), SolverTier::Greedy)
    }
}

impl Default for SolverChain {
    fn default() -> Self {
        Self::new()
    }
}

fn covers_every_route(cost: &[Vec<f64>], result: &[(usize, usize)]) -> bool {
    let num_routes = cost.first().map_or(0, |r| r.len());
    result.len() == num_routes.min(cost.len())
}
