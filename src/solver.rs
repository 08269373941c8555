mod cbs;

pub use cbs::CBS;

use crate::common::Solution;
use crate::error::PlanError;

use std::time::Duration;

/// Limits on one planning run. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchBudget {
    pub max_expansions: Option<usize>,
    pub time_limit: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolverConfig {
    pub budget: SearchBudget,
    /// Extra cost per re-plan along a branch. Biases the search away from
    /// re-planning the same agents; off keeps plain lowest-cost-first order.
    pub replan_penalty: Option<usize>,
    /// Low-level time horizon; defaults to passable cells times agent count.
    pub horizon: Option<usize>,
}

pub trait Solver {
    fn solve(&mut self, config: &SolverConfig) -> Result<Solution, PlanError>;
}
