use thiserror::Error;

/// Why a planning run produced no path bundle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// The agent alone is infeasible; reported as reason `unreachable`.
    #[error("agent {agent} cannot reach its goal even without other agents")]
    Unreachable { agent: usize },

    #[error("no conflict-free coordination exists within the search horizon")]
    NoJointSolution,

    #[error("search budget exhausted after expanding {expanded} constraint tree nodes")]
    BudgetExceeded { expanded: usize },

    #[error("invalid planning instance: {0}")]
    InvalidInstance(String),
}

impl PlanError {
    /// Stable machine-readable reason, as written in responses.
    pub fn reason(&self) -> &'static str {
        match self {
            PlanError::Unreachable { .. } => "unreachable",
            PlanError::NoJointSolution => "no_joint_solution",
            PlanError::BudgetExceeded { .. } => "budget_exceeded",
            PlanError::InvalidInstance(_) => "invalid_instance",
        }
    }
}
