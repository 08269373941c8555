mod conflict;
mod highlevel;
mod lowlevel;

pub use conflict::{detect_conflicts, first_conflict, position_at, Conflict, ConflictType};
pub use highlevel::{Constraint, ConstraintTable, HighLevelOpenNode};
pub(crate) use lowlevel::LowLevelOpenNode;

use crate::map::Map;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Grid coordinate as `(row, col)`.
pub type Cell = (usize, usize);

/// One agent's plan, indexed implicitly by time step.
pub type Path = Vec<Cell>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: usize,
    pub start: Cell,
    pub goal: Cell,
}

impl Agent {
    /// Start and goal are inside the grid and not blocked.
    pub fn verify(&self, map: &Map) -> bool {
        map.is_valid(self.start) && map.is_valid(self.goal)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub paths: Vec<Path>,
}

impl Solution {
    /// Sum of moves over all agents, waits included.
    pub fn cost(&self) -> usize {
        self.paths.iter().map(|path| path.len().saturating_sub(1)).sum()
    }

    /// Time step at which the last agent reaches its goal.
    pub fn makespan(&self) -> usize {
        self.paths
            .iter()
            .map(|path| path.len().saturating_sub(1))
            .max()
            .unwrap_or(0)
    }

    /// Every agent's cell at global tick `time`; finished agents stay at their goal.
    pub fn positions_at(&self, time: usize) -> Vec<Cell> {
        self.paths
            .iter()
            .map(|path| position_at(path, time))
            .collect()
    }

    pub fn verify(&self, map: &Map, agents: &[Agent]) -> bool {
        if self.paths.len() != agents.len() {
            debug!("solution has {} paths for {} agents", self.paths.len(), agents.len());
            return false;
        }

        for (agent, path) in agents.iter().zip(&self.paths) {
            if path.first() != Some(&agent.start) || path.last() != Some(&agent.goal) {
                debug!("agent {} path does not connect start and goal", agent.id);
                return false;
            }

            if path.iter().any(|&cell| !map.is_valid(cell)) {
                debug!("agent {} path crosses a blocked cell", agent.id);
                return false;
            }

            // Each step is a single orthogonal move or a wait.
            if path.windows(2).any(|step| {
                step[0].0.abs_diff(step[1].0) + step[0].1.abs_diff(step[1].1) > 1
            }) {
                debug!("agent {} path jumps between cells", agent.id);
                return false;
            }
        }

        let conflicts = detect_conflicts(&self.paths);
        if !conflicts.is_empty() {
            debug!("solution still has conflicts: {conflicts:?}");
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_agent_solution() -> Solution {
        Solution {
            paths: vec![
                vec![(0, 0), (0, 1), (0, 2)],
                vec![(1, 2), (1, 1), (1, 0), (1, 0)],
            ],
        }
    }

    #[test]
    fn test_cost_and_makespan() {
        let solution = two_agent_solution();
        assert_eq!(solution.cost(), 5);
        assert_eq!(solution.makespan(), 3);
    }

    #[test]
    fn test_positions_hold_goal_after_arrival() {
        let solution = two_agent_solution();
        assert_eq!(solution.positions_at(0), vec![(0, 0), (1, 2)]);
        assert_eq!(solution.positions_at(2), vec![(0, 2), (1, 0)]);
        assert_eq!(solution.positions_at(10), vec![(0, 2), (1, 0)]);
    }

    #[test]
    fn test_verify_rejects_jump_and_conflict() {
        let map = Map::from_obstacles(3, 3, &[]).unwrap();
        let agents = vec![
            Agent {
                id: 0,
                start: (0, 0),
                goal: (0, 2),
            },
            Agent {
                id: 1,
                start: (1, 2),
                goal: (1, 0),
            },
        ];
        assert!(two_agent_solution().verify(&map, &agents));

        let jump = Solution {
            paths: vec![vec![(0, 0), (0, 2)], vec![(1, 2), (1, 1), (1, 0)]],
        };
        assert!(!jump.verify(&map, &agents));

        let crossing = Solution {
            paths: vec![
                vec![(0, 0), (0, 1), (0, 2)],
                vec![(1, 2), (0, 2), (0, 1), (1, 1), (1, 0)],
            ],
        };
        assert!(!crossing.verify(&map, &agents));
    }
}
