use super::{Solver, SolverConfig};
use crate::common::{Agent, HighLevelOpenNode, Path, Solution};
use crate::error::PlanError;
use crate::map::Map;
use crate::stat::Stats;

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::time::Instant;
use tracing::{debug, info};

// Open set entry. Lower priority first, then earlier creation.
struct OpenEntry {
    priority: usize,
    sequence: usize,
    node: HighLevelOpenNode,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for OpenEntry {}

// Inverted so the max-heap pops the cheapest node.
impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct CBS {
    agents: Vec<Agent>,
    map: Map,
    distances: Vec<Vec<Vec<usize>>>,
    stats: Stats,
}

impl CBS {
    pub fn new(agents: Vec<Agent>, map: &Map) -> Self {
        let distances = agents
            .iter()
            .map(|agent| map.distance_map(agent.goal))
            .collect();
        CBS {
            agents,
            map: map.clone(),
            distances,
            stats: Stats::default(),
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Default low-level horizon: one full sweep of the free cells per agent.
    pub fn default_horizon(&self) -> usize {
        (self.map.passable_cells() * self.agents.len()).max(1)
    }

    // Rejects instances that cannot be solved before building the tree.
    fn check_instance(&self) -> Result<(), PlanError> {
        let mut starts = HashSet::new();
        let mut goals = HashSet::new();

        for (index, agent) in self.agents.iter().enumerate() {
            if agent.id != index {
                return Err(PlanError::InvalidInstance(format!(
                    "agent at index {index} has id {}",
                    agent.id
                )));
            }

            if !agent.verify(&self.map)
                || self.distances[index][agent.start.0][agent.start.1] == usize::MAX
            {
                debug!("agent {index} start or goal blocked, or goal enclosed");
                return Err(PlanError::Unreachable { agent: index });
            }

            if !starts.insert(agent.start) || !goals.insert(agent.goal) {
                debug!("agent {index} shares a start or goal cell with another agent");
                return Err(PlanError::NoJointSolution);
            }
        }

        Ok(())
    }

    fn finish(&mut self, start_time: Instant, paths: Option<&[Path]>) {
        self.stats.time_us = start_time.elapsed().as_micros() as usize;
        if let Some(paths) = paths {
            self.stats.path_lengths = paths.iter().map(|path| path.len() - 1).collect();
            self.stats.costs = self.stats.path_lengths.iter().sum();
        }
        self.stats.print();
    }
}

impl Solver for CBS {
    fn solve(&mut self, config: &SolverConfig) -> Result<Solution, PlanError> {
        let total_solve_start_time = Instant::now();
        self.stats = Stats::default();

        self.check_instance()?;
        let horizon = config.horizon.unwrap_or_else(|| self.default_horizon());
        debug!("horizon {horizon}, budget {:?}", config.budget);

        let root = match HighLevelOpenNode::new(
            &self.agents,
            &self.map,
            &self.distances,
            horizon,
            &mut self.stats,
        ) {
            Ok(root) => root,
            Err(err) => {
                self.finish(total_solve_start_time, None);
                return Err(err);
            }
        };

        let mut open = BinaryHeap::new();
        let mut sequence = 0;
        open.push(OpenEntry {
            priority: root.priority(config.replan_penalty),
            sequence,
            node: root,
        });
        self.stats.high_level_generate_nodes += 1;

        while let Some(OpenEntry { node: current_node, .. }) = open.pop() {
            let out_of_expansions = config
                .budget
                .max_expansions
                .is_some_and(|limit| self.stats.high_level_expand_nodes >= limit);
            let out_of_time = config
                .budget
                .time_limit
                .is_some_and(|limit| total_solve_start_time.elapsed() >= limit);
            if out_of_expansions || out_of_time {
                let expanded = self.stats.high_level_expand_nodes;
                info!("cbs budget exceeded after {expanded} expansions");
                self.finish(total_solve_start_time, None);
                return Err(PlanError::BudgetExceeded { expanded });
            }

            self.stats.high_level_expand_nodes += 1;

            let Some(conflict) = current_node.first_conflict() else {
                // No conflicts, return solution.
                self.finish(total_solve_start_time, Some(current_node.paths.as_slice()));
                return Ok(Solution {
                    paths: current_node.paths,
                });
            };
            debug!("conflict: {conflict:?}");

            // Each child only reads the parent; either may be pruned.
            for resolve_first in [true, false] {
                if let Some(child) = current_node.update_constraint(
                    &conflict,
                    resolve_first,
                    &self.agents,
                    &self.map,
                    &self.distances,
                    horizon,
                    &mut self.stats,
                ) {
                    sequence += 1;
                    open.push(OpenEntry {
                        priority: child.priority(config.replan_penalty),
                        sequence,
                        node: child,
                    });
                    self.stats.high_level_generate_nodes += 1;
                }
            }
        }

        info!("cbs open set exhausted");
        self.finish(total_solve_start_time, None);
        Err(PlanError::NoJointSolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{first_conflict, ConflictType};
    use crate::solver::SearchBudget;
    use std::time::Duration;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("info")
            .with_test_writer()
            .try_init();
    }

    fn agents(pairs: &[((usize, usize), (usize, usize))]) -> Vec<Agent> {
        pairs
            .iter()
            .enumerate()
            .map(|(id, &(start, goal))| Agent { id, start, goal })
            .collect()
    }

    #[test]
    fn test_cbs_head_on_in_open_grid() {
        init_tracing();
        let map = Map::from_obstacles(5, 5, &[]).unwrap();
        let agents = agents(&[((0, 0), (0, 4)), ((0, 4), (0, 0))]);
        let mut solver = CBS::new(agents.clone(), &map);
        let solution = solver.solve(&SolverConfig::default()).unwrap();

        assert!(solution.verify(&map, &agents));
        // One agent has to leave row 0 for a two-move detour.
        assert_eq!(solution.cost(), 10);
        assert_eq!(solver.stats().costs, 10);
        assert!(solver.stats().high_level_expand_nodes > 1);
    }

    #[test]
    fn test_cbs_independent_agents_expand_root_only() {
        let map = Map::from_obstacles(4, 4, &[]).unwrap();
        let agents = agents(&[((0, 0), (0, 3)), ((3, 0), (3, 3))]);
        let mut solver = CBS::new(agents, &map);
        let solution = solver.solve(&SolverConfig::default()).unwrap();
        assert_eq!(solution.cost(), 6);
        assert_eq!(solver.stats().high_level_expand_nodes, 1);
        assert_eq!(solver.stats().path_lengths, vec![3, 3]);
    }

    #[test]
    fn test_cbs_corridor_swap_edge_conflict() {
        init_tracing();
        // Passage at (1, 2); open pockets on both sides.
        let map = Map::from_obstacles(3, 6, &[(0, 2), (2, 2)]).unwrap();
        let agents = agents(&[((1, 0), (1, 5)), ((1, 5), (1, 0))]);

        let root_paths = vec![
            vec![(1, 0), (1, 1), (1, 2), (1, 3), (1, 4), (1, 5)],
            vec![(1, 5), (1, 4), (1, 3), (1, 2), (1, 1), (1, 0)],
        ];
        let conflict = first_conflict(&root_paths).unwrap();
        assert!(matches!(conflict.conflict_type, ConflictType::Edge { .. }));

        let mut solver = CBS::new(agents.clone(), &map);
        let solution = solver.solve(&SolverConfig::default()).unwrap();
        assert!(solution.verify(&map, &agents));
        assert!(solution.cost() > 10);
    }

    #[test]
    fn test_cbs_unreachable_fails_fast() {
        let map = Map::from_obstacles(3, 3, &[(0, 1), (1, 0), (1, 1)]).unwrap();

        let mut enclosed = CBS::new(agents(&[((2, 2), (2, 0)), ((0, 0), (2, 1))]), &map);
        assert_eq!(
            enclosed.solve(&SolverConfig::default()),
            Err(PlanError::Unreachable { agent: 1 })
        );
        assert_eq!(enclosed.stats().high_level_expand_nodes, 0);
        assert_eq!(enclosed.stats().low_level_invocations, 0);

        let mut blocked_goal = CBS::new(agents(&[((2, 2), (1, 1))]), &map);
        assert_eq!(
            blocked_goal.solve(&SolverConfig::default()),
            Err(PlanError::Unreachable { agent: 0 })
        );
    }

    #[test]
    fn test_cbs_shared_goal_has_no_joint_solution() {
        let map = Map::from_obstacles(3, 3, &[]).unwrap();
        let mut solver = CBS::new(agents(&[((0, 0), (2, 2)), ((0, 2), (2, 2))]), &map);
        assert_eq!(
            solver.solve(&SolverConfig::default()),
            Err(PlanError::NoJointSolution)
        );
    }

    #[test]
    fn test_cbs_tree_exhausted() {
        // Two agents exchanging the only two cells can never pass.
        let map = Map::from_obstacles(1, 2, &[]).unwrap();
        let mut solver = CBS::new(agents(&[((0, 0), (0, 1)), ((0, 1), (0, 0))]), &map);
        let config = SolverConfig {
            horizon: Some(2),
            ..SolverConfig::default()
        };
        assert_eq!(solver.solve(&config), Err(PlanError::NoJointSolution));
        assert!(solver.stats().high_level_expand_nodes > 1);
    }

    #[test]
    fn test_cbs_budget_exceeded() {
        let map = Map::from_obstacles(5, 5, &[]).unwrap();
        let mut solver = CBS::new(agents(&[((0, 0), (0, 4)), ((0, 4), (0, 0))]), &map);
        let config = SolverConfig {
            budget: SearchBudget {
                max_expansions: Some(1),
                time_limit: None,
            },
            ..SolverConfig::default()
        };
        assert_eq!(
            solver.solve(&config),
            Err(PlanError::BudgetExceeded { expanded: 1 })
        );

        let config = SolverConfig {
            budget: SearchBudget {
                max_expansions: None,
                time_limit: Some(Duration::ZERO),
            },
            ..SolverConfig::default()
        };
        assert!(matches!(
            solver.solve(&config),
            Err(PlanError::BudgetExceeded { expanded: 0 })
        ));
    }

    #[test]
    fn test_cbs_replan_penalty_still_conflict_free() {
        let map = Map::from_obstacles(5, 5, &[]).unwrap();
        let agents = agents(&[((0, 0), (0, 4)), ((0, 4), (0, 0)), ((4, 0), (0, 2))]);
        let mut solver = CBS::new(agents.clone(), &map);
        let config = SolverConfig {
            replan_penalty: Some(1),
            ..SolverConfig::default()
        };
        let solution = solver.solve(&config).unwrap();
        assert!(solution.verify(&map, &agents));
    }
}
