use super::conflict::{first_conflict, Conflict, ConflictType};
use super::{Agent, Cell, Path};
use crate::algorithm::a_star_search;
use crate::error::PlanError;
use crate::map::Map;
use crate::stat::Stats;

use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash, Ord, PartialOrd)]
pub enum Constraint {
    /// The agent may not occupy `position` at `time_step`.
    Vertex { position: Cell, time_step: usize },
    /// The agent may not move `from_position -> to_position` arriving at `to_time_step`.
    Edge {
        from_position: Cell,
        to_position: Cell,
        to_time_step: usize,
    },
}

impl Constraint {
    pub fn time_step(&self) -> usize {
        match *self {
            Constraint::Vertex { time_step, .. } => time_step,
            Constraint::Edge { to_time_step, .. } => to_time_step,
        }
    }
}

/// One agent's constraints, indexed for constant-time checks during expansion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConstraintTable {
    constraints: Vec<Constraint>,
    vertex: HashSet<(usize, Cell)>,
    edge: HashSet<(usize, Cell, Cell)>,
    latest_vertex: HashMap<Cell, usize>,
    max_time: usize,
}

impl ConstraintTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a constraint; false if it was already present.
    pub fn insert(&mut self, constraint: Constraint) -> bool {
        let inserted = match constraint {
            Constraint::Vertex {
                position,
                time_step,
            } => {
                let inserted = self.vertex.insert((time_step, position));
                if inserted {
                    let latest = self.latest_vertex.entry(position).or_insert(time_step);
                    *latest = (*latest).max(time_step);
                }
                inserted
            }
            Constraint::Edge {
                from_position,
                to_position,
                to_time_step,
            } => self
                .edge
                .insert((to_time_step, from_position, to_position)),
        };

        if inserted {
            self.max_time = self.max_time.max(constraint.time_step());
            self.constraints.push(constraint);
        }
        inserted
    }

    pub fn contains(&self, constraint: &Constraint) -> bool {
        match *constraint {
            Constraint::Vertex {
                position,
                time_step,
            } => self.vertex.contains(&(time_step, position)),
            Constraint::Edge {
                from_position,
                to_position,
                to_time_step,
            } => self
                .edge
                .contains(&(to_time_step, from_position, to_position)),
        }
    }

    pub fn is_vertex_constrained(&self, position: Cell, time: usize) -> bool {
        self.vertex.contains(&(time, position))
    }

    /// Whether moving `from -> to` and arriving at `time` breaks a constraint.
    pub fn is_violated(&self, from: Cell, to: Cell, time: usize) -> bool {
        self.vertex.contains(&(time, to)) || self.edge.contains(&(time, from, to))
    }

    /// True if some vertex constraint still forbids `position` after `time`,
    /// so an agent reaching its goal there cannot stop yet.
    pub fn has_vertex_after(&self, position: Cell, time: usize) -> bool {
        self.latest_vertex
            .get(&position)
            .is_some_and(|&latest| latest > time)
    }

    pub fn max_time(&self) -> usize {
        self.max_time
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Constraints in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }
}

/// A constraint tree node: accumulated constraints and one path per agent.
#[derive(Clone, Debug)]
pub struct HighLevelOpenNode {
    pub constraints: Vec<ConstraintTable>,
    pub paths: Vec<Path>,
    pub cost: usize, // Sum of moves over all paths under current constraints
    pub replans: Vec<usize>, // Times each agent was re-planned along this branch
}

impl HighLevelOpenNode {
    /// Root node: every agent planned alone with no constraints.
    pub fn new(
        agents: &[Agent],
        map: &Map,
        distances: &[Vec<Vec<usize>>],
        horizon: usize,
        stats: &mut Stats,
    ) -> Result<Self, PlanError> {
        let constraints = vec![ConstraintTable::new(); agents.len()];
        let mut paths = Vec::with_capacity(agents.len());
        let mut total_cost = 0;

        for agent in agents {
            let path = a_star_search(
                map,
                agent,
                &distances[agent.id],
                &constraints[agent.id],
                horizon,
                stats,
            )
            .ok_or(PlanError::Unreachable { agent: agent.id })?;

            // Notice: path include start node.
            total_cost += path.len() - 1;
            paths.push(path);
        }

        let root = HighLevelOpenNode {
            constraints,
            paths,
            cost: total_cost,
            replans: vec![0; agents.len()],
        };
        debug!("High level start node {root:?}");
        Ok(root)
    }

    pub fn first_conflict(&self) -> Option<Conflict> {
        first_conflict(&self.paths)
    }

    /// Key the open set is ordered by. Without a penalty this is the plain
    /// sum of costs; with one, each re-plan on the branch adds `penalty`.
    pub fn priority(&self, replan_penalty: Option<usize>) -> usize {
        match replan_penalty {
            Some(penalty) => self.cost + penalty * self.replans.iter().sum::<usize>(),
            None => self.cost,
        }
    }

    /// Child that forbids the conflicting move for `agent_1` (`resolve_first`)
    /// or `agent_2`. `None` when that agent has no path under the new constraints.
    pub fn update_constraint(
        &self,
        conflict: &Conflict,
        resolve_first: bool,
        agents: &[Agent],
        map: &Map,
        distances: &[Vec<Vec<usize>>],
        horizon: usize,
        stats: &mut Stats,
    ) -> Option<HighLevelOpenNode> {
        let agent_to_update = if resolve_first {
            conflict.agent_1
        } else {
            conflict.agent_2
        };

        let constraint = match conflict.conflict_type {
            ConflictType::Vertex {
                position,
                time_step,
            } => Constraint::Vertex {
                position,
                time_step,
            },
            ConflictType::Edge {
                from,
                to,
                time_step,
            } => {
                // agent_1 moved from -> to, agent_2 the reverse.
                let (from_position, to_position) = if resolve_first {
                    (from, to)
                } else {
                    (to, from)
                };
                Constraint::Edge {
                    from_position,
                    to_position,
                    to_time_step: time_step,
                }
            }
        };

        let mut new_constraints = self.constraints.clone();
        if !new_constraints[agent_to_update].insert(constraint) {
            // The current path already obeys every constraint it holds, so
            // this only happens on a malformed conflict.
            debug!("agent {agent_to_update} already holds {constraint:?}");
            return None;
        }

        let new_path = a_star_search(
            map,
            &agents[agent_to_update],
            &distances[agent_to_update],
            &new_constraints[agent_to_update],
            horizon,
            stats,
        )?;

        debug!("Update agent {agent_to_update:?} with path {new_path:?} for conflict {conflict:?}");

        // Add before subtracting: the old path may hold all of `self.cost`.
        let new_cost = self.cost + new_path.len() - self.paths[agent_to_update].len();
        let mut new_paths = self.paths.clone();
        new_paths[agent_to_update] = new_path;
        let mut new_replans = self.replans.clone();
        new_replans[agent_to_update] += 1;

        Some(HighLevelOpenNode {
            constraints: new_constraints,
            paths: new_paths,
            cost: new_cost,
            replans: new_replans,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_table_lookup() {
        let mut table = ConstraintTable::new();
        assert!(table.insert(Constraint::Vertex {
            position: (1, 1),
            time_step: 3,
        }));
        assert!(table.insert(Constraint::Edge {
            from_position: (0, 0),
            to_position: (0, 1),
            to_time_step: 1,
        }));
        assert!(!table.insert(Constraint::Vertex {
            position: (1, 1),
            time_step: 3,
        }));

        assert_eq!(table.len(), 2);
        assert_eq!(table.max_time(), 3);
        assert!(table.is_violated((1, 0), (1, 1), 3));
        assert!(!table.is_violated((1, 0), (1, 1), 2));
        assert!(table.is_violated((0, 0), (0, 1), 1));
        // Edge constraints are directional.
        assert!(!table.is_violated((0, 1), (0, 0), 1));

        assert!(table.has_vertex_after((1, 1), 2));
        assert!(!table.has_vertex_after((1, 1), 3));
        assert!(!table.has_vertex_after((0, 1), 0));
    }

    #[test]
    fn test_children_inherit_constraints() {
        let map = Map::from_obstacles(5, 5, &[]).unwrap();
        let agents = vec![
            Agent {
                id: 0,
                start: (0, 0),
                goal: (0, 4),
            },
            Agent {
                id: 1,
                start: (0, 4),
                goal: (0, 0),
            },
        ];
        let distances: Vec<_> = agents.iter().map(|a| map.distance_map(a.goal)).collect();
        let mut stats = Stats::default();

        let root = HighLevelOpenNode::new(&agents, &map, &distances, 50, &mut stats).unwrap();
        assert_eq!(root.cost, 8);
        let conflict = root.first_conflict().unwrap();

        let child = root
            .update_constraint(&conflict, true, &agents, &map, &distances, 50, &mut stats)
            .unwrap();
        assert_eq!(child.constraints[0].len(), 1);
        assert!(child.constraints[1].is_empty());
        assert_eq!(child.paths[1], root.paths[1]);
        assert_eq!(child.replans, vec![1, 0]);
        assert_eq!(child.cost, 9);
        assert_eq!(child.priority(Some(2)), 11);
        assert_eq!(child.priority(None), 9);

        let conflict = child.first_conflict().unwrap();
        let grandchild = child
            .update_constraint(&conflict, false, &agents, &map, &distances, 50, &mut stats)
            .unwrap();
        for (parent_table, table) in child.constraints.iter().zip(&grandchild.constraints) {
            assert!(parent_table.iter().all(|c| table.contains(c)));
        }
    }

    #[test]
    fn test_child_cost_with_stationary_agent() {
        let map = Map::from_obstacles(5, 5, &[]).unwrap();
        let agents = vec![
            Agent {
                id: 0,
                start: (0, 0),
                goal: (0, 4),
            },
            Agent {
                id: 1,
                start: (0, 2),
                goal: (0, 2),
            },
        ];
        let distances: Vec<_> = agents.iter().map(|a| map.distance_map(a.goal)).collect();
        let mut stats = Stats::default();

        // The moving agent's path carries the whole root cost.
        let root = HighLevelOpenNode::new(&agents, &map, &distances, 50, &mut stats).unwrap();
        assert_eq!(root.cost, 4);
        assert_eq!(root.paths[1], vec![(0, 2)]);
        let conflict = root.first_conflict().unwrap();
        assert_eq!(conflict.agent_1, 0);

        // Waiting one step in front of the parked agent costs one more move.
        let child = root
            .update_constraint(&conflict, true, &agents, &map, &distances, 50, &mut stats)
            .unwrap();
        assert_eq!(child.cost, 5);
        assert_eq!(child.paths[0].len(), 6);

        // The parked agent has to step off its goal and come back.
        let child = root
            .update_constraint(&conflict, false, &agents, &map, &distances, 50, &mut stats)
            .unwrap();
        assert_eq!(child.cost, 7);
        assert_eq!(child.paths[1].len(), 4);
    }
}
