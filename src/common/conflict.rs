use super::{Cell, Path};

use std::collections::HashMap;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConflictType {
    Vertex {
        position: Cell,
        time_step: usize,
    },
    /// `agent_1` moves `from -> to` while `agent_2` moves `to -> from`,
    /// arriving at `time_step`.
    Edge {
        from: Cell,
        to: Cell,
        time_step: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Conflict {
    pub agent_1: usize,
    pub agent_2: usize,
    pub conflict_type: ConflictType,
}

impl Conflict {
    pub fn time_step(&self) -> usize {
        match self.conflict_type {
            ConflictType::Vertex { time_step, .. } | ConflictType::Edge { time_step, .. } => {
                time_step
            }
        }
    }
}

/// Cell occupied at `time`; an agent past the end of its path waits at the goal.
pub fn position_at(path: &Path, time: usize) -> Cell {
    match path.get(time) {
        Some(&cell) => cell,
        None => path.last().copied().unwrap_or_default(),
    }
}

/// All vertex and edge conflicts in the bundle, ordered by time step.
pub fn detect_conflicts(paths: &[Path]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    scan(paths, |conflict| {
        conflicts.push(conflict);
        true
    });
    trace!("detect conflicts: {conflicts:?}");
    conflicts
}

/// The earliest conflict, the one a CBS expansion branches on.
pub fn first_conflict(paths: &[Path]) -> Option<Conflict> {
    let mut first = None;
    scan(paths, |conflict| {
        first = Some(conflict);
        false
    });
    first
}

// Walks the bundle one time step at a time. `visit` returns false to stop early.
fn scan<F: FnMut(Conflict) -> bool>(paths: &[Path], mut visit: F) {
    let max_length = paths.iter().map(|path| path.len()).max().unwrap_or(0);

    for step in 0..max_length {
        // Vertex conflicts: group agents by occupied cell.
        let mut occupied: HashMap<Cell, usize> = HashMap::new();
        for (agent, path) in paths.iter().enumerate() {
            let position = position_at(path, step);
            match occupied.get(&position) {
                Some(&first_agent) => {
                    let keep_going = visit(Conflict {
                        agent_1: first_agent,
                        agent_2: agent,
                        conflict_type: ConflictType::Vertex {
                            position,
                            time_step: step,
                        },
                    });
                    if !keep_going {
                        return;
                    }
                }
                None => {
                    occupied.insert(position, agent);
                }
            }
        }

        // Edge conflicts need a previous step, and only moving agents can swap.
        if step == 0 {
            continue;
        }
        for i in 0..paths.len() {
            if step >= paths[i].len() {
                continue;
            }
            let (prev_1, pos_1) = (paths[i][step - 1], paths[i][step]);
            if prev_1 == pos_1 {
                continue;
            }

            for j in (i + 1)..paths.len() {
                if step >= paths[j].len() {
                    continue;
                }
                let (prev_2, pos_2) = (paths[j][step - 1], paths[j][step]);

                if prev_1 == pos_2 && prev_2 == pos_1 {
                    let keep_going = visit(Conflict {
                        agent_1: i,
                        agent_2: j,
                        conflict_type: ConflictType::Edge {
                            from: prev_1,
                            to: pos_1,
                            time_step: step,
                        },
                    });
                    if !keep_going {
                        return;
                    }
                }
            }
        }
    }
}
