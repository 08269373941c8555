use super::construct_path;
use crate::common::{Agent, Cell, ConstraintTable, LowLevelOpenNode, Path};
use crate::map::Map;
use crate::stat::Stats;

use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, instrument, trace};

/// Admissible and consistent on a 4-connected grid with unit moves.
pub fn manhattan_distance(from: Cell, to: Cell) -> usize {
    from.0.abs_diff(to.0) + from.1.abs_diff(to.1)
}

/// Shortest path in `(cell, time)` space that obeys `constraints`.
///
/// `distance` is the static distance map towards the agent's goal, used to
/// drop states that can no longer arrive by `horizon`. The horizon is a hard
/// cap on arrival time; a goal constrained at or after it cannot be held.
/// Returns `None` when no such path exists.
#[instrument(skip_all, name="a_star", fields(agent = agent.id, start = format!("{:?}", agent.start), goal = format!("{:?}", agent.goal)), level = "debug")]
pub fn a_star_search(
    map: &Map,
    agent: &Agent,
    distance: &[Vec<usize>],
    constraints: &ConstraintTable,
    horizon: usize,
    stats: &mut Stats,
) -> Option<Path> {
    stats.low_level_invocations += 1;
    debug!(
        "constraints: {:?}, latest: {:?}, horizon: {horizon:?}",
        constraints.len(),
        constraints.max_time()
    );

    if !map.is_valid(agent.start) || !map.is_valid(agent.goal) {
        debug!("start or goal is blocked");
        return None;
    }
    if distance[agent.start.0][agent.start.1] > horizon {
        debug!("goal unreachable from start within horizon");
        return None;
    }
    if constraints.is_vertex_constrained(agent.start, 0) {
        debug!("start is forbidden at time 0");
        return None;
    }

    let mut open_list = BTreeSet::new();
    let mut closed_list = HashSet::new();
    let mut trace = HashMap::new();

    open_list.insert(LowLevelOpenNode {
        position: agent.start,
        f_open_cost: manhattan_distance(agent.start, agent.goal),
        g_cost: 0,
    });

    while let Some(current) = open_list.pop_first() {
        trace!("expand node: {current:?}");

        // Update stats.
        stats.low_level_expand_nodes += 1;

        closed_list.insert((current.position, current.g_cost));

        if current.position == agent.goal && !constraints.has_vertex_after(agent.goal, current.g_cost)
        {
            return Some(construct_path(&trace, (current.position, current.g_cost)));
        }

        // Assuming uniform cost, which also indicate the current time.
        let next_time = current.g_cost + 1;

        for &neighbor in map.get_neighbors(current.position) {
            // Check node (position at next time) has closed.
            if closed_list.contains(&(neighbor, next_time)) {
                continue;
            }

            // Check for constraints before exploring the neighbor.
            if constraints.is_violated(current.position, neighbor, next_time) {
                continue; // This move is prohibited due to a constraint.
            }

            // Too late to still arrive before the horizon.
            if next_time.saturating_add(distance[neighbor.0][neighbor.1]) > horizon {
                continue;
            }

            // Same (cell, time) always has the same g, so a repeated insert is a no-op.
            if open_list.insert(LowLevelOpenNode {
                position: neighbor,
                f_open_cost: next_time + manhattan_distance(neighbor, agent.goal),
                g_cost: next_time,
            }) {
                trace.insert((neighbor, next_time), (current.position, current.g_cost));
            }
        }
    }

    debug!("cannot find solution");
    None
}
