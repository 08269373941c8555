mod astar;

pub use astar::{a_star_search, manhattan_distance};

use std::collections::HashMap;

use crate::common::{Cell, Path};

type Trace = HashMap<(Cell, usize), (Cell, usize)>;

fn construct_path(trace: &Trace, mut current: (Cell, usize)) -> Path {
    let mut path = vec![current.0];
    while let Some(&(pos, time)) = trace.get(&current) {
        path.push(pos);
        current = (pos, time);
    }
    path.reverse();
    path
}
