use crate::common::Cell;

use anyhow::{anyhow, bail, Context};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufRead, BufReader};

#[derive(Debug, Clone)]
pub struct Tile {
    passable: bool,
    pub neighbors: Vec<Cell>, // Stores coordinates of accessible neighbors, wait included
}

impl Tile {
    pub fn is_passable(&self) -> bool {
        self.passable
    }
}

#[derive(Debug, Clone)]
pub struct Map {
    pub height: usize,
    pub width: usize,
    pub grid: Vec<Vec<Tile>>,
}

impl Map {
    /// Open grid of `height` x `width` with the given cells blocked.
    pub fn from_obstacles(height: usize, width: usize, obstacles: &[Cell]) -> anyhow::Result<Self> {
        if height == 0 || width == 0 {
            bail!("grid must have at least one row and one column, got {height}x{width}");
        }

        let mut passable = vec![vec![true; width]; height];
        for &(x, y) in obstacles {
            if x >= height || y >= width {
                bail!("obstacle ({x}, {y}) lies outside the {height}x{width} grid");
            }
            passable[x][y] = false;
        }

        Ok(Self::build(height, width, passable))
    }

    /// Reads a MovingAI `.map` file: `.` is free, anything else is blocked.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("cannot open map file {path}"))?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let _type = lines.next();

        let mut header_value = |name: &str| -> anyhow::Result<usize> {
            let line = lines
                .next()
                .ok_or_else(|| anyhow!("map file {path} ends before '{name}'"))??;
            line.split_whitespace()
                .last()
                .ok_or_else(|| anyhow!("missing value for '{name}' in {path}"))?
                .parse::<usize>()
                .with_context(|| format!("invalid '{name}' in {path}"))
        };

        let height = header_value("height")?;
        let width = header_value("width")?;

        // "map" marker line, then the grid rows.
        let _map = lines.next().ok_or_else(|| anyhow!("map file {path} has no grid"))??;

        let mut passable = Vec::with_capacity(height);
        for line in lines.take(height) {
            let line = line?;
            let row: Vec<bool> = line.chars().take(width).map(|ch| ch == '.').collect();
            if row.len() != width {
                bail!("map row {} in {path} has {} cells, expected {width}", passable.len(), row.len());
            }
            passable.push(row);
        }
        if passable.len() != height {
            bail!("map file {path} has {} rows, expected {height}", passable.len());
        }

        Ok(Self::build(height, width, passable))
    }

    fn build(height: usize, width: usize, passable: Vec<Vec<bool>>) -> Self {
        let grid = passable
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|passable| Tile {
                        passable,
                        neighbors: Vec::new(),
                    })
                    .collect()
            })
            .collect();

        let mut map = Map {
            height,
            width,
            grid,
        };
        map.initialize_neighbors();
        map
    }

    fn initialize_neighbors(&mut self) {
        for x in 0..self.height {
            for y in 0..self.width {
                if self.grid[x][y].passable {
                    self.grid[x][y].neighbors = self.compute_neighbors(x, y);
                }
            }
        }
    }

    fn compute_neighbors(&self, x: usize, y: usize) -> Vec<Cell> {
        let directions = [(-1, 0), (1, 0), (0, -1), (0, 1), (0, 0)]; // Up, down, left, right, stay
        let mut neighbors = Vec::new();

        for &(dx, dy) in &directions {
            let new_x = x as i64 + dx;
            let new_y = y as i64 + dy;
            if new_x >= 0
                && new_y >= 0
                && new_x < self.height as i64
                && new_y < self.width as i64
                && self.grid[new_x as usize][new_y as usize].passable
            {
                neighbors.push((new_x as usize, new_y as usize));
            }
        }

        neighbors
    }

    /// Valid moves from `cell`, the wait action last. Empty for invalid cells.
    pub fn get_neighbors(&self, cell: Cell) -> &[Cell] {
        if !self.is_valid(cell) {
            return &[];
        }
        &self.grid[cell.0][cell.1].neighbors
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.0 < self.height && cell.1 < self.width
    }

    /// Within bounds and not an obstacle.
    pub fn is_valid(&self, cell: Cell) -> bool {
        self.in_bounds(cell) && self.grid[cell.0][cell.1].is_passable()
    }

    pub fn passable_cells(&self) -> usize {
        self.grid
            .iter()
            .map(|row| row.iter().filter(|tile| tile.passable).count())
            .sum()
    }

    /// Exact move distance from every cell to `goal` on the static grid;
    /// `usize::MAX` where the goal cannot be reached.
    pub fn distance_map(&self, goal: Cell) -> Vec<Vec<usize>> {
        let mut distance = vec![vec![usize::MAX; self.width]; self.height];
        if !self.is_valid(goal) {
            return distance;
        }

        let mut heap = BinaryHeap::new();
        distance[goal.0][goal.1] = 0;
        heap.push((Reverse(0), goal));

        while let Some((Reverse(cost), (x, y))) = heap.pop() {
            if cost > distance[x][y] {
                continue;
            }

            for &(new_x, new_y) in &self.grid[x][y].neighbors {
                let next_cost = cost + 1;
                if next_cost < distance[new_x][new_y] {
                    heap.push((Reverse(next_cost), (new_x, new_y)));
                    distance[new_x][new_y] = next_cost;
                }
            }
        }

        distance
    }
}
