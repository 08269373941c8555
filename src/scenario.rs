use crate::common::{Agent, Cell, Path, Solution};
use crate::config::Config;
use crate::error::PlanError;
use crate::map::Map;
use crate::stat::Stats;

use anyhow::{anyhow, bail, Context, Result};
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub start: Cell,
    pub goal: Cell,
}

/// One planning request: grid size, static obstacles, and agents in id order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub rows: usize,
    pub cols: usize,
    #[serde(default)]
    pub obstacles: Vec<Cell>,
    pub agents: Vec<AgentRequest>,
}

impl Instance {
    /// Reads a request from YAML, or JSON when the file ends in `.json`.
    pub fn load_from_file(path: &str) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("cannot open instance file {path}"))?;
        let reader = BufReader::new(file);
        let instance = if path.ends_with(".json") {
            serde_json::from_reader(reader)
                .with_context(|| format!("invalid JSON instance {path}"))?
        } else {
            serde_yaml::from_reader(reader)
                .with_context(|| format!("invalid YAML instance {path}"))?
        };
        Ok(instance)
    }

    pub fn to_map(&self) -> Result<Map> {
        Map::from_obstacles(self.rows, self.cols, &self.obstacles)
    }

    pub fn to_agents(&self) -> Vec<Agent> {
        self.agents
            .iter()
            .enumerate()
            .map(|(id, request)| Agent {
                id,
                start: request.start,
                goal: request.goal,
            })
            .collect()
    }
}

/// Response body for the request boundary.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlanResponse {
    Solved {
        paths: Vec<Path>,
        cost: usize,
        makespan: usize,
        stats: Stats,
    },
    Failed {
        reason: String,
        message: String,
        stats: Stats,
    },
}

impl PlanResponse {
    pub fn from_result(result: &Result<Solution, PlanError>, stats: &Stats) -> Self {
        match result {
            Ok(solution) => PlanResponse::Solved {
                paths: solution.paths.clone(),
                cost: solution.cost(),
                makespan: solution.makespan(),
                stats: stats.clone(),
            },
            Err(err) => PlanResponse::Failed {
                reason: err.reason().to_string(),
                message: err.to_string(),
                stats: stats.clone(),
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Route {
    pub start_x: usize,
    pub start_y: usize,
    pub goal_x: usize,
    pub goal_y: usize,
}

/// MovingAI benchmark scenario: candidate routes for a named map.
#[derive(Debug, Deserialize)]
pub struct Scenario {
    pub map: String,
    pub map_width: usize,
    pub map_height: usize,
    pub routes: Vec<Route>,
}

impl Scenario {
    pub fn load_from_scen(path: &str) -> Result<Scenario> {
        let file = File::open(path).with_context(|| format!("cannot open scenario {path}"))?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        // First line is "version x.x" which we can skip
        let _version = lines.next();

        let mut scenario = Scenario {
            map: String::new(),
            map_width: 0,
            map_height: 0,
            routes: Vec::new(),
        };

        for (line_number, line) in lines.enumerate() {
            let line = line?;
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.is_empty() {
                continue;
            }
            if parts.len() < 8 {
                bail!("scenario {path} line {} has {} fields", line_number + 2, parts.len());
            }

            let field = |index: usize| -> Result<usize> {
                parts[index]
                    .parse()
                    .with_context(|| format!("scenario {path} line {}", line_number + 2))
            };

            // Columns are x (column) before y (row).
            let route = Route {
                start_x: field(5)?,
                start_y: field(4)?,
                goal_x: field(7)?,
                goal_y: field(6)?,
            };

            if scenario.map.is_empty() {
                // Initialize map details from the first route entry
                scenario.map = parts[1].to_string();
                scenario.map_width = field(2)?;
                scenario.map_height = field(3)?;
            }

            scenario.routes.push(route);
        }

        Ok(scenario)
    }

    /// Picks `num_agents` distinct routes whose starts and goals do not collide.
    pub fn generate_agents_randomly<R: Rng + ?Sized>(
        &self,
        num_agents: usize,
        rng: &mut R,
    ) -> Result<Vec<Agent>> {
        let mut available_routes = self.routes.clone();
        available_routes.sort();
        available_routes.dedup();

        // Shuffle the available routes to randomize the route selection
        available_routes.shuffle(rng);

        let mut agents: Vec<Agent> = Vec::new();
        for route in available_routes {
            if agents.len() == num_agents {
                break;
            }
            let start = (route.start_x, route.start_y);
            let goal = (route.goal_x, route.goal_y);
            if agents.iter().any(|a| a.start == start || a.goal == goal) {
                continue;
            }
            agents.push(Agent {
                id: agents.len(),
                start,
                goal,
            });
        }

        if agents.len() < num_agents {
            bail!(
                "only {} compatible routes available for {num_agents} agents",
                agents.len()
            );
        }

        info!("Generate scen: {agents:?}");
        Ok(agents)
    }
}

/// Builds the grid and agent list from whichever source the config names.
pub fn load_instance(config: &Config) -> Result<(Map, Vec<Agent>)> {
    if let Some(instance_path) = config.instance_path.as_deref() {
        let instance = Instance::load_from_file(instance_path)?;
        return Ok((instance.to_map()?, instance.to_agents()));
    }

    let map_path = config
        .map_path
        .as_deref()
        .ok_or_else(|| anyhow!("no instance or map file configured"))?;
    let scen_path = config
        .scen_path
        .as_deref()
        .ok_or_else(|| anyhow!("no scenario file configured for {map_path}"))?;

    let map = Map::from_file(map_path)?;
    let scenario = Scenario::load_from_scen(scen_path)?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let agents = scenario.generate_agents_randomly(config.num_agents, &mut rng)?;
    Ok((map, agents))
}
