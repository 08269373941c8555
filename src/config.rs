use crate::solver::{SearchBudget, SolverConfig};

use anyhow::{anyhow, Context};
use clap::Parser;
use serde::Deserialize;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "grid_cbs",
    about = "Collision-free multi-agent path planning on grids with Conflict-Based Search.",
    version = "0.1"
)]
pub struct Cli {
    #[arg(long, help = "Path to a YAML config file")]
    pub config: Option<String>,

    #[arg(long, help = "Path to a YAML or JSON planning instance")]
    pub instance: Option<String>,

    #[arg(long, help = "Path to a MovingAI map file")]
    pub map_path: Option<String>,

    #[arg(long, help = "Path to a MovingAI scenario file")]
    pub scen_path: Option<String>,

    #[arg(long, help = "Number of agents sampled from the scenario")]
    pub num_agents: Option<usize>,

    #[arg(long, help = "Seed for the random number generator")]
    pub seed: Option<u64>,

    #[arg(long, help = "Maximum constraint tree expansions")]
    pub max_expansions: Option<usize>,

    #[arg(long, help = "Wall-clock limit for one run, in milliseconds")]
    pub time_limit_ms: Option<u64>,

    #[arg(long, help = "Cost added per re-plan along a branch (non-standard bias)")]
    pub replan_penalty: Option<usize>,

    #[arg(long, help = "Low-level time horizon")]
    pub horizon: Option<usize>,

    #[arg(long, help = "Write the JSON response here instead of stdout")]
    pub output_path: Option<String>,

    #[arg(long, help = "Append run statistics to this CSV file")]
    pub stats_path: Option<String>,

    #[arg(long, help = "Log filter when RUST_LOG is unset")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub instance_path: Option<String>,
    pub map_path: Option<String>,
    pub scen_path: Option<String>,
    pub num_agents: usize,
    pub seed: u64,
    pub max_expansions: Option<usize>,
    pub time_limit_ms: Option<u64>,
    pub replan_penalty: Option<usize>,
    pub horizon: Option<usize>,
    pub output_path: Option<String>,
    pub stats_path: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            instance_path: None,
            map_path: None,
            scen_path: None,
            num_agents: 10,
            seed: 0,
            max_expansions: None,
            time_limit_ms: None,
            replan_penalty: None,
            horizon: None,
            output_path: None,
            stats_path: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(yaml).context("invalid config")
    }

    pub fn override_from_command_line(mut self, cli: &Cli) -> anyhow::Result<Self> {
        if let Some(instance) = &cli.instance {
            self.instance_path = Some(instance.clone());
        }
        if let Some(map_path) = &cli.map_path {
            self.map_path = Some(map_path.clone());
        }
        if let Some(scen_path) = &cli.scen_path {
            self.scen_path = Some(scen_path.clone());
        }
        if let Some(num_agents) = cli.num_agents {
            self.num_agents = num_agents;
        }
        if let Some(seed) = cli.seed {
            self.seed = seed;
        }
        if cli.max_expansions.is_some() {
            self.max_expansions = cli.max_expansions;
        }
        if cli.time_limit_ms.is_some() {
            self.time_limit_ms = cli.time_limit_ms;
        }
        if cli.replan_penalty.is_some() {
            self.replan_penalty = cli.replan_penalty;
        }
        if cli.horizon.is_some() {
            self.horizon = cli.horizon;
        }
        if let Some(output_path) = &cli.output_path {
            self.output_path = Some(output_path.clone());
        }
        if let Some(stats_path) = &cli.stats_path {
            self.stats_path = Some(stats_path.clone());
        }
        if let Some(log_level) = &cli.log_level {
            self.log_level = log_level.clone();
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.instance_path.is_none() {
            if self.map_path.is_none() || self.scen_path.is_none() {
                return Err(anyhow!(
                    "either an instance file or both a map and a scenario file are required"
                ));
            }
            if self.num_agents == 0 {
                return Err(anyhow!("Number of agents must be at least 1"));
            }
        }

        if self.max_expansions == Some(0) {
            return Err(anyhow!("Expansion budget must be at least 1, got 0"));
        }

        if self.horizon == Some(0) {
            return Err(anyhow!("Horizon must be at least 1, got 0"));
        }

        Ok(())
    }

    pub fn solver_config(&self) -> SolverConfig {
        SolverConfig {
            budget: SearchBudget {
                max_expansions: self.max_expansions,
                time_limit: self.time_limit_ms.map(Duration::from_millis),
            },
            replan_penalty: self.replan_penalty,
            horizon: self.horizon,
        }
    }
}
