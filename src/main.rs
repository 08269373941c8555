use grid_cbs::config::{Cli, Config};
use grid_cbs::scenario::{load_instance, PlanResponse};
use grid_cbs::solver::{Solver, CBS};

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if let Some(config_file) = cli.config.as_ref() {
        let config_str = std::fs::read_to_string(config_file)
            .with_context(|| format!("cannot read config file: {config_file}"))?;
        Config::from_yaml_str(&config_str)
            .with_context(|| format!("error with config file: {config_file}"))?
    } else {
        Config::default()
    }
    .override_from_command_line(&cli)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let (map, agents) = load_instance(&config)?;
    info!(
        "Planning {} agents on a {}x{} grid",
        agents.len(),
        map.height,
        map.width
    );

    let mut cbs_solver = CBS::new(agents, &map);
    let result = cbs_solver.solve(&config.solver_config());
    match &result {
        Ok(solution) => {
            if !solution.verify(&map, cbs_solver.agents()) {
                bail!("cbs returned an invalid solution");
            }
            info!("cbs solution cost {}, makespan {}", solution.cost(), solution.makespan());
        }
        Err(err) => error!("cbs solve fails: {err}"),
    }

    let response = PlanResponse::from_result(&result, cbs_solver.stats());
    let body = serde_json::to_string_pretty(&response)?;
    match config.output_path.as_deref() {
        Some(output_path) => std::fs::write(output_path, body)
            .with_context(|| format!("cannot write response to {output_path}"))?,
        None => println!("{body}"),
    }

    if let Some(stats_path) = config.stats_path.as_deref() {
        let label = config
            .instance_path
            .as_deref()
            .or(config.scen_path.as_deref())
            .unwrap_or("run");
        cbs_solver.stats().append_csv(stats_path, label)?;
    }

    Ok(())
}
