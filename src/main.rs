/*!
The `wheelly` binary: load the four config files, build a [`Controller`] over either
the simulator or the real robot, run the TD(λ) agent against it for the configured session
duration, and flush a final halt plus an agent autosave on the way out.
*/

use std::collections::HashMap;
use std::time::Instant;

use wheelly::agent::trajectory::TrajectoryStep;
use wheelly::agent::{AgentConfig, TdAgent};
use wheelly::cli::Cli;
use wheelly::config::{self, Validate};
use wheelly::controller::backend::{RealBackend, SimBackend};
use wheelly::controller::environment::{self, EnvironmentConfig};
use wheelly::controller::{Controller, ControllerConfig};
use wheelly::errors::WheellyResult;
use wheelly::kpi::csv_sink::CsvSink;
use wheelly::kpi::{KpiSink, LabelFilter, Router};
use wheelly::logger::{init_log, LogLevel, LoggerConfig};
use wheelly::physics::PhysicsWorld;
use wheelly::protocol::message::RobotCommand;
use wheelly::protocol::transport::Transport;
use wheelly::radar::ObstacleMap;
use wheelly::robot::RobotConfig;
use wheelly::tensor::Tensor2;

fn main() {
    let cli = match Cli::try_parse_or_exit() {
        Some(cli) => cli,
        None => std::process::exit(1),
    };

    init_log(&LoggerConfig { log_level: if cli.silent { LogLevel::Off } else { LogLevel::Info } });

    match run(&cli) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            log::error!("fatal: {e:?}");
            std::process::exit(2);
        }
    }
}

fn build_controller(robot_config: &RobotConfig, controller_config: ControllerConfig) -> WheellyResult<Controller> {
    match robot_config {
        RobotConfig::Simulator { obstacles, seed, max_angular_speed, err_sensor_sigma, err_sigma_sigma } => {
            let mut map = ObstacleMap::new(controller_config.grid_size);
            for (x, y) in obstacles {
                map.insert_obstacle(*x, *y);
            }
            let world = PhysicsWorld::new(map, *seed, *err_sensor_sigma, *err_sigma_sigma);
            let backend = SimBackend::new(world, *max_angular_speed, *err_sensor_sigma, *seed);
            Ok(Controller::with_simulator(controller_config, backend))
        }
        RobotConfig::Real { address, max_connect_attempts, retry_delay_ms } => {
            let transport = Transport::connect(
                address,
                *max_connect_attempts,
                std::time::Duration::from_millis(*retry_delay_ms),
                || {
                    use std::time::{SystemTime, UNIX_EPOCH};
                    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as u64
                },
            )?;
            Ok(Controller::with_real_robot(controller_config, RealBackend::new(transport)))
        }
    }
}

fn run(cli: &Cli) -> WheellyResult<()> {
    let robot_config: RobotConfig = config::load_active(&cli.robot_config)?;
    let controller_config: ControllerConfig = config::load_active(&cli.controller_config)?;
    let env_config: EnvironmentConfig = config::load_active(&cli.env_config)?;
    env_config.validate()?;
    let agent_config: AgentConfig = config::load_active(&cli.agent_config)?;

    let mut controller = build_controller(&robot_config, controller_config)?;
    let mut agent = TdAgent::new(agent_config.clone())?;

    let filter = LabelFilter::parse(&cli.labels)?;
    let sinks: Vec<Box<dyn KpiSink>> = vec![Box::new(CsvSink::new(&cli.kpi_dir))];
    let mut kpis = Router::new(filter, sinks);

    let deadline = Instant::now() + std::time::Duration::from_secs(cli.session_seconds);
    let mut pending: Option<(Tensor2, HashMap<String, Tensor2>, f32)> = None;

    while Instant::now() < deadline {
        if let Err(e) = step(&mut controller, &mut agent, &env_config, &agent_config, &mut kpis, &mut pending) {
            log::warn!("tick failed: {e:?}");
            if e.is_fatal() {
                shutdown(&mut controller, &mut agent, &mut kpis)?;
                return Err(e);
            }
        }
    }

    shutdown(&mut controller, &mut agent, &mut kpis)
}

fn step(
    controller: &mut Controller,
    agent: &mut TdAgent,
    env_config: &EnvironmentConfig,
    agent_config: &AgentConfig,
    kpis: &mut Router,
    pending: &mut Option<(Tensor2, HashMap<String, Tensor2>, f32)>,
) -> WheellyResult<()> {
    let observation = environment::observe(controller);

    if let Some((prev_obs, prev_masks, prev_reward)) = pending.take() {
        let step = TrajectoryStep {
            observation: prev_obs,
            action_masks: prev_masks,
            reward: prev_reward,
            next_observation: observation.clone(),
        };
        agent.observe(step, kpis)?;
    }

    let choice = agent.act(&observation)?;
    let now_ms = controller.status().simulation_time_ms;
    let command = environment::choice_to_command(&choice, now_ms + env_config.command_deadline_ms, env_config.num_sensor_directions);
    controller.set_pending_command(command);

    let mut masks = HashMap::new();
    for (name, &class) in &choice {
        let num_values = agent_config.actions.get(name).map(|a| a.num_values).unwrap_or(1);
        let mut mask = Tensor2::zeros(1, num_values);
        mask.set(0, class, 1.);
        masks.insert(name.clone(), mask);
    }

    controller.react()?;
    let reward = environment::reward(controller);
    *pending = Some((observation, masks, reward));
    kpis.flush()
}

fn shutdown(controller: &mut Controller, agent: &mut TdAgent, kpis: &mut Router) -> WheellyResult<()> {
    controller.set_pending_command(RobotCommand::Halt);
    let _ = controller.tick();
    agent.save()?;
    kpis.flush()
}
