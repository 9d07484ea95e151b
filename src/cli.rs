/*!
The `wheelly` CLI: paths to the four config files, the KPI output directory, the
`-l` label filter, `-s` silent mode, and `-t` session duration.
*/

use std::path::PathBuf;

use clap::Parser;

use crate::constants::DEFAULT_SESSION_SECONDS;

#[derive(Parser, Debug)]
#[command(name = "wheelly", version, about = "Wheelly robot controller, simulator and TD(λ) agent")]
pub struct Cli {
    /// Robot/transport config (real-robot address or simulator parameters).
    #[arg(short = 'r', long = "robot", value_name = "robot.yml")]
    pub robot_config: PathBuf,

    /// Controller tick/reaction/radar config.
    #[arg(short = 'c', long = "controller", value_name = "controller.yml")]
    pub controller_config: PathBuf,

    /// Environment (observation/reward shaping) config.
    #[arg(short = 'e', long = "env", value_name = "env.yml")]
    pub env_config: PathBuf,

    /// Agent spec: network DAG, actions, learning rates, persistence path.
    #[arg(short = 'a', long = "agent", value_name = "agent.yml")]
    pub agent_config: PathBuf,

    /// Directory KPI sinks write into.
    #[arg(short = 'k', long = "kpis", value_name = "kpis/")]
    pub kpi_dir: PathBuf,

    /// KPI label filter: `all`, or a comma-separated list of labels/patterns.
    #[arg(short = 'l', long = "labels", default_value = "all")]
    pub labels: String,

    /// Suppress the default `env_logger` stderr output.
    #[arg(short = 's', long = "silent", default_value_t = false)]
    pub silent: bool,

    /// Session wall-clock duration, in seconds.
    #[arg(short = 't', long = "time", default_value_t = DEFAULT_SESSION_SECONDS)]
    pub session_seconds: u64,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// `try_parse` instead of `parse` so the binary can map a parse failure to exit
    /// code 1 rather than clap's own default of 2.
    pub fn try_parse_or_exit() -> Option<Self> {
        match Self::try_parse() {
            Ok(cli) => Some(cli),
            Err(e) => {
                let _ = e.print();
                None
            }
        }
    }
}
