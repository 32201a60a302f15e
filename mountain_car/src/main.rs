mod mountain_car;

use std::{fs::File, io, path::PathBuf, sync::Mutex};

use clap::{command, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mountain_car::{AgentKind, RewardShapingConfig, TrainingSetup};

#[derive(Parser)]
#[command(about)]
pub struct MountainCarArgs {
    #[command(subcommand)]
    mode: MountainCarMode,
    /// Log file used while the terminal UI is active
    #[arg(long, global = true, default_value = "mountain_car.log")]
    log_file: PathBuf,
}

#[derive(Subcommand)]
pub enum MountainCarMode {
    /// Train an agent on the mountain car
    Train {
        #[command(flatten)]
        training_args: TrainArgs,
    },
    /// Drive the car with a trained agent
    Watch {
        model_dir: PathBuf,
        #[arg(value_enum, long, default_value_t = AgentKind::PolicyGradient)]
        agent: AgentKind,
        #[arg(long)]
        raw_reward: bool,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Browse the episodes of a saved transition log
    Show {
        transitions: PathBuf,
        #[arg(long)]
        episode: Option<usize>,
    },
}

#[derive(Parser, Debug)]
pub struct TrainArgs {
    #[arg(value_enum, long, default_value_t = AgentKind::PolicyGradient)]
    agent: AgentKind,

    /// Number of training episodes
    #[arg(long, default_value_t = 100)]
    episodes: usize,

    /// JSON file with the agent hyper-parameters
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    /// Directory the trained agent is written to
    #[arg(long)]
    save_model: Option<PathBuf>,

    /// JSON file the transition log is written to
    #[arg(long)]
    save_log: Option<PathBuf>,

    /// Train without the terminal UI, logging to stderr
    #[arg(long)]
    headless: bool,

    /// Episodes between value map refreshes, 0 disables the map
    #[arg(long, default_value_t = 10)]
    value_map_interval: usize,

    /// Learn from the environment reward instead of the shaped one
    #[arg(long)]
    raw_reward: bool,
}

impl From<TrainArgs> for TrainingSetup {
    fn from(value: TrainArgs) -> Self {
        TrainingSetup {
            agent: value.agent,
            episodes: value.episodes,
            config: value.config,
            seed: value.seed,
            save_model: value.save_model,
            save_log: value.save_log,
            value_map_interval: value.value_map_interval,
            shaping: RewardShapingConfig {
                enabled: !value.raw_reward,
                ..Default::default()
            },
        }
    }
}

fn init_logging(args: &MountainCarArgs) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let headless = matches!(
        &args.mode,
        MountainCarMode::Train { training_args } if training_args.headless
    );
    if headless {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    } else {
        let file = File::create(&args.log_file)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }
    Ok(())
}

fn main() -> io::Result<()> {
    let args = MountainCarArgs::parse();
    init_logging(&args)?;
    mountain_car::game_loop(args)
}
