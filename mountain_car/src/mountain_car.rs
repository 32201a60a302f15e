mod agent_engine;
mod car_model;
mod engine;
mod info;
mod input;
mod model;
mod plots;
mod render_engine;
mod reward_shaping;
mod show_engine;
mod watch_engine;

use std::io;

use rllearn::machine_learning::reinforcement_learning::transition_log::TransitionLog;
use tracing::info;

use crate::{MountainCarArgs, MountainCarMode};

pub use agent_engine::TrainingSetup;
pub use model::AgentKind;
pub use reward_shaping::RewardShapingConfig;

use self::{
    agent_engine::{train_agent, TrainingEngine},
    engine::Engine,
    model::{load_agent, to_io_error},
    render_engine::RenderEngine,
    show_engine::ShowEngine,
    watch_engine::WatchEngine,
};

pub fn game_loop(args: MountainCarArgs) -> io::Result<()> {
    match args.mode {
        MountainCarMode::Train { training_args } => {
            let headless = training_args.headless;
            let setup = TrainingSetup::from(training_args);
            if headless {
                let log = train_agent(&setup, |_, _| false)?;
                info!("Training finished after {} episodes", log.episodes());
                Ok(())
            } else {
                run_tui(TrainingEngine::new(setup))
            }
        }
        MountainCarMode::Watch {
            model_dir,
            agent,
            raw_reward,
            seed,
        } => {
            let agent = load_agent(agent, &model_dir)?;
            let shaping = RewardShapingConfig {
                enabled: !raw_reward,
                ..Default::default()
            };
            run_tui(WatchEngine::new(agent, shaping, seed))
        }
        MountainCarMode::Show {
            transitions,
            episode,
        } => {
            let log = TransitionLog::load_json(&transitions).map_err(to_io_error)?;
            info!(
                "Loaded {} transitions in {} episodes from {}",
                log.len(),
                log.episodes(),
                transitions.display()
            );
            run_tui(ShowEngine::new(log, episode))
        }
    }
}

fn run_tui<E: Engine>(mut engine: E) -> io::Result<()> {
    let mut render_engine = RenderEngine::init_render_engine()?;
    let result = render_engine.run_engine(&mut engine);
    render_engine.deinit_render_engine()?;
    result
}
