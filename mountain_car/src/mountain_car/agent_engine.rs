use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;

use rllearn::machine_learning::reinforcement_learning::{
    environment::RLEnvironment,
    run::{run, EpisodeReport, RunConfig},
    transition_log::TransitionLog,
};
use ratatui::{
    layout::{Constraint, Layout},
    Frame,
};
use tracing::{error, info, warn};

use super::{
    car_model::{CarModel, CarState},
    engine::Engine,
    info::TrainingInfo,
    input::GameInput,
    model::{new_agent, to_io_error, AgentKind, CarAgent, CarEnv},
    plots::{uniform_state_grid, StatePathChart, ValueMap},
    reward_shaping::{RewardShaping, RewardShapingConfig},
};

const VALUE_MAP_POINTS_PER_AXIS: usize = 30;

#[derive(Clone, Debug)]
pub struct TrainingSetup {
    pub agent: AgentKind,
    pub episodes: usize,
    pub config: Option<PathBuf>,
    pub seed: Option<u64>,
    pub save_model: Option<PathBuf>,
    pub save_log: Option<PathBuf>,
    pub value_map_interval: usize,
    pub shaping: RewardShapingConfig,
}

impl Default for TrainingSetup {
    fn default() -> Self {
        Self {
            agent: AgentKind::default(),
            episodes: 100,
            config: None,
            seed: None,
            save_model: None,
            save_log: None,
            value_map_interval: 10,
            shaping: RewardShapingConfig::default(),
        }
    }
}

/// Builds the environment and agent for `setup`, runs every episode and stores the model
/// and transition log where requested.
pub fn train_agent<H>(setup: &TrainingSetup, mut hook: H) -> io::Result<TransitionLog>
where
    H: FnMut(&EpisodeReport, &dyn CarAgent) -> bool,
{
    let mut env = RewardShaping::new(CarModel::new(setup.seed), setup.shaping.clone());
    let mut agent = new_agent(setup.agent, setup.config.as_deref(), setup.seed, &env)?;
    info!(
        "Training {} agent for {} episodes",
        setup.agent.name(),
        setup.episodes
    );
    let run_config = RunConfig {
        episodes: setup.episodes,
        verbose: true,
    };
    let log = run::<CarEnv, dyn CarAgent, _>(&mut env, agent.as_mut(), &run_config, |r, a| {
        hook(r, a)
    })
    .map_err(to_io_error)?;

    if let Some(dir) = &setup.save_model {
        agent.save(dir).map_err(to_io_error)?;
        info!("Saved model to {}", dir.display());
    }
    if let Some(path) = &setup.save_log {
        log.save_json(path).map_err(to_io_error)?;
        info!("Saved {} transitions to {}", log.len(), path.display());
    }
    Ok(log)
}

fn path_chart(report: &EpisodeReport) -> StatePathChart {
    StatePathChart::new(report.episode, &report.path, &report.end)
}

#[derive(Clone, Debug)]
struct EpisodeSummary {
    episode: usize,
    steps: usize,
    total_reward: f32,
}

#[derive(Default)]
struct LatestView {
    path: Option<StatePathChart>,
    value_map: Option<ValueMap>,
}

/// Trains on a worker thread and shows the progress, the latest episode and the value map.
pub struct TrainingEngine {
    agent_engine_handle: Option<thread::JoinHandle<()>>,
    main_to_agent_sender: Sender<GameInput>,
    summary_rx: Receiver<EpisodeSummary>,
    latest: Arc<Mutex<LatestView>>,
    latest_path: Option<StatePathChart>,
    latest_value_map: Option<ValueMap>,
    info: TrainingInfo,
}

impl TrainingEngine {
    pub fn new(setup: TrainingSetup) -> Self {
        let (main_to_agent_sender, main_to_agent_receiver) = mpsc::channel();
        let (summary_tx, summary_rx) = mpsc::channel();
        let latest = Arc::new(Mutex::new(LatestView::default()));
        let latest_sender = Arc::clone(&latest);
        let info = TrainingInfo::new(setup.agent.name(), setup.episodes);

        let agent_engine_handle = thread::spawn(move || {
            let car = CarModel::new(setup.seed);
            let grid: Vec<CarState> = uniform_state_grid(
                &car.observation_low(),
                &car.observation_high(),
                VALUE_MAP_POINTS_PER_AXIS,
            )
            .iter()
            .map(|s| CarState::from(s.as_slice()))
            .collect();
            let interval = setup.value_map_interval;
            let last_episode = setup.episodes.saturating_sub(1);
            let hook = |report: &EpisodeReport, agent: &dyn CarAgent| -> bool {
                let _ = summary_tx.send(EpisodeSummary {
                    episode: report.episode,
                    steps: report.steps,
                    total_reward: report.total_reward,
                });
                let refresh = interval > 0
                    && (report.episode % interval == 0 || report.episode == last_episode);
                let value_map = if refresh {
                    match ValueMap::from_estimator::<CarEnv, _>(agent, &grid) {
                        Ok(value_map) => Some(value_map),
                        Err(e) => {
                            warn!("Could not compute value map: {e}");
                            None
                        }
                    }
                } else {
                    None
                };
                if let Ok(mut latest) = latest_sender.lock() {
                    latest.path = Some(path_chart(report));
                    if value_map.is_some() {
                        latest.value_map = value_map;
                    }
                }
                matches!(
                    main_to_agent_receiver.try_recv(),
                    Ok(GameInput::Quit) | Err(TryRecvError::Disconnected)
                )
            };
            if let Err(e) = train_agent(&setup, hook) {
                error!("Training failed: {e}");
            }
        });

        Self {
            agent_engine_handle: Some(agent_engine_handle),
            main_to_agent_sender,
            summary_rx,
            latest,
            latest_path: None,
            latest_value_map: None,
            info,
        }
    }

    fn stop_worker(&mut self) {
        let _ = self.main_to_agent_sender.send(GameInput::Quit);
        if let Some(handle) = self.agent_engine_handle.take() {
            if handle.join().is_err() {
                error!("Training thread panicked");
            }
        }
    }
}

impl Engine for TrainingEngine {
    fn tick(&mut self, user_input: Option<GameInput>) -> io::Result<bool> {
        let should_quit = matches!(user_input, Some(GameInput::Quit));
        if should_quit {
            self.stop_worker();
        }
        loop {
            match self.summary_rx.try_recv() {
                Ok(summary) => {
                    self.info
                        .add_episode(summary.episode, summary.steps, summary.total_reward)
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.info.set_finished();
                    break;
                }
            }
        }
        if let Ok(mut latest) = self.latest.lock() {
            if let Some(path) = latest.path.take() {
                self.latest_path = Some(path);
            }
            if let Some(value_map) = latest.value_map.take() {
                self.latest_value_map = Some(value_map);
            }
        }
        Ok(should_quit)
    }

    fn render_frame(&self, frame: &mut Frame) {
        let [left, right] =
            Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)])
                .areas(frame.size());
        let [path_area, value_area] =
            Layout::vertical([Constraint::Percentage(40), Constraint::Percentage(60)]).areas(right);
        frame.render_widget(&self.info, left);
        if let Some(path) = &self.latest_path {
            frame.render_widget(path, path_area);
        }
        if let Some(value_map) = &self.latest_value_map {
            frame.render_widget(value_map, value_area);
        }
    }
}

impl Drop for TrainingEngine {
    fn drop(&mut self) {
        self.stop_worker();
    }
}
