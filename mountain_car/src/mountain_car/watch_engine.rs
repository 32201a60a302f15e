// watch_engine.rs

use std::io;

use ratatui::{
    layout::{Constraint, Layout},
    Frame,
};
use rllearn::machine_learning::reinforcement_learning::environment::RLEnvironment;
use tracing::{info, warn};

use super::{
    car_model::{CarModel, CarState},
    engine::Engine,
    input::GameInput,
    model::{to_io_error, CarAgent, CarEnv},
    plots::{uniform_state_grid, ValueMap},
    reward_shaping::{RewardShaping, RewardShapingConfig},
};

const VALUE_MAP_POINTS_PER_AXIS: usize = 40;

/// Drives the car with the greedy action of a trained agent.
pub struct WatchEngine {
    rl_env: CarEnv,
    agent: Box<dyn CarAgent>,
    value_map: Option<ValueMap>,
    episodes: usize,
}

impl WatchEngine {
    pub fn new(agent: Box<dyn CarAgent>, shaping: RewardShapingConfig, seed: Option<u64>) -> Self {
        let rl_env = RewardShaping::new(CarModel::new(seed), shaping);
        let grid: Vec<CarState> = uniform_state_grid(
            &rl_env.observation_low(),
            &rl_env.observation_high(),
            VALUE_MAP_POINTS_PER_AXIS,
        )
        .iter()
        .map(|s| CarState::from(s.as_slice()))
        .collect();
        let value_map = match ValueMap::from_estimator::<CarEnv, _>(agent.as_ref(), &grid) {
            Ok(value_map) => Some(value_map),
            Err(e) => {
                warn!("Could not compute value map: {e}");
                None
            }
        };
        Self {
            rl_env,
            agent,
            value_map,
            episodes: 0,
        }
    }

    fn reset(&mut self) {
        info!(
            "Episode {} ended after {} steps with reward {}",
            self.episodes,
            self.rl_env.inner().steps(),
            self.rl_env.cumulative_reward()
        );
        self.rl_env.reset();
        self.episodes += 1;
    }
}

impl Engine for WatchEngine {
    fn tick(&mut self, user_input: Option<GameInput>) -> io::Result<bool> {
        match user_input {
            Some(GameInput::Quit) => return Ok(true),
            Some(GameInput::Reset) => self.reset(),
            _ => {}
        }
        if self.rl_env.inner().has_episode_ended() {
            self.reset();
        }
        let action = self
            .agent
            .greedy_action(&self.rl_env.state())
            .map_err(to_io_error)?;
        let _ = self.rl_env.step(&action);
        Ok(false)
    }

    fn render_frame(&self, frame: &mut Frame) {
        let [car_area, value_area] =
            Layout::vertical([Constraint::Percentage(50), Constraint::Percentage(50)])
                .areas(frame.size());
        frame.render_widget(self.rl_env.inner(), car_area);
        if let Some(value_map) = &self.value_map {
            frame.render_widget(value_map, value_area);
        }
    }
}
