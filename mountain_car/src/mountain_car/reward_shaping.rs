// reward_shaping.rs
use rllearn::machine_learning::reinforcement_learning::environment::{RLEnvironment, Reward};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RewardShapingConfig {
    pub enabled: bool,
    pub center: Vec<f32>,
    pub scale: Vec<f32>,
    /// State component compared against `win_threshold`.
    pub win_component: usize,
    pub win_threshold: f32,
    pub win_bonus: f32,
}

impl Default for RewardShapingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            center: vec![-0.45, 0.0],
            scale: vec![1.05, 0.07],
            win_component: 0,
            win_threshold: 0.5,
            win_bonus: 100.0,
        }
    }
}

impl RewardShapingConfig {
    /// `|(s - center) / scale|` plus the bonus when the win component passed its threshold.
    pub fn shaped_reward(&self, state: &[f32]) -> Reward {
        let distance = state
            .iter()
            .enumerate()
            .map(|(i, x)| {
                let center = self.center.get(i).copied().unwrap_or_default();
                let scale = self.scale.get(i).copied().unwrap_or(1.0);
                ((x - center) / scale).powi(2)
            })
            .sum::<f32>()
            .sqrt();
        let won = state
            .get(self.win_component)
            .is_some_and(|x| *x >= self.win_threshold);
        match won {
            true => distance + self.win_bonus,
            false => distance,
        }
    }
}

/// Replaces the reward of the wrapped environment with a distance from the valley floor.
#[derive(Clone, Debug)]
pub struct RewardShaping<E: RLEnvironment> {
    env: E,
    config: RewardShapingConfig,
    cumulative_reward: Reward,
}

impl<E: RLEnvironment> RewardShaping<E> {
    pub fn new(env: E, config: RewardShapingConfig) -> Self {
        Self {
            env,
            config,
            cumulative_reward: 0.0,
        }
    }

    pub fn inner(&self) -> &E {
        &self.env
    }
}

impl<E: RLEnvironment> RLEnvironment for RewardShaping<E> {
    type State = E::State;
    type Action = E::Action;

    fn cumulative_reward(&self) -> Reward {
        self.cumulative_reward
    }

    fn step(&mut self, action: &Self::Action) -> (Reward, bool) {
        let (reward, done) = self.env.step(action);
        let reward = match self.config.enabled {
            true => self.config.shaped_reward(self.env.state().as_ref()),
            false => reward,
        };
        self.cumulative_reward += reward;
        (reward, done)
    }

    fn reset(&mut self) {
        self.env.reset();
        self.cumulative_reward = 0.0;
    }

    fn state(&self) -> Self::State {
        self.env.state()
    }

    fn observation_low(&self) -> Vec<f32> {
        self.env.observation_low()
    }

    fn observation_high(&self) -> Vec<f32> {
        self.env.observation_high()
    }
}
