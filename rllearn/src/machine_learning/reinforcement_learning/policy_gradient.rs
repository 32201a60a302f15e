// policy_gradient.rs
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use burn::tensor::{backend::AutodiffBackend, cast::ToElement, Int, Tensor, TensorData};
use rand::{distributions::WeightedIndex, prelude::Distribution, SeedableRng};
use rand_xorshift::XorShiftRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::machine_learning::{
    nn::{
        activation::Activation,
        fully_connected::{FullyConnectedConfig, FullyConnectedRegressor},
    },
    reinforcement_learning::{
        agent::{action_from_index, arg_max, Agent, GreedyPolicy, ValueEstimator},
        environment::{RLAction, RLEnvironment, RLState, Replay},
        rl_error::{RLError, RLResult},
        state_mapper::StateMapper,
    },
};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum UpdateMode {
    #[default]
    FullEpisode,
    TemporalDifference,
}

/// How the per-step advantages and the critic targets are derived from an episode.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AdvantageEstimator {
    /// `G_t - V(s_t)` with the critic regressing on `G_t = sum_k gamma^k r_(t+k)`.
    #[default]
    DiscountedReturn,
    /// `gamma^(n-1-t) r_t - V(s_t)` with the critic regressing on `r_t`.
    DiscountWeightedReward,
}

impl AdvantageEstimator {
    /// Returns `(advantages, critic_targets)`.
    pub fn estimate(&self, rewards: &[f32], values: &[f32], gamma: f32) -> (Vec<f32>, Vec<f32>) {
        let n = rewards.len();
        let targets = match self {
            AdvantageEstimator::DiscountedReturn => {
                let mut returns = vec![0.0; n];
                let mut g = 0.0;
                for t in (0..n).rev() {
                    g = rewards[t] + gamma * g;
                    returns[t] = g;
                }
                returns
            }
            AdvantageEstimator::DiscountWeightedReward => rewards.to_vec(),
        };
        let advantages = match self {
            AdvantageEstimator::DiscountedReturn => targets
                .iter()
                .zip(values)
                .map(|(g, v)| g - v)
                .collect(),
            AdvantageEstimator::DiscountWeightedReward => rewards
                .iter()
                .zip(values)
                .enumerate()
                .map(|(t, (r, v))| gamma.powi((n - 1 - t) as i32) * r - v)
                .collect(),
        };
        (advantages, targets)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PolicyGradientConfig {
    pub actor: FullyConnectedConfig,
    pub critic: FullyConnectedConfig,
    pub gamma: f32,
    pub update: UpdateMode,
    pub advantage: AdvantageEstimator,
    /// Derived from the environment's observation bounds when not given.
    pub mapper: Option<StateMapper>,
    pub seed: Option<u64>,
}

impl Default for PolicyGradientConfig {
    fn default() -> Self {
        Self {
            actor: FullyConnectedConfig::default().with_output_activation(Activation::Softmax),
            critic: FullyConnectedConfig::default(),
            gamma: 0.99,
            update: UpdateMode::FullEpisode,
            advantage: AdvantageEstimator::DiscountedReturn,
            mapper: None,
            seed: None,
        }
    }
}

pub struct PolicyModel<B: AutodiffBackend> {
    net: FullyConnectedRegressor<B>,
    gamma: f32,
    estimator: AdvantageEstimator,
}

impl<B: AutodiffBackend> PolicyModel<B> {
    pub fn new(
        state_dims: usize,
        action_size: usize,
        mut config: FullyConnectedConfig,
        gamma: f32,
        estimator: AdvantageEstimator,
        device: B::Device,
    ) -> RLResult<Self> {
        config.output_activation = Activation::Softmax;
        config.output_use_bias = false;
        let net = FullyConnectedRegressor::new(state_dims, action_size, config, device)?;
        Ok(Self {
            net,
            gamma,
            estimator,
        })
    }

    pub fn action_size(&self) -> usize {
        self.net.output_dims()
    }

    /// Action distribution `pi(.|s)` for every state.
    pub fn policy<S: AsRef<[f32]>>(&self, states: &[S]) -> RLResult<Vec<Vec<f32>>> {
        Ok(self.net.predict(states)?)
    }

    /// `pi(a|s)` of the given state-action pairs.
    pub fn policy_of<S: AsRef<[f32]>>(&self, states: &[S], actions: &[u32]) -> RLResult<Vec<f32>> {
        if states.len() != actions.len() {
            return Err(RLError::EpisodeMismatch(format!(
                "{} states and {} actions",
                states.len(),
                actions.len()
            )));
        }
        self.policy(states)?
            .into_iter()
            .zip(actions)
            .map(|(probabilities, &action)| {
                probabilities
                    .get(action as usize)
                    .copied()
                    .ok_or(RLError::ActionOutOfRange {
                        value: action,
                        max: probabilities.len() as u32 - 1,
                    })
            })
            .collect()
    }

    /// One step on `-sum_t A_t log pi(a_t|s_t)`. Returns the loss before the step.
    pub fn full_episode_update<S: AsRef<[f32]>>(
        &mut self,
        states: &[S],
        actions: &[u32],
        rewards: &[f32],
        values: &[f32],
    ) -> RLResult<f32> {
        let n = states.len();
        if actions.len() != n || rewards.len() != n || values.len() != n {
            return Err(RLError::EpisodeMismatch(format!(
                "{n} states, {} actions, {} rewards and {} values",
                actions.len(),
                rewards.len(),
                values.len()
            )));
        }
        if n == 0 {
            return Err(RLError::EmptyEpisode("policy update".to_string()));
        }
        let action_size = self.action_size() as u32;
        if let Some(&value) = actions.iter().find(|&&a| a >= action_size) {
            return Err(RLError::ActionOutOfRange {
                value,
                max: action_size - 1,
            });
        }
        let (advantages, _) = self.estimator.estimate(rewards, values, self.gamma);

        let device = self.net.device().clone();
        let input = self.net.input_tensor("policy update", states)?;
        let indices: Vec<i64> = actions.iter().map(|&a| a as i64).collect();
        let indices = Tensor::<B, 2, Int>::from_data(TensorData::new(indices, [n, 1]), &device);
        let advantages = Tensor::<B, 1>::from_data(TensorData::new(advantages, [n]), &device);

        let log_probabilities = self
            .net
            .forward(input)
            .gather(1, indices)
            .reshape([n])
            .clamp_min(1e-8)
            .log();
        let loss = (log_probabilities * advantages).sum().neg();
        let loss_value = loss.clone().into_scalar().to_f32();
        self.net.minimize(loss);
        Ok(loss_value)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> RLResult<()> {
        Ok(self.net.save(path)?)
    }

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> RLResult<()> {
        Ok(self.net.load(path)?)
    }
}

pub struct ValueModel<B: AutodiffBackend> {
    net: FullyConnectedRegressor<B>,
}

impl<B: AutodiffBackend> ValueModel<B> {
    pub fn new(state_dims: usize, config: FullyConnectedConfig, device: B::Device) -> RLResult<Self> {
        Ok(Self {
            net: FullyConnectedRegressor::new(state_dims, 1, config, device)?,
        })
    }

    pub fn value<S: AsRef<[f32]>>(&self, states: &[S]) -> RLResult<Vec<f32>> {
        Ok(self.net.predict(states)?.into_iter().flatten().collect())
    }

    pub fn full_episode_update<S: AsRef<[f32]>>(
        &mut self,
        states: &[S],
        targets: &[f32],
    ) -> RLResult<f32> {
        let targets: Vec<[f32; 1]> = targets.iter().map(|&t| [t]).collect();
        Ok(self.net.fit(states, &targets)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> RLResult<()> {
        Ok(self.net.save(path)?)
    }

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> RLResult<()> {
        Ok(self.net.load(path)?)
    }
}

#[derive(Serialize, Deserialize)]
struct SavedAgent {
    config: PolicyGradientConfig,
    state_dims: usize,
    action_size: usize,
}

/// Actor/critic agent that updates once per finished episode.
pub struct PolicyGradientAgent<B: AutodiffBackend> {
    config: PolicyGradientConfig,
    mapper: StateMapper,
    actor: PolicyModel<B>,
    critic: ValueModel<B>,
    states: Vec<Vec<f32>>,
    actions: Vec<u32>,
    rewards: Vec<f32>,
    rng: XorShiftRng,
}

impl<B: AutodiffBackend> PolicyGradientAgent<B> {
    pub fn new<E: RLEnvironment>(
        env: &E,
        mut config: PolicyGradientConfig,
        device: B::Device,
    ) -> RLResult<Self> {
        if config.mapper.is_none() {
            config.mapper = Some(StateMapper::for_environment(env));
        }
        Self::with_dims(E::State::SIZE, E::Action::SIZE as usize, config, device)
    }

    fn with_dims(
        state_dims: usize,
        action_size: usize,
        config: PolicyGradientConfig,
        device: B::Device,
    ) -> RLResult<Self> {
        if config.update == UpdateMode::TemporalDifference {
            return Err(RLError::Unsupported(
                "temporal difference updates for the policy gradient agent".to_string(),
            ));
        }
        let actor = PolicyModel::new(
            state_dims,
            action_size,
            config.actor.clone(),
            config.gamma,
            config.advantage,
            device.clone(),
        )?;
        let critic = ValueModel::new(state_dims, config.critic.clone(), device)?;
        let rng = XorShiftRng::seed_from_u64(config.seed.unwrap_or_else(rand::random));
        Ok(Self {
            mapper: config.mapper.clone().unwrap_or_default(),
            config,
            actor,
            critic,
            states: Vec::new(),
            actions: Vec::new(),
            rewards: Vec::new(),
            rng,
        })
    }

    pub fn actor(&self) -> &PolicyModel<B> {
        &self.actor
    }

    pub fn critic(&self) -> &ValueModel<B> {
        &self.critic
    }

    /// Transitions buffered since the last update.
    pub fn pending(&self) -> usize {
        self.states.len()
    }

    fn update(&mut self) -> RLResult<()> {
        if self.states.is_empty() {
            return Ok(());
        }
        let values = self.critic.value(&self.states)?;
        let (_, targets) = self
            .config
            .advantage
            .estimate(&self.rewards, &values, self.config.gamma);
        let actor_loss =
            self.actor
                .full_episode_update(&self.states, &self.actions, &self.rewards, &values)?;
        let critic_loss = self.critic.full_episode_update(&self.states, &targets)?;
        debug!(
            "Policy update over {} steps, actor loss {actor_loss}, critic loss {critic_loss}",
            self.states.len()
        );
        self.states.clear();
        self.actions.clear();
        self.rewards.clear();
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, dir: P) -> RLResult<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let mut config = self.config.clone();
        config.mapper = Some(self.mapper.clone());
        let saved = SavedAgent {
            config,
            state_dims: self.actor.net.input_dims(),
            action_size: self.actor.action_size(),
        };
        let mut writer = BufWriter::new(File::create(dir.join("agent.json"))?);
        serde_json::to_writer_pretty(&mut writer, &saved)?;
        writer.flush()?;
        self.actor.save(dir.join("actor"))?;
        self.critic.save(dir.join("critic"))
    }

    pub fn load<P: AsRef<Path>>(dir: P, device: B::Device) -> RLResult<Self> {
        let dir = dir.as_ref();
        let saved: SavedAgent =
            serde_json::from_reader(BufReader::new(File::open(dir.join("agent.json"))?))?;
        let mut agent = Self::with_dims(saved.state_dims, saved.action_size, saved.config, device)?;
        agent.actor.load(dir.join("actor"))?;
        agent.critic.load(dir.join("critic"))?;
        Ok(agent)
    }
}

impl<B: AutodiffBackend, E: RLEnvironment> Agent<E> for PolicyGradientAgent<B> {
    fn act(&mut self, state: &E::State) -> RLResult<E::Action> {
        let state = self.mapper.map(state.as_ref());
        let probabilities = self.actor.policy(&[state])?.pop().unwrap_or_default();
        let index = match WeightedIndex::new(&probabilities) {
            Ok(distribution) => distribution.sample(&mut self.rng),
            Err(_) => arg_max(&probabilities).unwrap_or(0),
        };
        action_from_index(index)
    }

    fn observe(&mut self, replay: &Replay<E>, _episode: usize, _step: usize) -> RLResult<()> {
        self.states.push(self.mapper.map(replay.prev_state.as_ref()));
        self.actions.push(replay.action.into());
        self.rewards.push(replay.reward);
        if replay.terminal {
            self.update()?;
        }
        Ok(())
    }

    fn end_episode(&mut self, _episode: usize) -> RLResult<()> {
        self.update()
    }
}

impl<B: AutodiffBackend, E: RLEnvironment> GreedyPolicy<E> for PolicyGradientAgent<B> {
    fn greedy_action(&self, state: &E::State) -> RLResult<E::Action> {
        let state = self.mapper.map(state.as_ref());
        let probabilities = self.actor.policy(&[state])?.pop().unwrap_or_default();
        action_from_index(arg_max(&probabilities).unwrap_or(0))
    }
}

impl<B: AutodiffBackend, E: RLEnvironment> ValueEstimator<E> for PolicyGradientAgent<B> {
    fn state_values(&self, states: &[E::State]) -> RLResult<Vec<Vec<f32>>> {
        let states = self.mapper.map_all(states);
        Ok(self
            .critic
            .value(&states)?
            .into_iter()
            .map(|v| vec![v])
            .collect())
    }

    fn channel_names(&self) -> Vec<String> {
        vec!["V(s)".to_string()]
    }
}
