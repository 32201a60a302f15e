// rbf_agent.rs
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use burn::tensor::backend::AutodiffBackend;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::machine_learning::{
    nn::rbf_net::{RbfNetConfig, RbfRegressor, Samplers},
    reinforcement_learning::{
        agent::{action_from_index, arg_max, Agent, GreedyPolicy, ValueEstimator},
        environment::{RLAction, RLEnvironment, RLState, Replay},
        replay_buffer::ReplayBuffer,
        rl_error::RLResult,
        state_mapper::StateMapper,
    },
};

/// Multiplicative per-episode decay of the exploration rate.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EpsilonScheduler {
    epsilon: f32,
    decay: f32,
    min_epsilon: f32,
}

impl EpsilonScheduler {
    pub fn new(initial: f32, decay: f32, min_epsilon: f32) -> Self {
        Self {
            epsilon: initial.max(min_epsilon),
            decay,
            min_epsilon,
        }
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn step(&mut self) -> f32 {
        self.epsilon = (self.epsilon * self.decay).max(self.min_epsilon);
        self.epsilon
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct QLearningConfig {
    pub rbf: RbfNetConfig,
    pub gamma: f32,
    pub epsilon: f32,
    pub epsilon_decay: f32,
    pub min_epsilon: f32,
    /// Zero disables experience replay.
    pub replay_buffer_size: usize,
    pub replay_batch: usize,
    pub mapper: Option<StateMapper>,
    pub seed: Option<u64>,
}

impl Default for QLearningConfig {
    fn default() -> Self {
        Self {
            rbf: RbfNetConfig::default().with_samplers(Samplers::Count(100)),
            gamma: 0.99,
            epsilon: 0.5,
            epsilon_decay: 0.95,
            min_epsilon: 0.01,
            replay_buffer_size: 0,
            replay_batch: 0,
            mapper: None,
            seed: None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SavedAgent {
    config: QLearningConfig,
    state_dims: usize,
    epsilon: EpsilonScheduler,
}

/// Q-learning with one radial basis network per action.
pub struct RbfQAgent<E: RLEnvironment, B: AutodiffBackend> {
    config: QLearningConfig,
    mapper: StateMapper,
    nets: Vec<RbfRegressor<B>>,
    epsilon: EpsilonScheduler,
    replay_buffer: Option<ReplayBuffer<E>>,
    state_dims: usize,
    rng: XorShiftRng,
}

impl<E: RLEnvironment, B: AutodiffBackend> RbfQAgent<E, B> {
    pub fn new(env: &E, mut config: QLearningConfig, device: B::Device) -> RLResult<Self> {
        if config.mapper.is_none() {
            config.mapper = Some(StateMapper::for_environment(env));
        }
        Self::with_dims(E::State::SIZE, config, device)
    }

    fn with_dims(state_dims: usize, config: QLearningConfig, device: B::Device) -> RLResult<Self> {
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut nets = Vec::with_capacity(E::Action::SIZE as usize);
        for action in 0..E::Action::SIZE as u64 {
            let mut rbf_config = config.rbf.clone();
            rbf_config.seed = Some(rbf_config.seed.unwrap_or(seed).wrapping_add(action));
            let mut net = RbfRegressor::new(rbf_config, device.clone());
            net.initialize(state_dims, 1)?;
            nets.push(net);
        }
        let replay_buffer = match config.replay_buffer_size {
            0 => None,
            size => Some(ReplayBuffer::new(size)),
        };
        Ok(Self {
            mapper: config.mapper.clone().unwrap_or_default(),
            epsilon: EpsilonScheduler::new(config.epsilon, config.epsilon_decay, config.min_epsilon),
            nets,
            replay_buffer,
            state_dims,
            rng: XorShiftRng::seed_from_u64(seed),
            config,
        })
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon.epsilon()
    }

    pub fn replay_len(&self) -> usize {
        self.replay_buffer.as_ref().map_or(0, ReplayBuffer::len)
    }

    fn q_values(&self, mapped_state: &[f32]) -> RLResult<Vec<f32>> {
        self.nets
            .iter()
            .map(|net| Ok(net.predict(mapped_state)?[0]))
            .collect()
    }

    /// Q(s, a) of every action.
    pub fn action_values(&self, state: &E::State) -> RLResult<Vec<f32>> {
        self.q_values(&self.mapper.map(state.as_ref()))
    }

    /// `r + gamma * max_a' Q(s', a')`, only `r` for terminal transitions.
    pub fn target(&self, replay: &Replay<E>) -> RLResult<f32> {
        if replay.terminal {
            return Ok(replay.reward);
        }
        let next = self.action_values(&replay.next_state)?;
        let best = next.into_iter().fold(f32::NEG_INFINITY, f32::max);
        Ok(replay.reward + self.config.gamma * best)
    }

    fn learn(&mut self, replay: &Replay<E>) -> RLResult<f32> {
        let target = self.target(replay)?;
        let state = self.mapper.map(replay.prev_state.as_ref());
        let action: u32 = replay.action.into();
        let net = &mut self.nets[action as usize];
        Ok(net.partial_fit(&state, &[target])?)
    }

    pub fn save<P: AsRef<Path>>(&self, dir: P) -> RLResult<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let mut config = self.config.clone();
        config.mapper = Some(self.mapper.clone());
        let saved = SavedAgent {
            config,
            state_dims: self.state_dims,
            epsilon: self.epsilon.clone(),
        };
        let mut writer = BufWriter::new(File::create(dir.join("agent.json"))?);
        serde_json::to_writer_pretty(&mut writer, &saved)?;
        writer.flush()?;
        for (action, net) in self.nets.iter().enumerate() {
            net.save(dir.join(format!("q_action_{action}")))?;
        }
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(dir: P, device: B::Device) -> RLResult<Self> {
        let dir = dir.as_ref();
        let saved: SavedAgent =
            serde_json::from_reader(BufReader::new(File::open(dir.join("agent.json"))?))?;
        let mut agent = Self::with_dims(saved.state_dims, saved.config, device)?;
        agent.epsilon = saved.epsilon;
        let state_dims = agent.state_dims;
        for (action, net) in agent.nets.iter_mut().enumerate() {
            net.load(dir.join(format!("q_action_{action}")), state_dims, 1)?;
        }
        Ok(agent)
    }
}

impl<E: RLEnvironment, B: AutodiffBackend> Agent<E> for RbfQAgent<E, B> {
    fn act(&mut self, state: &E::State) -> RLResult<E::Action> {
        if self.rng.gen_bool(self.epsilon.epsilon().clamp(0.0, 1.0) as f64) {
            let index = self.rng.gen_range(0..E::Action::SIZE as usize);
            return action_from_index(index);
        }
        self.greedy_action(state)
    }

    fn observe(&mut self, replay: &Replay<E>, _episode: usize, _step: usize) -> RLResult<()> {
        self.learn(replay)?;
        let batch: Vec<Replay<E>> = match self.replay_buffer.as_mut() {
            Some(buffer) => {
                buffer.add(replay.clone());
                buffer
                    .sample(self.config.replay_batch, &mut self.rng)
                    .into_iter()
                    .cloned()
                    .collect()
            }
            None => Vec::new(),
        };
        for replay in &batch {
            self.learn(replay)?;
        }
        Ok(())
    }

    fn end_episode(&mut self, episode: usize) -> RLResult<()> {
        let epsilon = self.epsilon.step();
        debug!("Episode {episode} done, epsilon now {epsilon}");
        Ok(())
    }
}

impl<E: RLEnvironment, B: AutodiffBackend> GreedyPolicy<E> for RbfQAgent<E, B> {
    fn greedy_action(&self, state: &E::State) -> RLResult<E::Action> {
        let values = self.action_values(state)?;
        action_from_index(arg_max(&values).unwrap_or(0))
    }
}

impl<E: RLEnvironment, B: AutodiffBackend> ValueEstimator<E> for RbfQAgent<E, B> {
    fn state_values(&self, states: &[E::State]) -> RLResult<Vec<Vec<f32>>> {
        let states = self.mapper.map_all(states);
        let per_action = self
            .nets
            .iter()
            .map(|net| Ok(net.predict_batch(&states)?.into_iter().flatten().collect()))
            .collect::<RLResult<Vec<Vec<f32>>>>()?;
        Ok((0..states.len())
            .map(|i| per_action.iter().map(|values| values[i]).collect())
            .collect())
    }

    fn channel_names(&self) -> Vec<String> {
        (0..E::Action::SIZE)
            .map(|action| format!("Q(s in S, action = {action})"))
            .collect()
    }
}
