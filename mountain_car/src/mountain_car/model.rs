// model.rs
use std::{fs::File, io, io::BufReader, path::Path};

use burn::backend::{Autodiff, NdArray};
use clap::ValueEnum;
use rllearn::machine_learning::reinforcement_learning::{
    agent::{Agent, GreedyPolicy, ValueEstimator},
    policy_gradient::{PolicyGradientAgent, PolicyGradientConfig},
    q_learning::rbf_agent::{QLearningConfig, RbfQAgent},
    rl_error::RLResult,
};
use serde::de::DeserializeOwned;
use tracing::info;

use super::{car_model::CarModel, reward_shaping::RewardShaping};

pub type CarEnv = RewardShaping<CarModel>;
pub type TrainBackend = Autodiff<NdArray>;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AgentKind {
    #[default]
    PolicyGradient,
    QLearning,
}

impl AgentKind {
    pub fn name(&self) -> &'static str {
        match self {
            AgentKind::PolicyGradient => "policy-gradient",
            AgentKind::QLearning => "q-learning",
        }
    }
}

/// Everything the engines need from an agent driving the car.
pub trait CarAgent:
    Agent<CarEnv> + ValueEstimator<CarEnv> + GreedyPolicy<CarEnv> + Send
{
    fn save(&self, dir: &Path) -> RLResult<()>;
}

impl CarAgent for PolicyGradientAgent<TrainBackend> {
    fn save(&self, dir: &Path) -> RLResult<()> {
        PolicyGradientAgent::save(self, dir)
    }
}

impl CarAgent for RbfQAgent<CarEnv, TrainBackend> {
    fn save(&self, dir: &Path) -> RLResult<()> {
        RbfQAgent::save(self, dir)
    }
}

pub fn to_io_error<E: std::error::Error + Send + Sync + 'static>(error: E) -> io::Error {
    io::Error::other(error)
}

fn read_config<C: DeserializeOwned + Default>(path: Option<&Path>) -> io::Result<C> {
    match path {
        Some(path) => {
            info!("Reading agent config from {}", path.display());
            serde_json::from_reader(BufReader::new(File::open(path)?)).map_err(to_io_error)
        }
        None => Ok(C::default()),
    }
}

/// Builds a fresh agent for `env`, with the hyper-parameters from `config` when given.
pub fn new_agent(
    kind: AgentKind,
    config: Option<&Path>,
    seed: Option<u64>,
    env: &CarEnv,
) -> io::Result<Box<dyn CarAgent>> {
    let device = Default::default();
    let agent: Box<dyn CarAgent> = match kind {
        AgentKind::PolicyGradient => {
            let mut config: PolicyGradientConfig = read_config(config)?;
            config.seed = seed.or(config.seed);
            Box::new(PolicyGradientAgent::<TrainBackend>::new(env, config, device).map_err(to_io_error)?)
        }
        AgentKind::QLearning => {
            let mut config: QLearningConfig = read_config(config)?;
            config.seed = seed.or(config.seed);
            Box::new(RbfQAgent::<CarEnv, TrainBackend>::new(env, config, device).map_err(to_io_error)?)
        }
    };
    Ok(agent)
}

pub fn load_agent(kind: AgentKind, dir: &Path) -> io::Result<Box<dyn CarAgent>> {
    info!("Loading {} agent from {}", kind.name(), dir.display());
    let device = Default::default();
    let agent: Box<dyn CarAgent> = match kind {
        AgentKind::PolicyGradient => Box::new(
            PolicyGradientAgent::<TrainBackend>::load(dir, device).map_err(to_io_error)?,
        ),
        AgentKind::QLearning => Box::new(
            RbfQAgent::<CarEnv, TrainBackend>::load(dir, device).map_err(to_io_error)?,
        ),
    };
    Ok(agent)
}

#[cfg(test)]
mod tests {
    use rllearn::machine_learning::reinforcement_learning::environment::RLEnvironment;

    use super::super::reward_shaping::RewardShapingConfig;
    use super::*;

    #[test]
    fn test_missing_config_file() {
        let env = RewardShaping::new(CarModel::new(Some(0)), RewardShapingConfig::default());
        let result = new_agent(
            AgentKind::QLearning,
            Some(Path::new("does/not/exist.json")),
            None,
            &env,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_q_agent_from_config_file() {
        let path = std::env::temp_dir().join("mountain_car_q_config_test.json");
        std::fs::write(&path, r#"{"gamma": 0.9, "rbf": {"samplers": {"Count": 4}}}"#).unwrap();
        let env = RewardShaping::new(CarModel::new(Some(0)), RewardShapingConfig::default());
        let mut agent = new_agent(AgentKind::QLearning, Some(&path), Some(1), &env).unwrap();
        let action = agent.act(&env.state()).unwrap();
        assert!(u32::from(action) < 3);
        assert_eq!(agent.channel_names().len(), 3);
        let _ = std::fs::remove_file(path);
    }
}
