// reinforcement_learning.rs
pub mod agent;
pub mod environment;
pub mod policy_gradient;
pub mod q_learning;
pub mod replay_buffer;
pub mod rl_error;
pub mod run;
pub mod state_mapper;
pub mod transition_log;
