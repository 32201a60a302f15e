// q_learning.rs
pub mod rbf_agent;
