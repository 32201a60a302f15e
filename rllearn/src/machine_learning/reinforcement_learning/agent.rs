use super::{
    environment::{RLAction, RLEnvironment, Replay},
    rl_error::{RLError, RLResult},
};

/// Something that chooses actions and learns from the transitions it caused.
pub trait Agent<E: RLEnvironment> {
    fn act(&mut self, state: &E::State) -> RLResult<E::Action>;
    fn observe(&mut self, replay: &Replay<E>, episode: usize, step: usize) -> RLResult<()>;
    fn end_episode(&mut self, _episode: usize) -> RLResult<()> {
        Ok(())
    }
}

/// Per-state values for plotting. Every returned row has one value per channel.
pub trait ValueEstimator<E: RLEnvironment> {
    fn state_values(&self, states: &[E::State]) -> RLResult<Vec<Vec<f32>>>;
    fn channel_names(&self) -> Vec<String>;
}

pub trait GreedyPolicy<E: RLEnvironment> {
    fn greedy_action(&self, state: &E::State) -> RLResult<E::Action>;
}

pub fn action_from_index<A: RLAction>(index: usize) -> RLResult<A> {
    match u32::try_from(index) {
        Ok(value) if value < A::SIZE => Ok(A::from(value)),
        _ => Err(RLError::ActionOutOfRange {
            value: index.min(u32::MAX as usize) as u32,
            max: A::SIZE - 1,
        }),
    }
}

/// Index of the largest value, the first one on ties.
pub fn arg_max(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}
