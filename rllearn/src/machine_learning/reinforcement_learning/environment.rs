use std::fmt::Debug;

// environment.rs
pub type Reward = f32;

/// One transition `prev_state --action--> next_state`.
pub struct Replay<E: RLEnvironment> {
    pub prev_state: E::State,
    pub action: E::Action,
    pub reward: Reward,
    pub next_state: E::State,
    pub terminal: bool,
}

impl<E: RLEnvironment> Clone for Replay<E> {
    fn clone(&self) -> Self {
        Self {
            prev_state: self.prev_state.clone(),
            action: self.action,
            reward: self.reward,
            next_state: self.next_state.clone(),
            terminal: self.terminal,
        }
    }
}

impl<E: RLEnvironment> Debug for Replay<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replay")
            .field("prev_state", &self.prev_state)
            .field("action", &self.action)
            .field("reward", &self.reward)
            .field("next_state", &self.next_state)
            .field("terminal", &self.terminal)
            .finish()
    }
}

pub type Step<E> = (
    <E as RLEnvironment>::Action,
    Reward,
    <E as RLEnvironment>::State,
    bool,
);

pub trait RLAction: Clone + Debug + Copy + From<u32> + Into<u32> + Sync + Send {
    const SIZE: u32;
}

pub trait RLState: Clone + Debug + AsRef<[f32]> + Sync + Send {
    const SIZE: usize;
}

pub trait RLEnvironment: Send + 'static {
    type State: RLState;
    type Action: RLAction;

    fn record_step(&mut self, action: Self::Action) -> Step<Self> {
        let (reward, ended) = self.step(&action);
        let next_state = self.state();
        (action, reward, next_state, ended)
    }
    /// Reward collected since the last reset.
    fn cumulative_reward(&self) -> Reward;
    /// Returns the reward of the transition and whether the episode ended.
    fn step(&mut self, action: &Self::Action) -> (Reward, bool);
    fn reset(&mut self);
    fn state(&self) -> Self::State;
    fn observation_low(&self) -> Vec<f32>;
    fn observation_high(&self) -> Vec<f32>;
}
