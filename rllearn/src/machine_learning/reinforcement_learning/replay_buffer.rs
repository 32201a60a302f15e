use super::environment::{RLEnvironment, Replay};
use rand::{seq::IteratorRandom, Rng};
use std::collections::VecDeque;

pub struct ReplayBuffer<E: RLEnvironment> {
    memory: VecDeque<Replay<E>>,
    max_size: usize,
}

impl<E: RLEnvironment> ReplayBuffer<E> {
    pub fn new(max_size: usize) -> Self {
        Self {
            memory: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    pub fn add(&mut self, replay: Replay<E>) {
        if self.max_size == 0 {
            return;
        }
        if self.memory.len() >= self.max_size {
            self.memory.pop_front();
        }
        self.memory.push_back(replay);
    }

    /// Up to `amount` distinct replays drawn uniformly.
    pub fn sample<R: Rng + ?Sized>(&self, amount: usize, rng: &mut R) -> Vec<&Replay<E>> {
        self.memory.iter().choose_multiple(rng, amount)
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }
}
