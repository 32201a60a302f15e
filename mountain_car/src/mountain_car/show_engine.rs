// show_engine.rs

use std::io;

use ratatui::{widgets::Block, Frame};
use rllearn::machine_learning::reinforcement_learning::transition_log::TransitionLog;

use super::{engine::Engine, input::GameInput, plots::EpisodePanel};

/// Browses the episodes of a saved transition log.
pub struct ShowEngine {
    log: TransitionLog,
    episode: usize,
    panel: Option<EpisodePanel>,
}

impl ShowEngine {
    /// Starts at `episode`, or at the last logged episode.
    pub fn new(log: TransitionLog, episode: Option<usize>) -> Self {
        let last = log.episodes().saturating_sub(1);
        let mut engine = Self {
            log,
            episode: episode.unwrap_or(last).min(last),
            panel: None,
        };
        engine.select(engine.episode);
        engine
    }

    fn select(&mut self, episode: usize) {
        self.episode = episode;
        self.panel = self.log.episode(Some(episode)).map(|view| EpisodePanel::new(&view));
    }
}

impl Engine for ShowEngine {
    fn tick(&mut self, user_input: Option<GameInput>) -> io::Result<bool> {
        match user_input {
            Some(GameInput::Quit) => return Ok(true),
            Some(GameInput::NextEpisode) if self.episode + 1 < self.log.episodes() => {
                self.select(self.episode + 1)
            }
            Some(GameInput::PreviousEpisode) if self.episode > 0 => self.select(self.episode - 1),
            _ => {}
        }
        Ok(false)
    }

    fn render_frame(&self, frame: &mut Frame) {
        match &self.panel {
            Some(panel) => frame.render_widget(panel, frame.size()),
            None => frame.render_widget(Block::bordered().title("Empty log"), frame.size()),
        }
    }
}
