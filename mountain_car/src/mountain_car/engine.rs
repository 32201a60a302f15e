// engine.rs

use std::io;

use ratatui::Frame;

use super::input::GameInput;

/// A screen of the terminal UI. `tick` returns true when the program should quit.
pub trait Engine {
    fn tick(&mut self, input: Option<GameInput>) -> io::Result<bool>;
    fn render_frame(&self, frame: &mut Frame);
}
