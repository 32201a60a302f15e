use std::io::{self, stdout, Stdout};

use crossterm::{
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{prelude::*, CompletedFrame};

use super::{engine::Engine, input::handle_events};

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Owns the terminal for the lifetime of a TUI mode.
pub struct RenderEngine {
    terminal: Tui,
    tick_rate: std::time::Duration,
}

impl RenderEngine {
    pub fn init_render_engine() -> io::Result<RenderEngine> {
        enable_raw_mode()?;
        stdout().execute(EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
        Ok(RenderEngine {
            terminal,
            tick_rate: std::time::Duration::from_millis(50),
        })
    }

    pub fn deinit_render_engine(mut self) -> io::Result<()> {
        disable_raw_mode()?;
        stdout().execute(LeaveAlternateScreen)?;
        self.terminal.show_cursor()
    }

    pub fn render<F>(&mut self, render_fn: F) -> io::Result<CompletedFrame>
    where
        F: FnOnce(&mut Frame),
    {
        self.terminal.draw(render_fn)
    }

    /// Draws and ticks `engine` until it asks to quit.
    pub fn run_engine<E: Engine>(&mut self, engine: &mut E) -> io::Result<()> {
        let mut should_quit = false;
        while !should_quit {
            self.render(|frame| engine.render_frame(frame))?;
            let user_input = handle_events(self.tick_rate)?;
            should_quit = engine.tick(user_input)?;
        }
        Ok(())
    }
}
