use std::{io, time::Duration};

use crossterm::event::{self, Event, KeyCode, KeyEventKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameInput {
    Quit,
    Reset,
    NextEpisode,
    PreviousEpisode,
}

impl GameInput {
    pub fn from_key(code: KeyCode) -> Option<GameInput> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => Some(GameInput::Quit),
            KeyCode::Char('r') => Some(GameInput::Reset),
            KeyCode::Char('l') | KeyCode::Right | KeyCode::Char('n') => {
                Some(GameInput::NextEpisode)
            }
            KeyCode::Char('h') | KeyCode::Left | KeyCode::Char('p') => {
                Some(GameInput::PreviousEpisode)
            }
            _ => None,
        }
    }
}

pub fn handle_events(timeout: Duration) -> io::Result<Option<GameInput>> {
    if event::poll(timeout)? {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                return Ok(GameInput::from_key(key.code));
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        assert_eq!(GameInput::from_key(KeyCode::Esc), Some(GameInput::Quit));
        assert_eq!(GameInput::from_key(KeyCode::Char('r')), Some(GameInput::Reset));
        assert_eq!(
            GameInput::from_key(KeyCode::Left),
            Some(GameInput::PreviousEpisode)
        );
        assert_eq!(GameInput::from_key(KeyCode::Char('x')), None);
    }
}
