use std::time::Duration;
use tracing::trace;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crate::domain::{BoardConfig, BoardError, Message};
use crate::model::Model;

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &BoardConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, BoardError> {
        if event::poll(Duration::from_millis(self.event_poll_time))?
            && let Event::Key(key) = event::read()?
            && key.kind == event::KeyEventKind::Press
        {
            return Ok(Self::handle_key(key, model.raw_keyevents()));
        }
        Ok(None)
    }

    /// While the command line is active every key goes to the input, only
    /// Ctrl-C still quits.
    fn handle_key(key: KeyEvent, raw: bool) -> Option<Message> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(Message::Quit);
        }
        if raw {
            return Some(Message::RawKey(key));
        }

        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Up | KeyCode::Char('k') => Some(Message::MoveUp),
            KeyCode::Down | KeyCode::Char('j') => Some(Message::MoveDown),
            KeyCode::Left | KeyCode::Char('h') => Some(Message::MoveLeft),
            KeyCode::Right | KeyCode::Char('l') => Some(Message::MoveRight),
            KeyCode::PageDown | KeyCode::Char('n') => Some(Message::NextPage),
            KeyCode::PageUp | KeyCode::Char('p') => Some(Message::PrevPage),
            KeyCode::Home | KeyCode::Char('g') => Some(Message::FirstPage),
            KeyCode::End | KeyCode::Char('G') => Some(Message::LastPage),
            KeyCode::Char('s') => Some(Message::Sort),
            KeyCode::Char('/') => Some(Message::Filter),
            KeyCode::Char('f') => Some(Message::FilterColumn),
            KeyCode::Char('c') => Some(Message::ClearFilters),
            KeyCode::Char('e') => Some(Message::Export),
            KeyCode::Char('x') => Some(Message::ToggleExportExpired),
            KeyCode::Char('r') => Some(Message::Refresh),
            KeyCode::Char('L') => Some(Message::Logout),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Enter => Some(Message::Enter),
            KeyCode::Esc => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_messages() {
        let key = |code| KeyEvent::from(code);
        assert_eq!(Controller::handle_key(key(KeyCode::Char('s')), false), Some(Message::Sort));
        assert_eq!(Controller::handle_key(key(KeyCode::PageDown), false), Some(Message::NextPage));
        assert_eq!(
            Controller::handle_key(KeyEvent::new(KeyCode::Char('G'), KeyModifiers::SHIFT), false),
            Some(Message::LastPage)
        );
        assert_eq!(Controller::handle_key(key(KeyCode::Char('z')), false), None);
    }

    #[test]
    fn raw_mode_forwards_keys() {
        let q = KeyEvent::from(KeyCode::Char('q'));
        assert_eq!(Controller::handle_key(q, true), Some(Message::RawKey(q)));

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(Controller::handle_key(ctrl_c, true), Some(Message::Quit));
    }
}
