use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};
use tracing::trace;

const MASK: char = '•';

/// Single line editor behind the command line and the login prompts.
#[derive(Default)]
pub struct Inputter {
    current_input: String,
    cursor_pos: usize,
    masked: bool,
    finished: bool,
    canceled: bool,
}

#[derive(Default, Clone, Debug)]
pub struct InputResult {
    pub input: String,
    pub finished: bool,
    pub canceled: bool,
    pub cursor_pos: usize,
    pub masked: bool,
}

impl InputResult {
    /// What the command line shows; masked input never leaves as plain text.
    pub fn display(&self) -> String {
        if self.masked {
            std::iter::repeat_n(MASK, self.input.chars().count()).collect()
        } else {
            self.input.clone()
        }
    }
}

impl Inputter {
    pub fn read(&mut self, key: event::KeyEvent) -> InputResult {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => self.enter(),
            (KeyCode::Esc, _) => self.escape(),
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, _) => self.left(),
            (KeyCode::Right, _) => self.right(),
            (KeyCode::Home, _) => {
                self.cursor_pos = 0;
                self.get()
            }
            (KeyCode::End, _) => {
                self.cursor_pos = self.len();
                self.get()
            }
            (kc, km) => self.key(kc, km),
        }
    }

    pub fn set(&mut self, s: &str) {
        self.current_input = s.to_string();
        self.cursor_pos = self.len();
    }

    pub fn set_masked(&mut self, masked: bool) {
        self.masked = masked;
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            canceled: self.canceled,
            finished: self.finished,
            input: self.current_input.clone(),
            cursor_pos: self.cursor_pos,
            masked: self.masked,
        }
    }

    pub fn clear(&mut self) {
        self.canceled = false;
        self.finished = false;
        self.masked = false;
        self.current_input.clear();
        self.cursor_pos = 0;
    }

    fn len(&self) -> usize {
        self.current_input.chars().count()
    }

    fn enter(&mut self) -> InputResult {
        self.finished = true;
        self.get()
    }

    fn escape(&mut self) -> InputResult {
        self.current_input.clear();
        self.cursor_pos = 0;
        self.canceled = true;
        self.finished = true;
        self.get()
    }

    fn backspace(&mut self) -> InputResult {
        if self.cursor_pos > 0 {
            self.cursor_pos -= 1;
            let at = self.byte_pos();
            self.current_input.remove(at);
        }
        self.get()
    }

    fn delete(&mut self) -> InputResult {
        if self.cursor_pos < self.len() {
            let at = self.byte_pos();
            self.current_input.remove(at);
        }
        self.get()
    }

    fn left(&mut self) -> InputResult {
        self.cursor_pos = self.cursor_pos.saturating_sub(1);
        self.get()
    }

    fn right(&mut self) -> InputResult {
        if self.cursor_pos < self.len() {
            self.cursor_pos += 1;
        }
        self.get()
    }

    fn key(&mut self, code: KeyCode, modifier: KeyModifiers) -> InputResult {
        if modifier.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
            trace!("Ignoring {code:?} with {modifier:?}");
            return self.get();
        }
        if let Some(chr) = code.as_char() {
            let at = self.byte_pos();
            self.current_input.insert(at, chr);
            self.cursor_pos += 1;
        }
        self.get()
    }

    fn byte_pos(&self) -> usize {
        self.current_input
            .char_indices()
            .nth(self.cursor_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}

#[cfg(test)]
mod tests {
    use ratatui::crossterm::event::KeyEvent;

    use super::*;

    fn type_str(input: &mut Inputter, text: &str) {
        for c in text.chars() {
            input.read(KeyEvent::from(KeyCode::Char(c)));
        }
    }

    #[test]
    fn edits_at_the_cursor() {
        let mut input = Inputter::default();
        type_str(&mut input, "émis");
        input.read(KeyEvent::from(KeyCode::Left));
        input.read(KeyEvent::from(KeyCode::Left));
        input.read(KeyEvent::from(KeyCode::Backspace));
        type_str(&mut input, "-");
        let result = input.read(KeyEvent::from(KeyCode::Delete));
        assert_eq!(result.input, "é-s");
        assert_eq!(result.cursor_pos, 2);
        assert!(!result.finished);
    }

    #[test]
    fn enter_finishes_and_escape_cancels() {
        let mut input = Inputter::default();
        type_str(&mut input, "abc");
        let done = input.read(KeyEvent::from(KeyCode::Enter));
        assert!(done.finished && !done.canceled);
        assert_eq!(done.input, "abc");

        input.clear();
        type_str(&mut input, "abc");
        let canceled = input.read(KeyEvent::from(KeyCode::Esc));
        assert!(canceled.finished && canceled.canceled);
        assert_eq!(canceled.input, "");
    }

    #[test]
    fn masked_input_hides_characters() {
        let mut input = Inputter::default();
        input.set_masked(true);
        type_str(&mut input, "pässwd");
        let result = input.get();
        assert_eq!(result.input, "pässwd");
        assert_eq!(result.display(), "••••••");
    }

    #[test]
    fn set_moves_cursor_to_the_end() {
        let mut input = Inputter::default();
        input.set("Dupont");
        type_str(&mut input, "!");
        assert_eq!(input.get().input, "Dupont!");
    }
}
