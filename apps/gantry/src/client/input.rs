//! Single-line input editing with command history.

/// The editable command line. `cursor` is a byte offset and always sits on a
/// char boundary.
pub struct InputState {
    text: String,
    cursor: usize,
    history: Vec<String>,
    /// `Some` while browsing history; the in-progress line is parked in
    /// `pending` so it comes back on the way down.
    history_index: Option<usize>,
    pending: String,
}

impl InputState {
    pub fn new() -> Self {
        Self {
            text: String::new(),
            cursor: 0,
            history: Vec::new(),
            history_index: None,
            pending: String::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set(&mut self, text: String, cursor: usize) {
        self.cursor = cursor.min(text.len());
        self.text = text;
        // Any edit ends history browsing.
        self.history_index = None;
    }

    pub fn insert(&mut self, ch: char) {
        self.text.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
        self.history_index = None;
    }

    pub fn backspace(&mut self) {
        if let Some(ch) = self.text[..self.cursor].chars().next_back() {
            self.cursor -= ch.len_utf8();
            let _ = self.text.remove(self.cursor);
            self.history_index = None;
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.len() {
            let _ = self.text.remove(self.cursor);
            self.history_index = None;
        }
    }

    /// Delete back to the start of the previous word (ctrl-w).
    pub fn delete_word(&mut self) {
        let head = &self.text[..self.cursor];
        let trimmed = head.trim_end();
        let start = trimmed
            .rfind(char::is_whitespace)
            .map(|idx| idx + 1)
            .unwrap_or(0);
        self.text.replace_range(start..self.cursor, "");
        self.cursor = start;
        self.history_index = None;
    }

    pub fn move_left(&mut self) {
        if let Some(ch) = self.text[..self.cursor].chars().next_back() {
            self.cursor -= ch.len_utf8();
        }
    }

    pub fn move_right(&mut self) {
        if let Some(ch) = self.text[self.cursor..].chars().next() {
            self.cursor += ch.len_utf8();
        }
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.text.len();
    }

    /// Take the current line, record it in history (skipping blanks and
    /// immediate repeats) and clear the field.
    pub fn submit(&mut self) -> String {
        let line = std::mem::take(&mut self.text);
        self.cursor = 0;
        self.history_index = None;
        if !line.trim().is_empty() && self.history.last() != Some(&line) {
            self.history.push(line.clone());
        }
        line
    }

    pub fn history_up(&mut self) {
        let next = match self.history_index {
            None if self.history.is_empty() => return,
            None => {
                self.pending = std::mem::take(&mut self.text);
                self.history.len() - 1
            }
            Some(0) => 0,
            Some(idx) => idx - 1,
        };
        self.history_index = Some(next);
        self.text = self.history[next].clone();
        self.cursor = self.text.len();
    }

    pub fn history_down(&mut self) {
        match self.history_index {
            None => {}
            Some(idx) if idx + 1 < self.history.len() => {
                self.history_index = Some(idx + 1);
                self.text = self.history[idx + 1].clone();
                self.cursor = self.text.len();
            }
            Some(_) => {
                self.history_index = None;
                self.text = std::mem::take(&mut self.pending);
                self.cursor = self.text.len();
            }
        }
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editing_respects_char_boundaries() {
        let mut input = InputState::new();
        for ch in "héllo".chars() {
            input.insert(ch);
        }
        assert_eq!(input.text(), "héllo");

        input.move_left();
        input.move_left();
        input.move_left();
        input.move_left();
        input.backspace();
        assert_eq!(input.text(), "hllo");

        input.insert('é');
        input.move_right();
        input.delete();
        assert_eq!(input.text(), "hélo");
    }

    #[test]
    fn delete_word_removes_the_previous_word() {
        let mut input = InputState::new();
        for ch in "/set foo ".chars() {
            input.insert(ch);
        }
        input.delete_word();
        assert_eq!(input.text(), "/set ");
        assert_eq!(input.cursor(), 5);
    }

    #[test]
    fn history_browses_and_restores_the_pending_line() {
        let mut input = InputState::new();
        input.set("first".to_string(), 5);
        let _ = input.submit();
        input.set("second".to_string(), 6);
        let _ = input.submit();

        input.set("draft".to_string(), 5);
        input.history_up();
        assert_eq!(input.text(), "second");
        input.history_up();
        assert_eq!(input.text(), "first");
        input.history_up();
        assert_eq!(input.text(), "first");

        input.history_down();
        assert_eq!(input.text(), "second");
        input.history_down();
        assert_eq!(input.text(), "draft");
    }

    #[test]
    fn history_skips_blanks_and_repeats() {
        let mut input = InputState::new();
        input.set("G28".to_string(), 3);
        let _ = input.submit();
        input.set("G28".to_string(), 3);
        let _ = input.submit();
        input.set("   ".to_string(), 3);
        let _ = input.submit();

        input.history_up();
        assert_eq!(input.text(), "G28");
        input.history_up();
        assert_eq!(input.text(), "G28");
    }
}
