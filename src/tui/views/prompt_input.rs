//! Custom prompt entry overlay.
//!
//! Shown when the user confirms an issue from the dashboard. An empty
//! submission means "use the generated prompt"; Esc cancels without
//! invoking anything.

use crossterm::event::KeyCode;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};

use crate::models::Issue;

/// What a key press resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptAction {
    /// Keep collecting input
    Pending,
    /// Launch the assistant; `None` means use the generated prompt
    Submit(Option<String>),
    /// Close the overlay without invoking
    Cancel,
}

/// Text-entry state for one manual invocation.
#[derive(Debug, Clone)]
pub struct PromptInput {
    issue: Issue,
    buffer: String,
}

impl PromptInput {
    pub fn new(issue: Issue) -> Self {
        Self {
            issue,
            buffer: String::new(),
        }
    }

    /// The issue this prompt will invoke the assistant for.
    pub fn issue(&self) -> &Issue {
        &self.issue
    }

    /// Apply one key press to the input buffer.
    pub fn handle_key(&mut self, key: KeyCode) -> PromptAction {
        match key {
            KeyCode::Esc => PromptAction::Cancel,
            KeyCode::Enter => {
                let text = self.buffer.trim();
                if text.is_empty() {
                    PromptAction::Submit(None)
                } else {
                    PromptAction::Submit(Some(text.to_string()))
                }
            }
            KeyCode::Backspace => {
                self.buffer.pop();
                PromptAction::Pending
            }
            KeyCode::Char(c) => {
                self.buffer.push(c);
                PromptAction::Pending
            }
            _ => PromptAction::Pending,
        }
    }

    /// Render the overlay into `area`.
    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(1),
            ])
            .split(area);

        let header = Paragraph::new(format!(
            " Invoke assistant for #{}: {}",
            self.issue.number, self.issue.title
        ))
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, chunks[0]);

        let input = Paragraph::new(format!(" {}█", self.buffer)).block(
            Block::default()
                .borders(Borders::ALL)
                .title("Custom prompt (empty for default)"),
        );
        frame.render_widget(input, chunks[1]);

        let hint = Paragraph::new(" Enter:Invoke  Esc:Cancel")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(hint, chunks[2]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_issue() -> Issue {
        Issue {
            number: 5,
            title: "Fix parsing".to_string(),
            state: "open".to_string(),
            labels: vec![],
            assignee: None,
            repo: "o/r".to_string(),
            url: "https://github.com/o/r/issues/5".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_typed_text_is_submitted() {
        let mut prompt = PromptInput::new(test_issue());
        for c in "fix it".chars() {
            assert_eq!(prompt.handle_key(KeyCode::Char(c)), PromptAction::Pending);
        }
        assert_eq!(
            prompt.handle_key(KeyCode::Enter),
            PromptAction::Submit(Some("fix it".to_string()))
        );
    }

    #[test]
    fn test_empty_submission_means_generated_prompt() {
        let mut prompt = PromptInput::new(test_issue());
        assert_eq!(prompt.handle_key(KeyCode::Enter), PromptAction::Submit(None));
    }

    #[test]
    fn test_whitespace_only_submission_means_generated_prompt() {
        let mut prompt = PromptInput::new(test_issue());
        prompt.handle_key(KeyCode::Char(' '));
        assert_eq!(prompt.handle_key(KeyCode::Enter), PromptAction::Submit(None));
    }

    #[test]
    fn test_backspace_edits_buffer() {
        let mut prompt = PromptInput::new(test_issue());
        prompt.handle_key(KeyCode::Char('a'));
        prompt.handle_key(KeyCode::Char('b'));
        prompt.handle_key(KeyCode::Backspace);
        assert_eq!(
            prompt.handle_key(KeyCode::Enter),
            PromptAction::Submit(Some("a".to_string()))
        );
    }

    #[test]
    fn test_escape_cancels() {
        let mut prompt = PromptInput::new(test_issue());
        prompt.handle_key(KeyCode::Char('x'));
        assert_eq!(prompt.handle_key(KeyCode::Esc), PromptAction::Cancel);
    }
}
