//! The floating chat widget: panel visibility, draft editing, message
//! history and the generation call that turns a draft into a reply.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::generate::{GenerationError, Generator};
use crate::state::{build_prompt, ChatMessage, ERROR_PLACEHOLDER, NO_RESPONSE_PLACEHOLDER};

type QueryTask = JoinHandle<Result<String, GenerationError>>;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct ChatWidget {
    pub is_open: bool,
    pub draft: String,
    /// Cursor position in `draft`, in chars
    pub cursor: usize,
    pub history: Vec<ChatMessage>,

    // Message list viewport
    pub scroll: u16,
    pub chat_height: u16, // Inner height of the message area
    /// Rows the message list took at the last render, after wrapping
    pub rendered_lines: usize,
    pub animation_frame: u8,
    /// Keep the newest message in view as the list grows
    follow: bool,

    include_history: bool,
    generator: Arc<dyn Generator>,
    query_task: Option<QueryTask>,
    /// History indices of user messages still waiting for their turn
    pending: VecDeque<usize>,
}

impl ChatWidget {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            is_open: false,
            draft: String::new(),
            cursor: 0,
            history: Vec::new(),
            scroll: 0,
            chat_height: 0,
            rendered_lines: 0,
            animation_frame: 0,
            follow: true,
            include_history: false,
            generator,
            query_task: None,
            pending: VecDeque::new(),
        }
    }

    /// Send earlier turns along with each prompt
    pub fn with_history_context(mut self, include_history: bool) -> Self {
        self.include_history = include_history;
        self
    }

    pub fn model(&self) -> &str {
        self.generator.model()
    }

    pub fn is_loading(&self) -> bool {
        self.query_task.is_some()
    }

    /// Number of submitted messages still waiting behind the in-flight one
    pub fn queued(&self) -> usize {
        self.pending.len()
    }

    pub fn toggle_panel(&mut self) {
        self.is_open = !self.is_open;
    }

    pub fn close_panel(&mut self) {
        self.is_open = false;
    }

    pub fn update_draft(&mut self, text: &str) {
        self.draft = text.to_string();
        self.cursor = self.draft.chars().count();
    }

    // Draft editing
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.draft, self.cursor);
        self.draft.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.draft, self.cursor);
            self.draft.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.draft.chars().count() {
            let byte_pos = char_to_byte_index(&self.draft, self.cursor);
            self.draft.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.draft.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.draft.chars().count();
    }

    /// Send the draft. Returns false when the draft is blank and nothing
    /// happened.
    ///
    /// The user message lands in the history and the draft is cleared before
    /// this returns. If a reply is still outstanding the message waits in a
    /// queue, so replies always arrive in the order they were asked.
    pub fn submit(&mut self) -> bool {
        if self.draft.trim().is_empty() {
            return false;
        }

        let content = std::mem::take(&mut self.draft);
        self.cursor = 0;
        self.history.push(ChatMessage::user(content));
        let idx = self.history.len() - 1;

        if self.query_task.is_some() {
            tracing::debug!(queued = self.pending.len() + 1, "reply in flight, queueing message");
            self.pending.push_back(idx);
        } else {
            self.dispatch(idx);
        }

        self.scroll_to_bottom();
        true
    }

    fn dispatch(&mut self, idx: usize) {
        let question = &self.history[idx].content;
        let prompt = if self.include_history {
            build_prompt(&self.history[..idx], question)
        } else {
            question.clone()
        };

        let generator = Arc::clone(&self.generator);
        self.query_task = Some(tokio::spawn(async move {
            generator.generate(&prompt).await
        }));
    }

    /// Apply the reply if the in-flight request has completed. Returns true
    /// when the history changed.
    pub async fn poll_reply(&mut self) -> bool {
        let finished = self
            .query_task
            .as_ref()
            .is_some_and(|task| task.is_finished());
        if !finished {
            return false;
        }
        self.wait_for_reply().await
    }

    /// Wait for the in-flight request and apply its result
    pub async fn wait_for_reply(&mut self) -> bool {
        let Some(task) = self.query_task.take() else {
            return false;
        };

        let result = match task.await {
            Ok(result) => result,
            Err(e) => Err(GenerationError::Interrupted(e.to_string())),
        };
        self.apply_reply(result);
        true
    }

    /// Wait until every submitted message has its reply
    pub async fn wait_idle(&mut self) {
        while self.wait_for_reply().await {}
    }

    fn apply_reply(&mut self, result: Result<String, GenerationError>) {
        let content = match result {
            Ok(text) if text.is_empty() => {
                tracing::warn!(model = self.generator.model(), "empty reply from model");
                NO_RESPONSE_PLACEHOLDER.to_string()
            }
            Ok(text) => text,
            Err(e) => {
                tracing::error!(model = self.generator.model(), error = %e, "generation failed");
                ERROR_PLACEHOLDER.to_string()
            }
        };
        self.history.push(ChatMessage::assistant(content));

        if let Some(next) = self.pending.pop_front() {
            self.dispatch(next);
        }
        self.scroll_to_bottom();
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow = false;
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_scroll();
        self.scroll = self.scroll.saturating_add(lines).min(max);
        self.follow = self.scroll == max;
    }

    /// Pin the message list to its newest entry (or the thinking
    /// indicator). Takes effect on the next `sync_viewport`.
    pub fn scroll_to_bottom(&mut self) {
        self.follow = true;
        self.scroll = self.max_scroll();
    }

    /// Record the rendered size of the message list: total rows after
    /// wrapping, and visible rows. Re-pins the bottom while following.
    pub fn sync_viewport(&mut self, rendered_lines: usize, height: u16) {
        self.rendered_lines = rendered_lines;
        self.chat_height = height;

        let max = self.max_scroll();
        self.scroll = if self.follow { max } else { self.scroll.min(max) };
    }

    fn max_scroll(&self) -> u16 {
        let hidden = self.rendered_lines.saturating_sub(self.chat_height as usize);
        hidden.min(u16::MAX as usize) as u16
    }
}

impl Drop for ChatWidget {
    fn drop(&mut self) {
        // A reply arriving after the widget is gone has nowhere to go
        if let Some(task) = self.query_task.take() {
            task.abort();
        }
    }
}
