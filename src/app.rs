use std::sync::Arc;

use ratatui::layout::Rect;

use crate::generate::Generator;
use crate::widget::ChatWidget;

/// Clickable regions from the last frame, for mouse hit-testing
#[derive(Debug, Default, Clone, Copy)]
pub struct HitAreas {
    pub toggle: Option<Rect>,
    pub close: Option<Rect>,
    pub send: Option<Rect>,
    pub input: Option<Rect>,
    pub messages: Option<Rect>,
}

pub struct App {
    pub should_quit: bool,
    pub chat: ChatWidget,
    pub areas: HitAreas,
}

impl App {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            should_quit: false,
            chat: ChatWidget::new(generator),
            areas: HitAreas::default(),
        }
    }

    pub fn with_history_context(mut self, include_history: bool) -> Self {
        self.chat = self.chat.with_history_context(include_history);
        self
    }

    pub fn with_panel_open(mut self, open: bool) -> Self {
        self.chat.is_open = open;
        self
    }

    /// Apply a finished reply, if any
    pub async fn poll_reply(&mut self) {
        if self.chat.poll_reply().await {
            tracing::debug!(messages = self.chat.history.len(), "reply applied");
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}
