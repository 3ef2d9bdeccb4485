use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::App;
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => app.chat.scroll_to_bottom(),
        AppEvent::Tick => app.chat.tick_animation(),
    }

    // Every event doubles as a chance to pick up a finished reply
    app.poll_reply().await;
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work with the panel open or closed
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => app.quit(),
            KeyCode::Char('t') => app.chat.toggle_panel(),
            _ => {}
        }
        return;
    }

    if app.chat.is_open {
        handle_panel_key(app, key);
    } else {
        handle_closed_key(app, key);
    }
}

fn handle_closed_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.quit(),
        KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('c') => app.chat.toggle_panel(),
        _ => {}
    }
}

fn handle_panel_key(app: &mut App, key: KeyEvent) {
    let chat = &mut app.chat;
    match key.code {
        KeyCode::Esc => chat.close_panel(),
        KeyCode::Enter => {
            chat.submit();
        }
        KeyCode::Backspace => chat.backspace(),
        KeyCode::Delete => chat.delete(),
        KeyCode::Left => chat.cursor_left(),
        KeyCode::Right => chat.cursor_right(),
        KeyCode::Home => chat.cursor_home(),
        KeyCode::End => chat.cursor_end(),
        KeyCode::Up => chat.scroll_up(1),
        KeyCode::Down => chat.scroll_down(1),
        KeyCode::PageUp => chat.scroll_up(chat.chat_height.max(1)),
        KeyCode::PageDown => chat.scroll_down(chat.chat_height.max(1)),
        KeyCode::Char(c) => chat.insert_char(c),
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn hit(area: Option<Rect>, mouse: &MouseEvent) -> bool {
    area.is_some_and(|rect| point_in_rect(mouse.column, mouse.row, rect))
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let areas = app.areas;
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if hit(areas.toggle, &mouse) {
                app.chat.toggle_panel();
            } else if app.chat.is_open {
                if hit(areas.close, &mouse) {
                    app.chat.close_panel();
                } else if hit(areas.send, &mouse) {
                    app.chat.submit();
                }
            }
        }
        MouseEventKind::ScrollUp if app.chat.is_open && hit(areas.messages, &mouse) => {
            app.chat.scroll_up(3);
        }
        MouseEventKind::ScrollDown if app.chat.is_open && hit(areas.messages, &mouse) => {
            app.chat.scroll_down(3);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChatMessage;
    use crate::testing::FakeGenerator;
    use crossterm::event::{KeyEventKind, KeyEventState};

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(c: char) -> AppEvent {
        AppEvent::Key(KeyEvent {
            code: KeyCode::Char(c),
            modifiers: KeyModifiers::CONTROL,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn click(column: u16, row: u16) -> AppEvent {
        AppEvent::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    async fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c))).await;
        }
    }

    #[tokio::test]
    async fn test_enter_opens_closed_panel() {
        let mut app = App::new(FakeGenerator::replying(["x"]));
        handle_event(&mut app, key(KeyCode::Enter)).await;
        assert!(app.chat.is_open);
        assert!(app.chat.history.is_empty());

        handle_event(&mut app, key(KeyCode::Esc)).await;
        assert!(!app.chat.is_open);
        assert!(!app.should_quit);

        handle_event(&mut app, key(KeyCode::Char('q'))).await;
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_typing_and_enter_submits() {
        let fake = FakeGenerator::replying(["Hello"]);
        let mut app = App::new(fake.clone()).with_panel_open(true);

        type_text(&mut app, "hi").await;
        assert_eq!(app.chat.draft, "hi");

        handle_event(&mut app, key(KeyCode::Enter)).await;
        assert_eq!(app.chat.history[0], ChatMessage::user("hi"));
        assert!(app.chat.draft.is_empty());

        app.chat.wait_idle().await;
        assert_eq!(app.chat.history[1], ChatMessage::assistant("Hello"));
    }

    #[tokio::test]
    async fn test_enter_matches_send_button() {
        let by_key = {
            let mut app = App::new(FakeGenerator::replying(["Hello"])).with_panel_open(true);
            type_text(&mut app, "question").await;
            handle_event(&mut app, key(KeyCode::Enter)).await;
            app.chat.wait_idle().await;
            (app.chat.history.clone(), app.chat.draft.clone(), app.chat.is_loading())
        };

        let by_click = {
            let mut app = App::new(FakeGenerator::replying(["Hello"])).with_panel_open(true);
            app.areas.send = Some(Rect::new(70, 20, 3, 1));
            type_text(&mut app, "question").await;
            handle_event(&mut app, click(71, 20)).await;
            app.chat.wait_idle().await;
            (app.chat.history.clone(), app.chat.draft.clone(), app.chat.is_loading())
        };

        assert_eq!(by_key, by_click);
        assert_eq!(by_key.0.len(), 2);
    }

    #[tokio::test]
    async fn test_enter_with_blank_draft_does_nothing() {
        let fake = FakeGenerator::replying(["Hello"]);
        let mut app = App::new(fake.clone()).with_panel_open(true);
        type_text(&mut app, "   ").await;
        handle_event(&mut app, key(KeyCode::Enter)).await;

        assert!(app.chat.history.is_empty());
        assert!(!app.chat.is_loading());
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn test_q_types_when_panel_open() {
        let mut app = App::new(FakeGenerator::replying(["x"])).with_panel_open(true);
        handle_event(&mut app, key(KeyCode::Char('q'))).await;
        assert!(!app.should_quit);
        assert_eq!(app.chat.draft, "q");
    }

    #[tokio::test]
    async fn test_ctrl_keys() {
        let mut app = App::new(FakeGenerator::replying(["x"]));
        handle_event(&mut app, ctrl('t')).await;
        assert!(app.chat.is_open);
        handle_event(&mut app, ctrl('t')).await;
        assert!(!app.chat.is_open);
        handle_event(&mut app, ctrl('c')).await;
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_mouse_toggle_and_close() {
        let mut app = App::new(FakeGenerator::replying(["x"]));
        app.areas.toggle = Some(Rect::new(74, 28, 6, 2));
        app.areas.close = Some(Rect::new(76, 5, 1, 1));

        // Close button is not clickable while the panel is hidden
        handle_event(&mut app, click(76, 5)).await;
        assert!(!app.chat.is_open);

        handle_event(&mut app, click(75, 29)).await;
        assert!(app.chat.is_open);

        handle_event(&mut app, click(76, 5)).await;
        assert!(!app.chat.is_open);
    }
}
