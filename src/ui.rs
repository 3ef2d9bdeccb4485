use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{block::Title, Block, BorderType, Borders, Clear, Paragraph, Wrap},
};
use crate::app::App;
use crate::state::ChatRole;

const TOGGLE_WIDTH: u16 = 6;
const TOGGLE_HEIGHT: u16 = 3;
const PANEL_WIDTH: u16 = 48;
const PANEL_HEIGHT: u16 = 22;
const SEND_WIDTH: u16 = 5;
const MARGIN: u16 = 1;

const ACCENT: Color = Color::Blue;

/// Style `**bold**` and `` `code` `` runs of a reply line.
/// Unclosed markers are kept as literal text.
fn parse_markdown_line(text: &str, base: Style) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let next = [("**", Modifier::BOLD), ("`", Modifier::ITALIC)]
            .into_iter()
            .filter_map(|(marker, modifier)| {
                let start = rest.find(marker)?;
                let after = &rest[start + marker.len()..];
                let len = after.find(marker)?;
                (len > 0).then_some((start, marker, len, modifier))
            })
            .min_by_key(|(start, ..)| *start);

        let Some((start, marker, len, modifier)) = next else {
            spans.push(Span::styled(rest.to_string(), base));
            break;
        };

        if start > 0 {
            spans.push(Span::styled(rest[..start].to_string(), base));
        }
        let inner_start = start + marker.len();
        spans.push(Span::styled(
            rest[inner_start..inner_start + len].to_string(),
            base.add_modifier(modifier),
        ));
        rest = &rest[inner_start + len + marker.len()..];
    }

    Line::from(spans)
}

/// Where the floating button sits: bottom-right corner
fn toggle_area(area: Rect) -> Rect {
    let width = TOGGLE_WIDTH.min(area.width);
    let height = TOGGLE_HEIGHT.min(area.height);
    Rect::new(
        area.x + area.width.saturating_sub(width + MARGIN),
        area.y + area.height.saturating_sub(height),
        width,
        height,
    )
}

/// The panel floats above the button, right edges aligned
fn panel_area(area: Rect, toggle: Rect) -> Rect {
    let width = PANEL_WIDTH.min(area.width.saturating_sub(2 * MARGIN));
    let height = PANEL_HEIGHT.min(toggle.y.saturating_sub(area.y));
    Rect::new(
        (toggle.x + toggle.width).saturating_sub(width),
        toggle.y.saturating_sub(height),
        width,
        height,
    )
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    render_backdrop(app, frame, area);

    let toggle = toggle_area(area);
    render_toggle(app, frame, toggle);
    app.areas.toggle = Some(toggle);

    if app.chat.is_open {
        let panel = panel_area(area, toggle);
        render_panel(app, frame, panel);
    } else {
        app.areas.close = None;
        app.areas.send = None;
        app.areas.input = None;
        app.areas.messages = None;
    }
}

fn render_backdrop(app: &App, frame: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from(vec![
            Span::styled(" chat-bubble ", Style::default().fg(ACCENT).bold()),
            Span::styled(
                format!("v{}", env!("CARGO_PKG_VERSION")),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        Line::from(Span::styled(
            " Ctrl+T or click the bubble to chat · Esc closes · q quits",
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(Span::styled(
            format!(" model: {}", app.chat.model()),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    frame.render_widget(Paragraph::new(lines), area);
}

fn render_toggle(app: &App, frame: &mut Frame, area: Rect) {
    let border = if app.chat.is_open { Color::Cyan } else { ACCENT };
    let button = Paragraph::new("💬")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::White))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(border)),
        );
    frame.render_widget(Clear, area);
    frame.render_widget(button, area);
}

fn render_panel(app: &mut App, frame: &mut Frame, area: Rect) {
    // Clear the area behind the panel
    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(ACCENT))
        .title(Span::styled(
            " 💬 AI Assistant ",
            Style::default().fg(Color::White).bg(ACCENT).bold(),
        ))
        .title(Title::from(" ✖ ").alignment(Alignment::Right));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    app.areas.close = (area.width >= 4).then(|| Rect::new(area.x + area.width - 3, area.y, 1, 1));

    let [messages_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(inner);

    render_messages(app, frame, messages_area);
    render_input(app, frame, input_area);
}

fn render_messages(app: &mut App, frame: &mut Frame, area: Rect) {
    app.areas.messages = Some(area);

    let chat = &app.chat;
    let text: Text<'static> = if chat.history.is_empty() && !chat.is_loading() {
        Text::from(Span::styled(
            "Ask me anything...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line<'static>> = Vec::new();

        for msg in &chat.history {
            match msg.role {
                ChatRole::User => {
                    let style = Style::default().fg(Color::White).bg(ACCENT);
                    lines.push(
                        Line::from(Span::styled(
                            msg.role.label(),
                            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                        ))
                        .alignment(Alignment::Right),
                    );
                    for line in msg.content.lines() {
                        lines.push(Line::styled(line.to_string(), style).alignment(Alignment::Right));
                    }
                }
                ChatRole::Assistant => {
                    let style = Style::default().fg(Color::Black).bg(Color::Gray);
                    lines.push(Line::from(Span::styled(
                        msg.role.label(),
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.content.lines() {
                        lines.push(parse_markdown_line(line, style));
                    }
                }
            }
            lines.push(Line::default());
        }

        if chat.is_loading() {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((chat.animation_frame as usize) + 1);
            let queued = match chat.queued() {
                0 => String::new(),
                n => format!(" ({} queued)", n),
            };
            lines.push(Line::from(Span::styled(
                format!("🤔 Thinking{}{}", dots, queued),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let messages = Paragraph::new(text).wrap(Wrap { trim: false });

    // Word wrapping decides how tall the list really is
    app.chat.sync_viewport(messages.line_count(area.width), area.height);
    let messages = messages.scroll((app.chat.scroll, 0));

    frame.render_widget(messages, area);
}

fn render_input(app: &mut App, frame: &mut Frame, area: Rect) {
    let [field_area, send_area] = Layout::horizontal([
        Constraint::Min(0),
        Constraint::Length(SEND_WIDTH),
    ])
    .areas(area);

    app.areas.input = Some(field_area);
    app.areas.send = Some(send_area);

    let field_block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Cyan));

    // Inner width = total width - 2 (for borders)
    let inner_width = field_area.width.saturating_sub(2) as usize;
    let cursor_pos = app.chat.cursor;

    // Keep the cursor visible by scrolling the draft horizontally
    let scroll_offset = if inner_width > 0 && cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let field = if app.chat.draft.is_empty() {
        Paragraph::new(Span::styled(
            "Type your message...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let visible_text: String = app.chat.draft
            .chars()
            .skip(scroll_offset)
            .take(inner_width)
            .collect();
        Paragraph::new(visible_text).style(Style::default().fg(Color::White))
    };
    frame.render_widget(field.block(field_block), field_area);

    let send = Paragraph::new("➤")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::White).bg(ACCENT).bold())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(ACCENT)),
        );
    frame.render_widget(send, send_area);

    if field_area.width > 2 && field_area.height > 2 {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((field_area.x + cursor_x + 1, field_area.y + 1));
    }
}
