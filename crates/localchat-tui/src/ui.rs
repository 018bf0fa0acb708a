use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use localchat_core::{Role, QUICK_REPLIES};
use crate::app::App;

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            // Consume the second *
            chars.next();

            // Push any accumulated plain text
            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;

            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(bold_text, Style::default().add_modifier(Modifier::BOLD)));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Centered popup rectangle, clamped to the frame.
fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let quick_height = if app.session.quick_replies_available() { 3 } else { 0 };

    // Main layout: header, chat, quick replies, input, footer
    let [header_area, chat_area, quick_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(quick_height),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    if quick_height > 0 {
        render_quick_replies(app, frame, quick_area);
    }
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    // Render popups (in order of priority)
    if let Some(notice) = &app.notice {
        render_notice(notice, frame, area);
    } else if app.session.is_initializing() {
        render_loading_overlay(app, frame, chat_area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let (status, status_color) = if app.session.is_initializing() {
        ("loading", Color::Yellow)
    } else if !app.session.is_ready() {
        ("unavailable", Color::Red)
    } else if app.session.is_busy() {
        ("thinking", Color::Magenta)
    } else {
        ("ready", Color::Green)
    };

    let title = Line::from(vec![
        Span::styled(" localchat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("{}: {} ", app.provider.display_name(), app.session.model()),
            Style::default().fg(Color::White),
        ),
        Span::styled(format!("[{}]", status), Style::default().fg(status_color)),
        Span::styled(format!(" {} ", app.server_url), Style::default().fg(Color::Gray)),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Chat ");

    let busy = app.session.is_busy();
    let chat_text = if app.session.conversation().visible_count() == 0 && !busy {
        Text::from(Span::styled(
            "Send a message to start chatting...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in app.session.conversation().visible() {
            match msg.role {
                Role::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.content.lines() {
                        lines.push(Line::from(line.to_string()));
                    }
                }
                Role::Assistant => {
                    lines.push(Line::from(Span::styled(
                        "AI:",
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.content.lines() {
                        lines.push(parse_markdown_line(line));
                    }
                }
                Role::System => continue,
            }
            lines.push(Line::default());
        }

        if busy {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_quick_replies(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Quick replies (Tab to pick, Enter to send) ");

    let mut spans = Vec::new();
    for (i, reply) in QUICK_REPLIES.iter().enumerate() {
        let style = if app.quick_reply_idx == Some(i) {
            Style::default().bg(Color::Magenta).fg(Color::White).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Magenta)
        };
        spans.push(Span::styled(format!(" {} ", reply), style));
        spans.push(Span::raw(" "));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let enabled = app.session.accepts_input();
    let border_color = if enabled { Color::Yellow } else { Color::DarkGray };
    let title = if app.session.is_busy() { " ... " } else { " Message LLM " };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .session
        .input()
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(if enabled { Color::Cyan } else { Color::DarkGray }))
        .block(input_block);

    frame.render_widget(input, area);

    if enabled && app.notice.is_none() {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().fg(Color::White);

    let mut hints = vec![("Enter", "send"), ("↑↓", "scroll"), ("Esc", "quit")];
    if app.session.quick_replies_available() {
        hints.insert(1, ("Tab", "quick reply"));
    }
    if app.notice.is_some() {
        hints = vec![("Enter", "dismiss"), ("Ctrl-C", "quit")];
    }

    let mut spans = Vec::new();
    for (key, label) in hints {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {}  ", label), label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_loading_overlay(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(area, 50, 5);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Loading model ");

    let status = app.session.status();
    let progress = if status.progress_text.is_empty() {
        "Loading...".to_string()
    } else {
        status.progress_text
    };

    let text = Text::from(vec![
        Line::from(Span::styled(progress, Style::default().fg(Color::White).bold())),
        Line::from(Span::styled(
            "This may take a few minutes...",
            Style::default().fg(Color::DarkGray),
        )),
    ]);

    frame.render_widget(
        Paragraph::new(text).block(block).alignment(ratatui::layout::Alignment::Center),
        popup_area,
    );
}

fn render_notice(notice: &str, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(area, 60, 7);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Error ");

    let text = Text::from(vec![
        Line::from(notice.to_string()),
        Line::default(),
        Line::from(Span::styled("Press Enter to dismiss", Style::default().fg(Color::DarkGray))),
    ]);

    frame.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: true }), popup_area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bold_markdown_becomes_styled_span() {
        let line = parse_markdown_line("a **b** c");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "b");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn unclosed_bold_stays_literal() {
        let line = parse_markdown_line("**oops");
        assert_eq!(line.spans.len(), 1);
        assert_eq!(line.spans[0].content, "**oops");
    }

    #[test]
    fn header_shows_server_url() {
        use localchat_core::Config;
        use ratatui::{backend::TestBackend, Terminal};

        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let config = Config {
            ollama_url: Some("http://gpu:11434".to_string()),
            ..Config::new()
        };
        let mut app = App::new(&config, tx);

        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let buffer = terminal.backend().buffer();
        let header: String = buffer
            .content
            .iter()
            .take(buffer.area.width as usize)
            .map(|cell| cell.symbol())
            .collect();
        assert!(header.contains("http://gpu:11434"), "header was {:?}", header);
    }

    #[test]
    fn centered_rect_fits_inside_area() {
        let area = Rect::new(0, 0, 30, 4);
        let popup = centered_rect(area, 60, 7);
        assert!(popup.width <= area.width);
        assert!(popup.height <= area.height);
    }
}
