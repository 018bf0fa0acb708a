use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::App;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Engine(event) => app.handle_engine_event(event),
        AppEvent::Completion(result) => app.finish_completion(result),
        AppEvent::SendInput => app.send_input(),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // The failure notice blocks everything until acknowledged
    if app.notice.is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            app.dismiss_notice();
        }
        return;
    }

    match key.code {
        KeyCode::Esc => app.should_quit = true,

        // Chat scrolling
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::PageUp => app.scroll_up(app.chat_height.max(1)),
        KeyCode::PageDown => app.scroll_down(app.chat_height.max(1)),

        // Tab cycles the highlighted quick reply
        KeyCode::Tab => app.cycle_quick_reply(),

        KeyCode::Enter => {
            match app.quick_reply_idx {
                Some(idx) if app.session.input().trim().is_empty() => {
                    app.quick_reply_idx = None;
                    app.fire_quick_reply(idx);
                }
                _ => app.send_input(),
            }
        }

        _ => handle_editing(app, key),
    }
}

fn handle_editing(app: &mut App, key: KeyEvent) {
    // Input is disabled while loading or waiting for a reply
    if !app.session.accepts_input() {
        return;
    }

    let cursor = app.cursor;
    let input = app.session.input_mut();
    match key.code {
        KeyCode::Backspace => {
            if cursor > 0 {
                let byte_pos = char_to_byte_index(input, cursor - 1);
                input.remove(byte_pos);
                app.cursor -= 1;
            }
        }
        KeyCode::Delete => {
            if cursor < input.chars().count() {
                let byte_pos = char_to_byte_index(input, cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = input.chars().count();
            app.cursor = (cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.cursor = 0;
        }
        KeyCode::End => {
            app.cursor = input.chars().count();
        }
        KeyCode::Char(c)
            if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            let byte_pos = char_to_byte_index(input, cursor);
            input.insert(byte_pos, c);
            app.cursor += 1;
            app.quick_reply_idx = None;
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}
