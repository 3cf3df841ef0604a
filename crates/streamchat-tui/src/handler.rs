use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, Field, InputMode};
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
        AppEvent::Stream(snapshot) => app.apply_snapshot(snapshot),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => {
                app.should_quit = true;
                return;
            }
            KeyCode::Char('s') => {
                app.input_mode = InputMode::Normal;
                app.submit();
                return;
            }
            _ => {}
        }
    }

    // Handle model picker if it's open
    if app.show_model_picker {
        match key.code {
            KeyCode::Esc => {
                app.show_model_picker = false;
            }
            KeyCode::Char('j') | KeyCode::Down => {
                app.model_picker_nav_down();
            }
            KeyCode::Char('k') | KeyCode::Up => {
                app.model_picker_nav_up();
            }
            KeyCode::Enter => {
                app.select_model();
            }
            _ => {}
        }
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        // Quit
        KeyCode::Char('q') => app.should_quit = true,

        // Focus
        KeyCode::Tab | KeyCode::Down => app.focus_next(),
        KeyCode::BackTab | KeyCode::Up => app.focus_prev(),

        KeyCode::Enter | KeyCode::Char('i') => match app.focus {
            field if field.is_text() => app.input_mode = InputMode::Editing,
            Field::Model => app.open_model_picker(),
            Field::Send => app.submit(),
            _ => {}
        },

        // Abort the running request
        KeyCode::Esc => {
            if app.is_busy() {
                app.cancel();
            }
        }

        // Response scrolling
        KeyCode::Char('j') => app.scroll_response_down(1),
        KeyCode::Char('k') => app.scroll_response_up(1),
        KeyCode::PageDown => app.scroll_response_down(app.response_height.max(1)),
        KeyCode::PageUp => app.scroll_response_up(app.response_height.max(1)),
        KeyCode::Char('G') | KeyCode::End => {
            app.follow_output = true;
            app.scroll_response_to_bottom();
        }
        KeyCode::Char('g') | KeyCode::Home => app.scroll_response_up(u16::MAX),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    let focus = app.focus;
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        // Ctrl+J inserts a newline; most terminals cannot report Shift+Enter
        KeyCode::Char('j') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            if focus.is_multiline() {
                if let Some(input) = app.focused_input_mut() {
                    input.insert('\n');
                }
            }
        }
        KeyCode::Enter => {
            if focus == Field::ApiKey {
                app.input_mode = InputMode::Normal;
                app.submit();
            } else {
                app.focus_next();
                if !app.focus.is_text() {
                    app.input_mode = InputMode::Normal;
                }
            }
        }
        KeyCode::Tab => {
            app.focus_next();
            if !app.focus.is_text() {
                app.input_mode = InputMode::Normal;
            }
        }
        KeyCode::BackTab => {
            app.focus_prev();
            if !app.focus.is_text() {
                app.input_mode = InputMode::Normal;
            }
        }
        code => {
            let Some(input) = app.focused_input_mut() else {
                app.input_mode = InputMode::Normal;
                return;
            };
            match code {
                KeyCode::Backspace => input.backspace(),
                KeyCode::Delete => input.delete(),
                KeyCode::Left => input.left(),
                KeyCode::Right => input.right(),
                KeyCode::Home => input.home(),
                KeyCode::End => input.end(),
                KeyCode::Char(c) => input.insert(c),
                _ => {}
            }
        }
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_response = app
        .response_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_response {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_response_down(3),
        MouseEventKind::ScrollUp => app.scroll_response_up(3),
        _ => {}
    }
}
