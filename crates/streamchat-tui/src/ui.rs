use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use crate::app::{App, Field, InputMode, TextInput};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_form(app, frame, body_area);
    render_footer(app, frame, footer_area);

    if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" OpenAI Chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("[{}]", app.snapshot.state.label()),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_form(app: &mut App, frame: &mut Frame, area: Rect) {
    let [developer_area, user_area, model_area, key_area, send_area, response_area] =
        Layout::vertical([
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(3),
        ])
        .areas(area);

    render_text_field(app, frame, developer_area, Field::DeveloperMessage);
    render_text_field(app, frame, user_area, Field::UserMessage);
    render_model_field(app, frame, model_area);
    render_text_field(app, frame, key_area, Field::ApiKey);
    render_send_button(app, frame, send_area);
    render_response(app, frame, response_area);
}

fn field_block(app: &App, field: Field) -> Block<'static> {
    let focused = app.focus == field;
    let border_color = match (focused, app.input_mode) {
        (true, InputMode::Editing) => Color::Yellow,
        (true, InputMode::Normal) => Color::Cyan,
        _ => Color::DarkGray,
    };

    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" {} ", field.label()))
}

fn input_for(app: &App, field: Field) -> &TextInput {
    match field {
        Field::DeveloperMessage => &app.developer_message,
        Field::UserMessage => &app.user_message,
        _ => &app.api_key,
    }
}

fn render_text_field(app: &App, frame: &mut Frame, area: Rect, field: Field) {
    let block = field_block(app, field);
    let inner = block.inner(area);
    let input = input_for(app, field);
    let editing = app.focus == field && app.input_mode == InputMode::Editing;

    // The key is never shown in clear text
    let display: String = if field == Field::ApiKey {
        "*".repeat(input.value.chars().count())
    } else {
        input.value.clone()
    };

    let (line, col) = input.cursor_line_col();
    let scroll_y = if editing {
        (line as u16).saturating_sub(inner.height.saturating_sub(1))
    } else {
        0
    };
    let scroll_x = if editing {
        (col as u16).saturating_sub(inner.width.saturating_sub(1))
    } else {
        0
    };

    let text = if display.is_empty() && !editing {
        Text::from(Span::styled(
            placeholder(field),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ))
    } else {
        Text::raw(display)
    };

    let paragraph = Paragraph::new(text)
        .block(block)
        .scroll((scroll_y, scroll_x));
    frame.render_widget(paragraph, area);

    if editing {
        let cursor_x = inner.x + (col as u16).saturating_sub(scroll_x);
        let cursor_y = inner.y + (line as u16).saturating_sub(scroll_y);
        frame.set_cursor_position((cursor_x, cursor_y));
    }
}

fn placeholder(field: Field) -> &'static str {
    match field {
        Field::DeveloperMessage => "Enter a developer message...",
        Field::UserMessage => "Enter a message...",
        _ => "sk-...",
    }
}

fn render_model_field(app: &App, frame: &mut Frame, area: Rect) {
    let block = field_block(app, Field::Model);
    let line = Line::from(vec![
        Span::styled(app.selected_model.clone(), Style::default().fg(Color::Green)),
        Span::styled("  (Enter to change)", Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn render_send_button(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == Field::Send;

    // Disabled while a request is in flight
    let (label, style) = if app.is_busy() {
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        (
            format!("Sending{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )
    } else if focused {
        (
            "Send".to_string(),
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        ("Send".to_string(), Style::default().fg(Color::White))
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }));
    let button = Paragraph::new(Span::styled(format!(" {} ", label), style)).block(block);

    let width = 20.min(area.width);
    frame.render_widget(button, Rect::new(area.x, area.y, width, area.height));
}

fn render_response(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == Field::Response;
    let border_color = if focused { Color::Cyan } else { Color::Magenta };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Response ");

    let inner = block.inner(area);
    app.response_area = Some(area);
    app.response_height = inner.height;
    app.response_width = inner.width;

    let text = if app.snapshot.output.is_empty() && app.snapshot.state.failure().is_none() {
        Text::from(Span::styled(
            "(No response yet)",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ))
    } else if app.output_is_error() {
        // Transport failures replace the buffer with the error text
        Text::styled(app.snapshot.output.clone(), Style::default().fg(Color::Red))
    } else {
        let mut lines: Vec<Line> = app
            .snapshot
            .output
            .split('\n')
            .map(|l| Line::raw(l.to_string()))
            .collect();

        // Keep the partial output and report the failure below it
        if let Some(failure) = app.snapshot.state.failure() {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                failure.to_string(),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )));
        }
        Text::from(lines)
    };

    let paragraph = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.response_scroll, 0));

    frame.render_widget(paragraph, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " EDIT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];

    if let Some(status) = &app.status_message {
        spans.push(Span::styled(
            format!(" {} ", status),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
        return;
    }

    let hints: Vec<(&str, &str)> = match app.input_mode {
        InputMode::Editing => {
            let mut hints = vec![("Esc", "done"), ("Enter", "next")];
            if app.focus.is_multiline() {
                hints.push(("^J", "newline"));
            }
            hints.push(("^S", "send"));
            hints
        }
        InputMode::Normal => {
            let mut hints = vec![("Tab", "focus"), ("Enter", "edit")];
            if app.is_busy() {
                hints.push(("Esc", "cancel"));
            }
            hints.extend([("^S", "send"), ("j/k", "scroll"), ("q", "quit")]);
            hints
        }
    };

    for (key, label) in hints {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
        spans.push(Span::raw(" "));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 40.min(area.width.saturating_sub(4));
    let popup_height = (app.available_models.len() as u16 + 2).min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Model (Enter to select, Esc to cancel) ");

    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|model| {
            let style = if model == &app.selected_model {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", model)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.model_picker_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};
    use streamchat_core::{
        Config, Failure, FailureKind, HttpTransport, RequestCoordinator, Snapshot, StreamState,
    };

    fn app() -> App {
        let coordinator = RequestCoordinator::new(HttpTransport::new("http://127.0.0.1:9"));
        App::new(&Config::new(), coordinator)
    }

    fn draw(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 40)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for row in buffer.content.chunks(buffer.area.width as usize) {
            for cell in row {
                out.push_str(cell.symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn test_initial_screen() {
        let mut app = app();
        let screen = draw(&mut app);
        assert!(screen.contains("OpenAI Chat"));
        assert!(screen.contains("(No response yet)"));
        assert!(screen.contains("gpt-4.1-mini"));
        assert_eq!(app.response_width, 78);
    }

    #[test]
    fn test_api_key_is_masked() {
        let mut app = app();
        app.api_key = TextInput::new("sk-secret");
        let screen = draw(&mut app);
        assert!(!screen.contains("sk-secret"));
        assert!(screen.contains("*********"));
    }

    #[test]
    fn test_send_button_while_busy() {
        let mut app = app();
        app.snapshot = Snapshot {
            cycle: 1,
            state: StreamState::Streaming,
            output: "Hel".to_string(),
        };
        app.animation_frame = 2;
        let screen = draw(&mut app);
        assert!(screen.contains("Sending..."));
        assert!(screen.contains("Hel"));
    }

    #[test]
    fn test_partial_output_kept_with_error_line() {
        let mut app = app();
        app.snapshot = Snapshot {
            cycle: 1,
            state: StreamState::Failed(Failure::new(
                FailureKind::Stream,
                "Stream interrupted: reset",
            )),
            output: "Hello wor".to_string(),
        };
        let screen = draw(&mut app);
        assert!(screen.contains("Hello wor"));
        assert!(screen.contains("Error: Stream interrupted: reset"));
    }
}
