//! UI rendering with ratatui.
//!
//! Layout: header bar, a sidebar with tasks and recent results on the left,
//! the chat column on the right, and a status bar.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap};
use ratatui::Frame;
use topic_tracker_core::{ConnectionState, ConnectionStatus};

use crate::app::{App, ChatTransport};
use crate::markdown::render_markdown;

/// Number of recent results listed in the sidebar.
const SIDEBAR_RESULTS: usize = 5;

/// Horizontal padding for chat content.
const CHAT_PADDING: u16 = 2;

/// Render the UI.
pub fn render(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header bar
            Constraint::Min(5),    // Sidebar + chat
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_header_bar(frame, app, main_layout[0]);

    let content_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(main_layout[1]);

    render_sidebar(frame, app, content_layout[0]);
    render_chat_column(frame, app, content_layout[1]);
    render_status_bar(frame, app, main_layout[2]);
}

/// Truncate a string in the middle with an ellipsis if it exceeds `max_len` chars.
fn truncate_middle(s: &str, max_len: usize) -> String {
    let len = s.chars().count();
    if len <= max_len {
        return s.to_string();
    }
    if max_len < 5 {
        return s.chars().take(max_len).collect();
    }
    let keep = (max_len - 3) / 2;
    let start: String = s.chars().take(keep).collect();
    let end: String = s.chars().skip(len - keep).collect();
    format!("{start}...{end}")
}

/// Indicator glyph, label and color for a connection status.
fn connection_indicator(status: &ConnectionStatus) -> (&'static str, String, Color) {
    match status.state {
        ConnectionState::Connected => ("●", "connected".to_string(), Color::Green),
        ConnectionState::Connecting if status.attempts > 0 => (
            "◌",
            format!("reconnecting {}", status.attempts),
            Color::Yellow,
        ),
        ConnectionState::Connecting => ("◌", "connecting".to_string(), Color::Yellow),
        ConnectionState::Disconnected if status.exhausted => {
            ("○", "offline (Ctrl+R)".to_string(), Color::Red)
        }
        ConnectionState::Disconnected if status.attempts > 0 => (
            "○",
            format!("retry {} pending", status.attempts),
            Color::Red,
        ),
        ConnectionState::Disconnected => ("○", "disconnected".to_string(), Color::Red),
    }
}

/// Render the header bar with title, backend URL and connection status.
fn render_header_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (glyph, label, color) = connection_indicator(&app.connection_status);

    let title = "HOT TOPIC TRACKER";
    let max_url_width = (area.width as usize / 2).saturating_sub(20);
    let display_url = truncate_middle(app.backend_url(), max_url_width);

    let right_text = format!("{display_url} {glyph} {label}");
    let used = title.chars().count() + right_text.chars().count();

    let line = Line::from(vec![
        Span::styled(title, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" ".repeat((area.width as usize).saturating_sub(used))),
        Span::raw(display_url),
        Span::raw(" "),
        Span::styled(glyph, Style::default().fg(color)),
        Span::styled(format!(" {label}"), Style::default().fg(color)),
    ]);

    let header = Paragraph::new(line).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

/// Human-readable schedule of a task.
fn schedule_label(seconds: u64) -> String {
    match seconds / 60 {
        0 => format!("Every {seconds} seconds"),
        1 => "Every minute".to_string(),
        minutes => format!("Every {minutes} minutes"),
    }
}

/// Icon shown next to a result's sentiment.
fn sentiment_icon(sentiment: &str) -> &'static str {
    match sentiment {
        "positive" => "📈",
        "negative" => "📉",
        _ => "📊",
    }
}

/// Render the sidebar: active tasks above, recent results below.
fn render_sidebar(frame: &mut Frame, app: &App, area: Rect) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let dim = Style::default().fg(Color::DarkGray);

    let mut task_lines: Vec<Line> = Vec::new();
    if app.tasks.is_empty() {
        task_lines.push(Line::styled("No active tasks", dim));
    }
    for task in &app.tasks {
        task_lines.push(Line::styled(
            task.name.as_str(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        task_lines.push(Line::styled(format!("  Keywords: {}", task.keywords), dim));
        task_lines.push(Line::styled(
            format!("  {}", schedule_label(task.schedule_interval)),
            dim,
        ));
    }

    let tasks = Paragraph::new(Text::from(task_lines))
        .block(
            Block::default()
                .title(format!(" Active Tasks ({}) ", app.tasks.len()))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Gray)),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(tasks, layout[0]);

    let mut result_lines: Vec<Line> = Vec::new();
    if app.results.is_empty() {
        result_lines.push(Line::styled("No results yet", dim));
    }
    for result in app.results.iter().take(SIDEBAR_RESULTS) {
        result_lines.push(Line::raw(result.summary.as_str()));
        result_lines.push(Line::from(vec![
            Span::styled(
                format!("  {} {}", result.sentiment, sentiment_icon(&result.sentiment)),
                Style::default().fg(Color::Cyan),
            ),
            Span::styled(format!("  {} items", result.data_count), dim),
        ]));
    }

    let mut block = Block::default()
        .title(" Recent Results ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));
    if app.refresh_error.is_some() {
        block = block.title_bottom(Line::styled(" stale ", Style::default().fg(Color::Yellow)));
    }

    let results = Paragraph::new(Text::from(result_lines))
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(results, layout[1]);
}

/// Render the right column containing chat and input as one unit.
fn render_chat_column(frame: &mut Frame, app: &App, area: Rect) {
    let title = match app.transport {
        ChatTransport::Sse => " Chat ",
        ChatTransport::Ws => " Chat (websocket) ",
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let inner_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Chat messages
            Constraint::Length(1), // Separator line
            Constraint::Length(1), // Input line
        ])
        .split(inner_area);

    let chat_area_full = inner_layout[0];
    let chat_area = Rect::new(
        chat_area_full.x + CHAT_PADDING,
        chat_area_full.y,
        chat_area_full.width.saturating_sub(CHAT_PADDING * 2 + 1), // +1 for scrollbar
        chat_area_full.height,
    );
    let content_width = chat_area.width as usize;

    let mut lines: Vec<Line> = Vec::new();
    let open = app.messages.open_id();

    for msg in app.messages.iter() {
        if msg.is_user() {
            lines.push(Line::from(vec![
                Span::styled("[You] ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
                Span::styled(msg.content.as_str(), Style::default().fg(Color::White)),
            ]));
        } else {
            lines.push(Line::from(vec![
                Span::styled("[Assistant] ", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
                Span::styled(msg.created_at.format("%H:%M").to_string(), Style::default().fg(Color::DarkGray)),
            ]));
            let mut md_lines = render_markdown(&msg.content, content_width);
            if open == Some(msg.id) {
                let cursor = Span::styled("▌", Style::default().fg(Color::Green));
                match md_lines.last_mut() {
                    Some(line) => line.spans.push(cursor),
                    None => md_lines.push(Line::from(cursor)),
                }
            }
            lines.extend(md_lines);
        }
        lines.push(Line::from(""));
    }

    if app.is_waiting_for_text() {
        let label = app.thinking.as_deref().unwrap_or("thinking...");
        lines.push(Line::from(vec![
            Span::styled(app.spinner_char(), Style::default().fg(Color::Yellow)),
            Span::styled(format!(" {label}"), Style::default().fg(Color::DarkGray)),
        ]));
    }

    let text = Text::from(lines);
    let visible_lines = chat_area.height as usize;
    let total_wrapped_lines = calculate_wrapped_line_count(&text, content_width);
    let max_scroll = total_wrapped_lines.saturating_sub(visible_lines);
    let effective_scroll = app.chat_scroll.min(max_scroll);
    // Paragraph scrolls from the top; chat_scroll counts from the bottom.
    let scroll_offset = max_scroll.saturating_sub(effective_scroll);

    let paragraph = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .scroll((u16::try_from(scroll_offset).unwrap_or(u16::MAX), 0));
    frame.render_widget(paragraph, chat_area);

    if total_wrapped_lines > visible_lines {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("▲"))
            .end_symbol(Some("▼"));
        let mut scrollbar_state = ScrollbarState::new(total_wrapped_lines)
            .position(scroll_offset)
            .viewport_content_length(visible_lines);
        frame.render_stateful_widget(scrollbar, chat_area_full, &mut scrollbar_state);
    }

    render_input_line(frame, app, inner_layout[1], inner_layout[2]);
}

/// Render the input line at the bottom of the chat column.
fn render_input_line(frame: &mut Frame, app: &App, separator_area: Rect, input_area: Rect) {
    let separator = Paragraph::new("─".repeat(separator_area.width as usize))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(separator, separator_area);

    let enabled = app.can_send();
    let prompt = "> ";
    let input_line = if app.input.is_empty() && !enabled {
        let hint = match app.transport {
            ChatTransport::Sse => "waiting for the reply...",
            ChatTransport::Ws => "not connected (Ctrl+R to reconnect)",
        };
        Line::from(vec![
            Span::styled(prompt, Style::default().fg(Color::DarkGray)),
            Span::styled(hint, Style::default().fg(Color::DarkGray).italic()),
        ])
    } else {
        Line::from(vec![
            Span::styled(
                prompt,
                Style::default().fg(if enabled { Color::Cyan } else { Color::DarkGray }),
            ),
            Span::styled(app.input.as_str(), Style::default().fg(Color::White)),
        ])
    };
    frame.render_widget(Paragraph::new(input_line), input_area);

    let column = u16::try_from(app.cursor_column()).unwrap_or(u16::MAX);
    frame.set_cursor_position((
        input_area.x.saturating_add(2).saturating_add(column),
        input_area.y,
    ));
}

/// Render the status bar.
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let status = if let Some(ref error) = app.error_message {
        Line::from(vec![
            Span::styled(" ERROR: ", Style::default().fg(Color::Red).bold()),
            Span::styled(error.as_str(), Style::default().fg(Color::Red)),
        ])
    } else if let Some(ref refresh_error) = app.refresh_error {
        Line::from(vec![
            Span::styled(" ⚠ ", Style::default().fg(Color::Yellow).bold()),
            Span::styled(refresh_error.as_str(), Style::default().fg(Color::Yellow)),
        ])
    } else if let Some(ref status) = app.status_message {
        Line::from(Span::styled(format!(" {status}"), Style::default().fg(Color::Green)))
    } else {
        let key = Style::default().fg(Color::Yellow);
        let mut spans = vec![Span::raw(" "), Span::styled("Enter", key), Span::raw(":send ")];
        if app.is_revealing() {
            spans.push(Span::styled("Esc", key));
            spans.push(Span::raw(":skip "));
        }
        spans.extend([
            Span::styled("Ctrl+R", key),
            Span::raw(":reconnect "),
            Span::styled("Ctrl+D", key),
            Span::raw(":disconnect "),
            Span::styled("Ctrl+C", key),
            Span::raw(":quit"),
        ]);
        Line::from(spans)
    };

    let status_bar = Paragraph::new(status).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(status_bar, area);
}

/// Calculate the number of visual lines after text wrapping.
fn calculate_wrapped_line_count(text: &Text, available_width: usize) -> usize {
    if available_width == 0 {
        return text.lines.len();
    }
    text.lines
        .iter()
        .map(|line| line.width().div_ceil(available_width).max(1))
        .sum()
}
