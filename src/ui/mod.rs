// UI module for rendering the TUI.
// Draws the build monitor: header, progress gauge, activity log, and status bar.

use chrono::{DateTime, Utc};
use ratatui::{prelude::*, widgets::*};

use crate::state::{ConsoleLevel, MonitorState};

/// Main draw function that renders the entire UI.
pub fn draw(frame: &mut Frame, state: &mut MonitorState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(3), // Progress
            Constraint::Min(1),    // Activity log
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    draw_header(frame, state, chunks[0]);
    draw_progress(frame, state, chunks[1]);
    draw_messages(frame, state, chunks[2]);
    draw_status_bar(frame, state, chunks[3]);
}

fn draw_header(frame: &mut Frame, state: &MonitorState, area: Rect) {
    let (label, color) = state.status_display();
    let build = &state.build;

    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", build.platform.display()),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("build {} ", build.id)),
        Span::styled(
            format!("({:?}) ", build.build_type),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("[{}]", label),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
    ]);

    let header = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" NativiWeb ")
            .title_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(header, area);
}

fn draw_progress(frame: &mut Frame, state: &MonitorState, area: Rect) {
    let build = &state.build;
    let (_, color) = state.status_display();

    let label = match (&build.phase, &build.error_message) {
        (_, Some(error)) if state.finished => format!("{}%  {}", build.progress, error),
        (Some(phase), _) => format!("{}%  {}", build.progress, phase),
        (None, _) => format!("{}%", build.progress),
    };

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" Progress "))
        .gauge_style(Style::default().fg(color).bg(Color::Black))
        .percent(u16::from(build.progress.min(100)))
        .label(label);
    frame.render_widget(gauge, area);
}

fn draw_messages(frame: &mut Frame, state: &mut MonitorState, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Activity ");

    if state.messages.is_empty() {
        let text = Paragraph::new("No messages")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(text, area);
        return;
    }

    let items: Vec<ListItem> = state
        .messages
        .iter()
        .map(|msg| {
            let (icon, color) = match msg.level {
                ConsoleLevel::Error => ("❌", Color::Red),
                ConsoleLevel::Warn => ("⚠️", Color::Yellow),
                ConsoleLevel::Success => ("✅", Color::Green),
                ConsoleLevel::Info => ("ℹ️", Color::Cyan),
            };

            ListItem::new(Line::from(vec![
                Span::raw(format!("{} ", icon)),
                Span::styled(
                    format_relative_time(&msg.timestamp),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(" "),
                Span::styled(msg.message.clone(), Style::default().fg(color)),
                Span::styled(
                    if msg.count > 1 {
                        format!(" (x{})", msg.count)
                    } else {
                        String::new()
                    },
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let list_widget = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list_widget, area, &mut state.list_state);
}

fn draw_status_bar(frame: &mut Frame, state: &MonitorState, area: Rect) {
    let mut hints = vec![
        Span::raw(" ↑↓ "),
        Span::styled("Scroll", Style::default().fg(Color::DarkGray)),
        Span::raw("  q/Esc "),
        Span::styled("Quit", Style::default().fg(Color::DarkGray)),
    ];

    if state.finished && !state.builds.is_empty() {
        hints.push(Span::styled(
            format!("  Project builds: {}", state.builds.len()),
            Style::default().fg(Color::DarkGray),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}

/// Format a timestamp as relative time (e.g., "2m ago").
pub fn format_relative_time(dt: &DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(*dt);

    if duration.num_days() > 0 {
        format!("{}d ago", duration.num_days())
    } else if duration.num_hours() > 0 {
        format!("{}h ago", duration.num_hours())
    } else if duration.num_minutes() > 0 {
        format!("{}m ago", duration.num_minutes())
    } else {
        "just now".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Build, BuildStatus, BuildType, Platform};
    use chrono::Duration;
    use ratatui::backend::TestBackend;

    #[test]
    fn test_format_relative_time() {
        assert_eq!(format_relative_time(&Utc::now()), "just now");
        assert_eq!(
            format_relative_time(&(Utc::now() - Duration::minutes(5))),
            "5m ago"
        );
        assert_eq!(
            format_relative_time(&(Utc::now() - Duration::days(2))),
            "2d ago"
        );
    }

    #[test]
    fn test_draw_renders_build() {
        let mut state = MonitorState::new(Build {
            id: "b42".to_string(),
            project_id: "p1".to_string(),
            platform: Platform::Android,
            status: BuildStatus::Processing,
            progress: 55,
            phase: Some("gradle".to_string()),
            build_type: BuildType::Debug,
            created_at: Utc::now(),
            completed_at: None,
            error_message: None,
            download_url: None,
        });

        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal.draw(|frame| draw(frame, &mut state)).unwrap();

        let rendered: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(rendered.contains("b42"));
        assert!(rendered.contains("BUILDING"));
        assert!(rendered.contains("55%"));
    }
}
