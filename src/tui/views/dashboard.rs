//! Issue list dashboard view.

use std::collections::HashMap;

use chrono::{DateTime, Local, Utc};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};

use crate::models::{ExecutionStatus, Issue, IssueActivity};

/// Longest title rendered before truncation.
const TITLE_WIDTH: usize = 35;

/// Widest label column slice.
const LABELS_WIDTH: usize = 16;

/// Borrowed state the dashboard renders from.
pub struct DashboardProps<'a> {
    pub issues: &'a [Issue],
    pub activity: &'a HashMap<u64, IssueActivity>,
    pub selected: usize,
    pub loading: bool,
    pub last_check: Option<DateTime<Utc>>,
    pub error: Option<&'a str>,
    pub user: Option<&'a str>,
    pub trigger_label: &'a str,
}

/// Truncate a title to the display column, appending an ellipsis.
fn format_title(title: &str) -> String {
    if title.chars().count() > TITLE_WIDTH {
        let truncated: String = title.chars().take(TITLE_WIDTH - 3).collect();
        format!("{}...", truncated)
    } else {
        title.to_string()
    }
}

/// Status glyph for one issue row.
fn status_glyph(status: &ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Idle => "·",
        ExecutionStatus::Running => "»",
        ExecutionStatus::Completed => "✓",
        ExecutionStatus::Error(_) => "✗",
    }
}

fn status_color(status: &ExecutionStatus) -> Color {
    match status {
        ExecutionStatus::Idle => Color::DarkGray,
        ExecutionStatus::Running => Color::Yellow,
        ExecutionStatus::Completed => Color::Green,
        ExecutionStatus::Error(_) => Color::Red,
    }
}

/// Slice the label list into the fixed display column.
fn format_labels(labels: &[String]) -> String {
    let joined = labels.join(", ");
    joined.chars().take(LABELS_WIDTH).collect()
}

/// Render the full dashboard into `area`.
pub fn render_dashboard(frame: &mut Frame, area: Rect, props: &DashboardProps<'_>) {
    let has_error = props.error.is_some();
    let mut constraints = vec![
        Constraint::Length(3), // title bar
        Constraint::Length(1), // check line
    ];
    if has_error {
        constraints.push(Constraint::Length(1));
    }
    constraints.push(Constraint::Min(3)); // issue table
    constraints.push(Constraint::Length(3)); // key hints

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    render_title_bar(frame, chunks[0], props);
    render_check_line(frame, chunks[1], props);

    let mut next = 2;
    if let Some(error) = props.error {
        let banner = Paragraph::new(format!(" Error: {}", error))
            .style(Style::default().fg(Color::Red));
        frame.render_widget(banner, chunks[next]);
        next += 1;
    }

    render_issue_table(frame, chunks[next], props);
    render_status_bar(frame, chunks[next + 1]);
}

fn render_title_bar(frame: &mut Frame, area: Rect, props: &DashboardProps<'_>) {
    let who = props
        .user
        .map(|u| format!(" @{}", u))
        .unwrap_or_default();
    let title = Paragraph::new(Line::from(vec![
        Span::styled(
            " crowsnest",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            " - watching for \"{}\"{}",
            props.trigger_label, who
        )),
    ]))
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(title, area);
}

fn render_check_line(frame: &mut Frame, area: Rect, props: &DashboardProps<'_>) {
    let text = if props.loading {
        " Checking for issues...".to_string()
    } else {
        match props.last_check {
            Some(at) => format!(
                " Last check: {}",
                at.with_timezone(&Local).format("%H:%M:%S")
            ),
            None => " Last check: never".to_string(),
        }
    };
    let line = Paragraph::new(text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(line, area);
}

fn render_issue_table(frame: &mut Frame, area: Rect, props: &DashboardProps<'_>) {
    if props.issues.is_empty() {
        let empty = Paragraph::new(" No assigned issues found")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(empty, area);
        return;
    }

    let mut lines = Vec::with_capacity(props.issues.len() + 1);
    lines.push(Line::from(Span::styled(
        format!(
            "   {:<6} {:<width$} {:<11} {:<labels$} repo",
            "#",
            "title",
            "status",
            "labels",
            width = TITLE_WIDTH,
            labels = LABELS_WIDTH,
        ),
        Style::default().add_modifier(Modifier::BOLD),
    )));

    let idle = IssueActivity::default();
    for (index, issue) in props.issues.iter().enumerate() {
        let activity = props.activity.get(&issue.number).unwrap_or(&idle);
        let selected = index == props.selected;
        let marker = if selected { " > " } else { "   " };
        let row_style = if selected {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };

        lines.push(Line::from(vec![
            Span::styled(
                format!(
                    "{}{:<6} {:<width$} ",
                    marker,
                    issue.number,
                    format_title(&issue.title),
                    width = TITLE_WIDTH,
                ),
                row_style,
            ),
            Span::styled(
                format!(
                    "{} {:<9} ",
                    status_glyph(&activity.status),
                    activity.status.name()
                ),
                Style::default().fg(status_color(&activity.status)),
            ),
            Span::styled(
                format!(
                    "{:<labels$} {}",
                    format_labels(&issue.labels),
                    issue.repo,
                    labels = LABELS_WIDTH,
                ),
                row_style,
            ),
        ]));
    }

    let table = Paragraph::new(lines).block(Block::default().borders(Borders::ALL));
    frame.render_widget(table, area);
}

fn render_status_bar(frame: &mut Frame, area: Rect) {
    let status = Paragraph::new(" j/k:Navigate  Enter:Invoke assistant  r:Refresh  q:Quit")
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, area);
}
