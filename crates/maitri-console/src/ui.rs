use crate::app::App;
use maitri_core::{
    AgentMap, AgentStatusLabel, ChatMessage, ConnectionState, Feedback, Role, VitalsSnapshot,
    AGENT_ROSTER,
};
use maitri_dialogue::{HEART_RATE_ELEVATED_ABOVE, O2_LOW_BELOW};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

const MONITORING_MESSAGE: &str = "Monitoring...";

#[derive(Clone, Copy)]
struct Theme {
    bg: Color,
    surface: Color,
    border: Color,
    title: Color,
    text: Color,
    muted: Color,
    accent: Color,
    ok: Color,
    warn: Color,
    critical: Color,
}

fn theme() -> Theme {
    Theme {
        bg: Color::Rgb(11, 18, 32),
        surface: Color::Rgb(17, 26, 46),
        border: Color::Rgb(71, 85, 105),
        title: Color::Rgb(191, 219, 254),
        text: Color::Rgb(226, 232, 240),
        muted: Color::Rgb(148, 163, 184),
        accent: Color::Rgb(56, 189, 248),
        ok: Color::Rgb(34, 197, 94),
        warn: Color::Rgb(245, 158, 11),
        critical: Color::Rgb(239, 68, 68),
    }
}

pub fn render_ui(frame: &mut ratatui::Frame, app: &App) {
    let size = frame.size();
    let theme = theme();
    let store = app.store();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(0),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(size);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(40), Constraint::Min(0)])
        .split(rows[1]);
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(0)])
        .split(columns[0]);

    frame.render_widget(render_header(app, theme, size.width), rows[0]);
    frame.render_widget(render_vitals(&store.vitals(), theme), side[0]);
    frame.render_widget(
        render_agents(&store.agents(), store.selected_agent().as_deref(), theme),
        side[1],
    );
    frame.render_widget(
        render_transcript(&store.chat(), theme, columns[1]),
        columns[1],
    );
    frame.render_widget(
        render_suggestions(&store.suggestions(), app.suggestion_cursor, theme),
        rows[2],
    );
    frame.render_widget(render_input(&app.input, theme), rows[3]);
}

fn panel(title: &str, theme: Theme, bg: Color) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border))
        .style(Style::default().bg(bg))
        .title(Span::styled(
            title.to_string(),
            Style::default()
                .fg(theme.title)
                .add_modifier(Modifier::BOLD),
        ))
}

fn connection_color(state: ConnectionState, theme: Theme) -> Color {
    match state {
        ConnectionState::Connected => theme.ok,
        ConnectionState::Connecting | ConnectionState::Reconnecting => theme.warn,
        ConnectionState::Disconnected => theme.critical,
    }
}

fn render_header(app: &App, theme: Theme, width: u16) -> Paragraph<'static> {
    let store = app.store();
    let connection = store.connection();
    let relay = if app.conversation.relay_enabled() {
        "on"
    } else {
        "off"
    };
    let mut status = vec![
        Span::styled(
            "MAITRI ",
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("Link: ", Style::default().fg(theme.muted)),
        Span::styled(
            connection.to_string(),
            Style::default().fg(connection_color(connection, theme)),
        ),
        Span::styled(format!("  Relay: {relay}"), Style::default().fg(theme.muted)),
    ];
    if store.composing() {
        status.push(Span::styled(
            "  MAITRI is typing...",
            Style::default().fg(theme.accent),
        ));
    }
    let hint = if let Some(note) = app.status_note.as_deref() {
        note.to_string()
    } else if width < 100 {
        "Enter send | Tab suggest | F2 emergency | Esc quit".to_string()
    } else {
        "Enter send | Tab suggest | F2 emergency | F3/F4/F7 quick | Up/Down agent | F5/F6 rate | Esc quit"
            .to_string()
    };
    let hint_color = if app.status_note.is_some() {
        theme.warn
    } else {
        theme.muted
    };

    Paragraph::new(Text::from(vec![
        Line::from(status),
        Line::from(Span::styled(hint, Style::default().fg(hint_color))),
    ]))
    .style(Style::default().fg(theme.text).bg(theme.bg))
    .block(panel("Status", theme, theme.bg))
}

fn vital_line(
    label: &str,
    value: Option<f64>,
    unit: &str,
    color: Color,
    theme: Theme,
) -> Line<'static> {
    let value = value
        .map(|value| format!("{value}{unit}"))
        .unwrap_or_else(|| "--".to_string());
    Line::from(vec![
        Span::styled(format!("{label:<14}"), Style::default().fg(theme.muted)),
        Span::styled(value, Style::default().fg(color)),
    ])
}

fn render_vitals(vitals: &VitalsSnapshot, theme: Theme) -> Paragraph<'static> {
    let heart_color = match vitals.heart_rate {
        Some(rate) if rate > HEART_RATE_ELEVATED_ABOVE => theme.warn,
        _ => theme.text,
    };
    let o2_color = match vitals.o2_level {
        Some(level) if level < O2_LOW_BELOW => theme.critical,
        _ => theme.text,
    };
    let lines = vec![
        vital_line("Heart rate", vitals.heart_rate, " bpm", heart_color, theme),
        vital_line("O2 level", vitals.o2_level, "%", o2_color, theme),
        vital_line("CO2", vitals.co2_level, "%", theme.text, theme),
        vital_line("Temperature", vitals.temperature, "°C", theme.text, theme),
        vital_line("Sleep quality", vitals.sleep_quality, "%", theme.text, theme),
        vital_line("Stress", vitals.stress_level, "%", theme.text, theme),
    ];
    Paragraph::new(Text::from(lines))
        .style(Style::default().fg(theme.text).bg(theme.surface))
        .block(panel("Vitals", theme, theme.surface))
}

fn label_color(label: AgentStatusLabel, theme: Theme) -> Color {
    match label {
        AgentStatusLabel::Active => theme.ok,
        AgentStatusLabel::Processing => theme.accent,
        AgentStatusLabel::Alert => theme.critical,
    }
}

fn agent_lines(
    id: &str,
    name: &str,
    agents: &AgentMap,
    selected: bool,
    theme: Theme,
) -> Vec<Line<'static>> {
    let record = agents.get(id);
    let label = record
        .map(|record| record.status_label())
        .unwrap_or(AgentStatusLabel::Active);
    let message = record
        .map(|record| record.status_message.as_str())
        .filter(|message| !message.trim().is_empty())
        .unwrap_or(MONITORING_MESSAGE)
        .to_string();
    let marker = if selected { "> " } else { "  " };
    let mut name_style = Style::default().fg(theme.text);
    if selected {
        name_style = name_style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
    }
    vec![
        Line::from(vec![
            Span::styled(marker.to_string(), Style::default().fg(theme.accent)),
            Span::styled(name.to_string(), name_style),
            Span::raw(" "),
            Span::styled(
                label.to_string(),
                Style::default().fg(label_color(label, theme)),
            ),
        ]),
        Line::from(Span::styled(
            format!("    {message}"),
            Style::default().fg(theme.muted),
        )),
    ]
}

fn render_agents(agents: &AgentMap, selected: Option<&str>, theme: Theme) -> Paragraph<'static> {
    let mut lines = Vec::new();
    for entry in AGENT_ROSTER.iter() {
        lines.extend(agent_lines(
            entry.id,
            entry.name,
            agents,
            selected == Some(entry.id),
            theme,
        ));
    }
    for (id, record) in agents {
        if AGENT_ROSTER.iter().any(|entry| entry.id == id.as_str()) {
            continue;
        }
        let name = if record.name.trim().is_empty() {
            id.as_str()
        } else {
            record.name.as_str()
        };
        lines.extend(agent_lines(id, name, agents, false, theme));
    }
    Paragraph::new(Text::from(lines))
        .style(Style::default().fg(theme.text).bg(theme.surface))
        .block(panel("Agents", theme, theme.surface))
}

fn message_lines(message: &ChatMessage, theme: Theme) -> Vec<Line<'static>> {
    let (speaker, color) = match message.role {
        Role::User => ("You", theme.accent),
        Role::Assistant => ("MAITRI", theme.ok),
    };
    let mut heading = vec![
        Span::styled(
            message.timestamp.format("%H:%M:%S ").to_string(),
            Style::default().fg(theme.muted),
        ),
        Span::styled(
            speaker.to_string(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
    ];
    match message.feedback {
        Some(Feedback::Up) => heading.push(Span::styled(" [+]", Style::default().fg(theme.ok))),
        Some(Feedback::Down) => {
            heading.push(Span::styled(" [-]", Style::default().fg(theme.critical)))
        }
        None => {}
    }
    let mut lines = vec![Line::from(heading)];
    for text in message.text.replace("**", "").lines() {
        lines.push(Line::from(Span::styled(
            format!("  {text}"),
            Style::default().fg(theme.text),
        )));
    }
    lines.push(Line::default());
    lines
}

fn render_transcript(chat: &[ChatMessage], theme: Theme, area: Rect) -> Paragraph<'static> {
    let lines: Vec<Line<'static>> = chat
        .iter()
        .flat_map(|message| message_lines(message, theme))
        .collect();
    let inner_width = area.width.saturating_sub(2).max(1) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;
    let wrapped_rows: usize = lines
        .iter()
        .map(|line| line.width().max(1).div_ceil(inner_width))
        .sum();
    let scroll = wrapped_rows.saturating_sub(inner_height).min(u16::MAX as usize) as u16;
    Paragraph::new(Text::from(lines))
        .style(Style::default().fg(theme.text).bg(theme.surface))
        .block(panel("Conversation", theme, theme.surface))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0))
}

fn render_suggestions(
    suggestions: &[String],
    cursor: Option<usize>,
    theme: Theme,
) -> Paragraph<'static> {
    let mut spans = Vec::new();
    for (index, suggestion) in suggestions.iter().enumerate() {
        let style = if cursor == Some(index) {
            Style::default()
                .fg(theme.bg)
                .bg(theme.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.text)
        };
        spans.push(Span::styled(format!(" {suggestion} "), style));
        spans.push(Span::raw(" "));
    }
    Paragraph::new(Line::from(spans))
        .style(Style::default().fg(theme.text).bg(theme.bg))
        .block(panel("Suggestions (Tab)", theme, theme.bg))
}

fn render_input(input: &str, theme: Theme) -> Paragraph<'static> {
    Paragraph::new(Line::from(vec![
        Span::styled("> ", Style::default().fg(theme.accent)),
        Span::styled(input.to_string(), Style::default().fg(theme.text)),
        Span::styled("_", Style::default().fg(theme.muted)),
    ]))
    .style(Style::default().fg(theme.text).bg(theme.bg))
    .block(panel("Message", theme, theme.bg))
}
