use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::{app::DashboardState, cards::Card, transport::ConnectionStatus};

const CARD_WIDTH: u16 = 28;
const CARD_HEIGHT: u16 = 4;
const RAW_PANE_HEIGHT: u16 = 8;

pub fn render(frame: &mut Frame, state: &DashboardState) {
    let raw_height = if state.raw_log_enabled() {
        RAW_PANE_HEIGHT
    } else {
        0
    };
    let [header, grid, raw] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(raw_height),
    ])
    .areas(frame.area());

    render_header(frame, header, state);
    render_cards(frame, grid, state);
    if raw_height > 0 {
        render_raw_log(frame, raw, state);
    }
}

fn status_style(status: ConnectionStatus) -> Style {
    let color = match status {
        ConnectionStatus::Connected => Color::Green,
        ConnectionStatus::Connecting => Color::Yellow,
        ConnectionStatus::Disconnected => Color::Red,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

fn render_header(frame: &mut Frame, area: Rect, state: &DashboardState) {
    let line = Line::from(vec![
        Span::styled(format!("WS: {}", state.status.label()), status_style(state.status)),
        Span::raw("  │  "),
        Span::raw(state.staleness.rendered().to_string()),
        Span::raw("  │  "),
        Span::styled(
            format!("sort: {}", state.sort.mode.label()),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled("  [s] sort  [q] quit", Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn render_cards(frame: &mut Frame, area: Rect, state: &DashboardState) {
    if state.registry.is_empty() {
        let waiting = Paragraph::new("waiting for telemetry…")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(waiting, area);
        return;
    }

    let columns = (area.width / CARD_WIDTH).max(1);
    let width = area.width / columns;
    for (index, card) in state.registry.iter().enumerate() {
        let index = index as u16;
        let x = area.x + (index % columns) * width;
        let y = area.y + (index / columns) * CARD_HEIGHT;
        if y + CARD_HEIGHT > area.y + area.height {
            // Off-screen cards are still tracked; they just are not drawn.
            break;
        }
        let cell = Rect::new(x, y, width, CARD_HEIGHT);
        frame.render_widget(card_widget(card), cell);
    }
}

fn card_widget(card: &Card) -> Paragraph<'_> {
    let mut value_line = vec![Span::styled(
        card.value.as_str(),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if card.field.has_unit() {
        value_line.push(Span::raw(" "));
        value_line.push(Span::styled(
            card.field.unit.as_str(),
            Style::default().fg(Color::Gray),
        ));
    }
    let group = Line::from(Span::styled(
        card.field.group.as_str(),
        Style::default().fg(Color::DarkGray),
    ));
    Paragraph::new(vec![Line::from(value_line), group]).block(
        Block::default()
            .borders(Borders::ALL)
            .title(card.field.label.as_str()),
    )
}

fn render_raw_log(frame: &mut Frame, area: Rect, state: &DashboardState) {
    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = state
        .raw_log()
        .rev()
        .take(visible)
        .map(|payload| Line::from(payload.to_string()))
        .collect();
    let pane = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("raw frames"));
    frame.render_widget(pane, area);
}
