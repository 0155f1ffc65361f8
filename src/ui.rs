//! Terminal UI rendering with ratatui

use crate::board::Board;
use crate::grid::Cell;
use crate::session::{LinkStatus, MatchResult};
use crate::tetromino::{Rotation, TetrominoType};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

const BLOCK: &str = "██";
const GHOST: &str = "░░";
const EMPTY: &str = "  ";

/// hold(12) + board(22) + next/stats(16) + opponent board(22) + opponent stats(14)
const MATCH_WIDTH: u16 = 86;
/// Board rows plus the buffer rows and borders
const MATCH_HEIGHT: u16 = 24;
/// Number of hidden rows shown above the visible board
const VISIBLE_BUFFER: usize = 2;

/// What the match screen shows besides the two boards
#[derive(Debug, Clone, Copy)]
pub struct MatchStatus {
    pub link: LinkStatus,
    pub room: Option<i32>,
    pub result: Option<MatchResult>,
}

/// Render a message box while the handshake is in progress
pub fn render_waiting(frame: &mut Frame, message: &str, room: Option<i32>) {
    let area = frame.area();
    let popup_area = center_rect(area, 44, if room.is_some() { 9 } else { 6 });

    let block = Block::default()
        .title(" VERSUS ")
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let mut lines = vec![
        Line::raw(""),
        Line::styled(message.to_string(), Style::default().fg(Color::Yellow).bold()),
    ];
    if let Some(room) = room {
        lines.push(Line::raw(""));
        lines.push(Line::styled("Room (share with friend):", Style::default().fg(Color::Gray)));
        lines.push(Line::styled(room.to_string(), Style::default().fg(Color::Green).bold()));
    }
    lines.push(Line::styled("Press Q to cancel", Style::default().fg(Color::DarkGray)));

    let paragraph = Paragraph::new(lines).alignment(Alignment::Center);
    frame.render_widget(paragraph, inner);
}

/// Render both boards side by side
pub fn render_match(frame: &mut Frame, local: &Board, puppet: &Board, status: MatchStatus) {
    let area = frame.area();
    let match_area = center_rect(area, MATCH_WIDTH, MATCH_HEIGHT);

    let layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(12), // Hold
            Constraint::Length(22), // Our board
            Constraint::Length(16), // Next + stats
            Constraint::Length(22), // Opponent board
            Constraint::Length(14), // Opponent stats
        ])
        .split(match_area);

    render_hold(frame, layout[0], local);
    render_board(frame, layout[1], local, " YOU ", true);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(14), Constraint::Min(6)])
        .split(layout[2]);
    let preview: Vec<TetrominoType> = local.preview().collect();
    render_next_queue(frame, right[0], &preview);
    render_stats(frame, right[1], local);

    render_board(frame, layout[3], puppet, " OPPONENT ", false);
    render_opponent_stats(frame, layout[4], puppet, status);

    match status.result {
        Some(MatchResult::Won) => render_overlay(frame, area, "YOU WIN!", "Press Q to leave"),
        Some(MatchResult::Lost) => render_overlay(frame, area, "TOPPED OUT", "Press Q to leave"),
        Some(MatchResult::Draw) => render_overlay(frame, area, "TOPPED OUT", "Both topped out"),
        None => {}
    }
}

/// Center a rect within another rect
fn center_rect(area: Rect, width: u16, height: u16) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect {
        x,
        y,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

fn render_hold(frame: &mut Frame, area: Rect, board: &Board) {
    let title = if board.ruleset().hold { " HOLD " } else { " ---- " };
    let block = Block::default()
        .title(title)
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if let Some(kind) = board.hold_piece() {
        render_mini_piece(frame, inner, kind);
    }
}

fn render_next_queue(frame: &mut Frame, area: Rect, queue: &[TetrominoType]) {
    let block = Block::default()
        .title(" NEXT ")
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let shown = queue.len().min(4);
    if shown == 0 {
        return;
    }

    let piece_areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Length(3); shown])
        .split(inner);

    for (i, &kind) in queue.iter().take(shown).enumerate() {
        render_mini_piece(frame, piece_areas[i], kind);
    }
}

/// Render a small piece preview (for hold and next queue)
fn render_mini_piece(frame: &mut Frame, area: Rect, kind: TetrominoType) {
    if area.height < 1 || area.width < 4 {
        return;
    }

    let shape = kind.shape(Rotation::North);
    let min_row = shape.iter().map(|&(_, r)| r).min().unwrap_or(0);
    let min_col = shape.iter().map(|&(c, _)| c).min().unwrap_or(0);
    let style = Style::default().fg(kind.color());

    let lines: Vec<Line> = (0..2)
        .map(|row| {
            let spans: Vec<Span> = (0..4)
                .map(|col| {
                    if shape.contains(&(min_col + col, min_row + row)) {
                        Span::styled(BLOCK, style)
                    } else {
                        Span::raw(EMPTY)
                    }
                })
                .collect();
            Line::from(spans)
        })
        .collect();

    let paragraph = Paragraph::new(lines).alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}

fn render_board(frame: &mut Frame, area: Rect, board: &Board, title: &str, show_ghost: bool) {
    let border = if board.is_alive() { Color::White } else { Color::Red };
    let block = Block::default()
        .title(title.to_string())
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let grid = board.grid();
    let falling = board.falling().cells();
    let ghost = if show_ghost && board.is_alive() {
        Some(board.ghost().cells())
    } else {
        None
    };
    let falling_style = Style::default().fg(board.falling().kind.color());
    let first_row = grid.spawn_rows().saturating_sub(VISIBLE_BUFFER);

    let lines: Vec<Line> = (first_row..grid.rows())
        .map(|row| {
            let row = row as i32;
            let spans: Vec<Span> = (0..grid.columns() as i32)
                .map(|col| {
                    if board.is_alive() && falling.contains(&(col, row)) {
                        Span::styled(BLOCK, falling_style)
                    } else if let Some(Cell::Filled(color)) = grid.get(col, row) {
                        Span::styled(BLOCK, Style::default().fg(color))
                    } else if ghost.is_some_and(|ghost| ghost.contains(&(col, row))) {
                        Span::styled(GHOST, falling_style.dim())
                    } else {
                        Span::raw(EMPTY)
                    }
                })
                .collect();
            Line::from(spans)
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}

fn stat_lines(board: &Board) -> Vec<Line<'static>> {
    let pending = board.garbage_queue().pending_rows();
    let garbage_color = if pending > 0 { Color::Red } else { Color::DarkGray };
    vec![
        Line::from(Span::styled("RULES", Style::default().fg(Color::Gray))),
        Line::from(Span::styled(
            board.ruleset().kind.to_string(),
            Style::default().fg(Color::Cyan),
        )),
        Line::from(Span::styled("LEVEL", Style::default().fg(Color::Gray))),
        Line::from(Span::styled(
            board.level().to_string(),
            Style::default().fg(Color::White).bold(),
        )),
        Line::from(Span::styled("LINES", Style::default().fg(Color::Gray))),
        Line::from(Span::styled(
            board.lines().to_string(),
            Style::default().fg(Color::Green),
        )),
        Line::from(Span::styled("GARBAGE", Style::default().fg(Color::Gray))),
        Line::from(Span::styled(pending.to_string(), Style::default().fg(garbage_color))),
    ]
}

fn render_stats(frame: &mut Frame, area: Rect, board: &Board) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let inner = block.inner(area);
    frame.render_widget(block, area);
    frame.render_widget(Paragraph::new(stat_lines(board)), inner);
}

fn render_opponent_stats(frame: &mut Frame, area: Rect, puppet: &Board, status: MatchStatus) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let (link, link_color) = match status.link {
        LinkStatus::Connected => ("ONLINE", Color::Green),
        LinkStatus::PeerFinished => ("FINISHED", Color::Yellow),
        LinkStatus::ConnectionLost => ("LOST", Color::Red),
        LinkStatus::Closed => ("CLOSED", Color::DarkGray),
    };

    let mut lines = stat_lines(puppet);
    lines.push(Line::raw(""));
    lines.push(Line::from(Span::styled(link, Style::default().fg(link_color).bold())));
    if let Some(room) = status.room {
        lines.push(Line::from(Span::styled(
            format!("ROOM {room}"),
            Style::default().fg(Color::DarkGray),
        )));
    }
    frame.render_widget(Paragraph::new(lines), inner);
}

/// Render an overlay for the end of a match
fn render_overlay(frame: &mut Frame, area: Rect, title: &str, subtitle: &str) {
    let popup_area = center_rect(area, 24, 5);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .style(Style::default().bg(Color::Black));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let text = vec![
        Line::styled(title.to_string(), Style::default().fg(Color::Yellow).bold()),
        Line::raw(""),
        Line::styled(subtitle.to_string(), Style::default().fg(Color::Gray)),
    ];

    let paragraph = Paragraph::new(text).alignment(Alignment::Center);
    frame.render_widget(paragraph, inner);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Handling;
    use crate::ruleset::Ruleset;
    use ratatui::{Terminal, backend::TestBackend};

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn test_match_screen_shows_status() {
        let local = Board::local(Ruleset::modern(), 7, Handling::default());
        let puppet = Board::puppet(Ruleset::modern(), 7, 1);
        let mut terminal = Terminal::new(TestBackend::new(90, 26)).unwrap();
        terminal
            .draw(|frame| {
                render_match(
                    frame,
                    &local,
                    &puppet,
                    MatchStatus {
                        link: LinkStatus::PeerFinished,
                        room: Some(4321),
                        result: None,
                    },
                )
            })
            .unwrap();

        let text = screen_text(&terminal);
        assert!(text.contains("OPPONENT"));
        assert!(text.contains("FINISHED"));
        assert!(text.contains("ROOM 4321"));
    }

    #[test]
    fn test_opponent_leaving_shows_win() {
        let local = Board::local(Ruleset::modern(), 7, Handling::default());
        let puppet = Board::puppet(Ruleset::modern(), 7, 1);
        let mut terminal = Terminal::new(TestBackend::new(90, 26)).unwrap();
        terminal
            .draw(|frame| {
                render_match(
                    frame,
                    &local,
                    &puppet,
                    MatchStatus {
                        link: LinkStatus::PeerFinished,
                        room: None,
                        result: Some(MatchResult::Won),
                    },
                )
            })
            .unwrap();
        assert!(screen_text(&terminal).contains("YOU WIN!"));
    }

    #[test]
    fn test_waiting_screen_shows_room() {
        let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
        terminal
            .draw(|frame| render_waiting(frame, "Waiting for opponent...", Some(1234)))
            .unwrap();
        assert!(screen_text(&terminal).contains("1234"));
    }
}
