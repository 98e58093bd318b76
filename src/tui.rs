use std::io::stdout;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};

use crate::gateway::Gateway;
use crate::models::{JobRecord, RecordId, Session, Status, currency_symbol};
use crate::store::{BlobStore, JobCollection};
use crate::sync::{self, SyncHandle, ViewState};
use crate::view::{DerivedView, StatusFilter, derive_view};

struct DashState {
    search: String,
    filter: StatusFilter,
    selected: usize,
    scroll_offset: u16,
    searching: bool,
    confirm_delete: Option<RecordId>,
    notice: Option<String>,
}

impl DashState {
    fn new(search: String, filter: StatusFilter) -> Self {
        Self {
            search,
            filter,
            selected: 0,
            scroll_offset: 0,
            searching: false,
            confirm_delete: None,
            notice: None,
        }
    }

    fn clamp_selection(&mut self, visible_len: usize) {
        if visible_len == 0 {
            self.selected = 0;
        } else if self.selected >= visible_len {
            self.selected = visible_len - 1;
        }
    }

    fn next(&mut self, visible_len: usize) {
        if visible_len > 0 && self.selected < visible_len - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }
}

/// Live dashboard: stats, search, status filter and the record list, all
/// recomputed from the synchronizer's latest snapshot on every frame.
pub async fn run_dashboard<S>(
    store: &S,
    session: &Session,
    search: String,
    filter: StatusFilter,
) -> Result<()>
where
    S: JobCollection + BlobStore,
{
    let mut handle = sync::start(store, session).await;
    let gateway = Gateway::new(store, store);
    let mut state = DashState::new(search, filter);

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &handle, &gateway, &mut state).await;

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    handle.stop();

    result
}

async fn run_loop<S>(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    handle: &SyncHandle,
    gateway: &Gateway<'_, S, S>,
    state: &mut DashState,
) -> Result<()>
where
    S: JobCollection + BlobStore,
{
    let mut list_state = ListState::default();
    list_state.select(Some(0));

    loop {
        let snapshot = handle.state().clone();
        let view = derive_view(&snapshot.records, &state.search, state.filter);
        state.clamp_selection(view.visible.len());
        list_state.select(if view.visible.is_empty() {
            None
        } else {
            Some(state.selected)
        });

        terminal.draw(|frame| draw(frame, state, &snapshot, &view, &mut list_state))?;

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if state.searching {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => state.searching = false,
                KeyCode::Backspace => {
                    state.search.pop();
                }
                KeyCode::Char(c) => state.search.push(c),
                _ => {}
            }
            continue;
        }

        if let Some(id) = state.confirm_delete.take() {
            if key.code == KeyCode::Char('y') {
                match gateway.delete(&id).await {
                    Ok(()) => state.notice = Some("Job application deleted".to_string()),
                    Err(err) => state.notice = Some(err.to_string()),
                }
            }
            continue;
        }

        let current = view.visible.get(state.selected);
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => break,
            KeyCode::Char('/') => {
                state.searching = true;
                state.notice = None;
            }
            KeyCode::Char('f') => {
                state.filter = state.filter.cycle();
                state.selected = 0;
            }
            KeyCode::Down | KeyCode::Char('j') => state.next(view.visible.len()),
            KeyCode::Up | KeyCode::Char('k') => state.prev(),
            KeyCode::Char('J') | KeyCode::PageDown => {
                state.scroll_offset = state.scroll_offset.saturating_add(3);
            }
            KeyCode::Char('K') | KeyCode::PageUp => {
                state.scroll_offset = state.scroll_offset.saturating_sub(3);
            }
            KeyCode::Char('d') => {
                if let Some(record) = current {
                    state.confirm_delete = Some(record.id.clone());
                }
            }
            KeyCode::Char('a') => set_status(gateway, current, Status::Applied, state).await,
            KeyCode::Char('i') => set_status(gateway, current, Status::Interview, state).await,
            KeyCode::Char('o') => set_status(gateway, current, Status::Offer, state).await,
            KeyCode::Char('x') => set_status(gateway, current, Status::Rejected, state).await,
            KeyCode::Char('w') => set_status(gateway, current, Status::Withdrawn, state).await,
            _ => {}
        }
    }
    Ok(())
}

// The list is not patched locally; the change lands with the next snapshot.
async fn set_status<S>(
    gateway: &Gateway<'_, S, S>,
    record: Option<&JobRecord>,
    status: Status,
    state: &mut DashState,
) where
    S: JobCollection + BlobStore,
{
    let Some(record) = record else { return };
    let mut draft = record.to_draft();
    draft.status = status;
    match gateway.update(&record.id, draft).await {
        Ok(()) => state.notice = Some(format!("Marked as {}", status.label())),
        Err(err) => state.notice = Some(err.to_string()),
    }
}

fn draw(
    frame: &mut Frame,
    state: &DashState,
    snapshot: &ViewState,
    view: &DerivedView,
    list_state: &mut ListState,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_stats(frame, chunks[0], view);

    if snapshot.loading {
        let loading = Paragraph::new("Loading job applications...")
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(loading, chunks[1]);
    } else {
        draw_body(frame, chunks[1], state, snapshot, view, list_state);
    }

    draw_status_line(frame, chunks[2], state, snapshot);

    let help = Paragraph::new(
        " j/k:navigate  J/K:scroll  /:search  f:filter  a/i/o/x/w:status  d:delete  q:quit",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, chunks[3]);
}

fn draw_stats(frame: &mut Frame, area: Rect, view: &DerivedView) {
    let c = view.counts;
    let line = Line::from(vec![
        Span::styled("Total ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            c.total.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
        Span::styled("Applied ", Style::default().fg(Color::Yellow)),
        Span::raw(c.applied.to_string()),
        Span::raw("   "),
        Span::styled("Interview ", Style::default().fg(Color::Magenta)),
        Span::raw(c.interview.to_string()),
        Span::raw("   "),
        Span::styled("Offers ", Style::default().fg(Color::Green)),
        Span::raw(c.offer.to_string()),
        Span::raw("   "),
        Span::styled("Rejected ", Style::default().fg(Color::Red)),
        Span::raw(c.rejected.to_string()),
    ]);
    let stats = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Job Tracker "),
    );
    frame.render_widget(stats, area);
}

fn draw_body(
    frame: &mut Frame,
    area: Rect,
    state: &DashState,
    snapshot: &ViewState,
    view: &DerivedView,
    list_state: &mut ListState,
) {
    if view.visible.is_empty() {
        let message = if snapshot.records.is_empty() {
            "No job applications yet.\n\nStart your job search journey by adding your first one:\n\n  jobtrack add <company> <role>"
        } else {
            "No jobs match the current search or filter.\n\nTry adjusting them (/ to search, f to change the filter)."
        };
        let empty = Paragraph::new(message)
            .block(Block::default().borders(Borders::ALL))
            .wrap(Wrap { trim: false });
        frame.render_widget(empty, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let items: Vec<ListItem> = view
        .visible
        .iter()
        .map(|record| {
            let line = Line::from(vec![
                Span::styled(
                    format!("{} ", status_icon(record.status)),
                    status_style(record.status),
                ),
                Span::raw(truncate(&record.company, 20)),
                Span::styled(
                    format!(" | {}", truncate(&record.role, 24)),
                    Style::default().fg(Color::DarkGray),
                ),
            ]);
            ListItem::new(line)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(format!(
            " Applications ({}) ",
            view.visible.len()
        )))
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, chunks[0], list_state);

    let detail = build_detail(view.visible.get(state.selected));
    let detail_widget = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));
    frame.render_widget(detail_widget, chunks[1]);
}

fn draw_status_line(frame: &mut Frame, area: Rect, state: &DashState, snapshot: &ViewState) {
    let text = if let Some(id) = &state.confirm_delete {
        format!(
            " Delete application {}? Press y to confirm, any other key to cancel.",
            id
        )
    } else if state.searching {
        format!(" Search: {}_  (Enter to finish)", state.search)
    } else if let Some(err) = &snapshot.error {
        format!(" {}", err)
    } else if let Some(notice) = &state.notice {
        format!(" {}", notice)
    } else {
        format!(" Filter: {}   Search: {}", state.filter.label(), if state.search.is_empty() { "-" } else { &state.search })
    };

    let style = if state.confirm_delete.is_some() || snapshot.error.is_some() {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::Cyan)
    };
    frame.render_widget(Paragraph::new(text).style(style), area);
}

fn build_detail(record: Option<&JobRecord>) -> Text<'static> {
    let Some(record) = record else {
        return Text::raw("No application selected");
    };

    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(
        record.role.clone(),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(format!("at {}", record.company)));
    lines.push(Line::from(Span::styled(
        format!("Status: {}", record.status.label()),
        status_style(record.status),
    )));

    if !record.location.is_empty() {
        lines.push(Line::from(format!("Location: {}", record.location)));
    }
    if !record.salary.is_empty() {
        let symbol = currency_symbol(&record.currency);
        if symbol.is_empty() {
            lines.push(Line::from(format!("Salary: {}", record.salary)));
        } else {
            lines.push(Line::from(format!("Salary: {}{}", symbol, record.salary)));
        }
    }
    if !record.job_url.is_empty() {
        lines.push(Line::from(format!("URL: {}", record.job_url)));
    }
    lines.push(Line::from(format!(
        "Applied: {}",
        format_date(record.created_at)
    )));
    lines.push(Line::from(format!(
        "Updated: {}",
        format_date(record.updated_at)
    )));

    if !record.attachments.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Attachments",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for attachment in &record.attachments {
            lines.push(Line::from(format!(
                "  {} ({})",
                attachment.name,
                human_size(attachment.size)
            )));
        }
    }

    if !record.notes.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Notes",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for line in textwrap::fill(&record.notes, 70).lines() {
            lines.push(Line::from(format!("  {}", line)));
        }
    }

    Text::from(lines)
}

fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Applied => "+",
        Status::Interview => "*",
        Status::Offer => "$",
        Status::Rejected => "x",
        Status::Withdrawn => "-",
    }
}

fn status_style(status: Status) -> Style {
    match status {
        Status::Applied => Style::default().fg(Color::Yellow),
        Status::Interview => Style::default().fg(Color::Magenta),
        Status::Offer => Style::default().fg(Color::Green),
        Status::Rejected => Style::default().fg(Color::Red),
        Status::Withdrawn => Style::default().fg(Color::DarkGray),
    }
}

pub fn format_date(timestamp: Option<DateTime<Utc>>) -> String {
    match timestamp {
        Some(ts) => ts.format("%b %d, %Y").to_string(),
        // Server timestamp not materialized yet
        None => "just now".to_string(),
    }
}

pub fn human_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
