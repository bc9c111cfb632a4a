use anyhow::Result;
use chrono::NaiveDate;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame, Terminal,
};
use std::io::{self, Stdout};
use std::time::Duration;
use taskboard_core::{
    parse_tags, urgency, Buckets, DropTarget, SortKey, Task, TaskCache, TaskDraft, TaskPatch,
    TaskRemote, TaskStatus, Urgency,
};

use crate::runner::Runner;
use crate::state::{write_preferences, Preferences, Theme};

#[derive(Debug, Clone, PartialEq, Eq)]
enum PromptKind {
    NewTitle,
    NewTags { title: String },
    NewDue { title: String, tags: String },
    EditTitle { id: String },
    EditTags { id: String },
    EditDue { id: String },
    Search,
    TagFilter,
}

impl PromptKind {
    fn label(&self) -> &'static str {
        match self {
            PromptKind::NewTitle => "Task title",
            PromptKind::NewTags { .. } => "Tags (comma separated)",
            PromptKind::NewDue { .. } => "Due date (YYYY-MM-DD, blank for none)",
            PromptKind::EditTitle { .. } => "Title",
            PromptKind::EditTags { .. } => "Tags (comma separated)",
            PromptKind::EditDue { .. } => "Due date (YYYY-MM-DD, blank clears)",
            PromptKind::Search => "Search",
            PromptKind::TagFilter => "Filter by tag",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Normal,
    Prompt { kind: PromptKind, input: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

struct App {
    column: usize,
    row: usize,
    mode: Mode,
    theme: Theme,
    today: NaiveDate,
    notice: Option<String>,
    show_help: bool,
}

impl App {
    fn new(theme: Theme, today: NaiveDate) -> Self {
        Self {
            column: 0,
            row: 0,
            mode: Mode::Normal,
            theme,
            today,
            notice: None,
            show_help: false,
        }
    }

    fn status(&self) -> TaskStatus {
        TaskStatus::ALL[self.column]
    }

    fn selected<'a>(&self, view: &'a Buckets) -> Option<&'a Task> {
        view.get(self.status()).get(self.row)
    }

    fn clamp(&mut self, view: &Buckets) {
        let len = view.get(self.status()).len();
        if self.row >= len {
            self.row = len.saturating_sub(1);
        }
    }

    /// Put the cursor on `id` wherever it ended up.
    fn follow(&mut self, view: &Buckets, id: &str) {
        for status in TaskStatus::ALL {
            if let Some(row) = view.get(status).iter().position(|t| t.id == id) {
                self.column = status.column();
                self.row = row;
                return;
            }
        }
    }

    fn prompt(&mut self, kind: PromptKind, input: impl Into<String>) {
        self.mode = Mode::Prompt {
            kind,
            input: input.into(),
        };
    }
}

struct Palette {
    fg: Color,
    bg: Color,
    muted: Color,
    accent: Color,
    error: Color,
    soon: Color,
}

fn palette(theme: Theme) -> Palette {
    match theme {
        Theme::Light => Palette {
            fg: Color::Black,
            bg: Color::White,
            muted: Color::DarkGray,
            accent: Color::Blue,
            error: Color::Red,
            soon: Color::Rgb(180, 110, 0),
        },
        Theme::Dark => Palette {
            fg: Color::White,
            bg: Color::Black,
            muted: Color::Gray,
            accent: Color::Cyan,
            error: Color::LightRed,
            soon: Color::Yellow,
        },
    }
}

pub fn run_board<R: TaskRemote, C: TaskCache>(
    runner: &mut Runner<R, C>,
    prefs: Preferences,
    today: NaiveDate,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(prefs.theme, today);
    let res = board_loop(&mut terminal, &mut app, runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    res
}

fn board_loop<R: TaskRemote, C: TaskCache>(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    runner: &mut Runner<R, C>,
) -> Result<()> {
    runner.start();

    loop {
        runner.pump();
        app.clamp(&runner.board().view());
        terminal.draw(|f| draw(f, app, runner))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key(app, runner, key) == Flow::Quit {
                    break;
                }
            }
        }
    }

    Ok(())
}

fn handle_key<R: TaskRemote, C: TaskCache>(
    app: &mut App,
    runner: &mut Runner<R, C>,
    key: KeyEvent,
) -> Flow {
    if let Mode::Prompt { .. } = app.mode {
        handle_prompt_key(app, runner, key);
        return Flow::Continue;
    }

    app.notice = None;
    let view = runner.board().view();
    let selected_id = app.selected(&view).map(|t| t.id.clone());

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return Flow::Quit,
        KeyCode::Char('?') => app.show_help = !app.show_help,

        KeyCode::Left | KeyCode::Char('h') => {
            app.column = app.column.saturating_sub(1);
            app.row = 0;
        }
        KeyCode::Right | KeyCode::Char('l') => {
            app.column = (app.column + 1).min(TaskStatus::ALL.len() - 1);
            app.row = 0;
        }
        KeyCode::Up | KeyCode::Char('k') => app.row = app.row.saturating_sub(1),
        KeyCode::Down | KeyCode::Char('j') => {
            if app.row + 1 < view.get(app.status()).len() {
                app.row += 1;
            }
        }

        KeyCode::Char('H') | KeyCode::Char('L') => {
            if let Some(id) = selected_id {
                let dir = if key.code == KeyCode::Char('H') { -1 } else { 1 };
                let target = app.status().shifted(dir);
                if target != app.status() {
                    let req = runner.board_mut().move_status(&id, DropTarget::end_of(target));
                    runner.submit(req);
                    app.follow(&runner.board().view(), &id);
                }
            }
        }
        KeyCode::Char('K') | KeyCode::Char('J') => {
            if let Some(id) = selected_id {
                reorder(app, runner, &view, &id, key.code == KeyCode::Char('K'));
            }
        }

        KeyCode::Char('a') => app.prompt(PromptKind::NewTitle, ""),
        KeyCode::Char('e') => {
            if let Some(t) = app.selected(&view) {
                let title = t.title.clone();
                app.prompt(PromptKind::EditTitle { id: t.id.clone() }, title);
            }
        }
        KeyCode::Char('t') => {
            if let Some(t) = app.selected(&view) {
                let tags = t.tags.join(", ");
                app.prompt(PromptKind::EditTags { id: t.id.clone() }, tags);
            }
        }
        KeyCode::Char('u') => {
            if let Some(t) = app.selected(&view) {
                let due = t.due_date.map(|d| d.to_string()).unwrap_or_default();
                app.prompt(PromptKind::EditDue { id: t.id.clone() }, due);
            }
        }
        KeyCode::Char('d') | KeyCode::Delete => {
            if let Some(id) = selected_id {
                let req = runner.board_mut().delete(&id);
                runner.submit(req);
            }
        }

        KeyCode::Char('/') => {
            let current = runner.board().criteria().search.clone().unwrap_or_default();
            app.prompt(PromptKind::Search, current);
        }
        KeyCode::Char('#') => {
            let current = runner.board().criteria().tag.clone().unwrap_or_default();
            app.prompt(PromptKind::TagFilter, current);
        }
        KeyCode::Char('f') => {
            let next = match runner.board().criteria().status {
                None => Some(TaskStatus::Todo),
                Some(TaskStatus::Todo) => Some(TaskStatus::InProgress),
                Some(TaskStatus::InProgress) => Some(TaskStatus::Done),
                Some(TaskStatus::Done) => None,
            };
            runner.board_mut().set_status_filter(next);
        }
        KeyCode::Char('s') => {
            let next = SortKey::next(runner.board().criteria().sort);
            runner.board_mut().set_sort(next);
        }
        KeyCode::Char('c') => runner.board_mut().clear_filters(),

        KeyCode::Char('r') => {
            let req = runner.board_mut().refresh();
            runner.submit(Some(req));
        }
        KeyCode::Char('x') => runner.board_mut().dismiss_error(),
        KeyCode::Char('T') => {
            app.theme = app.theme.toggled();
            if let Err(e) = write_preferences(&Preferences { theme: app.theme }) {
                tracing::warn!("saving theme: {e:#}");
                app.notice = Some(format!("could not save theme: {e}"));
            }
        }
        _ => {}
    }

    app.clamp(&runner.board().view());
    Flow::Continue
}

fn reorder<R: TaskRemote, C: TaskCache>(
    app: &mut App,
    runner: &mut Runner<R, C>,
    view: &Buckets,
    id: &str,
    up: bool,
) {
    if runner.board().criteria().sort.is_some() {
        app.notice = Some("clear the sort (s) to reorder".to_string());
        return;
    }
    let column = view.get(app.status());
    let neighbour = if up {
        app.row.checked_sub(1).and_then(|r| column.get(r))
    } else {
        column.get(app.row + 1)
    };
    let Some(neighbour) = neighbour else { return };
    let Some(index) = runner.board().bucket_index(&neighbour.id) else {
        return;
    };

    let req = runner
        .board_mut()
        .move_status(id, DropTarget::new(app.status(), index));
    runner.submit(req);
    app.follow(&runner.board().view(), id);
}

fn handle_prompt_key<R: TaskRemote, C: TaskCache>(
    app: &mut App,
    runner: &mut Runner<R, C>,
    key: KeyEvent,
) {
    let Mode::Prompt { kind, input } = &mut app.mode else {
        return;
    };
    match key.code {
        KeyCode::Esc => app.mode = Mode::Normal,
        KeyCode::Backspace => {
            input.pop();
        }
        KeyCode::Char(c) => input.push(c),
        KeyCode::Enter => {
            let kind = kind.clone();
            let input = input.trim().to_string();
            app.mode = Mode::Normal;
            submit_prompt(app, runner, kind, input);
        }
        _ => {}
    }
}

fn parse_due(input: &str) -> Result<Option<NaiveDate>, String> {
    if input.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| format!("invalid date '{input}', expected YYYY-MM-DD"))
}

fn submit_prompt<R: TaskRemote, C: TaskCache>(
    app: &mut App,
    runner: &mut Runner<R, C>,
    kind: PromptKind,
    input: String,
) {
    match kind {
        // blank title: drop the form, nothing is sent
        PromptKind::NewTitle if input.is_empty() => {}
        PromptKind::NewTitle => app.prompt(PromptKind::NewTags { title: input }, ""),
        PromptKind::NewTags { title } => app.prompt(PromptKind::NewDue { title, tags: input }, ""),
        PromptKind::NewDue { title, tags } => match parse_due(&input) {
            Ok(due) => {
                let draft = TaskDraft::new(title)
                    .with_tags_input(&tags)
                    .with_status(app.status())
                    .with_due_date(due);
                let req = runner.board_mut().add(draft);
                runner.submit(req);
            }
            Err(msg) => {
                app.notice = Some(msg);
                app.prompt(PromptKind::NewDue { title, tags }, input);
            }
        },

        PromptKind::EditTitle { .. } if input.is_empty() => {
            app.notice = Some("title must not be empty".to_string());
        }
        PromptKind::EditTitle { id } => {
            let patch = TaskPatch {
                title: Some(input),
                ..TaskPatch::default()
            };
            let req = runner.board_mut().edit(&id, patch);
            runner.submit(req);
        }
        PromptKind::EditTags { id } => {
            let patch = TaskPatch {
                tags: Some(parse_tags(&input)),
                ..TaskPatch::default()
            };
            let req = runner.board_mut().edit(&id, patch);
            runner.submit(req);
        }
        PromptKind::EditDue { id } => match parse_due(&input) {
            Ok(due) => {
                let patch = TaskPatch {
                    due_date: Some(due),
                    ..TaskPatch::default()
                };
                let req = runner.board_mut().edit(&id, patch);
                runner.submit(req);
            }
            Err(msg) => {
                app.notice = Some(msg);
                app.prompt(PromptKind::EditDue { id }, input);
            }
        },

        PromptKind::Search => {
            runner
                .board_mut()
                .set_search(Some(input).filter(|s| !s.is_empty()));
            app.row = 0;
        }
        PromptKind::TagFilter => {
            runner
                .board_mut()
                .set_tag_filter(Some(input).filter(|s| !s.is_empty()));
            app.row = 0;
        }
    }
}

fn draw<R: TaskRemote, C: TaskCache>(f: &mut Frame, app: &App, runner: &Runner<R, C>) {
    let pal = palette(app.theme);
    let base = Style::default().fg(pal.fg).bg(pal.bg);
    let board = runner.board();
    let view = board.view();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(f.area());

    // header: title, active criteria, sync state
    let crit = board.criteria();
    let mut header = vec![Span::styled(
        "Task Board",
        base.fg(pal.accent).add_modifier(Modifier::BOLD),
    )];
    if let Some(s) = crit.status {
        header.push(Span::styled(format!("  status:{}", s.label()), base.fg(pal.muted)));
    }
    if let Some(q) = crit.search.as_deref() {
        header.push(Span::styled(format!("  search:\"{q}\""), base.fg(pal.muted)));
    }
    if let Some(t) = crit.tag.as_deref() {
        header.push(Span::styled(format!("  tag:{t}"), base.fg(pal.muted)));
    }
    if let Some(k) = crit.sort {
        header.push(Span::styled(format!("  sort:{}", k.label()), base.fg(pal.muted)));
    }
    if board.is_loading() {
        header.push(Span::styled("  Loading tasks...", base.fg(pal.soon)));
    } else if runner.in_flight() > 0 {
        header.push(Span::styled(format!("  syncing ({})", runner.in_flight()), base.fg(pal.muted)));
    }
    f.render_widget(Paragraph::new(Line::from(header)).style(base), chunks[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(33),
            Constraint::Percentage(33),
            Constraint::Percentage(34),
        ])
        .split(chunks[1]);

    for status in TaskStatus::ALL {
        let tasks = view.get(status);
        let items: Vec<ListItem> = tasks.iter().map(|t| task_item(t, app.today, &pal, base)).collect();
        let focused = app.column == status.column();

        let list = List::new(items)
            .block(
                Block::default()
                    .title(format!(" {} ({}) ", status.label(), tasks.len()))
                    .borders(Borders::ALL)
                    .border_style(if focused { base.fg(pal.accent) } else { base.fg(pal.muted) }),
            )
            .style(base)
            .highlight_style(base.add_modifier(Modifier::REVERSED | Modifier::BOLD));

        let mut state = ListState::default();
        if focused && !tasks.is_empty() {
            state.select(Some(app.row));
        }
        f.render_stateful_widget(list, columns[status.column()], &mut state);
    }

    // prompt, else error, else notice
    let footer = match &app.mode {
        Mode::Prompt { kind, input } => Line::from(vec![
            Span::styled(format!("{}: ", kind.label()), base.fg(pal.accent)),
            Span::styled(format!("{input}_"), base),
        ]),
        Mode::Normal => match (board.last_error(), &app.notice) {
            (Some(err), _) => Line::from(Span::styled(
                format!("{err}  (x to dismiss, r to retry load)"),
                base.fg(pal.error),
            )),
            (None, Some(n)) => Line::from(Span::styled(n.clone(), base.fg(pal.soon))),
            (None, None) => Line::from(""),
        },
    };
    f.render_widget(Paragraph::new(footer).style(base), chunks[2]);

    let help = if app.show_help {
        "a add  e title  t tags  u due  d delete  H/L move  K/J reorder  / search  # tag  f status  s sort  c clear  r reload  T theme  q quit"
    } else {
        "arrows/hjkl move cursor  a add  d delete  H/L move task  ? more keys  q quit"
    };
    f.render_widget(Paragraph::new(Span::styled(help, base.fg(pal.muted))).style(base), chunks[3]);
}

fn task_item<'a>(t: &'a Task, today: NaiveDate, pal: &Palette, base: Style) -> ListItem<'a> {
    let mut first = vec![Span::styled(t.title.as_str(), base)];
    if t.is_temporary() {
        first.push(Span::styled(" (unsynced)", base.fg(pal.muted)));
    }

    let mut second: Vec<Span> = Vec::new();
    if let Some(due) = t.due_date {
        let style = match urgency(due, today) {
            Urgency::Overdue => base.fg(pal.error).add_modifier(Modifier::BOLD),
            Urgency::DueToday | Urgency::DueSoon => base.fg(pal.soon),
            Urgency::Later => base.fg(pal.muted),
        };
        second.push(Span::styled(format!("due {due} "), style));
    }
    for tag in &t.tags {
        second.push(Span::styled(format!("#{tag} "), base.fg(pal.accent)));
    }

    let mut lines = vec![Line::from(first)];
    if !second.is_empty() {
        lines.push(Line::from(second));
    }
    ListItem::new(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use std::sync::Arc;
    use taskboard_core::{Board, MemoryCache, Project, RemoteError};

    struct Offline;

    impl TaskRemote for Offline {
        async fn list_tasks(&self) -> Result<Vec<Task>, RemoteError> {
            Err(RemoteError::transport("offline"))
        }
        async fn create_task(&self, _: &TaskDraft) -> Result<Task, RemoteError> {
            Err(RemoteError::transport("offline"))
        }
        async fn update_task(&self, _: &str, _: &TaskPatch) -> Result<Task, RemoteError> {
            Err(RemoteError::transport("offline"))
        }
        async fn delete_task(&self, _: &str) -> Result<(), RemoteError> {
            Err(RemoteError::transport("offline"))
        }
        async fn list_projects(&self) -> Result<Vec<Project>, RemoteError> {
            Err(RemoteError::transport("offline"))
        }
    }

    fn setup(tasks: &[Task]) -> (App, Runner<Offline, MemoryCache>) {
        let board = Board::new(MemoryCache::with_tasks(tasks));
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        (App::new(Theme::Light, today), Runner::new(board, Arc::new(Offline)))
    }

    fn press(app: &mut App, r: &mut Runner<Offline, MemoryCache>, code: KeyCode) -> Flow {
        handle_key(app, r, KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut App, r: &mut Runner<Offline, MemoryCache>, text: &str) {
        for c in text.chars() {
            press(app, r, KeyCode::Char(c));
        }
    }

    #[tokio::test]
    async fn add_form_creates_task_in_focused_column() {
        let (mut app, mut r) = setup(&[]);
        press(&mut app, &mut r, KeyCode::Right);
        press(&mut app, &mut r, KeyCode::Char('a'));
        type_text(&mut app, &mut r, "Write docs");
        press(&mut app, &mut r, KeyCode::Enter);
        type_text(&mut app, &mut r, "a, b");
        press(&mut app, &mut r, KeyCode::Enter);
        press(&mut app, &mut r, KeyCode::Enter);
        assert_eq!(app.mode, Mode::Normal);

        r.settle().await;
        let t = &r.board().tasks()[0];
        assert!(t.is_temporary());
        assert_eq!(t.status, TaskStatus::InProgress);
        assert_eq!(t.tags, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn blank_title_closes_the_form() {
        let (mut app, mut r) = setup(&[]);
        press(&mut app, &mut r, KeyCode::Char('a'));
        type_text(&mut app, &mut r, "   ");
        press(&mut app, &mut r, KeyCode::Enter);
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(r.in_flight(), 0);
    }

    #[tokio::test]
    async fn bad_due_date_keeps_prompt_open() {
        let (mut app, mut r) = setup(&[]);
        press(&mut app, &mut r, KeyCode::Char('a'));
        type_text(&mut app, &mut r, "x");
        press(&mut app, &mut r, KeyCode::Enter);
        press(&mut app, &mut r, KeyCode::Enter);
        type_text(&mut app, &mut r, "tomorrow");
        press(&mut app, &mut r, KeyCode::Enter);
        assert!(matches!(app.mode, Mode::Prompt { kind: PromptKind::NewDue { .. }, .. }));
        assert!(app.notice.is_some());
    }

    #[tokio::test]
    async fn shift_l_moves_task_and_cursor_follows() {
        let (mut app, mut r) = setup(&[Task::new("1", "a"), Task::new("2", "b")]);
        press(&mut app, &mut r, KeyCode::Down);
        press(&mut app, &mut r, KeyCode::Char('L'));

        assert_eq!(r.board().get("2").unwrap().status, TaskStatus::InProgress);
        assert_eq!(app.column, 1);
        assert_eq!(app.row, 0);

        r.settle().await;
        // failed status update does not revert the move
        assert_eq!(r.board().get("2").unwrap().status, TaskStatus::InProgress);
        assert!(r.board().last_error().is_some());
    }

    #[tokio::test]
    async fn reorder_moves_within_column() {
        let (mut app, mut r) = setup(&[Task::new("1", "a"), Task::new("2", "b"), Task::new("3", "c")]);
        press(&mut app, &mut r, KeyCode::Char('J'));
        let order: Vec<&str> = r.board().tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(order, vec!["2", "1", "3"]);
        assert_eq!(app.row, 1);

        press(&mut app, &mut r, KeyCode::Char('K'));
        let order: Vec<&str> = r.board().tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(order, vec!["1", "2", "3"]);
        assert_eq!(app.row, 0);
    }

    #[tokio::test]
    async fn search_and_status_filter_shape_the_view() {
        let (mut app, mut r) = setup(&[
            Task::new("1", "alpha"),
            Task::new("2", "beta").with_status(TaskStatus::Done),
        ]);
        press(&mut app, &mut r, KeyCode::Char('/'));
        type_text(&mut app, &mut r, "BET");
        press(&mut app, &mut r, KeyCode::Enter);
        assert_eq!(r.board().view().len(), 1);

        press(&mut app, &mut r, KeyCode::Char('c'));
        press(&mut app, &mut r, KeyCode::Char('f'));
        let view = r.board().view();
        assert_eq!(view.todo.len(), 1);
        assert!(view.done.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_selected_task() {
        let (mut app, mut r) = setup(&[Task::new("1", "a"), Task::new("2", "b")]);
        press(&mut app, &mut r, KeyCode::Char('d'));
        assert_eq!(r.board().tasks().len(), 1);
        assert_eq!(r.board().tasks()[0].id, "2");
        assert_eq!(press(&mut app, &mut r, KeyCode::Char('q')), Flow::Quit);
    }
}
