//! Terminal dashboard: login screen, three-column board, task editor popup.
//!
//! Key handling and server replies are plain state transitions on [`App`]
//! that may ask for a [`Job`]. The run loop spawns each job on the runtime
//! and feeds its [`Message`] back, so the screen never waits on the network.

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction as LayoutDirection, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::api::ApiClient;
use crate::auth::{self, RegisterForm, REGISTERED_NOTICE};
use crate::board::{self, reorder_plan, Board, Column, DragEffect, DragState, Direction, Invalidation};
use crate::editor::{self, Field, LineInput, TaskEditor, TaskForm};
use crate::error::{BoardError, RequestError};
use crate::models::{Priority, ReorderEntry, Task, TaskId, User};
use crate::session::SessionHandle;
use crate::store::{RefreshResult, TaskStore};

const TICK: Duration = Duration::from_millis(100);
const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];
const SESSION_EXPIRED: &str = "Session expired. Log in again.";

/// Asynchronous work requested by the UI.
#[derive(Debug)]
pub enum Job {
    Login { username: String, password: String },
    Register(RegisterForm),
    Restore,
    Refresh,
    Update(Task),
    Delete(TaskId),
    Reorder(Vec<ReorderEntry>),
    Save { form: TaskForm, existing: Option<Task> },
    LoadUsers,
}

/// A [`Message`] tagged with the login generation its job started in.
pub type Reply = (u64, Message);

/// A finished [`Job`].
#[derive(Debug)]
pub enum Message {
    LoggedIn(Result<User, BoardError>),
    Registered(Result<User, BoardError>),
    Restored(Result<Option<User>, BoardError>),
    Refreshed(RefreshResult),
    Mutated {
        action: &'static str,
        result: Result<Invalidation, RequestError>,
    },
    Saved(Result<Invalidation, BoardError>),
    UsersLoaded(Vec<User>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginField {
    Username,
    Email,
    Password,
    Confirm,
}

impl LoginField {
    fn label(self) -> &'static str {
        match self {
            LoginField::Username => "Username",
            LoginField::Email => "Email",
            LoginField::Password => "Password",
            LoginField::Confirm => "Confirm password",
        }
    }

    fn is_secret(self) -> bool {
        matches!(self, LoginField::Password | LoginField::Confirm)
    }
}

#[derive(Debug, Clone)]
struct LoginScreen {
    registering: bool,
    focus: LoginField,
    username: LineInput,
    email: LineInput,
    password: LineInput,
    confirm: LineInput,
    error: Option<String>,
    notice: Option<String>,
    busy: bool,
}

impl Default for LoginScreen {
    fn default() -> Self {
        LoginScreen {
            registering: false,
            focus: LoginField::Username,
            username: LineInput::default(),
            email: LineInput::default(),
            password: LineInput::default(),
            confirm: LineInput::default(),
            error: None,
            notice: None,
            busy: false,
        }
    }
}

impl LoginScreen {
    fn fields(&self) -> &'static [LoginField] {
        if self.registering {
            &[
                LoginField::Username,
                LoginField::Email,
                LoginField::Password,
                LoginField::Confirm,
            ]
        } else {
            &[LoginField::Username, LoginField::Password]
        }
    }

    fn input(&self, field: LoginField) -> &LineInput {
        match field {
            LoginField::Username => &self.username,
            LoginField::Email => &self.email,
            LoginField::Password => &self.password,
            LoginField::Confirm => &self.confirm,
        }
    }

    fn input_mut(&mut self) -> &mut LineInput {
        match self.focus {
            LoginField::Username => &mut self.username,
            LoginField::Email => &mut self.email,
            LoginField::Password => &mut self.password,
            LoginField::Confirm => &mut self.confirm,
        }
    }

    fn step_focus(&mut self, forward: bool) {
        let fields = self.fields();
        let at = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        let next = if forward {
            (at + 1) % fields.len()
        } else {
            (at + fields.len() - 1) % fields.len()
        };
        self.focus = fields[next];
    }

    fn toggle_mode(&mut self) {
        self.registering = !self.registering;
        self.error = None;
        self.notice = None;
        if !self.fields().contains(&self.focus) {
            self.focus = LoginField::Username;
        }
    }

    fn submit(&mut self) -> Option<Job> {
        if self.busy {
            return None;
        }
        self.error = None;
        self.notice = None;

        if self.registering {
            let form = RegisterForm {
                username: self.username.content.clone(),
                email: self.email.content.clone(),
                password: self.password.content.clone(),
                confirm_password: self.confirm.content.clone(),
            };
            if let Err(err) = form.validate() {
                self.error = Some(err.to_string());
                return None;
            }
            self.busy = true;
            Some(Job::Register(form))
        } else {
            self.busy = true;
            Some(Job::Login {
                username: self.username.content.clone(),
                password: self.password.content.clone(),
            })
        }
    }
}

pub struct App {
    session: SessionHandle,
    pub screen: Screen,
    login: LoginScreen,
    board: Board,
    column: Column,
    rows: [usize; 3],
    editor: Option<TaskEditor>,
    refreshing: bool,
    refresh_queued: bool,
    /// Bumped on every login and logout; replies from older jobs are stale.
    generation: u64,
    tick: usize,
    pub should_quit: bool,
}

impl App {
    pub fn new(session: SessionHandle) -> Self {
        let screen = if session.is_authenticated() {
            Screen::Dashboard
        } else {
            Screen::Login
        };
        App {
            session,
            screen,
            login: LoginScreen::default(),
            board: Board::new(),
            column: Column::Todo,
            rows: [0; 3],
            editor: None,
            refreshing: false,
            refresh_queued: false,
            generation: 0,
            tick: 0,
            should_quit: false,
        }
    }

    /// Work to start before the first key press.
    pub fn startup_jobs(&mut self) -> Vec<Job> {
        match self.screen {
            Screen::Login => Vec::new(),
            Screen::Dashboard => {
                let mut jobs = vec![Job::Restore];
                jobs.extend(self.request_refresh());
                jobs
            }
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn on_tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    /// Refreshes never overlap; one asked for mid-flight runs when the
    /// current one lands.
    fn request_refresh(&mut self) -> Option<Job> {
        if self.refreshing {
            self.refresh_queued = true;
            return None;
        }
        self.refreshing = true;
        Some(Job::Refresh)
    }

    fn selected_task(&self) -> Option<&Task> {
        board::tasks_in(self.board.store().tasks(), self.column)
            .get(self.rows[self.column.index()])
            .copied()
    }

    fn clamp_rows(&mut self) {
        for (column, tasks) in self.board.columns() {
            let row = &mut self.rows[column.index()];
            *row = (*row).min(tasks.len().saturating_sub(1));
        }
    }

    fn next_row(&mut self) {
        let len = board::tasks_in(self.board.store().tasks(), self.column).len();
        if len == 0 {
            return;
        }
        let row = &mut self.rows[self.column.index()];
        *row = if *row + 1 >= len { 0 } else { *row + 1 };
    }

    fn previous_row(&mut self) {
        let len = board::tasks_in(self.board.store().tasks(), self.column).len();
        if len == 0 {
            return;
        }
        let row = &mut self.rows[self.column.index()];
        *row = if *row == 0 { len - 1 } else { *row - 1 };
    }

    fn enter_dashboard(&mut self) -> Option<Job> {
        self.generation = self.generation.wrapping_add(1);
        self.screen = Screen::Dashboard;
        self.board = Board::new();
        self.column = Column::Todo;
        self.rows = [0; 3];
        self.editor = None;
        self.refreshing = false;
        self.refresh_queued = false;
        self.login = LoginScreen::default();
        self.request_refresh()
    }

    fn leave_dashboard(&mut self, notice: Option<&str>) {
        if let Err(err) = self.session.logout() {
            log::error!("Failed to clear stored session: {}", err);
        }
        self.generation = self.generation.wrapping_add(1);
        self.screen = Screen::Login;
        self.board = Board::new();
        self.editor = None;
        self.refreshing = false;
        self.refresh_queued = false;
        self.login = LoginScreen {
            notice: notice.map(str::to_string),
            ..LoginScreen::default()
        };
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Job> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return None;
        }
        match self.screen {
            Screen::Login => self.handle_login_key(key),
            Screen::Dashboard if self.editor.is_some() => self.handle_editor_key(key),
            Screen::Dashboard => self.handle_board_key(key),
        }
    }

    fn handle_login_key(&mut self, key: KeyEvent) -> Option<Job> {
        let login = &mut self.login;
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                login.toggle_mode()
            }
            KeyCode::Tab | KeyCode::Down => login.step_focus(true),
            KeyCode::BackTab | KeyCode::Up => login.step_focus(false),
            KeyCode::Enter => return login.submit(),
            KeyCode::Backspace => login.input_mut().delete_char(),
            KeyCode::Left => login.input_mut().move_cursor_left(),
            KeyCode::Right => login.input_mut().move_cursor_right(),
            KeyCode::Char(c) => login.input_mut().insert_char(c),
            _ => {}
        }
        None
    }

    fn handle_editor_key(&mut self, key: KeyEvent) -> Option<Job> {
        let editor = self.editor.as_mut()?;
        match key.code {
            KeyCode::Esc => {
                if !editor.is_submitting() {
                    self.editor = None;
                }
            }
            KeyCode::Enter => {
                if editor.is_submitting() {
                    return None;
                }
                return editor
                    .begin_submit()
                    .map(|(form, existing)| Job::Save { form, existing });
            }
            KeyCode::Tab | KeyCode::Down => editor.focus_next(),
            KeyCode::BackTab | KeyCode::Up => editor.focus_previous(),
            KeyCode::Left => editor.move_cursor_left(),
            KeyCode::Right => editor.move_cursor_right(),
            KeyCode::Backspace => editor.delete_char(),
            KeyCode::Char(c) => editor.insert_char(c),
            _ => {}
        }
        None
    }

    fn handle_board_key(&mut self, key: KeyEvent) -> Option<Job> {
        if self.board.pending_delete().is_some() {
            return match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    self.board.take_confirmed_delete().map(Job::Delete)
                }
                _ => {
                    self.board.cancel_delete();
                    None
                }
            };
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Left => self.column = self.column.previous(),
            KeyCode::Right => self.column = self.column.next(),
            KeyCode::Down => self.next_row(),
            KeyCode::Up => self.previous_row(),
            KeyCode::Char('m') => {
                if let Some(id) = self.selected_task().map(|t| t.id) {
                    self.board.drag_start(id);
                }
            }
            KeyCode::Enter => match self.board.drag_state() {
                DragState::Dragging(_) => {
                    if let DragEffect::Update(task) = self.board.drop_on(self.column) {
                        return Some(Job::Update(task));
                    }
                }
                DragState::Idle => return self.open_editor(true),
            },
            KeyCode::Esc => {
                self.board.cancel_drag();
                self.board.clear_notice();
            }
            KeyCode::Char('n') => return self.open_editor(false),
            KeyCode::Char('e') => return self.open_editor(true),
            KeyCode::Char('d') => {
                if let Some(id) = self.selected_task().map(|t| t.id) {
                    self.board.request_delete(id);
                }
            }
            KeyCode::Char('K') => return self.reorder(Direction::Up),
            KeyCode::Char('J') => return self.reorder(Direction::Down),
            KeyCode::Char('r') => return self.request_refresh(),
            KeyCode::Char('L') => self.leave_dashboard(None),
            _ => {}
        }
        None
    }

    fn open_editor(&mut self, edit_selected: bool) -> Option<Job> {
        let editor = if edit_selected {
            TaskEditor::edit(self.selected_task()?)
        } else {
            TaskEditor::create()
        };
        self.editor = Some(editor);
        Some(Job::LoadUsers)
    }

    fn reorder(&mut self, direction: Direction) -> Option<Job> {
        let id = self.selected_task()?.id;
        let entries = reorder_plan(self.board.store().tasks(), id, direction)?;
        // keep the cursor on the task being moved
        let row = &mut self.rows[self.column.index()];
        *row = match direction {
            Direction::Up => row.saturating_sub(1),
            Direction::Down => *row + 1,
        };
        Some(Job::Reorder(entries))
    }

    /// Route a job's reply, dropping it if a login or logout happened
    /// since the job was started.
    pub fn receive(&mut self, (generation, message): Reply) -> Option<Job> {
        if generation != self.generation {
            log::debug!("Dropping reply from an earlier session");
            return None;
        }
        self.handle_message(message)
    }

    pub fn handle_message(&mut self, message: Message) -> Option<Job> {
        match message {
            Message::LoggedIn(result) => {
                self.login.busy = false;
                match result {
                    Ok(_) => self.enter_dashboard(),
                    Err(err) => {
                        self.login.error = Some(err.to_string());
                        None
                    }
                }
            }
            Message::Registered(result) => {
                self.login.busy = false;
                match result {
                    Ok(_) => {
                        self.login.registering = false;
                        self.login.password = LineInput::default();
                        self.login.confirm = LineInput::default();
                        self.login.focus = LoginField::Password;
                        self.login.notice = Some(REGISTERED_NOTICE.to_string());
                    }
                    Err(err) => self.login.error = Some(err.to_string()),
                }
                None
            }
            Message::Restored(result) => {
                match result {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        if self.screen == Screen::Dashboard {
                            self.leave_dashboard(Some(SESSION_EXPIRED));
                        }
                    }
                    Err(err) => log::warn!("Could not verify session: {}", err),
                }
                None
            }
            Message::Refreshed(result) => {
                self.refreshing = false;
                if self.screen != Screen::Dashboard {
                    return None;
                }
                let report = self.board.apply_refresh(result);
                if report.errors.iter().any(RequestError::is_unauthorized) {
                    self.leave_dashboard(Some(SESSION_EXPIRED));
                    return None;
                }
                self.clamp_rows();
                if std::mem::take(&mut self.refresh_queued) {
                    return self.request_refresh();
                }
                None
            }
            Message::Mutated { action, result } => {
                if matches!(&result, Err(err) if err.is_unauthorized()) {
                    self.leave_dashboard(Some(SESSION_EXPIRED));
                    return None;
                }
                match self.board.settle(action, result) {
                    Invalidation::Refresh => self.request_refresh(),
                    Invalidation::None => None,
                }
            }
            Message::Saved(result) => {
                if matches!(&result, Err(BoardError::Request(err)) if err.is_unauthorized()) {
                    self.leave_dashboard(Some(SESSION_EXPIRED));
                    return None;
                }
                if let Some(editor) = self.editor.as_mut() {
                    if editor.finish_submit(&result) {
                        self.editor = None;
                    }
                }
                match result {
                    Ok(Invalidation::Refresh) => self.request_refresh(),
                    _ => None,
                }
            }
            Message::UsersLoaded(users) => {
                if let Some(editor) = self.editor.as_mut() {
                    editor.set_users(users);
                }
                None
            }
        }
    }
}

fn spawn_job(client: &ApiClient, generation: u64, job: Job, tx: UnboundedSender<Reply>) {
    let client = client.clone();
    tokio::spawn(async move {
        let message = match job {
            Job::Login { username, password } => {
                Message::LoggedIn(auth::login(&client, &username, &password).await)
            }
            Job::Register(form) => Message::Registered(auth::register(&client, &form).await),
            Job::Restore => Message::Restored(auth::restore(&client).await),
            Job::Refresh => Message::Refreshed(TaskStore::fetch(&client).await),
            Job::Update(task) => Message::Mutated {
                action: "move task",
                result: board::submit_update(&client, &task).await,
            },
            Job::Delete(id) => Message::Mutated {
                action: "delete task",
                result: board::submit_delete(&client, id).await,
            },
            Job::Reorder(entries) => Message::Mutated {
                action: "reorder tasks",
                result: board::submit_reorder(&client, &entries).await,
            },
            Job::Save { form, existing } => {
                Message::Saved(editor::submit(&client, &form, existing.as_ref()).await)
            }
            Job::LoadUsers => Message::UsersLoaded(editor::load_users(&client).await),
        };
        // the receiver is gone once the UI has quit
        let _ = tx.send((generation, message));
    });
}

pub async fn run_tui(client: ApiClient) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(client.session().clone());
    let res = run_app(&mut terminal, &mut app, &client).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    client: &ApiClient,
) -> io::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    for job in app.startup_jobs() {
        spawn_job(client, app.generation(), job, tx.clone());
    }

    loop {
        terminal.draw(|f| ui(f, app))?;

        while let Ok(reply) = rx.try_recv() {
            if let Some(job) = app.receive(reply) {
                spawn_job(client, app.generation(), job, tx.clone());
            }
        }

        if tokio::task::block_in_place(|| event::poll(TICK))? {
            if let Event::Key(key) = event::read()? {
                if let Some(job) = app.handle_key(key) {
                    spawn_job(client, app.generation(), job, tx.clone());
                }
            }
        }

        app.on_tick();
        if app.should_quit {
            break;
        }
    }
    Ok(())
}

fn ui(f: &mut Frame, app: &mut App) {
    match app.screen {
        Screen::Login => render_login(f, app),
        Screen::Dashboard => render_dashboard(f, app),
    }
}

// Helper function to create centered rectangles for popups
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(LayoutDirection::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(LayoutDirection::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Text with a block cursor drawn at `input.cursor`.
fn cursor_spans(input: &LineInput, mask: bool) -> Vec<Span<'static>> {
    let (before, after) = input.split_at_cursor();
    let shown = |s: &str| {
        if mask {
            "*".repeat(s.chars().count())
        } else {
            s.to_string()
        }
    };
    let mut chars = after.chars();
    let cursor = chars
        .next()
        .map(|c| shown(&c.to_string()))
        .unwrap_or_else(|| " ".to_string());
    let rest: String = chars.collect();

    vec![
        Span::styled(shown(before), Style::default().fg(Color::White)),
        Span::styled(cursor, Style::default().bg(Color::Cyan).fg(Color::Black)),
        Span::styled(shown(&rest), Style::default().fg(Color::White)),
    ]
}

fn render_login(f: &mut Frame, app: &mut App) {
    let login = &app.login;
    let area = centered_rect(60, 50, f.area());
    let title = if login.registering { "Register" } else { "Log In" };

    let mut lines = vec![Line::from("")];
    for field in login.fields() {
        let input = login.input(*field);
        let label = Span::styled(
            format!("{:>18}: ", field.label()),
            Style::default().fg(Color::Cyan),
        );
        let mut spans = vec![label];
        if *field == login.focus {
            spans.extend(cursor_spans(input, field.is_secret()));
        } else if field.is_secret() {
            spans.push(Span::raw("*".repeat(input.content.chars().count())));
        } else {
            spans.push(Span::raw(input.content.clone()));
        }
        lines.push(Line::from(spans));
    }
    lines.push(Line::from(""));

    if login.busy {
        lines.push(Line::from(Span::styled(
            format!("{} Working...", SPINNER[app.tick % SPINNER.len()]),
            Style::default().fg(Color::Yellow),
        )));
    }
    if let Some(error) = &login.error {
        lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
    }
    if let Some(notice) = &login.notice {
        lines.push(Line::from(Span::styled(notice.clone(), Style::default().fg(Color::Green))));
    }
    lines.push(Line::from(""));
    let switch = if login.registering {
        "Ctrl+R: back to log in"
    } else {
        "Ctrl+R: create account"
    };
    lines.push(Line::from(Span::styled(
        format!("Tab: next field | Enter: submit | {} | Esc: quit", switch),
        Style::default().fg(Color::DarkGray),
    )));

    let block = Block::default()
        .title(format!("Task Board - {}", title))
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::White));
    let content = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });

    f.render_widget(Clear, area);
    f.render_widget(content, area);
}

fn priority_color(priority: &Priority) -> Color {
    match priority {
        Priority::High => Color::Red,
        Priority::Medium => Color::Yellow,
        Priority::Low => Color::Green,
        Priority::Other(_) => Color::White,
    }
}

fn task_item(task: &Task, dragging: bool) -> ListItem<'static> {
    let mut spans = Vec::new();
    if dragging {
        spans.push(Span::styled("» ", Style::default().fg(Color::Yellow)));
    }
    spans.push(Span::styled(
        task.title.clone(),
        Style::default().fg(Color::White),
    ));
    spans.push(Span::styled(
        format!(" [{}]", task.priority),
        Style::default().fg(priority_color(&task.priority)),
    ));

    let mut detail = Vec::new();
    if let Some(day) = task.due_day() {
        detail.push(format!("due {}", day.format("%Y-%m-%d")));
    }
    if let Some(user) = &task.assignee {
        detail.push(format!("@{}", user.username));
    }

    let mut lines = vec![Line::from(spans)];
    if !detail.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("  {}", detail.join("  ")),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let item = ListItem::new(lines);
    if dragging {
        item.style(Style::default().add_modifier(Modifier::REVERSED))
    } else {
        item
    }
}

fn render_dashboard(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(LayoutDirection::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(f.area());

    render_header(f, app, chunks[0]);

    if app.board.store().is_ready() {
        render_columns(f, app, chunks[1]);
    } else {
        let spinner = Paragraph::new(format!(
            "{} Loading tasks...",
            SPINNER[app.tick % SPINNER.len()]
        ))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
        f.render_widget(spinner, chunks[1]);
    }

    render_footer(f, app, chunks[2]);

    if let Some(id) = app.board.pending_delete() {
        let title = app
            .board
            .store()
            .find(id)
            .map(|t| t.title.clone())
            .unwrap_or_default();
        let popup_area = centered_rect(50, 20, f.area());
        let block = Block::default()
            .title("Delete Task")
            .borders(Borders::ALL)
            .style(Style::default().bg(Color::DarkGray));
        let content = Paragraph::new(format!(
            "Delete '{}'?\n\ny: delete | any other key: cancel",
            title
        ))
        .block(block)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::White));

        f.render_widget(Clear, popup_area);
        f.render_widget(content, popup_area);
    }

    if let Some(editor) = &app.editor {
        render_editor(f, editor);
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let stats = app.board.store().stats();
    let who = app
        .session
        .user()
        .map(|u| u.username)
        .unwrap_or_else(|| "...".to_string());

    let line = Line::from(vec![
        Span::styled(
            format!("To Do {}", stats.todo),
            Style::default().fg(Color::Blue),
        ),
        Span::raw("  "),
        Span::styled(
            format!("In Progress {}", stats.in_progress),
            Style::default().fg(Color::Yellow),
        ),
        Span::raw("  "),
        Span::styled(
            format!("Done {}", stats.done),
            Style::default().fg(Color::Green),
        ),
        Span::raw("  "),
        Span::styled(
            format!("Total {}", stats.total),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ]);

    let header = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Task Board | {}", who))
            .style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(header, area);
}

fn render_columns(f: &mut Frame, app: &mut App, area: Rect) {
    let areas = Layout::default()
        .direction(LayoutDirection::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(area);

    let dragged = match app.board.drag_state() {
        DragState::Dragging(id) => Some(id),
        DragState::Idle => None,
    };

    for (column, tasks) in app.board.columns() {
        let focused = column == app.column;
        let items: Vec<ListItem> = tasks
            .iter()
            .map(|task| task_item(task, dragged == Some(task.id)))
            .collect();

        let mut title = format!("{} ({})", column.title(), tasks.len());
        let border = match (focused, dragged.is_some()) {
            (true, true) => {
                title.push_str(" - drop here");
                Style::default().fg(Color::Yellow)
            }
            (true, false) => Style::default().fg(Color::Cyan),
            (false, _) => Style::default(),
        };

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .border_style(border),
            )
            .highlight_style(
                Style::default()
                    .bg(Color::LightGreen)
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol(">> ");

        let mut state = ListState::default();
        if focused && !tasks.is_empty() {
            state.select(Some(app.rows[column.index()]));
        }
        f.render_stateful_widget(list, areas[column.index()], &mut state);
    }
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let line = if let Some(notice) = app.board.notice() {
        Line::from(Span::styled(notice.to_string(), Style::default().fg(Color::Red)))
    } else if matches!(app.board.drag_state(), DragState::Dragging(_)) {
        Line::from("←/→: choose column | Enter: drop | Esc: cancel")
    } else {
        Line::from(
            "←/→: column | ↑/↓: task | m: move | n: new | e: edit | d: delete | K/J: reorder | r: refresh | L: log out | q: quit",
        )
    };
    let footer = Paragraph::new(line)
        .block(Block::default().borders(Borders::ALL))
        .style(Style::default().fg(Color::White));
    f.render_widget(footer, area);
}

fn render_editor(f: &mut Frame, editor: &TaskEditor) {
    let area = centered_rect(70, 60, f.area());

    let mut lines = vec![Line::from("")];
    for field in Field::ALL {
        let mut spans = vec![Span::styled(
            format!("{:>12}: ", field.label()),
            Style::default().fg(Color::Cyan),
        )];
        if field == editor.focus() && field.is_text() {
            spans.extend(cursor_spans(editor.input(), false));
        } else if field == editor.focus() {
            spans.push(Span::styled(
                format!("< {} >", editor.value(field)),
                Style::default().bg(Color::Cyan).fg(Color::Black),
            ));
        } else {
            spans.push(Span::raw(editor.value(field)));
        }
        lines.push(Line::from(spans));
    }
    lines.push(Line::from(""));

    if editor.is_submitting() {
        lines.push(Line::from(Span::styled("Saving...", Style::default().fg(Color::Yellow))));
    }
    if let Some(error) = editor.error() {
        lines.push(Line::from(Span::styled(error.to_string(), Style::default().fg(Color::Red))));
    }
    lines.push(Line::from(Span::styled(
        "Tab: next field | Space: cycle choice | Enter: save | Esc: cancel",
        Style::default().fg(Color::DarkGray),
    )));

    let block = Block::default()
        .title(editor.title())
        .borders(Borders::ALL)
        .style(Style::default().bg(Color::Black).fg(Color::White));
    let content = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });

    f.render_widget(Clear, area);
    f.render_widget(content, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStats;
    use crate::testing::{api_error, task, user};
    use ratatui::backend::TestBackend;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            assert!(app.handle_key(key(KeyCode::Char(c))).is_none());
        }
    }

    fn logged_in() -> App {
        let session = SessionHandle::in_memory();
        session.login(user(1, "ana"), "tok".to_string()).unwrap();
        App::new(session)
    }

    fn loaded(tasks: Vec<Task>) -> App {
        let mut app = logged_in();
        let jobs = app.startup_jobs();
        assert!(matches!(jobs.as_slice(), [Job::Restore, Job::Refresh]));
        let stats = TaskStats::from_tasks(&tasks);
        assert!(app
            .handle_message(Message::Refreshed(RefreshResult {
                tasks: Ok(tasks),
                stats: Ok(stats),
            }))
            .is_none());
        app
    }

    fn rendered(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|f| ui(f, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn starts_on_login_without_token() {
        let mut app = App::new(SessionHandle::in_memory());
        assert_eq!(app.screen, Screen::Login);
        assert!(app.startup_jobs().is_empty());
        assert!(rendered(&mut app).contains("Log In"));
    }

    #[test]
    fn login_submits_entered_credentials_and_opens_board() {
        let mut app = App::new(SessionHandle::in_memory());
        type_text(&mut app, "ana");
        app.handle_key(key(KeyCode::Tab));
        type_text(&mut app, "pw");

        let job = app.handle_key(key(KeyCode::Enter));
        assert!(matches!(job, Some(Job::Login { ref username, ref password })
            if username == "ana" && password == "pw"));
        // a second Enter while waiting does nothing
        assert!(app.handle_key(key(KeyCode::Enter)).is_none());

        let next = app.handle_message(Message::LoggedIn(Ok(user(1, "ana"))));
        assert!(matches!(next, Some(Job::Refresh)));
        assert_eq!(app.screen, Screen::Dashboard);
    }

    #[test]
    fn failed_login_shows_server_message() {
        let mut app = App::new(SessionHandle::in_memory());
        app.handle_message(Message::LoggedIn(Err(api_error(401, "Invalid credentials!").into())));
        assert_eq!(app.screen, Screen::Login);
        assert!(rendered(&mut app).contains("Invalid credentials!"));
    }

    #[test]
    fn register_with_mismatched_passwords_sends_nothing() {
        let mut app = App::new(SessionHandle::in_memory());
        app.handle_key(KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL));
        type_text(&mut app, "ana");
        app.handle_key(key(KeyCode::Tab));
        type_text(&mut app, "ana@example.com");
        app.handle_key(key(KeyCode::Tab));
        type_text(&mut app, "one");
        app.handle_key(key(KeyCode::Tab));
        type_text(&mut app, "two");

        assert!(app.handle_key(key(KeyCode::Enter)).is_none());
        assert_eq!(app.login.error.as_deref(), Some("Passwords do not match"));
    }

    #[test]
    fn registration_returns_to_login_with_notice() {
        let mut app = App::new(SessionHandle::in_memory());
        app.login.registering = true;
        app.handle_message(Message::Registered(Ok(user(2, "bruno"))));
        assert!(!app.login.registering);
        assert_eq!(app.login.notice.as_deref(), Some(REGISTERED_NOTICE));
        assert_eq!(app.screen, Screen::Login);
    }

    #[test]
    fn shows_spinner_until_first_refresh() {
        let mut app = logged_in();
        app.startup_jobs();
        assert!(rendered(&mut app).contains("Loading tasks"));

        app.handle_message(Message::Refreshed(RefreshResult {
            tasks: Ok(vec![task(1, "Write report", "todo")]),
            stats: Ok(TaskStats { todo: 1, in_progress: 0, done: 0, total: 1 }),
        }));
        let screen = rendered(&mut app);
        assert!(!screen.contains("Loading tasks"));
        assert!(screen.contains("To Do (1)"));
        assert!(screen.contains("Write report"));
    }

    #[test]
    fn move_key_then_drop_on_other_column_submits_update() {
        let mut app = loaded(vec![task(1, "a", "todo"), task(2, "b", "done")]);

        app.handle_key(key(KeyCode::Char('m')));
        assert_eq!(app.board().drag_state(), DragState::Dragging(TaskId(1)));
        app.handle_key(key(KeyCode::Right));

        let job = app.handle_key(key(KeyCode::Enter));
        match job {
            Some(Job::Update(task)) => {
                assert_eq!(task.id, TaskId(1));
                assert_eq!(task.status, crate::models::TaskStatus::InProgress);
                assert_eq!(task.title, "a");
            }
            other => panic!("expected update, got {:?}", other),
        }
        assert_eq!(app.board().drag_state(), DragState::Idle);
    }

    #[test]
    fn drop_on_own_column_sends_nothing() {
        let mut app = loaded(vec![task(1, "a", "todo")]);
        app.handle_key(key(KeyCode::Char('m')));
        assert!(app.handle_key(key(KeyCode::Enter)).is_none());
        assert_eq!(app.board().drag_state(), DragState::Idle);
    }

    #[test]
    fn successful_mutation_refreshes_and_failure_shows_notice() {
        let mut app = loaded(vec![task(1, "a", "todo")]);

        let next = app.handle_message(Message::Mutated {
            action: "move task",
            result: Ok(Invalidation::Refresh),
        });
        assert!(matches!(next, Some(Job::Refresh)));

        app.handle_message(Message::Refreshed(RefreshResult {
            tasks: Ok(vec![task(1, "a", "todo")]),
            stats: Ok(TaskStats { todo: 1, in_progress: 0, done: 0, total: 1 }),
        }));
        let next = app.handle_message(Message::Mutated {
            action: "move task",
            result: Err(api_error(500, "database is locked")),
        });
        assert!(next.is_none());
        assert!(app.board().notice().unwrap().contains("database is locked"));
        assert_eq!(app.board().store().tasks().len(), 1);
    }

    #[test]
    fn refreshes_do_not_overlap() {
        let mut app = loaded(vec![task(1, "a", "todo")]);

        assert!(matches!(app.handle_key(key(KeyCode::Char('r'))), Some(Job::Refresh)));
        assert!(app.handle_key(key(KeyCode::Char('r'))).is_none());

        let next = app.handle_message(Message::Refreshed(RefreshResult {
            tasks: Ok(vec![]),
            stats: Ok(TaskStats::default()),
        }));
        assert!(matches!(next, Some(Job::Refresh)));
    }

    #[test]
    fn delete_waits_for_confirmation() {
        let mut app = loaded(vec![task(1, "a", "todo")]);

        app.handle_key(key(KeyCode::Char('d')));
        assert!(rendered(&mut app).contains("Delete 'a'?"));
        assert!(app.handle_key(key(KeyCode::Char('n'))).is_none());
        assert_eq!(app.board().pending_delete(), None);

        app.handle_key(key(KeyCode::Char('d')));
        let job = app.handle_key(key(KeyCode::Char('y')));
        assert!(matches!(job, Some(Job::Delete(TaskId(1)))));
    }

    #[test]
    fn reorder_keys_plan_within_column() {
        let mut app = loaded(vec![task(1, "a", "todo"), task(2, "b", "todo")]);
        assert!(app.handle_key(key(KeyCode::Char('K'))).is_none());

        match app.handle_key(key(KeyCode::Char('J'))) {
            Some(Job::Reorder(entries)) => {
                let ids: Vec<TaskId> = entries.iter().map(|e| e.id).collect();
                assert_eq!(ids, vec![TaskId(2), TaskId(1)]);
            }
            other => panic!("expected reorder, got {:?}", other),
        }
    }

    #[test]
    fn editor_keeps_input_after_failed_save() {
        let mut app = loaded(vec![]);
        assert!(matches!(app.handle_key(key(KeyCode::Char('n'))), Some(Job::LoadUsers)));

        // empty title is rejected locally
        assert!(app.handle_key(key(KeyCode::Enter)).is_none());
        assert!(rendered(&mut app).contains("Title is required"));

        type_text(&mut app, "Ship it");
        let job = app.handle_key(key(KeyCode::Enter));
        assert!(matches!(job, Some(Job::Save { ref form, existing: None }) if form.title == "Ship it"));

        let next = app.handle_message(Message::Saved(Err(api_error(500, "boom").into())));
        assert!(next.is_none());
        let editor = app.editor.as_ref().unwrap();
        assert_eq!(editor.form().title, "Ship it");
        assert_eq!(editor.error(), Some("boom"));

        app.handle_key(key(KeyCode::Enter));
        let next = app.handle_message(Message::Saved(Ok(Invalidation::Refresh)));
        assert!(matches!(next, Some(Job::Refresh)));
        assert!(app.editor.is_none());
    }

    #[test]
    fn rejected_token_returns_to_login() {
        let mut app = loaded(vec![task(1, "a", "todo")]);
        app.handle_key(key(KeyCode::Char('r')));
        app.handle_message(Message::Refreshed(RefreshResult {
            tasks: Err(api_error(401, "Token is invalid!")),
            stats: Err(api_error(401, "Token is invalid!")),
        }));
        assert_eq!(app.screen, Screen::Login);
        assert!(!app.session.is_authenticated());
        assert_eq!(app.login.notice.as_deref(), Some(SESSION_EXPIRED));
    }

    #[test]
    fn refresh_from_previous_login_is_dropped() {
        let mut app = loaded(vec![task(1, "ana-task", "todo")]);
        assert!(matches!(app.handle_key(key(KeyCode::Char('r'))), Some(Job::Refresh)));
        let started_in = app.generation();

        app.handle_key(key(KeyCode::Char('L')));
        let on_login_screen = app.generation();
        let next = app.receive((on_login_screen, Message::LoggedIn(Ok(user(2, "bia")))));
        assert!(matches!(next, Some(Job::Refresh)));
        let bia = app.generation();
        assert_ne!(bia, started_in);

        let stale = app.receive((
            started_in,
            Message::Refreshed(RefreshResult {
                tasks: Ok(vec![task(1, "ana-task", "todo")]),
                stats: Ok(TaskStats { todo: 1, in_progress: 0, done: 0, total: 1 }),
            }),
        ));
        assert!(stale.is_none());
        assert!(app.board().store().tasks().is_empty());
        assert!(!app.board().store().is_ready());

        let stale = app.receive((
            started_in,
            Message::Mutated { action: "move task", result: Err(api_error(500, "boom")) },
        ));
        assert!(stale.is_none());
        assert_eq!(app.board().notice(), None);

        // bia's own refresh still lands
        app.receive((
            bia,
            Message::Refreshed(RefreshResult {
                tasks: Ok(vec![task(7, "bia-task", "done")]),
                stats: Ok(TaskStats { todo: 0, in_progress: 0, done: 1, total: 1 }),
            }),
        ));
        let titles: Vec<&str> = app.board().store().tasks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["bia-task"]);
    }

    #[test]
    fn logout_key_clears_session() {
        let mut app = loaded(vec![]);
        app.handle_key(key(KeyCode::Char('L')));
        assert_eq!(app.screen, Screen::Login);
        assert!(!app.session.is_authenticated());
    }
}
