use chrono::NaiveDate;

use crate::api::{to_body, TaskApi};
use crate::board::Invalidation;
use crate::error::{BoardError, Result};
use crate::models::{Priority, Task, TaskPayload, TaskStatus, User, UserId};

/// Single-line text input with a cursor, counted in chars.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineInput {
    pub content: String,
    pub cursor: usize,
}

impl LineInput {
    pub fn new(content: &str) -> Self {
        LineInput {
            content: content.to_string(),
            cursor: content.chars().count(),
        }
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }

    fn len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn insert_char(&mut self, c: char) {
        if self.cursor > self.len() {
            self.cursor = self.len();
        }
        let at = self.byte_index(self.cursor);
        self.content.insert(at, c);
        self.cursor += 1;
    }

    pub fn delete_char(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let at = self.byte_index(self.cursor - 1);
        self.content.remove(at);
        self.cursor -= 1;
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        if self.cursor < self.len() {
            self.cursor += 1;
        }
    }

    pub fn move_to_start(&mut self) {
        self.cursor = 0;
    }

    pub fn move_to_end(&mut self) {
        self.cursor = self.len();
    }

    /// Content split around the cursor, for rendering.
    pub fn split_at_cursor(&self) -> (&str, &str) {
        self.content.split_at(self.byte_index(self.cursor))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Description,
    Priority,
    Status,
    DueDate,
    AssignedTo,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Title,
        Field::Description,
        Field::Priority,
        Field::Status,
        Field::DueDate,
        Field::AssignedTo,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Field::Title => "Title *",
            Field::Description => "Description",
            Field::Priority => "Priority",
            Field::Status => "Status",
            Field::DueDate => "Due date (YYYY-MM-DD)",
            Field::AssignedTo => "Assignee",
        }
    }

    /// Free-text fields are typed into; the others cycle through choices.
    pub fn is_text(self) -> bool {
        matches!(self, Field::Title | Field::Description | Field::DueDate)
    }

    fn position(self) -> usize {
        Field::ALL.iter().position(|f| *f == self).unwrap_or(0)
    }

    pub fn next(self) -> Field {
        Field::ALL[(self.position() + 1) % Field::ALL.len()]
    }

    pub fn previous(self) -> Field {
        Field::ALL[(self.position() + Field::ALL.len() - 1) % Field::ALL.len()]
    }
}

/// Raw form values as entered. Empty optional fields mean "no value".
#[derive(Debug, Clone, PartialEq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub due_date: String,
    pub assigned_to: String,
}

impl Default for TaskForm {
    fn default() -> Self {
        TaskForm {
            title: String::new(),
            description: String::new(),
            priority: Priority::Medium,
            status: TaskStatus::Todo,
            due_date: String::new(),
            assigned_to: String::new(),
        }
    }
}

impl TaskForm {
    pub fn from_task(task: &Task) -> Self {
        let due_date = task
            .due_date
            .as_deref()
            .map(|raw| raw.split('T').next().unwrap_or(raw).to_string())
            .unwrap_or_default();
        TaskForm {
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            priority: task.priority.clone(),
            status: task.status.clone(),
            due_date,
            assigned_to: task.assigned_to.map(|id| id.to_string()).unwrap_or_default(),
        }
    }

    fn text(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Description => &self.description,
            Field::DueDate => &self.due_date,
            Field::AssignedTo => &self.assigned_to,
            Field::Priority => self.priority.as_str(),
            Field::Status => self.status.as_str(),
        }
    }

    fn set_text(&mut self, field: Field, value: String) {
        match field {
            Field::Title => self.title = value,
            Field::Description => self.description = value,
            Field::DueDate => self.due_date = value,
            Field::AssignedTo => self.assigned_to = value,
            Field::Priority | Field::Status => {}
        }
    }

    /// Check the form and build the payload to transmit. Empty optional
    /// fields become `None` rather than empty strings.
    pub fn validate(&self) -> Result<TaskPayload> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(BoardError::validation("Title is required"));
        }

        let due_date = match self.due_date.trim() {
            "" => None,
            raw => {
                let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                    BoardError::validation(format!("Invalid due date '{}': use YYYY-MM-DD", raw))
                })?;
                Some(day.format("%Y-%m-%d").to_string())
            }
        };

        let assigned_to = match self.assigned_to.trim() {
            "" => None,
            raw => Some(raw.parse::<UserId>().map_err(|_| {
                BoardError::validation(format!("Invalid assignee '{}': expected a user id", raw))
            })?),
        };

        Ok(TaskPayload {
            title: title.to_string(),
            description: self.description.clone(),
            priority: self.priority.clone(),
            status: self.status.clone(),
            due_date,
            assigned_to,
        })
    }
}

/// Validate and send a form: create when `existing` is `None`, otherwise a
/// full replacement of `existing`. Validation failures never reach the API.
pub async fn submit<A: TaskApi + ?Sized>(
    api: &A,
    form: &TaskForm,
    existing: Option<&Task>,
) -> Result<Invalidation> {
    let payload = form.validate()?;
    match existing {
        None => {
            api.create_task(&payload).await?;
        }
        Some(task) => {
            let body = to_body(&payload)?;
            api.update_task(task.id, &body).await?;
        }
    }
    Ok(Invalidation::Refresh)
}

/// Users for the assignee picker. Failure is logged and yields none.
pub async fn load_users<A: TaskApi + ?Sized>(api: &A) -> Vec<User> {
    match api.list_users().await {
        Ok(users) => users,
        Err(err) => {
            log::error!("Failed to fetch users: {}", err);
            Vec::new()
        }
    }
}

/// The create/edit surface. Keeps entered values until it is closed, so a
/// failed submit loses nothing.
#[derive(Debug, Clone)]
pub struct TaskEditor {
    form: TaskForm,
    editing: Option<Task>,
    focus: Field,
    input: LineInput,
    users: Vec<User>,
    error: Option<String>,
    submitting: bool,
}

impl TaskEditor {
    pub fn create() -> Self {
        Self::open(TaskForm::default(), None)
    }

    pub fn edit(task: &Task) -> Self {
        Self::open(TaskForm::from_task(task), Some(task.clone()))
    }

    fn open(form: TaskForm, editing: Option<Task>) -> Self {
        let input = LineInput::new(&form.title);
        TaskEditor {
            form,
            editing,
            focus: Field::Title,
            input,
            users: Vec::new(),
            error: None,
            submitting: false,
        }
    }

    pub fn title(&self) -> &'static str {
        if self.editing.is_some() {
            "Edit Task"
        } else {
            "New Task"
        }
    }

    pub fn editing(&self) -> Option<&Task> {
        self.editing.as_ref()
    }

    pub fn focus(&self) -> Field {
        self.focus
    }

    pub fn input(&self) -> &LineInput {
        &self.input
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn set_users(&mut self, users: Vec<User>) {
        self.users = users;
    }

    /// Form values including whatever is in the focused input.
    pub fn form(&self) -> TaskForm {
        let mut form = self.form.clone();
        if self.focus.is_text() {
            form.set_text(self.focus, self.input.content.clone());
        }
        form
    }

    /// Display text for a field.
    pub fn value(&self, field: Field) -> String {
        let form = self.form();
        match field {
            Field::Priority => form.priority.label().to_string(),
            Field::AssignedTo => {
                let raw = form.assigned_to.trim();
                if raw.is_empty() {
                    return "(nobody)".to_string();
                }
                self.users
                    .iter()
                    .find(|u| u.id.to_string() == raw)
                    .map(|u| u.username.clone())
                    .unwrap_or_else(|| format!("user #{}", raw))
            }
            other => form.text(other).to_string(),
        }
    }

    fn commit(&mut self) {
        if self.focus.is_text() {
            self.form.set_text(self.focus, self.input.content.clone());
        }
    }

    fn focus_on(&mut self, field: Field) {
        self.commit();
        self.focus = field;
        self.input = LineInput::new(self.form.text(field));
    }

    pub fn focus_next(&mut self) {
        self.focus_on(self.focus.next());
    }

    pub fn focus_previous(&mut self) {
        self.focus_on(self.focus.previous());
    }

    pub fn insert_char(&mut self, c: char) {
        if self.focus.is_text() {
            self.input.insert_char(c);
        } else if c == ' ' {
            self.cycle();
        }
    }

    pub fn delete_char(&mut self) {
        if self.focus.is_text() {
            self.input.delete_char();
        }
    }

    pub fn move_cursor_left(&mut self) {
        self.input.move_cursor_left();
    }

    pub fn move_cursor_right(&mut self) {
        self.input.move_cursor_right();
    }

    /// Step a choice field to its next value.
    pub fn cycle(&mut self) {
        match self.focus {
            Field::Priority => self.form.priority = self.form.priority.next(),
            Field::Status => {
                self.form.status = match self.form.status {
                    TaskStatus::Todo => TaskStatus::InProgress,
                    TaskStatus::InProgress => TaskStatus::Done,
                    TaskStatus::Done | TaskStatus::Unknown(_) => TaskStatus::Todo,
                }
            }
            Field::AssignedTo => {
                let current = self.form.assigned_to.trim().to_string();
                let ids: Vec<String> = self.users.iter().map(|u| u.id.to_string()).collect();
                let next = match ids.iter().position(|id| *id == current) {
                    None if current.is_empty() => ids.first().cloned(),
                    None => None,
                    Some(i) => ids.get(i + 1).cloned(),
                };
                self.form.assigned_to = next.unwrap_or_default();
            }
            _ => {}
        }
    }

    /// Validate locally. On failure the message is shown and nothing is sent.
    pub fn begin_submit(&mut self) -> Option<(TaskForm, Option<Task>)> {
        self.commit();
        if let Err(err) = self.form.validate() {
            self.error = Some(err.to_string());
            return None;
        }
        self.error = None;
        self.submitting = true;
        Some((self.form.clone(), self.editing.clone()))
    }

    /// Record the outcome of a submit started with [`TaskEditor::begin_submit`].
    /// Returns true when the surface should close.
    pub fn finish_submit(&mut self, result: &Result<Invalidation>) -> bool {
        self.submitting = false;
        match result {
            Ok(_) => true,
            Err(err) => {
                log::error!("Failed to save task: {}", err);
                self.error = Some(err.to_string());
                false
            }
        }
    }

    pub async fn submit<A: TaskApi + ?Sized>(&mut self, api: &A) -> Result<Invalidation> {
        let Some((form, existing)) = self.begin_submit() else {
            let message = self.error.clone().unwrap_or_default();
            return Err(BoardError::Validation(message));
        };
        let result = submit(api, &form, existing.as_ref()).await;
        self.finish_submit(&result);
        result
    }
}
