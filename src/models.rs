use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub type UserId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status as the server reports it. Strings outside the three board
/// columns are kept verbatim so they survive a full-replacement update.
/// A null status is unknown (empty) and renders in no column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
    Unknown(String),
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Unknown(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, TaskStatus::Unknown(_))
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Todo
    }
}

impl From<String> for TaskStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "todo" => TaskStatus::Todo,
            "in_progress" => TaskStatus::InProgress,
            "done" => TaskStatus::Done,
            _ => TaskStatus::Unknown(raw),
        }
    }
}

impl From<Option<String>> for TaskStatus {
    fn from(raw: Option<String>) -> Self {
        raw.map(TaskStatus::from)
            .unwrap_or_else(|| TaskStatus::Unknown(String::new()))
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority. The API speaks `baixa`/`media`/`alta`; the English
/// names are accepted on input. A null priority reads as the default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum Priority {
    Low,
    Medium,
    High,
    Other(String),
}

impl Priority {
    pub const CHOICES: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(&self) -> &str {
        match self {
            Priority::Low => "baixa",
            Priority::Medium => "media",
            Priority::High => "alta",
            Priority::Other(raw) => raw,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Other(raw) => raw,
        }
    }

    /// Cycles through the three known priorities; unknown values restart at low.
    pub fn next(&self) -> Priority {
        match self {
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High | Priority::Other(_) => Priority::Low,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl From<String> for Priority {
    fn from(raw: String) -> Self {
        match raw.to_lowercase().as_str() {
            "baixa" | "low" => Priority::Low,
            "media" | "medium" => Priority::Medium,
            "alta" | "high" => Priority::High,
            _ => Priority::Other(raw),
        }
    }
}

impl From<Option<String>> for Priority {
    fn from(raw: Option<String>) -> Self {
        raw.map(Priority::from).unwrap_or_default()
    }
}

impl From<Priority> for String {
    fn from(priority: Priority) -> Self {
        priority.as_str().to_string()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn initial(&self) -> char {
        self.username
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('?')
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    #[serde(default)]
    pub assignee: Option<User>,
    /// Server fields the client does not interpret, sent back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    /// Full replacement copy with only the status changed.
    pub fn with_status(&self, status: TaskStatus) -> Task {
        Task {
            status,
            ..self.clone()
        }
    }

    /// Calendar date part of `due_date` (servers send either a date or a datetime).
    pub fn due_day(&self) -> Option<NaiveDate> {
        let raw = self.due_date.as_deref()?;
        let day = raw.split('T').next().unwrap_or(raw);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }
}

/// Server-computed counts. Fetched separately from the task list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    #[serde(default)]
    pub todo: u64,
    #[serde(default)]
    pub in_progress: u64,
    #[serde(default)]
    pub done: u64,
    #[serde(default)]
    pub total: u64,
}

impl TaskStats {
    /// Counts derivable from a task list, the way the server computes them.
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut stats = TaskStats {
            total: tasks.len() as u64,
            ..TaskStats::default()
        };
        for task in tasks {
            match task.status {
                TaskStatus::Todo => stats.todo += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Done => stats.done += 1,
                TaskStatus::Unknown(_) => {}
            }
        }
        stats
    }
}

/// Body of a create or edit submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub due_date: Option<String>,
    pub assigned_to: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderEntry {
    pub id: TaskId,
    pub status: TaskStatus,
    pub position: i64,
}

#[derive(Debug, Serialize)]
pub struct ReorderRequest<'a> {
    pub tasks: &'a [ReorderEntry],
}

#[derive(Debug, Serialize)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct NewAccount<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_json() -> Value {
        json!({
            "id": 1,
            "title": "Write report",
            "description": "",
            "priority": "alta",
            "status": "todo",
            "position": 2,
            "due_date": "2024-05-01T00:00:00",
            "assigned_to": 3,
            "assignee": {"id": 3, "username": "ana", "email": "ana@example.com"},
            "created_by": 1,
            "created_at": "2024-04-01T10:00:00"
        })
    }

    #[test]
    fn task_keeps_unmodelled_fields_on_reserialize() {
        let task: Task = serde_json::from_value(sample_json()).unwrap();
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.extra.get("created_by"), Some(&json!(1)));

        let back = serde_json::to_value(&task).unwrap();
        assert_eq!(back, sample_json());
    }

    #[test]
    fn unknown_status_is_preserved_verbatim() {
        let mut raw = sample_json();
        raw["status"] = json!("archived");
        let task: Task = serde_json::from_value(raw).unwrap();
        assert_eq!(task.status, TaskStatus::Unknown("archived".to_string()));
        assert!(!task.status.is_known());
        assert_eq!(serde_json::to_value(&task).unwrap()["status"], json!("archived"));
    }

    #[test]
    fn null_status_or_priority_spoils_only_that_task() {
        let mut broken = sample_json();
        broken["id"] = json!(2);
        broken["status"] = Value::Null;
        broken["priority"] = Value::Null;

        let tasks: Vec<Task> = serde_json::from_value(json!([sample_json(), broken])).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].status, TaskStatus::Todo);
        assert!(!tasks[1].status.is_known());
        assert_eq!(crate::board::Column::of(&tasks[1].status), None);
        assert_eq!(tasks[1].priority, Priority::Medium);
    }

    #[test]
    fn priority_accepts_english_and_writes_api_vocabulary() {
        assert_eq!(Priority::from("HIGH".to_string()), Priority::High);
        assert_eq!(Priority::from("baixa".to_string()), Priority::Low);
        assert_eq!(String::from(Priority::Medium), "media");
        assert_eq!(Priority::from("urgent".to_string()).as_str(), "urgent");
    }

    #[test]
    fn with_status_changes_only_status() {
        let task: Task = serde_json::from_value(sample_json()).unwrap();
        let moved = task.with_status(TaskStatus::Done);
        assert_eq!(moved.status, TaskStatus::Done);
        assert_eq!(Task { status: TaskStatus::Todo, ..moved }, task);
    }

    #[test]
    fn due_day_reads_date_and_datetime_forms() {
        let mut task: Task = serde_json::from_value(sample_json()).unwrap();
        assert_eq!(task.due_day(), NaiveDate::from_ymd_opt(2024, 5, 1));
        task.due_date = Some("2024-06-09".to_string());
        assert_eq!(task.due_day(), NaiveDate::from_ymd_opt(2024, 6, 9));
        task.due_date = None;
        assert_eq!(task.due_day(), None);
    }

    #[test]
    fn stats_from_tasks_counts_unknown_only_in_total() {
        let mut tasks = Vec::new();
        for (id, status) in [(1, "todo"), (2, "done"), (3, "done"), (4, "blocked")] {
            let mut raw = sample_json();
            raw["id"] = json!(id);
            raw["status"] = json!(status);
            tasks.push(serde_json::from_value::<Task>(raw).unwrap());
        }
        let stats = TaskStats::from_tasks(&tasks);
        assert_eq!(
            stats,
            TaskStats { todo: 1, in_progress: 0, done: 2, total: 4 }
        );
    }

    #[test]
    fn minimal_task_uses_defaults() {
        let task: Task = serde_json::from_value(json!({"id": 9, "title": "t", "status": "done"})).unwrap();
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.assigned_to, None);
        assert!(task.extra.is_empty());
    }
}
