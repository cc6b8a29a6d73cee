//! In-process stand-in for the task API, used by store, board, and editor tests.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::api::TaskApi;
use crate::error::RequestError;
use crate::models::{ReorderEntry, Task, TaskId, TaskPayload, TaskStats, TaskStatus, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Op {
    ListTasks,
    Stats,
    Get,
    ByStatus,
    Create,
    Update,
    Delete,
    Reorder,
    Users,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Call {
    pub op: Op,
    pub id: Option<TaskId>,
    pub body: Option<Value>,
}

#[derive(Default)]
struct FakeState {
    tasks: Vec<Task>,
    users: Vec<User>,
    stats_override: Option<TaskStats>,
    failures: HashMap<Op, RequestError>,
    calls: Vec<Call>,
    next_id: i64,
}

/// Behaves like a tiny server: mutations change the task list that later
/// list calls return, and stats are derived from it unless overridden.
#[derive(Default)]
pub(crate) struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let next_id = tasks.iter().map(|t| t.id.0).max().unwrap_or(0) + 1;
        FakeApi {
            state: Mutex::new(FakeState {
                tasks,
                next_id,
                ..FakeState::default()
            }),
        }
    }

    pub fn set_users(&self, users: Vec<User>) {
        self.state.lock().unwrap().users = users;
    }

    pub fn set_stats(&self, stats: TaskStats) {
        self.state.lock().unwrap().stats_override = Some(stats);
    }

    pub fn fail(&self, op: Op, err: RequestError) {
        self.state.lock().unwrap().failures.insert(op, err);
    }

    pub fn heal(&self, op: Op) {
        self.state.lock().unwrap().failures.remove(&op);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.op == op)
            .count()
    }

    pub fn server_tasks(&self) -> Vec<Task> {
        self.state.lock().unwrap().tasks.clone()
    }

    fn record(&self, op: Op, id: Option<TaskId>, body: Option<Value>) -> Result<(), RequestError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call { op, id, body });
        match state.failures.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn not_found() -> RequestError {
    RequestError::Api {
        status: 404,
        message: "HTTP error! status: 404".to_string(),
    }
}

#[async_trait]
impl TaskApi for FakeApi {
    async fn list_tasks(&self) -> Result<Vec<Task>, RequestError> {
        self.record(Op::ListTasks, None, None)?;
        Ok(self.server_tasks())
    }

    async fn task_stats(&self) -> Result<TaskStats, RequestError> {
        self.record(Op::Stats, None, None)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .stats_override
            .unwrap_or_else(|| TaskStats::from_tasks(&state.tasks)))
    }

    async fn get_task(&self, id: TaskId) -> Result<Task, RequestError> {
        self.record(Op::Get, Some(id), None)?;
        self.server_tasks()
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(not_found)
    }

    async fn tasks_by_status(&self, status: &TaskStatus) -> Result<Vec<Task>, RequestError> {
        self.record(Op::ByStatus, None, Some(json!(status.as_str())))?;
        let mut tasks: Vec<Task> = self
            .server_tasks()
            .into_iter()
            .filter(|t| &t.status == status)
            .collect();
        tasks.sort_by_key(|t| t.position.unwrap_or(i64::MAX));
        Ok(tasks)
    }

    async fn create_task(&self, payload: &TaskPayload) -> Result<Value, RequestError> {
        let body = serde_json::to_value(payload).unwrap();
        self.record(Op::Create, None, Some(body.clone()))?;
        let mut state = self.state.lock().unwrap();
        let mut created = body;
        created["id"] = json!(state.next_id);
        state.next_id += 1;
        let task: Task = serde_json::from_value(created.clone()).unwrap();
        state.tasks.push(task);
        Ok(created)
    }

    async fn update_task(&self, id: TaskId, body: &Value) -> Result<Value, RequestError> {
        self.record(Op::Update, Some(id), Some(body.clone()))?;
        let mut state = self.state.lock().unwrap();
        let slot = state
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(not_found)?;
        let mut merged = serde_json::to_value(&*slot).unwrap();
        if let (Some(target), Some(fields)) = (merged.as_object_mut(), body.as_object()) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        merged["id"] = json!(id.0);
        *slot = serde_json::from_value(merged.clone()).unwrap();
        Ok(merged)
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), RequestError> {
        self.record(Op::Delete, Some(id), None)?;
        let mut state = self.state.lock().unwrap();
        let before = state.tasks.len();
        state.tasks.retain(|t| t.id != id);
        if state.tasks.len() == before {
            return Err(not_found());
        }
        Ok(())
    }

    async fn reorder_tasks(&self, entries: &[ReorderEntry]) -> Result<(), RequestError> {
        self.record(Op::Reorder, None, Some(serde_json::to_value(entries).unwrap()))?;
        let mut state = self.state.lock().unwrap();
        for entry in entries {
            if let Some(task) = state.tasks.iter_mut().find(|t| t.id == entry.id) {
                task.status = entry.status.clone();
                task.position = Some(entry.position);
            }
        }
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, RequestError> {
        self.record(Op::Users, None, None)?;
        Ok(self.state.lock().unwrap().users.clone())
    }
}

pub(crate) fn task(id: i64, title: &str, status: &str) -> Task {
    serde_json::from_value(json!({
        "id": id,
        "title": title,
        "description": "",
        "priority": "media",
        "status": status,
        "position": null,
        "due_date": null,
        "assigned_to": null,
        "assignee": null,
        "created_by": 1,
        "created_at": "2024-04-01T10:00:00"
    }))
    .unwrap()
}

pub(crate) fn user(id: i64, username: &str) -> User {
    User {
        id,
        username: username.to_string(),
        email: format!("{username}@example.com"),
        extra: Map::new(),
    }
}

pub(crate) fn api_error(status: u16, message: &str) -> RequestError {
    RequestError::Api {
        status,
        message: message.to_string(),
    }
}
