//! Board reconciliation: column layout, the drag-and-drop state machine,
//! delete confirmation, and the mutate-then-invalidate contract.
//!
//! Columns are never stored. Each render filters the store's task list by
//! status, so a task's column can't disagree with its status. Mutations
//! are not applied locally; a successful one asks for a refresh and the
//! board shows the server's copy once it lands.

use std::fmt;
use std::str::FromStr;

use crate::api::{to_body, TaskApi};
use crate::error::RequestError;
use crate::models::{ReorderEntry, Task, TaskId, TaskStatus};
use crate::store::{RefreshReport, RefreshResult, TaskStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Todo,
    InProgress,
    Done,
}

impl Column {
    pub const ALL: [Column; 3] = [Column::Todo, Column::InProgress, Column::Done];

    pub fn status(self) -> TaskStatus {
        match self {
            Column::Todo => TaskStatus::Todo,
            Column::InProgress => TaskStatus::InProgress,
            Column::Done => TaskStatus::Done,
        }
    }

    /// Column a status renders in. Unrecognized statuses render nowhere.
    pub fn of(status: &TaskStatus) -> Option<Column> {
        match status {
            TaskStatus::Todo => Some(Column::Todo),
            TaskStatus::InProgress => Some(Column::InProgress),
            TaskStatus::Done => Some(Column::Done),
            TaskStatus::Unknown(_) => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Column::Todo => "To Do",
            Column::InProgress => "In Progress",
            Column::Done => "Done",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Column::Todo => 0,
            Column::InProgress => 1,
            Column::Done => 2,
        }
    }

    pub fn next(self) -> Column {
        Column::ALL[(self.index() + 1) % Column::ALL.len()]
    }

    pub fn previous(self) -> Column {
        Column::ALL[(self.index() + Column::ALL.len() - 1) % Column::ALL.len()]
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status().as_str())
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "todo" | "to_do" => Ok(Column::Todo),
            "in_progress" | "progress" | "doing" => Ok(Column::InProgress),
            "done" => Ok(Column::Done),
            other => Err(format!(
                "unknown column '{}': expected todo, in_progress or done",
                other
            )),
        }
    }
}

/// Tasks rendered in `column`: a status filter, stably ordered by
/// server position (unpositioned tasks last, in list order).
pub fn tasks_in(tasks: &[Task], column: Column) -> Vec<&Task> {
    let mut members: Vec<&Task> = tasks
        .iter()
        .filter(|task| Column::of(&task.status) == Some(column))
        .collect();
    members.sort_by_key(|task| task.position.unwrap_or(i64::MAX));
    members
}

pub fn columns(tasks: &[Task]) -> [(Column, Vec<&Task>); 3] {
    Column::ALL.map(|column| (column, tasks_in(tasks, column)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(TaskId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragEvent {
    Start(TaskId),
    Drop(Column),
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragEffect {
    None,
    /// Submit this full replacement of the dragged task.
    Update(Task),
}

/// Pure drag-and-drop step. Dropping always returns to `Idle`; only a drop
/// onto a column other than the task's current one produces an update.
pub fn transition(state: DragState, event: DragEvent, tasks: &[Task]) -> (DragState, DragEffect) {
    match event {
        DragEvent::Start(id) => {
            if tasks.iter().any(|task| task.id == id) {
                (DragState::Dragging(id), DragEffect::None)
            } else {
                (DragState::Idle, DragEffect::None)
            }
        }
        DragEvent::Cancel => (DragState::Idle, DragEffect::None),
        DragEvent::Drop(column) => {
            let DragState::Dragging(id) = state else {
                return (DragState::Idle, DragEffect::None);
            };
            let target = column.status();
            match tasks.iter().find(|task| task.id == id) {
                Some(task) if task.status != target => {
                    (DragState::Idle, DragEffect::Update(task.with_status(target)))
                }
                _ => (DragState::Idle, DragEffect::None),
            }
        }
    }
}

/// What the caller should do after a mutation settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    None,
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Entries for moving `id` one slot within its column, with positions
/// renumbered from 1. `None` when the move would fall off either end.
pub fn reorder_plan(tasks: &[Task], id: TaskId, direction: Direction) -> Option<Vec<ReorderEntry>> {
    let task = tasks.iter().find(|task| task.id == id)?;
    let column = Column::of(&task.status)?;
    let mut members = tasks_in(tasks, column);
    let from = members.iter().position(|task| task.id == id)?;
    let to = match direction {
        Direction::Up => from.checked_sub(1)?,
        Direction::Down if from + 1 < members.len() => from + 1,
        Direction::Down => return None,
    };
    members.swap(from, to);

    Some(
        members
            .iter()
            .enumerate()
            .map(|(i, task)| ReorderEntry {
                id: task.id,
                status: column.status(),
                position: i as i64 + 1,
            })
            .collect(),
    )
}

pub async fn submit_update<A: TaskApi + ?Sized>(api: &A, task: &Task) -> Result<Invalidation, RequestError> {
    let body = to_body(task)?;
    api.update_task(task.id, &body).await?;
    Ok(Invalidation::Refresh)
}

pub async fn submit_delete<A: TaskApi + ?Sized>(api: &A, id: TaskId) -> Result<Invalidation, RequestError> {
    api.delete_task(id).await?;
    Ok(Invalidation::Refresh)
}

pub async fn submit_reorder<A: TaskApi + ?Sized>(
    api: &A,
    entries: &[ReorderEntry],
) -> Result<Invalidation, RequestError> {
    api.reorder_tasks(entries).await?;
    Ok(Invalidation::Refresh)
}

/// Result of a board interaction that may have reached the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nothing was sent.
    Skipped,
    /// The mutation succeeded and the store was refreshed.
    Applied(RefreshReport),
}

/// Dashboard state: the task store plus transient interaction state.
#[derive(Debug, Default)]
pub struct Board {
    store: TaskStore,
    drag: DragState,
    pending_delete: Option<TaskId>,
    notice: Option<String>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TaskStore {
        &mut self.store
    }

    pub fn columns(&self) -> [(Column, Vec<&Task>); 3] {
        columns(self.store.tasks())
    }

    pub fn drag_state(&self) -> DragState {
        self.drag
    }

    /// Last failure worth showing inline, if any.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    fn step(&mut self, event: DragEvent) -> DragEffect {
        let (next, effect) = transition(self.drag, event, self.store.tasks());
        self.drag = next;
        effect
    }

    pub fn drag_start(&mut self, id: TaskId) {
        self.step(DragEvent::Start(id));
    }

    pub fn cancel_drag(&mut self) {
        self.step(DragEvent::Cancel);
    }

    /// Drop the held task on `column`. Drag state is cleared either way.
    pub fn drop_on(&mut self, column: Column) -> DragEffect {
        self.step(DragEvent::Drop(column))
    }

    /// Ask to delete `id`. Nothing is sent until [`Board::confirm_delete`].
    pub fn request_delete(&mut self, id: TaskId) -> Option<&Task> {
        let task = self.store.find(id)?;
        self.pending_delete = Some(id);
        Some(task)
    }

    pub fn pending_delete(&self) -> Option<TaskId> {
        self.pending_delete
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Hand out the confirmed deletion, clearing the pending confirmation.
    pub fn take_confirmed_delete(&mut self) -> Option<TaskId> {
        self.pending_delete.take()
    }

    /// Record how a mutation settled. Failures are logged and kept as the
    /// notice; the store is left as it was.
    pub fn settle(&mut self, action: &str, result: Result<Invalidation, RequestError>) -> Invalidation {
        match result {
            Ok(invalidation) => {
                self.notice = None;
                invalidation
            }
            Err(err) => {
                log::error!("Failed to {}: {}", action, err);
                self.notice = Some(format!("Failed to {}: {}", action, err));
                Invalidation::None
            }
        }
    }

    pub async fn invalidate<A: TaskApi + ?Sized>(
        &mut self,
        invalidation: Invalidation,
        api: &A,
    ) -> Option<RefreshReport> {
        match invalidation {
            Invalidation::None => None,
            Invalidation::Refresh => {
                let result = TaskStore::fetch(api).await;
                Some(self.apply_refresh(result))
            }
        }
    }

    /// Apply a completed fetch, surfacing its first failure as the notice.
    pub fn apply_refresh(&mut self, result: RefreshResult) -> RefreshReport {
        let report = self.store.apply(result);
        if let Some(message) = report.message() {
            self.notice = Some(message);
        }
        report
    }

    async fn run<A: TaskApi + ?Sized>(
        &mut self,
        action: &str,
        api: &A,
        result: Result<Invalidation, RequestError>,
    ) -> Result<Outcome, RequestError> {
        if let Err(err) = &result {
            self.settle(action, Err(err.clone()));
            return Err(err.clone());
        }
        let invalidation = self.settle(action, result);
        let report = self.invalidate(invalidation, api).await.unwrap_or_default();
        Ok(Outcome::Applied(report))
    }

    /// Drop the held task on `column` and, if that changes its status,
    /// submit the update and refresh on success.
    pub async fn move_dragged<A: TaskApi + ?Sized>(
        &mut self,
        column: Column,
        api: &A,
    ) -> Result<Outcome, RequestError> {
        match self.drop_on(column) {
            DragEffect::None => Ok(Outcome::Skipped),
            DragEffect::Update(task) => {
                let result = submit_update(api, &task).await;
                self.run("move task", api, result).await
            }
        }
    }

    pub async fn confirm_delete<A: TaskApi + ?Sized>(&mut self, api: &A) -> Result<Outcome, RequestError> {
        let Some(id) = self.take_confirmed_delete() else {
            return Ok(Outcome::Skipped);
        };
        let result = submit_delete(api, id).await;
        self.run("delete task", api, result).await
    }

    pub async fn reorder<A: TaskApi + ?Sized>(
        &mut self,
        id: TaskId,
        direction: Direction,
        api: &A,
    ) -> Result<Outcome, RequestError> {
        let Some(entries) = reorder_plan(self.store.tasks(), id, direction) else {
            return Ok(Outcome::Skipped);
        };
        let result = submit_reorder(api, &entries).await;
        self.run("reorder tasks", api, result).await
    }
}
