//! In-memory task list and stats for the dashboard.
//!
//! The store is only ever written from a completed fetch. A refresh issues
//! the list and stats requests concurrently and applies both results in one
//! synchronous step, so no reader observes a half-applied refresh. A half
//! that failed leaves its previous collection in place.

use crate::api::TaskApi;
use crate::error::RequestError;
use crate::models::{Task, TaskId, TaskStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// No refresh has completed yet; the board shows a spinner.
    #[default]
    Loading,
    Ready,
}

/// Outcome of one concurrent list + stats fetch, not yet applied.
#[derive(Debug, Clone)]
pub struct RefreshResult {
    pub tasks: Result<Vec<Task>, RequestError>,
    pub stats: Result<TaskStats, RequestError>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshReport {
    pub tasks_updated: bool,
    pub stats_updated: bool,
    pub errors: Vec<RequestError>,
}

impl RefreshReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// First failure, for display next to the board.
    pub fn message(&self) -> Option<String> {
        self.errors.first().map(|e| e.to_string())
    }
}

#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
    stats: TaskStats,
    state: LoadState,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch tasks and stats concurrently. Completes once both have resolved.
    pub async fn fetch<A: TaskApi + ?Sized>(api: &A) -> RefreshResult {
        let (tasks, stats) = tokio::join!(api.list_tasks(), api.task_stats());
        RefreshResult { tasks, stats }
    }

    pub fn apply(&mut self, result: RefreshResult) -> RefreshReport {
        let mut report = RefreshReport::default();

        match result.tasks {
            Ok(tasks) => {
                log::debug!("Loaded {} tasks", tasks.len());
                self.tasks = tasks;
                report.tasks_updated = true;
            }
            Err(err) => {
                log::error!("Failed to fetch tasks: {}", err);
                report.errors.push(err);
            }
        }

        match result.stats {
            Ok(stats) => {
                self.stats = stats;
                report.stats_updated = true;
            }
            Err(err) => {
                log::error!("Failed to fetch task stats: {}", err);
                report.errors.push(err);
            }
        }

        // Ready once the first refresh has finished, whatever its outcome.
        self.state = LoadState::Ready;
        report
    }

    pub async fn refresh<A: TaskApi + ?Sized>(&mut self, api: &A) -> RefreshReport {
        let result = Self::fetch(api).await;
        self.apply(result)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn stats(&self) -> TaskStats {
        self.stats
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == LoadState::Ready
    }

    pub fn find(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Whether the stats agree with the counts derivable from the task list.
    pub fn is_consistent(&self) -> bool {
        TaskStats::from_tasks(&self.tasks) == self.stats
    }
}
