use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Endpoint paths of the remote task API.
pub mod endpoints {
    pub const LOGIN: &str = "/api/login";
    pub const REGISTER: &str = "/api/register";
    pub const ME: &str = "/api/me";
    pub const USERS: &str = "/api/users";
    pub const TASKS: &str = "/api/tasks";
    pub const TASKS_STATS: &str = "/api/tasks/stats";
    pub const TASKS_BY_STATUS: &str = "/api/tasks/by-status";
    pub const TASKS_REORDER: &str = "/api/tasks/reorder";
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub data_dir: PathBuf,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("TASKBOARD_API_URL")
            .or_else(|| lookup("VITE_API_URL"))
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let data_dir = match lookup("TASKBOARD_HOME") {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => {
                let home_dir = lookup("HOME").unwrap_or_else(|| ".".to_string());
                PathBuf::from(home_dir).join(".taskboard")
            }
        };

        let timeout = lookup("TASKBOARD_TIMEOUT_SECS")
            .and_then(|secs| secs.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Config {
            api_url: normalize_base_url(&api_url),
            data_dir,
            timeout: Duration::from_secs(timeout),
        }
    }

    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = normalize_base_url(api_url);
        self
    }

    pub fn session_db_path(&self) -> PathBuf {
        self.data_dir.join("session.db")
    }

    pub fn log_file_path(&self) -> PathBuf {
        self.data_dir.join("taskboard.log")
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
