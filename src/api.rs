//! HTTP client for the remote task API.
//!
//! Every call carries the session's bearer token when one is present and
//! every failure is folded into a [`RequestError`]. Nothing is retried,
//! cached, or deduplicated.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::{endpoints, Config};
use crate::error::RequestError;
use crate::models::{ReorderEntry, ReorderRequest, Task, TaskId, TaskPayload, TaskStats, TaskStatus, User};
use crate::session::SessionHandle;

/// The task operations the store, board, and editor depend on.
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn list_tasks(&self) -> Result<Vec<Task>, RequestError>;

    async fn task_stats(&self) -> Result<TaskStats, RequestError>;

    async fn get_task(&self, id: TaskId) -> Result<Task, RequestError>;

    async fn tasks_by_status(&self, status: &TaskStatus) -> Result<Vec<Task>, RequestError>;

    async fn create_task(&self, payload: &TaskPayload) -> Result<Value, RequestError>;

    /// Full replacement of the task addressed by `id`.
    async fn update_task(&self, id: TaskId, body: &Value) -> Result<Value, RequestError>;

    async fn delete_task(&self, id: TaskId) -> Result<(), RequestError>;

    async fn reorder_tasks(&self, entries: &[ReorderEntry]) -> Result<(), RequestError>;

    async fn list_users(&self) -> Result<Vec<User>, RequestError>;
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: SessionHandle,
}

impl ApiClient {
    pub fn new(config: &Config, session: SessionHandle) -> Result<Self, RequestError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(ApiClient {
            http,
            base_url: config.api_url.clone(),
            session,
        })
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue one request and return the decoded JSON body. An empty body
    /// decodes to `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Value, RequestError> {
        let result = self.send(method.clone(), endpoint, body).await;
        if let Err(err) = &result {
            log::error!("API request error: {} {}: {}", method, endpoint, err);
        }
        result
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Value, RequestError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut builder = self
            .http
            .request(method, &url)
            .header(CONTENT_TYPE, "application/json");

        if let Some(token) = self.session.token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        let parsed = if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            Ok(Value::Null)
        } else {
            serde_json::from_slice::<Value>(&bytes)
        };

        if !status.is_success() {
            let message = parsed
                .ok()
                .as_ref()
                .and_then(|data| data.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
            return Err(RequestError::Api {
                status: status.as_u16(),
                message,
            });
        }

        parsed.map_err(|e| RequestError::Network(format!("could not parse response: {e}")))
    }

    pub async fn request_as<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<T, RequestError> {
        let value = self.request(method, endpoint, body).await?;
        serde_json::from_value(value).map_err(|e| {
            let err = RequestError::Network(format!("unexpected response from {endpoint}: {e}"));
            log::error!("API request error: {}", err);
            err
        })
    }

    pub async fn current_user(&self) -> Result<User, RequestError> {
        self.request_as(Method::GET, endpoints::ME, None).await
    }
}

/// JSON body for `value`. Failure is local and reported as `Encode`.
pub fn to_body<T: serde::Serialize>(value: &T) -> Result<Value, RequestError> {
    Ok(serde_json::to_value(value)?)
}

fn task_path(id: TaskId) -> String {
    format!("{}/{}", endpoints::TASKS, id)
}

#[async_trait]
impl TaskApi for ApiClient {
    async fn list_tasks(&self) -> Result<Vec<Task>, RequestError> {
        self.request_as(Method::GET, endpoints::TASKS, None).await
    }

    async fn task_stats(&self) -> Result<TaskStats, RequestError> {
        self.request_as(Method::GET, endpoints::TASKS_STATS, None).await
    }

    async fn get_task(&self, id: TaskId) -> Result<Task, RequestError> {
        self.request_as(Method::GET, &task_path(id), None).await
    }

    async fn tasks_by_status(&self, status: &TaskStatus) -> Result<Vec<Task>, RequestError> {
        let path = format!("{}/{}", endpoints::TASKS_BY_STATUS, status.as_str());
        self.request_as(Method::GET, &path, None).await
    }

    async fn create_task(&self, payload: &TaskPayload) -> Result<Value, RequestError> {
        let body = to_body(payload)?;
        self.request(Method::POST, endpoints::TASKS, Some(&body)).await
    }

    async fn update_task(&self, id: TaskId, body: &Value) -> Result<Value, RequestError> {
        self.request(Method::PUT, &task_path(id), Some(body)).await
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), RequestError> {
        self.request(Method::DELETE, &task_path(id), None).await?;
        Ok(())
    }

    async fn reorder_tasks(&self, entries: &[ReorderEntry]) -> Result<(), RequestError> {
        let body = to_body(&ReorderRequest { tasks: entries })?;
        self.request(Method::POST, endpoints::TASKS_REORDER, Some(&body))
            .await?;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, RequestError> {
        self.request_as(Method::GET, endpoints::USERS, None).await
    }
}
