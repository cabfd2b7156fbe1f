//! HTTP client for the remote spreadsheet store
//!
//! The remote is a small web app in front of a spreadsheet. Every call is a
//! single request against one base URL, selecting the collection with a
//! `path` query parameter:
//!
//! - `GET  {base}?path=projects` → `{"projects": [...]}`
//! - `GET  {base}?path=tasks`    → `{"tasks": [...]}`
//! - `POST {base}?path=projects` with one project as the body
//! - `POST {base}?path=tasks`    with one task as the body
//! - `GET  {base}?path=health`   → any JSON object
//!
//! The web app reports script failures as `200 {"error": "..."}`, which is
//! surfaced as [`Error::RemoteError`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{DEFAULT_SYNC_TIMEOUT_SECS, SyncConfig};
use crate::error::{Error, Result};
use crate::model::{Project, Task, decode_records};

const PROJECTS_PATH: &str = "projects";
const TASKS_PATH: &str = "tasks";
const HEALTH_PATH: &str = "health";

/// Record transport used by the sync coordinator.
///
/// Implementations must not hold any local state and must report every
/// failure as an `Err`; undecodable records are filtered out of fetches.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_projects(&self) -> Result<Vec<Project>>;
    async fn fetch_tasks(&self) -> Result<Vec<Task>>;
    async fn push_project(&self, project: &Project) -> Result<()>;
    async fn push_task(&self, task: &Task) -> Result<()>;
}

/// reqwest-backed [`RemoteStore`]
#[derive(Clone)]
pub struct SyncClient {
    http_client: HttpClient,
    base_url: String,
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Builder for creating a SyncClient
#[derive(Debug, Default)]
pub struct SyncClientBuilder {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

impl SyncClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the endpoint and timeout from configuration
    pub fn config(mut self, config: &SyncConfig) -> Self {
        self.base_url = config.resolved_base_url();
        self.timeout_secs = Some(config.timeout_secs);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn build(self) -> Result<SyncClient> {
        let base_url = self
            .base_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .ok_or(Error::SyncNotConfigured)?;

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::ConfigError(format!(
                "Sync URL must start with http:// or https://, got '{}'",
                base_url
            )));
        }

        let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_SYNC_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(Error::ConfigError(
                "Sync timeout must be greater than zero".to_string(),
            ));
        }

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        Ok(SyncClient {
            http_client,
            base_url,
        })
    }
}

impl SyncClient {
    /// Create a client for `base_url` with the default timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        SyncClientBuilder::new().base_url(base_url).build()
    }

    /// Create a client from configuration; fails if no URL is configured
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        SyncClientBuilder::new().config(config).build()
    }

    pub fn builder() -> SyncClientBuilder {
        SyncClientBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the remote answers
    pub async fn health(&self) -> Result<()> {
        let body = self.get_json(HEALTH_PATH).await?;
        check_remote_error(&body)
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        debug!(base_url = %self.base_url, path, "Fetching from remote store");

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[("path", path)])
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(path, status = status.as_u16(), "Remote fetch failed");
            return Err(Error::RemoteStatus(status.as_u16()));
        }

        let text = response.text().await.map_err(Error::NetworkError)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::MalformedResponse(format!("{} response is not JSON: {}", path, e)))
    }

    async fn fetch_collection(&self, path: &str) -> Result<Vec<Value>> {
        let body = self.get_json(path).await?;
        check_remote_error(&body)?;

        match body {
            Value::Object(mut map) => match map.remove(path) {
                Some(Value::Array(items)) => Ok(items),
                Some(other) => Err(Error::MalformedResponse(format!(
                    "'{}' is not an array: {}",
                    path, other
                ))),
                None => Err(Error::MalformedResponse(format!("missing '{}' array", path))),
            },
            other => Err(Error::MalformedResponse(format!(
                "expected an object with '{}', got {}",
                path, other
            ))),
        }
    }

    async fn post_record<T: Serialize + Sync>(&self, path: &str, record: &T) -> Result<()> {
        let response = self
            .http_client
            .post(&self.base_url)
            .query(&[("path", path)])
            .json(record)
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(path, status = status.as_u16(), "Remote push failed");
            return Err(Error::RemoteStatus(status.as_u16()));
        }

        check_push_body(path, response.text().await)
    }
}

/// Success bodies are not part of the contract; only an explicit error
/// object counts as a failure. An unreadable body is logged and accepted.
fn check_push_body<E: std::fmt::Display>(
    path: &str,
    body: std::result::Result<String, E>,
) -> Result<()> {
    let text = match body {
        Ok(text) => text,
        Err(e) => {
            warn!(path, error = %e, "Could not read push response body");
            return Ok(());
        }
    };

    match serde_json::from_str::<Value>(&text) {
        Ok(body) => check_remote_error(&body),
        Err(_) => {
            debug!(path, "Push response body is not JSON");
            Ok(())
        }
    }
}

fn check_remote_error(body: &Value) -> Result<()> {
    match body.get("error") {
        Some(Value::String(message)) => Err(Error::RemoteError(message.clone())),
        Some(other) if !other.is_null() => Err(Error::RemoteError(other.to_string())),
        _ => Ok(()),
    }
}

#[async_trait]
impl RemoteStore for SyncClient {
    async fn fetch_projects(&self) -> Result<Vec<Project>> {
        let raw = self.fetch_collection(PROJECTS_PATH).await?;
        Ok(decode_records(raw, "project"))
    }

    async fn fetch_tasks(&self) -> Result<Vec<Task>> {
        let raw = self.fetch_collection(TASKS_PATH).await?;
        Ok(decode_records(raw, "task"))
    }

    async fn push_project(&self, project: &Project) -> Result<()> {
        debug!(id = project.id, "Pushing project");
        self.post_record(PROJECTS_PATH, project).await
    }

    async fn push_task(&self, task: &Task) -> Result<()> {
        debug!(id = task.id, "Pushing task");
        self.post_record(TASKS_PATH, task).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn test_builder_requires_url() {
        let err = SyncClient::builder().build().unwrap_err();
        assert!(matches!(err, Error::SyncNotConfigured));

        let err = SyncClient::builder().base_url("   ").build().unwrap_err();
        assert!(matches!(err, Error::SyncNotConfigured));
    }

    #[test]
    fn test_builder_rejects_bad_settings() {
        let err = SyncClient::new("script.google.com/exec").unwrap_err();
        assert_eq!(err.code(), "E600");

        let err = SyncClient::builder()
            .base_url("https://example.com")
            .timeout_secs(0)
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "E600");
    }

    #[tokio::test]
    async fn test_fetch_projects_filters_bad_records() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .match_query(Matcher::UrlEncoded("path".into(), "projects".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "projects": [
                        {"id": 1, "name": "Launch", "description": "", "color": "Red", "createdAt": "2025-01-01 10:00"},
                        {"id": "oops", "name": "Bad", "description": "", "color": "Red", "createdAt": ""}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = SyncClient::new(server.url()).unwrap();
        let projects = client.fetch_projects().await.unwrap();

        mock.assert_async().await;
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "Launch");
    }

    #[tokio::test]
    async fn test_fetch_tasks_non_200_is_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .match_query(Matcher::UrlEncoded("path".into(), "tasks".into()))
            .with_status(500)
            .create_async()
            .await;

        let client = SyncClient::new(server.url()).unwrap();
        let err = client.fetch_tasks().await.unwrap_err();
        assert!(matches!(err, Error::RemoteStatus(500)));
    }

    #[tokio::test]
    async fn test_fetch_missing_collection_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .match_query(Matcher::UrlEncoded("path".into(), "tasks".into()))
            .with_status(200)
            .with_body(r#"{"name": "backend"}"#)
            .create_async()
            .await;

        let client = SyncClient::new(server.url()).unwrap();
        let err = client.fetch_tasks().await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_fetch_non_json_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .match_query(Matcher::UrlEncoded("path".into(), "projects".into()))
            .with_status(200)
            .with_body("<html>login</html>")
            .create_async()
            .await;

        let client = SyncClient::new(server.url()).unwrap();
        let err = client.fetch_projects().await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_remote_error_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .match_query(Matcher::UrlEncoded("path".into(), "projects".into()))
            .with_status(200)
            .with_body(r#"{"error": "Sheet not found"}"#)
            .create_async()
            .await;

        let client = SyncClient::new(server.url()).unwrap();
        let err = client.fetch_projects().await.unwrap_err();
        assert!(matches!(err, Error::RemoteError(ref m) if m == "Sheet not found"));
    }

    #[tokio::test]
    async fn test_push_task_posts_record() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_query(Matcher::UrlEncoded("path".into(), "tasks".into()))
            .match_body(Matcher::PartialJson(json!({
                "id": 3,
                "projectId": 1,
                "scheduledAt": null,
                "priority": "High"
            })))
            .with_status(200)
            .with_body(r#"{"id": 3}"#)
            .create_async()
            .await;

        let task = Task {
            id: 3,
            title: "Draft".to_string(),
            description: String::new(),
            created_at: "2025-01-15 09:00".to_string(),
            project_id: 1,
            completed: false,
            scheduled_at: None,
            notified: false,
            priority: crate::model::Priority::High,
        };

        let client = SyncClient::new(server.url()).unwrap();
        client.push_task(&task).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_push_project_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .match_query(Matcher::UrlEncoded("path".into(), "projects".into()))
            .with_status(403)
            .create_async()
            .await;

        let project = Project {
            id: 1,
            name: "Launch".to_string(),
            description: String::new(),
            color: crate::model::ProjectColor::Blue,
            created_at: "2025-01-15 09:00".to_string(),
        };

        let client = SyncClient::new(server.url()).unwrap();
        let err = client.push_project(&project).await.unwrap_err();
        assert!(matches!(err, Error::RemoteStatus(403)));
    }

    #[test]
    fn test_push_body_checks() {
        assert!(check_push_body::<&str>("tasks", Ok(String::new())).is_ok());
        assert!(check_push_body::<&str>("tasks", Ok("<html>ok</html>".to_string())).is_ok());
        assert!(matches!(
            check_push_body::<&str>("tasks", Ok(r#"{"error": "sheet locked"}"#.to_string())),
            Err(Error::RemoteError(message)) if message == "sheet locked"
        ));
        assert!(check_push_body("tasks", Err("connection reset")).is_ok());
    }

    #[tokio::test]
    async fn test_health() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .match_query(Matcher::UrlEncoded("path".into(), "health".into()))
            .with_status(200)
            .with_body(r#"{"status": "ok"}"#)
            .create_async()
            .await;

        let client = SyncClient::new(server.url()).unwrap();
        client.health().await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_remote_is_network_error() {
        // Nothing listens on port 9 on the loopback interface
        let client = SyncClient::builder()
            .base_url("http://127.0.0.1:9")
            .timeout_secs(2)
            .build()
            .unwrap();
        let err = client.fetch_projects().await.unwrap_err();
        assert!(matches!(err, Error::NetworkError(_)));
        assert!(err.is_transport());
    }
}
