use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{RecordId, lenient, parse_timestamp};

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(format!(
                "Unknown priority '{}'. Valid options: High, Medium, Low",
                s
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(value
            .as_str()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default())
    }
}

/// A unit of work inside a project, optionally carrying a reminder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(deserialize_with = "lenient::record_id")]
    pub id: RecordId,
    #[serde(deserialize_with = "lenient::text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub created_at: String,
    #[serde(deserialize_with = "lenient::record_id")]
    pub project_id: RecordId,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub completed: bool,
    #[serde(default, deserialize_with = "lenient::schedule")]
    pub scheduled_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub notified: bool,
    #[serde(default)]
    pub priority: Priority,
}

impl Task {
    /// Parsed reminder time, `None` when unscheduled or unparseable
    pub fn scheduled_time(&self) -> Option<NaiveDateTime> {
        self.scheduled_at.as_deref().and_then(parse_timestamp)
    }

    /// Still owed a reminder: open, scheduled and not yet notified
    pub fn awaiting_reminder(&self) -> bool {
        !self.completed && self.scheduled_at.is_some() && !self.notified
    }
}

/// Input for creating a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub project_id: RecordId,
    pub scheduled_at: Option<String>,
    pub priority: Priority,
}

impl NewTask {
    pub fn new(title: impl Into<String>, project_id: RecordId) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            project_id,
            scheduled_at: None,
            priority: Priority::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_schedule(mut self, scheduled_at: impl Into<String>) -> Self {
        self.scheduled_at = Some(scheduled_at.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Full replacement of a task's mutable fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskUpdate {
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub scheduled_at: Option<String>,
    pub priority: Priority,
}

impl From<&Task> for TaskUpdate {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            completed: task.completed,
            scheduled_at: task.scheduled_at.clone(),
            priority: task.priority,
        }
    }
}

/// Blank schedules mean "no reminder"
pub(crate) fn normalize_schedule(scheduled_at: Option<String>) -> Option<String> {
    scheduled_at
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_spreadsheet_row_decodes() {
        let task: Task = serde_json::from_value(json!({
            "id": "5",
            "title": "Draft",
            "description": 42,
            "createdAt": "2025-01-15 09:00",
            "projectId": 1.0,
            "completed": "",
            "scheduledAt": "",
            "notified": "FALSE",
            "priority": "high"
        }))
        .unwrap();

        assert_eq!(task.id, 5);
        assert_eq!(task.project_id, 1);
        assert_eq!(task.description, "42");
        assert!(!task.completed);
        assert_eq!(task.scheduled_at, None);
        assert!(!task.notified);
        assert_eq!(task.priority, Priority::High);
    }

    #[test]
    fn test_missing_optional_fields_use_defaults() {
        let task: Task = serde_json::from_value(json!({
            "id": 2,
            "title": "Review",
            "projectId": 1
        }))
        .unwrap();

        assert_eq!(task.priority, Priority::Medium);
        assert!(!task.completed);
        assert!(!task.notified);
        assert!(task.scheduled_at.is_none());
    }

    #[test]
    fn test_bad_project_id_is_rejected() {
        let result = serde_json::from_value::<Task>(json!({
            "id": 2,
            "title": "Review",
            "projectId": "none"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_awaiting_reminder() {
        let mut task: Task = serde_json::from_value(json!({
            "id": 1,
            "title": "Call",
            "projectId": 1,
            "scheduledAt": "2025-01-15 14:30"
        }))
        .unwrap();
        assert!(task.awaiting_reminder());
        assert!(task.scheduled_time().is_some());

        task.notified = true;
        assert!(!task.awaiting_reminder());
    }

    #[test]
    fn test_scheduled_at_serializes_as_null() {
        let task = Task {
            id: 1,
            title: "Call".to_string(),
            description: String::new(),
            created_at: "2025-01-15 09:00".to_string(),
            project_id: 1,
            completed: false,
            scheduled_at: None,
            notified: false,
            priority: Priority::Low,
        };

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["scheduledAt"], Value::Null);
        assert_eq!(value["priority"], json!("Low"));
        assert_eq!(value["projectId"], json!(1));
    }

    #[test]
    fn test_normalize_schedule() {
        assert_eq!(normalize_schedule(Some("  ".to_string())), None);
        assert_eq!(
            normalize_schedule(Some(" 2025-01-15 14:30 ".to_string())),
            Some("2025-01-15 14:30".to_string())
        );
        assert_eq!(normalize_schedule(None), None);
    }
}
