//! Input validation
//!
//! The store accepts whatever it is given; front ends run user input through
//! these validators first.

use crate::error::{Error, Result};
use crate::model::{Priority, ProjectColor, format_timestamp, parse_timestamp};

const MAX_NAME_CHARS: usize = 100;
const MAX_DESCRIPTION_CHARS: usize = 1000;

fn invalid(field: &str, message: impl std::fmt::Display) -> Error {
    Error::InvalidInput(format!("{}: {}", field, message))
}

fn validate_description(description: &str) -> Result<()> {
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(invalid(
            "description",
            format!("must be {} characters or less", MAX_DESCRIPTION_CHARS),
        ));
    }
    Ok(())
}

/// Validator for project input
pub struct ProjectValidator;

impl ProjectValidator {
    /// Validate a project name
    ///
    /// Rules:
    /// - Must not be blank
    /// - Must be 100 characters or less
    pub fn validate_name(name: &str) -> Result<()> {
        let name = name.trim();

        if name.is_empty() {
            return Err(invalid("name", "Project name cannot be empty"));
        }

        if name.chars().count() > MAX_NAME_CHARS {
            return Err(invalid(
                "name",
                format!("Project name must be {} characters or less", MAX_NAME_CHARS),
            ));
        }

        Ok(())
    }

    pub fn validate_description(description: &str) -> Result<()> {
        validate_description(description)
    }

    /// Parse a color name, case-insensitively
    pub fn validate_color(color: &str) -> Result<ProjectColor> {
        color.parse().map_err(|e: String| invalid("color", e))
    }
}

/// Validator for task input
pub struct TaskValidator;

impl TaskValidator {
    /// Validate a task title
    ///
    /// Rules:
    /// - Must not be blank
    /// - Must be 100 characters or less
    pub fn validate_title(title: &str) -> Result<()> {
        let title = title.trim();

        if title.is_empty() {
            return Err(invalid("title", "Task title cannot be empty"));
        }

        if title.chars().count() > MAX_NAME_CHARS {
            return Err(invalid(
                "title",
                format!("Task title must be {} characters or less", MAX_NAME_CHARS),
            ));
        }

        Ok(())
    }

    pub fn validate_description(description: &str) -> Result<()> {
        validate_description(description)
    }

    /// Validate a schedule and return it in canonical `YYYY-MM-DD HH:MM` form.
    ///
    /// A blank schedule means "not scheduled".
    pub fn validate_schedule(scheduled_at: &str) -> Result<Option<String>> {
        let scheduled_at = scheduled_at.trim();
        if scheduled_at.is_empty() {
            return Ok(None);
        }

        parse_timestamp(scheduled_at)
            .map(|at| Some(format_timestamp(at)))
            .ok_or_else(|| {
                invalid(
                    "scheduled_at",
                    format!("'{}' is not a date in YYYY-MM-DD HH:MM format", scheduled_at),
                )
            })
    }

    pub fn validate_priority(priority: &str) -> Result<Priority> {
        priority.parse().map_err(|e: String| invalid("priority", e))
    }
}
