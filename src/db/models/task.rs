use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub assignee_id: Uuid,
    pub created_by: Uuid,
    pub department_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub status: String,
    pub priority: String,
    pub progress: i32,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Review,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Option<TaskStatus> {
        match s {
            "todo" => Some(TaskStatus::Todo),
            "in_progress" => Some(TaskStatus::InProgress),
            "review" => Some(TaskStatus::Review),
            "done" => Some(TaskStatus::Done),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<TaskPriority> {
        match s {
            "low" => Some(TaskPriority::Low),
            "medium" => Some(TaskPriority::Medium),
            "high" => Some(TaskPriority::High),
            "urgent" => Some(TaskPriority::Urgent),
            _ => None,
        }
    }
}

/// Keep status and progress consistent: `done` forces 100, and reaching 100
/// forces `done`.
pub fn normalize_progress(status: TaskStatus, progress: i32) -> (TaskStatus, i32) {
    let progress = progress.clamp(0, 100);
    if status == TaskStatus::Done {
        (TaskStatus::Done, 100)
    } else if progress == 100 {
        (TaskStatus::Done, 100)
    } else {
        (status, progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_forces_full_progress() {
        assert_eq!(normalize_progress(TaskStatus::Done, 40), (TaskStatus::Done, 100));
    }

    #[test]
    fn full_progress_forces_done() {
        assert_eq!(
            normalize_progress(TaskStatus::InProgress, 100),
            (TaskStatus::Done, 100)
        );
    }

    #[test]
    fn partial_progress_is_kept() {
        assert_eq!(
            normalize_progress(TaskStatus::InProgress, 60),
            (TaskStatus::InProgress, 60)
        );
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(normalize_progress(TaskStatus::Todo, -5), (TaskStatus::Todo, 0));
        assert_eq!(normalize_progress(TaskStatus::Review, 150), (TaskStatus::Done, 100));
    }
}
