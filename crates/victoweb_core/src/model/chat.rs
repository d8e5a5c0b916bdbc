//! Admin hub chat, task and checklist models.
//!
//! # Invariants
//! - Over-long chat and task text is truncated to the limits below, never rejected.
//! - A task's todos are deleted with the task.

use super::account::AccountId;
use super::EpochMillis;
use chrono::NaiveDate;
use serde::Serialize;

pub type MessageId = i64;
pub type TaskId = i64;
pub type TodoId = i64;

pub const MAX_CHAT_MESSAGE_LENGTH: usize = 4000;
pub const MAX_TASK_TITLE_LENGTH: usize = 200;
pub const MAX_TASK_DESCRIPTION_LENGTH: usize = 4000;
pub const MAX_TODO_LABEL_LENGTH: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Blocked,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [Self::Todo, Self::InProgress, Self::Blocked, Self::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Blocked => "blocked",
            Self::Done => "done",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Todo => "To Do",
            Self::InProgress => "In Progress",
            Self::Blocked => "Blocked",
            Self::Done => "Done",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 4] = [Self::Low, Self::Medium, Self::High, Self::Urgent];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Urgent => "Urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|priority| priority.as_str() == value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub author_id: AccountId,
    pub body: String,
    pub created_at: EpochMillis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTask {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub created_by: AccountId,
    pub assigned_to: Option<AccountId>,
    pub created_at: EpochMillis,
    pub updated_at: EpochMillis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTaskItem {
    pub id: TodoId,
    pub task_id: TaskId,
    pub label: String,
    pub is_done: bool,
    pub created_at: EpochMillis,
}

/// Insert model for a new task; text is already truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub created_by: AccountId,
    pub assigned_to: Option<AccountId>,
}
