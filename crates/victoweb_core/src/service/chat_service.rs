//! Admin hub service: chat log, task board and the hub snapshot.
//!
//! # Responsibility
//! - Validate and apply chat/task/todo mutations.
//! - Project stored rows into display-ready views in the configured zone.
//! - Assemble the full hub snapshot used by pages and fragments.
//!
//! # Invariants
//! - Over-long text is truncated, never rejected.
//! - The summary always counts every task, ignoring the active filter.
//! - Done tasks are never overdue.

use crate::model::account::AccountId;
use crate::model::chat::{
    ChatTask, ChatTaskItem, MessageId, NewTask, TaskId, TaskPriority, TaskStatus, TodoId,
    MAX_CHAT_MESSAGE_LENGTH, MAX_TASK_DESCRIPTION_LENGTH, MAX_TASK_TITLE_LENGTH,
    MAX_TODO_LABEL_LENGTH,
};
use crate::model::validation::{require, truncate_chars, ValidationError};
use crate::model::EpochMillis;
use crate::repo::chat_repo::{
    ChatMessageRecord, ChatRepository, StaffMember, TaskQuery, TaskRecord,
};
use crate::repo::RepoError;
use chrono::{NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const ADMIN_CHAT_SYSTEM_MESSAGE: &str =
    "Executive Coordination Hub ready. Log action items and updates here.";
pub const LANDING_CHAT_SYSTEM_MESSAGE: &str =
    "Welcome to the Executive Coordination Hub. Use /task create to open a new task, /todo to add checklist items.";

const SYSTEM_AUTHOR_NAME: &str = "System";
const UNASSIGNED_LABEL: &str = "Unassigned";
const TODO_DONE_VALUES: [&str; 4] = ["1", "true", "True", "on"];

#[derive(Debug)]
pub enum ChatServiceError {
    Validation(ValidationError),
    MessageNotFound(MessageId),
    TaskNotFound(TaskId),
    TodoNotFound(TodoId),
    Repo(RepoError),
}

impl Display for ChatServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::MessageNotFound(id) => write!(f, "chat message not found: {id}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::TodoNotFound(id) => write!(f, "todo not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ChatServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ChatServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound {
                entity: "chat message",
                id,
            } => Self::MessageNotFound(id),
            RepoError::NotFound { entity: "task", id } => Self::TaskNotFound(id),
            RepoError::NotFound { entity: "todo", id } => Self::TodoNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for ChatServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Task board filter; raw on input, canonical after [`sanitize_task_filter`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskFilter {
    pub status: String,
    pub priority: String,
    #[serde(alias = "q")]
    pub query: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub blocked: usize,
    pub done: usize,
    pub urgent: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl TaskSummary {
    fn count(&mut self, status: TaskStatus, priority: TaskPriority) {
        self.total += 1;
        match status {
            TaskStatus::Todo => self.todo += 1,
            TaskStatus::InProgress => self.in_progress += 1,
            TaskStatus::Blocked => self.blocked += 1,
            TaskStatus::Done => self.done += 1,
        }
        match priority {
            TaskPriority::Urgent => self.urgent += 1,
            TaskPriority::High => self.high += 1,
            TaskPriority::Medium => self.medium += 1,
            TaskPriority::Low => self.low += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessageView {
    pub id: MessageId,
    pub author_id: AccountId,
    pub author_name: String,
    pub body: String,
    pub created_at_human: String,
    pub is_mine: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodoView {
    pub id: TodoId,
    pub label: String,
    pub is_done: bool,
    pub created_at_human: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskView {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub status: &'static str,
    pub priority: &'static str,
    /// ISO date or empty.
    pub due_date: String,
    pub created_at_human: String,
    pub updated_at_human: String,
    pub status_label: &'static str,
    pub priority_label: &'static str,
    pub assigned_to_id: Option<AccountId>,
    pub assigned_to_name: String,
    pub has_assignee: bool,
    /// Assignee id, 0 when unassigned.
    pub assigned_to_value: AccountId,
    pub due_date_human: String,
    pub is_overdue: bool,
    pub outstanding_todos: usize,
    pub completed_todos: usize,
    pub todos: Vec<TodoView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChoiceOption {
    pub value: &'static str,
    pub label: &'static str,
}

/// Everything the hub page and its fragments display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminHub {
    pub messages: Vec<ChatMessageView>,
    pub tasks: Vec<TaskView>,
    pub admin_users: Vec<StaffMember>,
    pub task_summary: TaskSummary,
    pub task_filter: TaskFilter,
    pub task_status_options: Vec<ChoiceOption>,
    pub task_priority_options: Vec<ChoiceOption>,
}

/// New task form fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub priority: String,
    pub status: String,
    pub due_date: String,
    pub assigned_to: String,
}

/// Display clock: zone for formatting plus the current instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubClock {
    pub time_zone: Tz,
    pub now: EpochMillis,
}

impl HubClock {
    pub fn new(time_zone: Tz, now: EpochMillis) -> Self {
        Self { time_zone, now }
    }

    pub fn today(&self) -> NaiveDate {
        match Utc.timestamp_millis_opt(self.now).single() {
            Some(instant) => instant.with_timezone(&self.time_zone).date_naive(),
            None => NaiveDate::default(),
        }
    }
}

pub struct ChatService<R: ChatRepository> {
    repo: R,
}

impl<R: ChatRepository> ChatService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn post_message(
        &self,
        author_id: AccountId,
        body: &str,
    ) -> Result<MessageId, ChatServiceError> {
        let body = body.trim();
        require("body", body)?;
        let body = truncate_chars(body, MAX_CHAT_MESSAGE_LENGTH);
        let id = self.repo.create_message(author_id, &body)?;
        info!(
            "event=chat_message_create module=chat status=ok message_id={} author_id={}",
            id, author_id
        );
        Ok(id)
    }

    pub fn delete_message(&self, id: MessageId) -> Result<(), ChatServiceError> {
        self.repo.delete_message(id)?;
        info!("event=chat_message_delete module=chat status=ok message_id={}", id);
        Ok(())
    }

    /// Chat log oldest first; `is_mine` is relative to `viewer`.
    pub fn messages_for_admin(
        &self,
        viewer: Option<AccountId>,
        clock: HubClock,
    ) -> Result<Vec<ChatMessageView>, ChatServiceError> {
        Ok(self
            .repo
            .list_messages()?
            .into_iter()
            .map(|record| message_view(record, viewer, clock.time_zone))
            .collect())
    }

    pub fn create_task(
        &self,
        creator: AccountId,
        draft: &TaskDraft,
    ) -> Result<TaskId, ChatServiceError> {
        let title = draft.title.trim();
        require("title", title)?;
        let task = NewTask {
            title: truncate_chars(title, MAX_TASK_TITLE_LENGTH),
            description: truncate_chars(draft.description.trim(), MAX_TASK_DESCRIPTION_LENGTH),
            status: parse_status_or_default(&draft.status)?,
            priority: parse_priority_or_default(&draft.priority)?,
            due_date: parse_due_date(&draft.due_date)?,
            created_by: creator,
            assigned_to: self.parse_assignee(&draft.assigned_to)?,
        };
        let id = self.repo.create_task(&task)?;
        info!(
            "event=chat_task_create module=chat status=ok task_id={} created_by={}",
            id, creator
        );
        Ok(id)
    }

    pub fn update_task_status(&self, id: TaskId, raw_status: &str) -> Result<(), ChatServiceError> {
        let status = TaskStatus::parse(raw_status.trim())
            .ok_or_else(|| invalid_choice("status", raw_status))?;
        self.repo.set_task_status(id, status)?;
        info!(
            "event=chat_task_status module=chat status=ok task_id={} task_status={}",
            id,
            status.as_str()
        );
        Ok(())
    }

    /// Empty input unassigns the task.
    pub fn update_task_assignment(
        &self,
        id: TaskId,
        raw_assignee: &str,
    ) -> Result<(), ChatServiceError> {
        let assignee = self.parse_assignee(raw_assignee)?;
        self.repo.set_task_assignment(id, assignee)?;
        info!(
            "event=chat_task_assign module=chat status=ok task_id={} assigned={}",
            id,
            assignee.is_some()
        );
        Ok(())
    }

    pub fn add_todo(&self, task_id: TaskId, label: &str) -> Result<TodoId, ChatServiceError> {
        let label = label.trim();
        require("label", label)?;
        let id = self
            .repo
            .add_todo(task_id, &truncate_chars(label, MAX_TODO_LABEL_LENGTH))?;
        info!(
            "event=chat_todo_create module=chat status=ok task_id={} todo_id={}",
            task_id, id
        );
        Ok(id)
    }

    /// Marks the todo done iff `raw` is a checked-box value; returns the new state.
    pub fn toggle_todo(&self, id: TodoId, raw: Option<&str>) -> Result<bool, ChatServiceError> {
        let is_done = is_checked(raw);
        let task_id = self.repo.set_todo_done(id, is_done)?;
        info!(
            "event=chat_todo_toggle module=chat status=ok task_id={} todo_id={} done={}",
            task_id, id, is_done
        );
        Ok(is_done)
    }

    pub fn delete_task(&self, id: TaskId) -> Result<(), ChatServiceError> {
        self.repo.delete_task(id)?;
        info!("event=chat_task_delete module=chat status=ok task_id={}", id);
        Ok(())
    }

    pub fn get_task(&self, id: TaskId) -> Result<ChatTask, ChatServiceError> {
        self.repo
            .get_task(id)?
            .ok_or(ChatServiceError::TaskNotFound(id))
    }

    /// Filtered board plus the unfiltered summary.
    pub fn tasks_for_admin(
        &self,
        filter: &TaskFilter,
        clock: HubClock,
    ) -> Result<(Vec<TaskView>, TaskSummary), ChatServiceError> {
        let sanitized = sanitize_task_filter(filter);
        let query = TaskQuery {
            status: TaskStatus::parse(&sanitized.status),
            priority: TaskPriority::parse(&sanitized.priority),
            text: (!sanitized.query.is_empty()).then(|| sanitized.query.clone()),
        };
        let today = clock.today();
        let tasks = self
            .repo
            .list_tasks(&query)?
            .into_iter()
            .map(|record| task_view(record, clock.time_zone, today))
            .collect();
        Ok((tasks, self.task_summary()?))
    }

    pub fn task_summary(&self) -> Result<TaskSummary, ChatServiceError> {
        let mut summary = TaskSummary::default();
        for (status, priority) in self.repo.task_keys()? {
            summary.count(status, priority);
        }
        Ok(summary)
    }

    /// Full hub snapshot; `system_message` is prepended when non-blank.
    pub fn admin_hub(
        &self,
        viewer: Option<AccountId>,
        filter: &TaskFilter,
        system_message: &str,
        clock: HubClock,
    ) -> Result<AdminHub, ChatServiceError> {
        let task_filter = sanitize_task_filter(filter);
        let mut messages = self.messages_for_admin(viewer, clock)?;
        if !system_message.is_empty() {
            messages = ensure_system_chat_message(messages, system_message, clock);
        }
        let (tasks, task_summary) = self.tasks_for_admin(&task_filter, clock)?;
        Ok(AdminHub {
            messages,
            tasks,
            admin_users: self.repo.list_staff_members()?,
            task_summary,
            task_filter,
            task_status_options: status_options(),
            task_priority_options: priority_options(),
        })
    }

    fn parse_assignee(&self, raw: &str) -> Result<Option<AccountId>, ChatServiceError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        let id: AccountId = raw
            .parse()
            .map_err(|_| invalid_choice("assigned_to", raw))?;
        if !self.repo.account_exists(id)? {
            return Err(invalid_choice("assigned_to", raw).into());
        }
        Ok(Some(id))
    }
}

/// Lowercases status/priority, drops unknown values and trims the query.
pub fn sanitize_task_filter(filter: &TaskFilter) -> TaskFilter {
    let status = filter.status.trim().to_lowercase();
    let priority = filter.priority.trim().to_lowercase();
    TaskFilter {
        status: if TaskStatus::parse(&status).is_some() {
            status
        } else {
            String::new()
        },
        priority: if TaskPriority::parse(&priority).is_some() {
            priority
        } else {
            String::new()
        },
        query: filter.query.trim().to_string(),
    }
}

/// Prepends a System message unless the same one already leads the log.
pub fn ensure_system_chat_message(
    mut messages: Vec<ChatMessageView>,
    body: &str,
    clock: HubClock,
) -> Vec<ChatMessageView> {
    let body = body.trim();
    if body.is_empty() {
        return messages;
    }
    if let Some(first) = messages.first() {
        if first.author_id == 0
            && first.author_name.eq_ignore_ascii_case(SYSTEM_AUTHOR_NAME)
            && first.body == body
        {
            return messages;
        }
    }
    messages.insert(
        0,
        ChatMessageView {
            id: 0,
            author_id: 0,
            author_name: SYSTEM_AUTHOR_NAME.to_string(),
            body: body.to_string(),
            created_at_human: humanize_timestamp(clock.now, clock.time_zone),
            is_mine: false,
        },
    );
    messages
}

/// `%d %b %H:%M` in `tz`.
pub fn humanize_timestamp(at: EpochMillis, tz: Tz) -> String {
    match Utc.timestamp_millis_opt(at).single() {
        Some(instant) => instant.with_timezone(&tz).format("%d %b %H:%M").to_string(),
        None => String::new(),
    }
}

/// Returns the `%d %b %Y` rendering and whether the task is overdue.
pub fn humanize_due_date(
    due_date: Option<NaiveDate>,
    status: TaskStatus,
    today: NaiveDate,
) -> (String, bool) {
    match due_date {
        Some(date) => (
            date.format("%d %b %Y").to_string(),
            status != TaskStatus::Done && date < today,
        ),
        None => (String::new(), false),
    }
}

pub fn is_checked(raw: Option<&str>) -> bool {
    raw.is_some_and(|value| TODO_DONE_VALUES.contains(&value))
}

pub fn status_options() -> Vec<ChoiceOption> {
    TaskStatus::ALL
        .into_iter()
        .map(|status| ChoiceOption {
            value: status.as_str(),
            label: status.label(),
        })
        .collect()
}

pub fn priority_options() -> Vec<ChoiceOption> {
    TaskPriority::ALL
        .into_iter()
        .map(|priority| ChoiceOption {
            value: priority.as_str(),
            label: priority.label(),
        })
        .collect()
}

fn message_view(record: ChatMessageRecord, viewer: Option<AccountId>, tz: Tz) -> ChatMessageView {
    let message = record.message;
    ChatMessageView {
        is_mine: viewer == Some(message.author_id),
        id: message.id,
        author_id: message.author_id,
        author_name: record.author_name,
        created_at_human: humanize_timestamp(message.created_at, tz),
        body: message.body,
    }
}

fn todo_view(item: ChatTaskItem, tz: Tz) -> TodoView {
    TodoView {
        id: item.id,
        label: item.label,
        is_done: item.is_done,
        created_at_human: humanize_timestamp(item.created_at, tz),
    }
}

fn task_view(record: TaskRecord, tz: Tz, today: NaiveDate) -> TaskView {
    let task = record.task;
    let (due_date_human, is_overdue) = humanize_due_date(task.due_date, task.status, today);
    let completed_todos = record.todos.iter().filter(|todo| todo.is_done).count();
    let outstanding_todos = record.todos.len() - completed_todos;
    TaskView {
        id: task.id,
        title: task.title,
        description: task.description,
        status: task.status.as_str(),
        priority: task.priority.as_str(),
        due_date: task
            .due_date
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        created_at_human: humanize_timestamp(task.created_at, tz),
        updated_at_human: humanize_timestamp(task.updated_at, tz),
        status_label: task.status.label(),
        priority_label: task.priority.label(),
        assigned_to_id: task.assigned_to,
        has_assignee: task.assigned_to.is_some(),
        assigned_to_value: task.assigned_to.unwrap_or(0),
        assigned_to_name: record
            .assignee_name
            .unwrap_or_else(|| UNASSIGNED_LABEL.to_string()),
        due_date_human,
        is_overdue,
        outstanding_todos,
        completed_todos,
        todos: record
            .todos
            .into_iter()
            .map(|todo| todo_view(todo, tz))
            .collect(),
    }
}

fn invalid_choice(field: &'static str, value: &str) -> ValidationError {
    ValidationError::new(
        field,
        format!("Select a valid choice. {value} is not one of the available choices."),
    )
}

fn parse_status_or_default(raw: &str) -> Result<TaskStatus, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(TaskStatus::default());
    }
    TaskStatus::parse(raw).ok_or_else(|| invalid_choice("status", raw))
}

fn parse_priority_or_default(raw: &str) -> Result<TaskPriority, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(TaskPriority::default());
    }
    TaskPriority::parse(raw).ok_or_else(|| invalid_choice("priority", raw))
}

fn parse_due_date(raw: &str) -> Result<Option<NaiveDate>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| ValidationError::new("due_date", "Enter a valid date."))
}
