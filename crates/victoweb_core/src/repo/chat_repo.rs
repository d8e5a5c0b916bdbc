//! Admin hub repository: chat log, task board and checklists.
//!
//! # Responsibility
//! - Persist chat messages, tasks and todo items.
//! - Own the task board ordering and text filter in SQL.
//!
//! # Invariants
//! - Messages list oldest first (`created_at, id`).
//! - Tasks list unfinished first, then by priority rank, due date
//!   (undated last) and newest creation.
//! - Todos list in insertion order.

use super::{bool_to_int, format_date, int_to_bool, parse_date, RepoError, RepoResult};
use crate::model::account::AccountId;
use crate::model::chat::{
    ChatMessage, ChatTask, ChatTaskItem, MessageId, NewTask, TaskId, TaskPriority, TaskStatus,
    TodoId,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;

const DISPLAY_NAME_SQL: &str =
    "CASE WHEN trim(a.full_name) <> '' THEN trim(a.full_name) ELSE a.username END";

const TASK_COLUMNS_SQL: &str = "t.id,
    t.title,
    t.description,
    t.status,
    t.priority,
    t.due_date,
    t.created_by,
    t.assigned_to,
    t.created_at,
    t.updated_at";

/// Message together with its author's display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessageRecord {
    pub message: ChatMessage,
    pub author_name: String,
}

/// Task with assignee display name and its todo items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub task: ChatTask,
    pub assignee_name: Option<String>,
    pub todos: Vec<ChatTaskItem>,
}

/// Staff member option for task assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaffMember {
    pub id: AccountId,
    pub username: String,
    pub full_name: String,
}

/// Already-sanitized task board filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    /// Case-insensitive match on title, description, assignee name or username.
    pub text: Option<String>,
}

pub trait ChatRepository {
    fn create_message(&self, author_id: AccountId, body: &str) -> RepoResult<MessageId>;
    fn delete_message(&self, id: MessageId) -> RepoResult<()>;
    fn list_messages(&self) -> RepoResult<Vec<ChatMessageRecord>>;

    fn create_task(&self, task: &NewTask) -> RepoResult<TaskId>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<ChatTask>>;
    fn set_task_status(&self, id: TaskId, status: TaskStatus) -> RepoResult<()>;
    fn set_task_assignment(&self, id: TaskId, assignee: Option<AccountId>) -> RepoResult<()>;
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
    fn list_tasks(&self, query: &TaskQuery) -> RepoResult<Vec<TaskRecord>>;
    /// Status/priority pair of every task, unfiltered.
    fn task_keys(&self) -> RepoResult<Vec<(TaskStatus, TaskPriority)>>;

    fn add_todo(&self, task_id: TaskId, label: &str) -> RepoResult<TodoId>;
    /// Returns the owning task id.
    fn set_todo_done(&self, id: TodoId, is_done: bool) -> RepoResult<TaskId>;

    fn account_exists(&self, id: AccountId) -> RepoResult<bool>;
    fn list_staff_members(&self) -> RepoResult<Vec<StaffMember>>;
}

pub struct SqliteChatRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteChatRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn todos_for_task(&self, task_id: TaskId) -> RepoResult<Vec<ChatTaskItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, task_id, label, is_done, created_at
             FROM chat_task_items
             WHERE task_id = ?1
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([task_id])?;
        let mut todos = Vec::new();
        while let Some(row) = rows.next()? {
            todos.push(ChatTaskItem {
                id: row.get("id")?,
                task_id: row.get("task_id")?,
                label: row.get("label")?,
                is_done: int_to_bool(row.get("is_done")?, "chat_task_items.is_done")?,
                created_at: row.get("created_at")?,
            });
        }
        Ok(todos)
    }

    fn ensure_account(&self, id: Option<AccountId>) -> RepoResult<()> {
        if let Some(account_id) = id {
            if !self.account_exists(account_id)? {
                return Err(RepoError::not_found("account", account_id));
            }
        }
        Ok(())
    }
}

impl ChatRepository for SqliteChatRepository<'_> {
    fn create_message(&self, author_id: AccountId, body: &str) -> RepoResult<MessageId> {
        self.ensure_account(Some(author_id))?;
        self.conn.execute(
            "INSERT INTO chat_messages (author_id, body) VALUES (?1, ?2);",
            params![author_id, body],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn delete_message(&self, id: MessageId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM chat_messages WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("chat message", id));
        }
        Ok(())
    }

    fn list_messages(&self) -> RepoResult<Vec<ChatMessageRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT
                m.id,
                m.author_id,
                m.body,
                m.created_at,
                {DISPLAY_NAME_SQL} AS author_name
             FROM chat_messages m
             INNER JOIN accounts a ON a.id = m.author_id
             ORDER BY m.created_at ASC, m.id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut messages = Vec::new();
        while let Some(row) = rows.next()? {
            messages.push(ChatMessageRecord {
                message: ChatMessage {
                    id: row.get("id")?,
                    author_id: row.get("author_id")?,
                    body: row.get("body")?,
                    created_at: row.get("created_at")?,
                },
                author_name: row.get("author_name")?,
            });
        }
        Ok(messages)
    }

    fn create_task(&self, task: &NewTask) -> RepoResult<TaskId> {
        self.ensure_account(Some(task.created_by))?;
        self.ensure_account(task.assigned_to)?;
        self.conn.execute(
            "INSERT INTO chat_tasks (
                title,
                description,
                status,
                priority,
                due_date,
                created_by,
                assigned_to
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                task.title.as_str(),
                task.description.as_str(),
                task.status.as_str(),
                task.priority.as_str(),
                task.due_date.map(format_date),
                task.created_by,
                task.assigned_to,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<ChatTask>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS_SQL} FROM chat_tasks t WHERE t.id = ?1;"
        ))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_task_row(row)?)),
            None => Ok(None),
        }
    }

    fn set_task_status(&self, id: TaskId, status: TaskStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE chat_tasks
             SET status = ?2, updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, status.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("task", id));
        }
        Ok(())
    }

    fn set_task_assignment(&self, id: TaskId, assignee: Option<AccountId>) -> RepoResult<()> {
        self.ensure_account(assignee)?;
        let changed = self.conn.execute(
            "UPDATE chat_tasks
             SET assigned_to = ?2, updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, assignee],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("task", id));
        }
        Ok(())
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM chat_tasks WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("task", id));
        }
        Ok(())
    }

    fn list_tasks(&self, query: &TaskQuery) -> RepoResult<Vec<TaskRecord>> {
        let mut sql = format!(
            "SELECT
                {TASK_COLUMNS_SQL},
                CASE WHEN a.id IS NULL THEN NULL ELSE {DISPLAY_NAME_SQL} END AS assignee_name
             FROM chat_tasks t
             LEFT JOIN accounts a ON a.id = t.assigned_to
             WHERE 1 = 1"
        );
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(status) = query.status {
            sql.push_str(" AND t.status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(priority) = query.priority {
            sql.push_str(" AND t.priority = ?");
            bind_values.push(Value::Text(priority.as_str().to_string()));
        }
        if let Some(text) = query.text.as_ref().filter(|value| !value.is_empty()) {
            sql.push_str(
                " AND (
                    instr(lower(t.title), lower(?)) > 0
                    OR instr(lower(t.description), lower(?)) > 0
                    OR instr(lower(coalesce(a.full_name, '')), lower(?)) > 0
                    OR instr(lower(coalesce(a.username, '')), lower(?)) > 0
                )",
            );
            for _ in 0..4 {
                bind_values.push(Value::Text(text.clone()));
            }
        }

        sql.push_str(
            " ORDER BY
                CASE WHEN t.status = 'done' THEN 1 ELSE 0 END ASC,
                CASE t.priority
                    WHEN 'urgent' THEN 0
                    WHEN 'high' THEN 1
                    WHEN 'medium' THEN 2
                    ELSE 3
                END ASC,
                coalesce(t.due_date, '9999-12-31') ASC,
                t.created_at DESC,
                t.id DESC",
        );

        let mut tasks = Vec::new();
        {
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(bind_values))?;
            while let Some(row) = rows.next()? {
                tasks.push((parse_task_row(row)?, row.get::<_, Option<String>>("assignee_name")?));
            }
        }

        let mut records = Vec::with_capacity(tasks.len());
        for (task, assignee_name) in tasks {
            let todos = self.todos_for_task(task.id)?;
            records.push(TaskRecord {
                task,
                assignee_name,
                todos,
            });
        }
        Ok(records)
    }

    fn task_keys(&self) -> RepoResult<Vec<(TaskStatus, TaskPriority)>> {
        let mut stmt = self.conn.prepare("SELECT status, priority FROM chat_tasks;")?;
        let mut rows = stmt.query([])?;
        let mut keys = Vec::new();
        while let Some(row) = rows.next()? {
            let status: String = row.get(0)?;
            let priority: String = row.get(1)?;
            keys.push((parse_status(&status)?, parse_priority(&priority)?));
        }
        Ok(keys)
    }

    fn add_todo(&self, task_id: TaskId, label: &str) -> RepoResult<TodoId> {
        if self.get_task(task_id)?.is_none() {
            return Err(RepoError::not_found("task", task_id));
        }
        self.conn.execute(
            "INSERT INTO chat_task_items (task_id, label) VALUES (?1, ?2);",
            params![task_id, label],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn set_todo_done(&self, id: TodoId, is_done: bool) -> RepoResult<TaskId> {
        let task_id: Option<TaskId> = self
            .conn
            .query_row(
                "UPDATE chat_task_items SET is_done = ?2 WHERE id = ?1 RETURNING task_id;",
                params![id, bool_to_int(is_done)],
                |row| row.get(0),
            )
            .optional()?;
        task_id.ok_or(RepoError::not_found("todo", id))
    }

    fn account_exists(&self, id: AccountId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM accounts WHERE id = ?1);",
            [id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn list_staff_members(&self) -> RepoResult<Vec<StaffMember>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, username, full_name
             FROM accounts
             WHERE is_staff = 1
             ORDER BY full_name ASC, username ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(StaffMember {
                id: row.get("id")?,
                username: row.get("username")?,
                full_name: row.get("full_name")?,
            });
        }
        Ok(members)
    }
}

fn parse_status(value: &str) -> RepoResult<TaskStatus> {
    TaskStatus::parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid task status `{value}` in chat_tasks.status"))
    })
}

fn parse_priority(value: &str) -> RepoResult<TaskPriority> {
    TaskPriority::parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid task priority `{value}` in chat_tasks.priority"
        ))
    })
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<ChatTask> {
    let status: String = row.get("status")?;
    let priority: String = row.get("priority")?;
    let due_date = match row.get::<_, Option<String>>("due_date")? {
        Some(value) => Some(parse_date(&value, "chat_tasks.due_date")?),
        None => None,
    };
    Ok(ChatTask {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: parse_status(&status)?,
        priority: parse_priority(&priority)?,
        due_date,
        created_by: row.get("created_by")?,
        assigned_to: row.get("assigned_to")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
