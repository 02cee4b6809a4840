//! Task and project persistence.

use crate::DbError;
use parley_types::{ProjectRecord, TaskRecord};
use rusqlite::{params, Connection, OptionalExtension, Row};

const TASK_COLUMNS: &str =
    "id, content, description, priority, project_id, is_completed, due_date, reminder_at";

/// Parameters for creating a task.
#[derive(Debug, Clone, Default)]
pub struct CreateTaskParams {
    pub content: String,
    pub description: Option<String>,
    pub priority: i64,
    pub project_id: i64,
    pub due_date: Option<String>,
    pub reminder_at: Option<String>,
}

/// Full replacement of a task's mutable fields.
#[derive(Debug, Clone, Default)]
pub struct UpdateTaskParams {
    pub content: String,
    pub description: Option<String>,
    pub is_completed: bool,
    pub priority: i64,
    pub project_id: i64,
    pub due_date: Option<String>,
    pub reminder_at: Option<String>,
}

/// Parameters for creating a project.
#[derive(Debug, Clone)]
pub struct CreateProjectParams {
    pub name: String,
    pub color: String,
    pub is_favorite: bool,
    pub view_style: String,
}

fn map_row_to_task(row: &Row) -> rusqlite::Result<TaskRecord> {
    Ok(TaskRecord {
        id: row.get(0)?,
        content: row.get(1)?,
        description: row.get(2)?,
        priority: row.get(3)?,
        project_id: row.get(4)?,
        is_completed: row.get(5)?,
        due_date: row.get(6)?,
        reminder_at: row.get(7)?,
    })
}

fn map_row_to_project(row: &Row) -> rusqlite::Result<ProjectRecord> {
    Ok(ProjectRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        is_favorite: row.get(3)?,
        view_style: row.get(4)?,
    })
}

/// Creates a task owned by `creator_id` and returns the stored record.
pub fn create_task(
    conn: &Connection,
    creator_id: i64,
    params: &CreateTaskParams,
) -> Result<TaskRecord, DbError> {
    conn.execute(
        "INSERT INTO tasks (
            creator_id, project_id, content, description, priority, due_date, reminder_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            creator_id,
            params.project_id,
            params.content,
            params.description,
            params.priority,
            params.due_date,
            params.reminder_at,
        ],
    )?;
    get_task(conn, creator_id, conn.last_insert_rowid())
}

/// Fetches one of the user's tasks.
pub fn get_task(conn: &Connection, creator_id: i64, task_id: i64) -> Result<TaskRecord, DbError> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND creator_id = ?2"),
        params![task_id, creator_id],
        map_row_to_task,
    )
    .optional()?
    .ok_or_else(|| DbError::not_found("task", task_id))
}

/// Overwrites a task's fields. Fails with `NotFound` when the task does not
/// exist or belongs to another user.
pub fn update_task(
    conn: &Connection,
    creator_id: i64,
    task_id: i64,
    params: &UpdateTaskParams,
) -> Result<TaskRecord, DbError> {
    let changed = conn.execute(
        "UPDATE tasks SET
            content = ?1, description = ?2, is_completed = ?3, priority = ?4,
            project_id = ?5, due_date = ?6, reminder_at = ?7
         WHERE id = ?8 AND creator_id = ?9",
        params![
            params.content,
            params.description,
            params.is_completed,
            params.priority,
            params.project_id,
            params.due_date,
            params.reminder_at,
            task_id,
            creator_id,
        ],
    )?;
    if changed == 0 {
        return Err(DbError::not_found("task", task_id));
    }
    get_task(conn, creator_id, task_id)
}

/// Lists the user's tasks, oldest first.
pub fn list_tasks(conn: &Connection, creator_id: i64) -> Result<Vec<TaskRecord>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE creator_id = ?1 ORDER BY id ASC"
    ))?;
    let rows = stmt.query_map([creator_id], map_row_to_task)?;
    let mut tasks = Vec::new();
    for row in rows {
        tasks.push(row?);
    }
    Ok(tasks)
}

/// Creates a project owned by `user_id`.
pub fn create_project(
    conn: &Connection,
    user_id: i64,
    params: &CreateProjectParams,
) -> Result<ProjectRecord, DbError> {
    conn.execute(
        "INSERT INTO projects (user_id, name, color, is_favorite, view_style)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user_id,
            params.name,
            params.color,
            params.is_favorite,
            params.view_style,
        ],
    )?;
    let id = conn.last_insert_rowid();
    conn.query_row(
        "SELECT id, name, color, is_favorite, view_style FROM projects WHERE id = ?1",
        [id],
        map_row_to_project,
    )
    .map_err(DbError::from)
}

/// Lists the user's projects by name.
pub fn list_projects(conn: &Connection, user_id: i64) -> Result<Vec<ProjectRecord>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, color, is_favorite, view_style
         FROM projects WHERE user_id = ?1 ORDER BY name ASC",
    )?;
    let rows = stmt.query_map([user_id], map_row_to_project)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
}
