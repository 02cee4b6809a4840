//! Users and per-user profile notes.

use crate::DbError;
use rusqlite::{params, Connection, OptionalExtension, Row};

/// A row in the `users` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub display_name: Option<String>,
    pub active: bool,
}

fn map_row_to_user(row: &Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        active: row.get(3)?,
    })
}

/// Inserts a user and returns its id.
pub fn insert_user(
    conn: &Connection,
    email: &str,
    display_name: Option<&str>,
) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO users (email, display_name) VALUES (?1, ?2)",
        params![email, display_name],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Looks up an active user by email (case-insensitive).
pub fn find_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>, DbError> {
    let user = conn
        .query_row(
            "SELECT id, email, display_name, active
             FROM users WHERE email = ?1 COLLATE NOCASE AND active = 1",
            [email],
            map_row_to_user,
        )
        .optional()?;
    Ok(user)
}

/// Returns the stored profile notes for a user, or an empty string.
pub fn get_user_info(conn: &Connection, user_id: i64) -> Result<String, DbError> {
    let info = conn
        .query_row(
            "SELECT info FROM user_info WHERE user_id = ?1",
            [user_id],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(info.unwrap_or_default())
}

/// Replaces the profile notes for a user.
pub fn set_user_info(conn: &Connection, user_id: i64, info: &str) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO user_info (user_id, info) VALUES (?1, ?2)
         ON CONFLICT(user_id) DO UPDATE SET info = excluded.info, updated_at = datetime('now')",
        params![user_id, info],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_migrations;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn find_user_ignores_case_and_inactive_rows() {
        let conn = setup();
        let id = insert_user(&conn, "Ada@example.com", Some("Ada")).unwrap();

        let found = find_user_by_email(&conn, "ada@example.com").unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.display_name.as_deref(), Some("Ada"));

        conn.execute("UPDATE users SET active = 0 WHERE id = ?1", [id])
            .unwrap();
        assert!(find_user_by_email(&conn, "ada@example.com").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let conn = setup();
        insert_user(&conn, "bob@example.com", None).unwrap();
        let err = insert_user(&conn, "bob@example.com", None).unwrap_err();
        assert!(matches!(err, DbError::Database(_)));
    }

    #[test]
    fn user_info_upserts() {
        let conn = setup();
        let id = insert_user(&conn, "cy@example.com", None).unwrap();
        assert_eq!(get_user_info(&conn, id).unwrap(), "");

        set_user_info(&conn, id, "Prefers metric units").unwrap();
        set_user_info(&conn, id, "Lives in Lyon").unwrap();
        assert_eq!(get_user_info(&conn, id).unwrap(), "Lives in Lyon");
    }
}
