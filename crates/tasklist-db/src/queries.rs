use crate::Database;
use crate::models::{TodoRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, Row};
use tasklist_types::models::Role;

const USER_COLUMNS: &str = "id, username, password, role, full_name";
const TODO_COLUMNS: &str = "id, user_id, title, done";

impl Database {
    // -- Users --

    /// Insert a user. Returns `None` when the username is already taken; the
    /// UNIQUE constraint decides, so concurrent registrations cannot both win.
    pub fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
        full_name: &str,
    ) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            let sql = format!(
                "INSERT INTO users (username, password, role, full_name) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(username) DO NOTHING
                 RETURNING {USER_COLUMNS}"
            );
            conn.query_row(
                &sql,
                (username, password_hash, role.as_str(), full_name),
                map_user,
            )
            .optional()
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by(conn, "id", id))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Todos --

    /// Insert a todo for `user_id`. Returns `None` if that user does not exist.
    pub fn insert_todo(&self, user_id: i64, title: &str) -> Result<Option<TodoRow>> {
        self.with_conn_mut(|conn| {
            let sql = format!(
                "INSERT INTO todos (user_id, title)
                 SELECT ?1, ?2 WHERE EXISTS (SELECT 1 FROM users WHERE id = ?1)
                 RETURNING {TODO_COLUMNS}"
            );
            conn.query_row(&sql, rusqlite::params![user_id, title], map_todo)
                .optional()
        })
    }

    pub fn get_todo(&self, id: i64) -> Result<Option<TodoRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = ?1"),
                [id],
                map_todo,
            )
            .optional()
        })
    }

    pub fn list_todos(&self) -> Result<Vec<TodoRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {TODO_COLUMNS} FROM todos ORDER BY id"))?;
            let rows = stmt
                .query_map([], map_todo)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_todos_by_user(&self, user_id: i64) -> Result<Vec<TodoRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TODO_COLUMNS} FROM todos WHERE user_id = ?1 ORDER BY id"
            ))?;
            let rows = stmt
                .query_map([user_id], map_todo)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Update title and done flag. With `owner = Some(uid)` the row only
    /// matches if it belongs to `uid`, so the ownership check and the write are
    /// one statement. Returns the updated row, or `None` if nothing matched.
    pub fn update_todo(
        &self,
        id: i64,
        owner: Option<i64>,
        title: &str,
        done: bool,
    ) -> Result<Option<TodoRow>> {
        self.with_conn_mut(|conn| {
            let sql = format!(
                "UPDATE todos SET title = ?3, done = ?4
                 WHERE id = ?1 AND (?2 IS NULL OR user_id = ?2)
                 RETURNING {TODO_COLUMNS}"
            );
            conn.query_row(&sql, rusqlite::params![id, owner, title, done], map_todo)
                .optional()
        })
    }

    /// Delete a todo, with the same owner filter as [`Database::update_todo`].
    /// Returns the removed row.
    pub fn delete_todo(&self, id: i64, owner: Option<i64>) -> Result<Option<TodoRow>> {
        self.with_conn_mut(|conn| {
            let sql = format!(
                "DELETE FROM todos
                 WHERE id = ?1 AND (?2 IS NULL OR user_id = ?2)
                 RETURNING {TODO_COLUMNS}"
            );
            conn.query_row(&sql, rusqlite::params![id, owner], map_todo)
                .optional()
        })
    }
}

fn query_user_by<V: rusqlite::ToSql>(
    conn: &Connection,
    column: &str,
    value: V,
) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"))?;

    stmt.query_row([value], map_user).optional()
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        role: row.get(3)?,
        full_name: row.get(4)?,
    })
}

fn map_todo(row: &Row<'_>) -> rusqlite::Result<TodoRow> {
    Ok(TodoRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        done: row.get(3)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
