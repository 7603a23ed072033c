//! Database row types — these map directly to SQLite rows.
//! Distinct from tasklist-types API models to keep the DB layer independent.
use anyhow::{Result, anyhow};
use tasklist_types::models::{Role, Todo, User};

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub role: String,
    pub full_name: String,
}

impl UserRow {
    pub fn role(&self) -> Result<Role> {
        self.role
            .parse()
            .map_err(|e| anyhow!("Corrupt role on user {}: {}", self.id, e))
    }

    /// Public view of the row, without the password hash.
    pub fn to_user(&self) -> Result<User> {
        Ok(User {
            id: self.id,
            username: self.username.clone(),
            role: self.role()?,
            full_name: self.full_name.clone(),
        })
    }
}

pub struct TodoRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub done: bool,
}

impl From<TodoRow> for Todo {
    fn from(row: TodoRow) -> Self {
        Todo {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            done: row.done,
        }
    }
}
