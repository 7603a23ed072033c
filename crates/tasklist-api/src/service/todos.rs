use std::sync::Arc;

use tracing::{error, info};

use tasklist_db::Database;
use tasklist_types::models::Todo;

use super::blocking;
use super::cache::{ListCache, keys};
use crate::error::ApiError;
use crate::middleware::Actor;

const MAX_TITLE_LEN: usize = 200;

/// Ownership-checked todo CRUD with cache invalidation on every write.
#[derive(Clone)]
pub struct TodoService {
    db: Arc<Database>,
    cache: ListCache,
}

impl TodoService {
    pub fn new(db: Arc<Database>, cache: ListCache) -> Self {
        Self { db, cache }
    }

    /// A user always creates for themselves; an admin must name the owner.
    pub async fn create_todo(
        &self,
        actor: &Actor,
        target_user_id: Option<i64>,
        title: &str,
    ) -> Result<Todo, ApiError> {
        let owner = match actor {
            Actor::Owner(id) => *id,
            Actor::Admin => target_user_id
                .ok_or_else(|| ApiError::BadInput("user_id is required".into()))?,
        };
        let title = validate_title(title)?;

        let db = self.db.clone();
        let row = blocking(move || db.insert_todo(owner, &title))
            .await?
            .ok_or(ApiError::NotFound)?;

        let todo = Todo::from(row);
        self.invalidate_for(todo.user_id).await?;

        info!("Todo {} created for user {}", todo.id, todo.user_id);
        Ok(todo)
    }

    /// Admin sees every todo, a user only their own.
    pub async fn list_todos(&self, actor: &Actor) -> Result<Vec<Todo>, ApiError> {
        match actor {
            Actor::Admin => self.list_all_todos().await,
            Actor::Owner(id) => self.list_todos_for_user(*id).await,
        }
    }

    pub async fn list_all_todos(&self) -> Result<Vec<Todo>, ApiError> {
        let db = self.db.clone();
        let todos = self
            .cache
            .get_or_load(&keys::all_todos(), move || {
                Ok(db.list_todos()?.into_iter().map(Todo::from).collect::<Vec<_>>())
            })
            .await?;
        Ok(todos)
    }

    pub async fn list_todos_for_user(&self, user_id: i64) -> Result<Vec<Todo>, ApiError> {
        let db = self.db.clone();
        let todos = self
            .cache
            .get_or_load(&keys::user_todos(user_id), move || {
                Ok(db
                    .list_todos_by_user(user_id)?
                    .into_iter()
                    .map(Todo::from)
                    .collect::<Vec<_>>())
            })
            .await?;
        Ok(todos)
    }

    pub async fn update_todo(
        &self,
        actor: &Actor,
        todo_id: i64,
        title: &str,
        done: bool,
    ) -> Result<Todo, ApiError> {
        let title = validate_title(title)?;
        let owner = owner_filter(actor);

        let db = self.db.clone();
        let row = blocking(move || db.update_todo(todo_id, owner, &title, done))
            .await?
            .ok_or_else(|| not_found_or_not_owned(actor))?;

        let todo = Todo::from(row);
        self.invalidate_for(todo.user_id).await?;

        info!("Todo {} updated", todo.id);
        Ok(todo)
    }

    pub async fn delete_todo(&self, actor: &Actor, todo_id: i64) -> Result<(), ApiError> {
        let owner = owner_filter(actor);

        let db = self.db.clone();
        let row = blocking(move || db.delete_todo(todo_id, owner))
            .await?
            .ok_or_else(|| not_found_or_not_owned(actor))?;

        self.invalidate_for(row.user_id).await?;

        info!("Todo {} deleted", row.id);
        Ok(())
    }

    /// The write is already committed here; a failed invalidation is still
    /// reported so the caller never sees success with a stale cache.
    async fn invalidate_for(&self, owner: i64) -> Result<(), ApiError> {
        self.cache
            .invalidate(&[keys::all_todos(), keys::user_todos(owner)])
            .await
            .map_err(|e| {
                error!("Todo write for user {} committed but cache invalidation failed", owner);
                ApiError::Internal(e)
            })
    }
}

fn owner_filter(actor: &Actor) -> Option<i64> {
    match actor {
        Actor::Admin => None,
        Actor::Owner(id) => Some(*id),
    }
}

/// Users cannot tell a missing todo from someone else's.
fn not_found_or_not_owned(actor: &Actor) -> ApiError {
    match actor {
        Actor::Admin => ApiError::NotFound,
        Actor::Owner(_) => ApiError::Forbidden("todo not found or not owned by you"),
    }
}

fn validate_title(title: &str) -> Result<String, ApiError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::BadInput("title must not be empty".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::BadInput(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}
