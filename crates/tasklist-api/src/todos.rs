//! Todo handlers. User and admin routes share handlers; the gate's
//! [`Actor`](crate::middleware::Actor) decides what each call may touch.

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use tasklist_types::api::{
    AdminCreateTodoRequest, ApiResponse, CreateTodoRequest, UpdateTodoRequest,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::RequestIdentity;

/// Own todos for a user, every todo for an admin.
pub async fn list_todos(
    State(state): State<AppState>,
    Extension(identity): Extension<RequestIdentity>,
) -> Result<impl IntoResponse, ApiError> {
    let todos = state.todos.list_todos(&identity.actor).await?;
    Ok(Json(ApiResponse::new("successfully fetch all todos", todos)))
}

pub async fn list_user_todos(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let todos = state.todos.list_todos_for_user(user_id).await?;
    Ok(Json(ApiResponse::new("successfully fetch all todos", todos)))
}

pub async fn create_todo(
    State(state): State<AppState>,
    Extension(identity): Extension<RequestIdentity>,
    ApiJson(req): ApiJson<CreateTodoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let todo = state.todos.create_todo(&identity.actor, None, &req.title).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new("todo created successfully", todo)),
    ))
}

pub async fn admin_create_todo(
    State(state): State<AppState>,
    Extension(identity): Extension<RequestIdentity>,
    ApiJson(req): ApiJson<AdminCreateTodoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let todo = state
        .todos
        .create_todo(&identity.actor, Some(req.user_id), &req.title)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new("todo created successfully", todo)),
    ))
}

pub async fn update_todo(
    State(state): State<AppState>,
    Extension(identity): Extension<RequestIdentity>,
    ApiPath(todo_id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateTodoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let todo = state
        .todos
        .update_todo(&identity.actor, todo_id, &req.title, req.done)
        .await?;
    Ok(Json(ApiResponse::new("todo updated successfully", todo)))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    Extension(identity): Extension<RequestIdentity>,
    ApiPath(todo_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.todos.delete_todo(&identity.actor, todo_id).await?;
    Ok(Json(ApiResponse::new("todo deleted successfully", ())))
}
