use axum::{Json, extract::State, response::IntoResponse};

use tasklist_types::api::ApiResponse;

use crate::auth::AppState;
use crate::error::ApiError;

pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let users = state.users.list_users().await?;
    Ok(Json(ApiResponse::new("successfully fetch all users", users)))
}
