use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::auth::{self, AppState};
use crate::middleware::{require_admin, require_auth, require_user};
use crate::{todos, users};

/// The full HTTP surface, with every non-public route behind the gate.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register));

    let user_routes = Router::new()
        .route("/todos", get(todos::list_todos).post(todos::create_todo))
        .route("/todos/{id}", put(todos::update_todo).delete(todos::delete_todo))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user));

    let admin_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/admin/todos", get(todos::list_todos).post(todos::admin_create_todo))
        .route("/admin/todos/{id}", put(todos::update_todo).delete(todos::delete_todo))
        .route("/admin/users/{user_id}/todos", get(todos::list_user_todos))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let authenticated_routes = Router::new()
        .route("/me", get(auth::me))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api = Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .merge(authenticated_routes)
        .with_state(state);

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(health))
}

async fn health() -> &'static str {
    "ok"
}
