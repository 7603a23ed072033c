use std::sync::Arc;
use std::time::Duration;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use tasklist_cache::CacheStore;
use tasklist_db::Database;
use tasklist_types::api::{
    ApiResponse, IdentityResponse, LoginRequest, LoginResponse, RegisterRequest,
};

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::middleware::RequestIdentity;
use crate::password::CredentialHasher;
use crate::service::{ListCache, RegistrationPolicy, TodoService, UserService};
use crate::token::TokenService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub tokens: TokenService,
    pub users: UserService,
    pub todos: TodoService,
}

impl AppStateInner {
    /// Wire the services from their collaborators.
    pub fn new(
        db: Arc<Database>,
        cache: Arc<dyn CacheStore>,
        cache_ttl: Duration,
        tokens: TokenService,
        hasher: CredentialHasher,
        policy: RegistrationPolicy,
    ) -> anyhow::Result<Self> {
        let lists = ListCache::new(cache, cache_ttl);
        Ok(Self {
            users: UserService::new(db.clone(), lists.clone(), hasher, tokens.clone(), policy)?,
            todos: TodoService::new(db, lists),
            tokens,
        })
    }
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.users.register(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new("user created successfully", user)),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = state.users.login(&req.username, &req.password).await?;

    Ok(Json(ApiResponse::new("successfully login", LoginResponse { token })))
}

pub async fn me(Extension(identity): Extension<RequestIdentity>) -> impl IntoResponse {
    let claims = identity.claims;
    Json(ApiResponse::new(
        "authenticated",
        IdentityResponse {
            user_id: claims.user_id,
            username: claims.username,
            role: claims.role,
            full_name: claims.full_name,
            expires_at: claims.exp,
        },
    ))
}
