//! Access control gate: authenticate the bearer token, check the route's role
//! requirement, and attach a typed [`RequestIdentity`] for handlers.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use tasklist_types::api::Claims;
use tasklist_types::models::Role;

use crate::auth::AppState;
use crate::error::{ApiError, MUST_AUTHENTICATE};
use crate::token::TokenService;

/// Role requirement declared by a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    /// Any valid token.
    Authenticated,
    Only(Role),
}

impl RouteAccess {
    pub fn permits(&self, role: Role) -> bool {
        match self {
            RouteAccess::Authenticated => true,
            RouteAccess::Only(required) => *required == role,
        }
    }
}

/// Who a request acts as once authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// Not bound to an owner; admin routes name their target explicitly.
    Admin,
    /// Bound to the token's user id for ownership checks.
    Owner(i64),
}

impl Actor {
    pub fn from_claims(claims: &Claims) -> Self {
        match claims.role {
            Role::Admin => Actor::Admin,
            Role::User => Actor::Owner(claims.user_id),
        }
    }
}

/// Request-scoped identity placed in request extensions by the gate.
#[derive(Debug, Clone)]
pub struct RequestIdentity {
    pub claims: Claims,
    pub actor: Actor,
}

/// Run the gate against a raw `Authorization` header value.
pub fn authorize(
    tokens: &TokenService,
    authorization: Option<&str>,
    access: RouteAccess,
) -> Result<RequestIdentity, ApiError> {
    let token = authorization
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::Unauthorized(MUST_AUTHENTICATE))?;

    let claims = tokens.validate(token)?;

    if !access.permits(claims.role) {
        debug!(
            "User {} ({}) denied: role {} does not satisfy {:?}",
            claims.username, claims.user_id, claims.role, access
        );
        return Err(ApiError::Forbidden("not allowed to access this resource"));
    }

    let actor = Actor::from_claims(&claims);
    Ok(RequestIdentity { claims, actor })
}

async fn gate(
    state: &AppState,
    mut req: Request,
    next: Next,
    access: RouteAccess,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let identity = authorize(&state.tokens, auth_header, access)?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Any valid token.
pub async fn require_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    gate(&state, req, next, RouteAccess::Authenticated).await
}

pub async fn require_user(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    gate(&state, req, next, RouteAccess::Only(Role::User)).await
}

pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    gate(&state, req, next, RouteAccess::Only(Role::Admin)).await
}
