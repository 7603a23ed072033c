use std::sync::Arc;

use tracing::{error, info, warn};

use tasklist_db::Database;
use tasklist_types::api::RegisterRequest;
use tasklist_types::models::{Role, User};

use super::blocking;
use super::cache::{ListCache, keys};
use crate::error::{ApiError, INVALID_CREDENTIALS};
use crate::password::CredentialHasher;
use crate::token::TokenService;

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=32;
const MAX_PASSWORD_LEN: usize = 128;
const MAX_FULL_NAME_LEN: usize = 64;

/// Hashed once at startup; unknown usernames are verified against it.
const DECOY_PASSWORD: &str = "tasklist-decoy-password";

/// Which roles public registration may grant.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistrationPolicy {
    pub allow_admin_signup: bool,
}

#[derive(Clone)]
pub struct UserService {
    db: Arc<Database>,
    cache: ListCache,
    hasher: CredentialHasher,
    tokens: TokenService,
    policy: RegistrationPolicy,
    decoy_hash: Arc<str>,
}

impl UserService {
    pub fn new(
        db: Arc<Database>,
        cache: ListCache,
        hasher: CredentialHasher,
        tokens: TokenService,
        policy: RegistrationPolicy,
    ) -> anyhow::Result<Self> {
        let decoy_hash = hasher.hash(DECOY_PASSWORD)?.into();
        Ok(Self {
            db,
            cache,
            hasher,
            tokens,
            policy,
            decoy_hash,
        })
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<User, ApiError> {
        validate_registration(&req)?;

        let role = req.role.unwrap_or(Role::User);
        if role == Role::Admin && !self.policy.allow_admin_signup {
            return Err(ApiError::Forbidden("admin accounts cannot be self-registered"));
        }

        self.create(req.username, req.password, role, req.full_name).await
    }

    /// Both "no such user" and "wrong password" come back as the same error,
    /// after the same amount of hashing work.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let db = self.db.clone();
        let hasher = self.hasher.clone();
        let decoy_hash = self.decoy_hash.clone();
        let username = username.to_string();
        let password = password.to_string();

        let user = blocking(move || {
            let Some(row) = db.get_user_by_username(&username)? else {
                hasher.verify(&password, &decoy_hash)?;
                return Ok(None);
            };
            if !hasher.verify(&password, &row.password)? {
                return Ok(None);
            }
            row.to_user().map(Some)
        })
        .await?;

        let Some(user) = user else {
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS));
        };

        let token = self.tokens.issue(&user)?;
        info!("{} ({}) logged in", user.username, user.id);
        Ok(token)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        let db = self.db.clone();
        let users = self
            .cache
            .get_or_load(&keys::all_users(), move || {
                db.list_users()?
                    .iter()
                    .map(|row| row.to_user())
                    .collect::<anyhow::Result<Vec<_>>>()
            })
            .await?;
        Ok(users)
    }

    /// Make sure an admin account named `username` exists. Returns `true` if it
    /// was created by this call.
    pub async fn ensure_admin(&self, username: &str, password: &str) -> Result<bool, ApiError> {
        let db = self.db.clone();
        let name = username.to_string();
        if let Some(existing) = blocking(move || db.get_user_by_username(&name)).await? {
            if existing.role()? != Role::Admin {
                warn!("Bootstrap admin '{}' exists but is not an admin", username);
            }
            return Ok(false);
        }

        match self
            .create(username.to_string(), password.to_string(), Role::Admin, "Administrator".into())
            .await
        {
            Ok(_) => Ok(true),
            // lost a race with another instance
            Err(ApiError::Conflict(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create(
        &self,
        username: String,
        password: String,
        role: Role,
        full_name: String,
    ) -> Result<User, ApiError> {
        // cheap early exit before paying for a hash; storage still has the last word
        let db = self.db.clone();
        let name = username.clone();
        if blocking(move || db.get_user_by_username(&name)).await?.is_some() {
            return Err(username_taken());
        }

        let hasher = self.hasher.clone();
        let password_hash = blocking(move || hasher.hash(&password)).await?;

        let db = self.db.clone();
        let row = blocking(move || db.create_user(&username, &password_hash, role, &full_name))
            .await?
            .ok_or_else(username_taken)?;
        let user = row.to_user()?;

        self.cache.invalidate(&[keys::all_users()]).await.map_err(|e| {
            error!("User {} created but cache invalidation failed", user.id);
            ApiError::Internal(e)
        })?;

        info!("Registered {} ({}) as {}", user.username, user.id, user.role);
        Ok(user)
    }
}

fn username_taken() -> ApiError {
    ApiError::Conflict("username already exists".into())
}

fn validate_registration(req: &RegisterRequest) -> Result<(), ApiError> {
    if !USERNAME_LEN.contains(&req.username.chars().count()) {
        return Err(ApiError::BadInput(format!(
            "username must be {} to {} characters",
            USERNAME_LEN.start(),
            USERNAME_LEN.end()
        )));
    }
    if !req
        .username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(ApiError::BadInput(
            "username may only contain letters, digits, '_', '.' and '-'".into(),
        ));
    }
    if req.password.is_empty() || req.password.len() > MAX_PASSWORD_LEN {
        return Err(ApiError::BadInput(format!(
            "password must be 1 to {MAX_PASSWORD_LEN} bytes"
        )));
    }
    if req.full_name.chars().count() > MAX_FULL_NAME_LEN {
        return Err(ApiError::BadInput(format!(
            "full_name must be at most {MAX_FULL_NAME_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::cache::DEFAULT_CACHE_TTL;
    use crate::token::DEFAULT_TOKEN_TTL;
    use crate::service::testing::BrokenDeletes;
    use tasklist_cache::{CacheStore, MemoryCache};

    fn service(policy: RegistrationPolicy) -> (Arc<Database>, UserService) {
        service_with(Arc::new(MemoryCache::new()), policy)
    }

    fn service_with(
        store: Arc<dyn CacheStore>,
        policy: RegistrationPolicy,
    ) -> (Arc<Database>, UserService) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let cache = ListCache::new(store, DEFAULT_CACHE_TTL);
        let tokens = TokenService::new("user-service-test-secret", DEFAULT_TOKEN_TTL).unwrap();
        let hasher = CredentialHasher::with_params(1024, 1, 1).unwrap();
        let users = UserService::new(db.clone(), cache, hasher, tokens, policy).unwrap();
        (db, users)
    }

    fn reg(username: &str, password: &str, role: Option<Role>) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            password: password.into(),
            role,
            full_name: String::new(),
        }
    }

    #[tokio::test]
    async fn second_registration_of_same_name_conflicts() {
        let (_, users) = service(RegistrationPolicy::default());
        users.register(reg("alice", "pw123", None)).await.unwrap();

        let err = users.register(reg("alice", "other", None)).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn password_is_stored_hashed() {
        let (db, users) = service(RegistrationPolicy::default());
        let user = users.register(reg("bob", "pw123", None)).await.unwrap();
        assert_eq!(user.role, Role::User);

        let row = db.get_user_by_id(user.id).unwrap().unwrap();
        assert_ne!(row.password, "pw123");
        assert!(!row.password.contains("pw123"));

        let listed = serde_json::to_string(&users.list_users().await.unwrap()).unwrap();
        assert!(!listed.contains(&row.password));
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let (_, users) = service(RegistrationPolicy::default());
        users.register(reg("bob", "pw123", None)).await.unwrap();

        let unknown = users.login("nobody", "pw123").await.unwrap_err();
        let wrong = users.login("bob", "nope").await.unwrap_err();
        assert!(matches!(unknown, ApiError::Unauthorized(INVALID_CREDENTIALS)));
        assert!(matches!(wrong, ApiError::Unauthorized(INVALID_CREDENTIALS)));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn unknown_user_login_pays_for_a_hash() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let cache = ListCache::new(Arc::new(MemoryCache::new()), DEFAULT_CACHE_TTL);
        let tokens = TokenService::new("user-service-test-secret", DEFAULT_TOKEN_TTL).unwrap();
        let hasher = CredentialHasher::with_params(8192, 2, 1).unwrap();
        let users =
            UserService::new(db, cache, hasher, tokens, RegistrationPolicy::default()).unwrap();
        assert!(users.decoy_hash.starts_with("$argon2id$"));
        assert!(users.decoy_hash.contains("m=8192,t=2,p=1"));

        users.register(reg("bob", "pw123", None)).await.unwrap();

        let started = std::time::Instant::now();
        users.login("bob", "nope").await.unwrap_err();
        let wrong_password = started.elapsed();

        let started = std::time::Instant::now();
        users.login("nobody", "nope").await.unwrap_err();
        let unknown_user = started.elapsed();

        assert!(
            unknown_user * 4 >= wrong_password,
            "unknown user took {unknown_user:?}, wrong password took {wrong_password:?}"
        );
    }

    #[tokio::test]
    async fn login_issues_token_with_role() {
        let (_, users) = service(RegistrationPolicy::default());
        let bob = users.register(reg("bob", "pw123", None)).await.unwrap();

        let token = users.login("bob", "pw123").await.unwrap();
        let claims = users.tokens.validate(&token).unwrap();
        assert_eq!(claims.user_id, bob.id);
        assert_eq!(claims.role, Role::User);
    }

    #[tokio::test]
    async fn admin_signup_follows_policy() {
        let (_, closed) = service(RegistrationPolicy::default());
        let err = closed.register(reg("root", "pw", Some(Role::Admin))).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        let (_, open) = service(RegistrationPolicy { allow_admin_signup: true });
        let admin = open.register(reg("root", "pw", Some(Role::Admin))).await.unwrap();
        assert_eq!(admin.role, Role::Admin);
    }

    #[tokio::test]
    async fn invalid_registrations_are_bad_input() {
        let (_, users) = service(RegistrationPolicy::default());
        for req in [
            reg("ab", "pw", None),
            reg(&"x".repeat(33), "pw", None),
            reg("has space", "pw", None),
            reg("carol", "", None),
        ] {
            let err = users.register(req).await.unwrap_err();
            assert!(matches!(err, ApiError::BadInput(_)));
        }
    }

    #[tokio::test]
    async fn user_list_refreshes_after_registration() {
        let (_, users) = service(RegistrationPolicy::default());
        users.register(reg("alice", "pw", None)).await.unwrap();
        assert_eq!(users.list_users().await.unwrap().len(), 1);

        users.register(reg("bob", "pw", None)).await.unwrap();
        let names: Vec<String> = users
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn failed_invalidation_fails_registration_after_commit() {
        let (db, users) =
            service_with(Arc::new(BrokenDeletes::default()), RegistrationPolicy::default());

        let err = users.register(reg("bob", "pw123", None)).await.unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
        assert!(db.get_user_by_username("bob").unwrap().is_some());
    }

    #[tokio::test]
    async fn ensure_admin_is_idempotent() {
        let (db, users) = service(RegistrationPolicy::default());
        assert!(users.ensure_admin("admin", "s3cret").await.unwrap());
        assert!(!users.ensure_admin("admin", "s3cret").await.unwrap());

        let row = db.get_user_by_username("admin").unwrap().unwrap();
        assert_eq!(row.role().unwrap(), Role::Admin);
    }

    #[tokio::test]
    async fn concurrent_registrations_yield_one_winner() {
        let (db, users) = service(RegistrationPolicy::default());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let users = users.clone();
            handles.push(tokio::spawn(async move {
                users.register(reg("dup", "pw", None)).await
            }));
        }

        let mut ok = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(ApiError::Conflict(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(db.list_users().unwrap().len(), 1);
    }
}
