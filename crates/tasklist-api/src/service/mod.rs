//! Domain services: ownership-checked CRUD composed from the record store, the
//! list cache, the credential hasher and the token service.

pub mod cache;
pub mod todos;
pub mod users;

pub use cache::ListCache;
pub use todos::TodoService;
pub use users::{RegistrationPolicy, UserService};

use anyhow::anyhow;

/// Run blocking work (SQLite, Argon2) off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow!("spawn_blocking join error: {}", e))?
}
