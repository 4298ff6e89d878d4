//! Store contract consumed by the gateway.

use async_trait::async_trait;

/// Backend interface for key-value operations.
///
/// The gateway never implements storage itself; a deployment injects an
/// adapter over whatever engine actually holds the data (a consensus-backed
/// store in production, an in-memory map in tests). Implementations must be
/// safe to call from concurrent handler tasks and own whatever
/// serialization their consistency model needs.
///
/// Errors are opaque to the gateway: they are logged with their cause and
/// surfaced to callers as generic internal errors.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Look up a key. `Ok(None)` means the key is absent, which is a
    /// legitimate result, not an error.
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Write a key-value pair. An empty value is a real value, distinct
    /// from deleting the key.
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;

    /// Remove a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}
