//! Cross-app memory (`ultralight.remember/recall`, spec §4.7). Distinct from
//! [`crate::kv`]: scope is a caller-chosen string, not implicitly the
//! current app, so one app can read memory another app wrote when the
//! caller opts into `scope = "user"`.

use async_trait::async_trait;
use serde_json::Value;

use crate::CapabilityError;

/// `scope = "app:<appId>"` restricts recall to memories written under the
/// same scope string; `scope = "user"` shares across every app for the
/// current user.
#[must_use]
pub fn default_scope(app_id: &str) -> String {
    format!("app:{app_id}")
}

#[async_trait]
pub trait MemoryBackend: Send + Sync {
    async fn remember(
        &self,
        user_id: &str,
        scope: &str,
        key: &str,
        value: Value,
    ) -> Result<(), CapabilityError>;

    async fn recall(
        &self,
        user_id: &str,
        scope: &str,
        key: &str,
    ) -> Result<Option<Value>, CapabilityError>;
}

/// In-memory [`MemoryBackend`] used by tests and local development.
#[derive(Default)]
pub struct InMemoryMemory {
    entries: dashmap::DashMap<(String, String, String), Value>,
}

impl InMemoryMemory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryBackend for InMemoryMemory {
    async fn remember(
        &self,
        user_id: &str,
        scope: &str,
        key: &str,
        value: Value,
    ) -> Result<(), CapabilityError> {
        self.entries
            .insert((user_id.to_string(), scope.to_string(), key.to_string()), value);
        Ok(())
    }

    async fn recall(
        &self,
        user_id: &str,
        scope: &str,
        key: &str,
    ) -> Result<Option<Value>, CapabilityError> {
        Ok(self
            .entries
            .get(&(user_id.to_string(), scope.to_string(), key.to_string()))
            .map(|v| v.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_scope_is_app_prefixed() {
        assert_eq!(default_scope("app1"), "app:app1");
    }

    #[tokio::test]
    async fn remember_then_recall_round_trips() {
        let mem = InMemoryMemory::new();
        mem.remember("u1", "app:app1", "k", json!("v")).await.unwrap();
        assert_eq!(mem.recall("u1", "app:app1", "k").await.unwrap(), Some(json!("v")));
    }

    #[tokio::test]
    async fn app_scoped_memory_is_not_visible_under_a_different_app_scope() {
        let mem = InMemoryMemory::new();
        mem.remember("u1", "app:app1", "k", json!(1)).await.unwrap();
        assert_eq!(mem.recall("u1", "app:app2", "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn user_scoped_memory_is_shared_across_apps() {
        let mem = InMemoryMemory::new();
        mem.remember("u1", "user", "k", json!(1)).await.unwrap();
        assert_eq!(mem.recall("u1", "user", "k").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn memory_is_scoped_per_user() {
        let mem = InMemoryMemory::new();
        mem.remember("u1", "user", "k", json!(1)).await.unwrap();
        assert_eq!(mem.recall("u2", "user", "k").await.unwrap(), None);
    }
}
