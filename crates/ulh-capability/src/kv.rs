//! Per-user, per-app key-value storage (`ultralight.store/load/list/query/remove`,
//! spec §4.7).

use async_trait::async_trait;
use serde_json::Value;

use crate::CapabilityError;

/// A single page of a prefix query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage {
    pub entries: Vec<(String, Value)>,
}

/// Backing store for [`crate::CapabilitySurface::store`] and friends. Keys
/// are opaque strings; `/` is hierarchical by convention only, not enforced
/// here.
#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn store(
        &self,
        user_id: &str,
        app_id: &str,
        key: &str,
        value: Value,
    ) -> Result<(), CapabilityError>;

    async fn load(
        &self,
        user_id: &str,
        app_id: &str,
        key: &str,
    ) -> Result<Option<Value>, CapabilityError>;

    async fn list(
        &self,
        user_id: &str,
        app_id: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<String>, CapabilityError>;

    async fn query(
        &self,
        user_id: &str,
        app_id: &str,
        prefix: &str,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<QueryPage, CapabilityError>;

    async fn remove(&self, user_id: &str, app_id: &str, key: &str) -> Result<(), CapabilityError>;
}

/// In-memory [`KvBackend`] used by tests and local development.
#[derive(Default)]
pub struct InMemoryKv {
    entries: dashmap::DashMap<(String, String, String), Value>,
}

impl InMemoryKv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvBackend for InMemoryKv {
    async fn store(
        &self,
        user_id: &str,
        app_id: &str,
        key: &str,
        value: Value,
    ) -> Result<(), CapabilityError> {
        self.entries
            .insert((user_id.to_string(), app_id.to_string(), key.to_string()), value);
        Ok(())
    }

    async fn load(
        &self,
        user_id: &str,
        app_id: &str,
        key: &str,
    ) -> Result<Option<Value>, CapabilityError> {
        Ok(self
            .entries
            .get(&(user_id.to_string(), app_id.to_string(), key.to_string()))
            .map(|v| v.clone()))
    }

    async fn list(
        &self,
        user_id: &str,
        app_id: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<String>, CapabilityError> {
        let prefix = prefix.unwrap_or("");
        Ok(self
            .entries
            .iter()
            .filter(|e| e.key().0 == user_id && e.key().1 == app_id && e.key().2.starts_with(prefix))
            .map(|e| e.key().2.clone())
            .collect())
    }

    async fn query(
        &self,
        user_id: &str,
        app_id: &str,
        prefix: &str,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<QueryPage, CapabilityError> {
        let mut matched: Vec<(String, Value)> = self
            .entries
            .iter()
            .filter(|e| e.key().0 == user_id && e.key().1 == app_id && e.key().2.starts_with(prefix))
            .map(|e| (e.key().2.clone(), e.value().clone()))
            .collect();
        matched.sort_by(|a, b| a.0.cmp(&b.0));

        let offset = offset.unwrap_or(0);
        let entries = match limit {
            Some(limit) => matched.into_iter().skip(offset).take(limit).collect(),
            None => matched.into_iter().skip(offset).collect(),
        };
        Ok(QueryPage { entries })
    }

    async fn remove(&self, user_id: &str, app_id: &str, key: &str) -> Result<(), CapabilityError> {
        self.entries
            .remove(&(user_id.to_string(), app_id.to_string(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn store_then_load_round_trips() {
        let kv = InMemoryKv::new();
        kv.store("u1", "app1", "k", json!({"a": 1})).await.unwrap();
        assert_eq!(kv.load("u1", "app1", "k").await.unwrap(), Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn load_missing_key_is_none() {
        let kv = InMemoryKv::new();
        assert_eq!(kv.load("u1", "app1", "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn keys_are_scoped_per_user_and_app() {
        let kv = InMemoryKv::new();
        kv.store("u1", "app1", "k", json!(1)).await.unwrap();
        assert_eq!(kv.load("u2", "app1", "k").await.unwrap(), None);
        assert_eq!(kv.load("u1", "app2", "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let kv = InMemoryKv::new();
        kv.store("u1", "app1", "notes/a", json!(1)).await.unwrap();
        kv.store("u1", "app1", "notes/b", json!(2)).await.unwrap();
        kv.store("u1", "app1", "other", json!(3)).await.unwrap();
        let mut names = kv.list("u1", "app1", Some("notes/")).await.unwrap();
        names.sort();
        assert_eq!(names, vec!["notes/a".to_string(), "notes/b".to_string()]);
    }

    #[tokio::test]
    async fn query_paginates_sorted_results() {
        let kv = InMemoryKv::new();
        for i in 0..5 {
            kv.store("u1", "app1", &format!("n/{i}"), json!(i)).await.unwrap();
        }
        let page = kv.query("u1", "app1", "n/", Some(2), Some(1)).await.unwrap();
        assert_eq!(page.entries, vec![("n/1".to_string(), json!(1)), ("n/2".to_string(), json!(2))]);
    }

    #[tokio::test]
    async fn remove_deletes_key() {
        let kv = InMemoryKv::new();
        kv.store("u1", "app1", "k", json!(1)).await.unwrap();
        kv.remove("u1", "app1", "k").await.unwrap();
        assert_eq!(kv.load("u1", "app1", "k").await.unwrap(), None);
    }
}
