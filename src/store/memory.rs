use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{field_matches, Collection, DocumentStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
struct Entry {
    id: Uuid,
    key: Option<String>,
    body: Value,
}

/// Process-local backend. Used when no database is configured and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(
        &self,
        collection: Collection,
        id: Uuid,
        key: Option<&str>,
        body: Value,
    ) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        let entries = collections.entry(collection).or_default();

        if let Some(key) = key {
            if entries.iter().any(|e| e.key.as_deref() == Some(key)) {
                return Err(StoreError::DuplicateKey {
                    collection,
                    key: key.to_string(),
                });
            }
        }
        if entries.iter().any(|e| e.id == id) {
            return Err(StoreError::DuplicateKey {
                collection,
                key: id.to_string(),
            });
        }

        entries.push(Entry {
            id,
            key: key.map(str::to_string),
            body,
        });
        Ok(())
    }

    async fn find(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|entries| entries.iter().find(|e| e.id == id))
            .map(|e| e.body.clone()))
    }

    async fn find_by_key(&self, collection: Collection, key: &str) -> StoreResult<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|entries| entries.iter().find(|e| e.key.as_deref() == Some(key)))
            .map(|e| e.body.clone()))
    }

    async fn find_ids_where(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Uuid>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| field_matches(&e.body, field, value))
                    .map(|e| e.id)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn ids(&self, collection: Collection) -> StoreResult<Vec<Uuid>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|entries| entries.iter().map(|e| e.id).collect())
            .unwrap_or_default())
    }

    async fn replace(&self, collection: Collection, id: Uuid, body: Value) -> StoreResult<bool> {
        let mut collections = self.collections.write().await;
        let entry = collections
            .get_mut(&collection)
            .and_then(|entries| entries.iter_mut().find(|e| e.id == id));

        match entry {
            Some(entry) => {
                entry.body = body;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_key(
        &self,
        collection: Collection,
        key: &str,
    ) -> StoreResult<Option<Value>> {
        let mut collections = self.collections.write().await;
        let entries = match collections.get_mut(&collection) {
            Some(entries) => entries,
            None => return Ok(None),
        };

        Ok(entries
            .iter()
            .position(|e| e.key.as_deref() == Some(key))
            .map(|index| entries.remove(index).body))
    }

    async fn clear(&self, collection: Collection) -> StoreResult<u64> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .remove(&collection)
            .map(|entries| entries.len() as u64)
            .unwrap_or(0))
    }
}
