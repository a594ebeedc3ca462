//! Document persistence.
//!
//! The service never talks to a database driver directly. It goes through the
//! [`DocumentStore`] trait, which deals in JSON documents addressed by a `Uuid`
//! and, for most collections, a unique business key (`studentID`, `courseCode`,
//! professor `email`). [`Repository`] layers typed access on top of it.
//!
//! Writes are whole-document replacements. Two requests mutating the same
//! document race, and the later `replace` wins.

pub mod memory;
pub mod postgres;

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Collection {
    Students,
    Courses,
    Professors,
    Attendances,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Students,
        Collection::Courses,
        Collection::Professors,
        Collection::Attendances,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Students => "students",
            Collection::Courses => "courses",
            Collection::Professors => "professors",
            Collection::Attendances => "attendances",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate key `{key}` in {collection}")]
    DuplicateKey { collection: Collection, key: String },
    #[error("Corrupt document in {collection}: {source}")]
    Corrupt {
        collection: Collection,
        #[source]
        source: serde_json::Error,
    },
    #[error("Backend failure: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a new document. Fails with `DuplicateKey` when `key` is taken.
    async fn insert(
        &self,
        collection: Collection,
        id: Uuid,
        key: Option<&str>,
        body: Value,
    ) -> StoreResult<()>;

    async fn find(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Value>>;

    async fn find_by_key(&self, collection: Collection, key: &str) -> StoreResult<Option<Value>>;

    /// Ids of documents whose `field` equals `value`, or is an array containing it.
    async fn find_ids_where(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Uuid>>;

    async fn ids(&self, collection: Collection) -> StoreResult<Vec<Uuid>>;

    /// Overwrites the stored body. Returns `false` if the document is gone.
    async fn replace(&self, collection: Collection, id: Uuid, body: Value) -> StoreResult<bool>;

    /// Removes the document owning `key` and hands back its last body.
    async fn delete_by_key(&self, collection: Collection, key: &str)
        -> StoreResult<Option<Value>>;

    /// Drops every document in `collection`. Returns how many were removed.
    async fn clear(&self, collection: Collection) -> StoreResult<u64>;
}

/// A record type living in one collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;

    fn id(&self) -> Uuid;

    fn unique_key(&self) -> Option<&str>;
}

pub struct Repository<D> {
    store: Arc<dyn DocumentStore>,
    _doc: PhantomData<fn() -> D>,
}

impl<D> Clone for Repository<D> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _doc: PhantomData,
        }
    }
}

impl<D: Document> Repository<D> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _doc: PhantomData,
        }
    }

    fn encode(doc: &D) -> StoreResult<Value> {
        serde_json::to_value(doc).map_err(|source| StoreError::Corrupt {
            collection: D::COLLECTION,
            source,
        })
    }

    fn decode(body: Value) -> StoreResult<D> {
        serde_json::from_value(body).map_err(|source| StoreError::Corrupt {
            collection: D::COLLECTION,
            source,
        })
    }

    pub async fn insert(&self, doc: &D) -> StoreResult<()> {
        let body = Self::encode(doc)?;
        self.store
            .insert(D::COLLECTION, doc.id(), doc.unique_key(), body)
            .await
    }

    pub async fn find(&self, id: Uuid) -> StoreResult<Option<D>> {
        self.store
            .find(D::COLLECTION, id)
            .await?
            .map(Self::decode)
            .transpose()
    }

    pub async fn find_by_key(&self, key: &str) -> StoreResult<Option<D>> {
        self.store
            .find_by_key(D::COLLECTION, key)
            .await?
            .map(Self::decode)
            .transpose()
    }

    pub async fn ids_where<V: Serialize>(&self, field: &str, value: V) -> StoreResult<Vec<Uuid>> {
        let value = serde_json::to_value(value).map_err(|source| StoreError::Corrupt {
            collection: D::COLLECTION,
            source,
        })?;
        self.store
            .find_ids_where(D::COLLECTION, field, &value)
            .await
    }

    pub async fn ids(&self) -> StoreResult<Vec<Uuid>> {
        self.store.ids(D::COLLECTION).await
    }

    pub async fn save(&self, doc: &D) -> StoreResult<bool> {
        let body = Self::encode(doc)?;
        self.store.replace(D::COLLECTION, doc.id(), body).await
    }

    pub async fn clear(&self) -> StoreResult<u64> {
        self.store.clear(D::COLLECTION).await
    }

    pub async fn delete_by_key(&self, key: &str) -> StoreResult<Option<D>> {
        self.store
            .delete_by_key(D::COLLECTION, key)
            .await?
            .map(Self::decode)
            .transpose()
    }
}

/// `true` when `body[field]` is `value` or an array holding it.
pub(crate) fn field_matches(body: &Value, field: &str, value: &Value) -> bool {
    match body.get(field) {
        Some(Value::Array(items)) => items.iter().any(|item| item == value),
        Some(other) => other == value,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_matching_covers_scalars_and_arrays() {
        let id = Uuid::new_v4().to_string();
        let body = json!({ "professorEmail": "a@b.ca", "courses": [id.clone()] });

        assert!(field_matches(&body, "professorEmail", &json!("a@b.ca")));
        assert!(field_matches(&body, "courses", &json!(id)));
        assert!(!field_matches(&body, "courses", &json!("other")));
        assert!(!field_matches(&body, "missing", &json!("a@b.ca")));
    }
}
