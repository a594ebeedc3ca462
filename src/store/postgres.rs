use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Collection, DocumentStore, StoreError, StoreResult};

/// JSONB-backed document store. One table per collection, named after it.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> StoreResult<()> {
        for collection in Collection::ALL {
            let ddl = format!(
                "CREATE TABLE IF NOT EXISTS {} (\
                    seq BIGSERIAL, \
                    id UUID PRIMARY KEY, \
                    key TEXT UNIQUE, \
                    body JSONB NOT NULL)",
                collection.name()
            );
            sqlx::query(&ddl).execute(&self.pool).await?;
        }
        log::debug!("document tables ready");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn insert(
        &self,
        collection: Collection,
        id: Uuid,
        key: Option<&str>,
        body: Value,
    ) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO {} (id, key, body) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            collection.name()
        );
        let res = sqlx::query(&sql)
            .bind(id)
            .bind(key)
            .bind(Json(body))
            .execute(&self.pool)
            .await?;

        if res.rows_affected() < 1 {
            return Err(StoreError::DuplicateKey {
                collection,
                key: key.map(str::to_string).unwrap_or_else(|| id.to_string()),
            });
        }
        Ok(())
    }

    async fn find(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Value>> {
        let sql = format!("SELECT body FROM {} WHERE id = $1 LIMIT 1", collection.name());
        let body = sqlx::query_scalar::<_, Json<Value>>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(body.map(|Json(body)| body))
    }

    async fn find_by_key(&self, collection: Collection, key: &str) -> StoreResult<Option<Value>> {
        let sql = format!("SELECT body FROM {} WHERE key = $1 LIMIT 1", collection.name());
        let body = sqlx::query_scalar::<_, Json<Value>>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(body.map(|Json(body)| body))
    }

    async fn find_ids_where(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Uuid>> {
        let sql = format!(
            "SELECT id FROM {} \
             WHERE body -> $1::text = $2::jsonb \
                OR (jsonb_typeof(body -> $1::text) = 'array' \
                    AND body -> $1::text @> jsonb_build_array($2::jsonb)) \
             ORDER BY seq",
            collection.name()
        );
        let ids = sqlx::query_scalar::<_, Uuid>(&sql)
            .bind(field)
            .bind(Json(value))
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn ids(&self, collection: Collection) -> StoreResult<Vec<Uuid>> {
        let sql = format!("SELECT id FROM {} ORDER BY seq", collection.name());
        let ids = sqlx::query_scalar::<_, Uuid>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn replace(&self, collection: Collection, id: Uuid, body: Value) -> StoreResult<bool> {
        let sql = format!("UPDATE {} SET body = $2 WHERE id = $1", collection.name());
        let res = sqlx::query(&sql)
            .bind(id)
            .bind(Json(body))
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() >= 1)
    }

    async fn delete_by_key(
        &self,
        collection: Collection,
        key: &str,
    ) -> StoreResult<Option<Value>> {
        let sql = format!("DELETE FROM {} WHERE key = $1 RETURNING body", collection.name());
        let body = sqlx::query_scalar::<_, Json<Value>>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(body.map(|Json(body)| body))
    }

    async fn clear(&self, collection: Collection) -> StoreResult<u64> {
        let sql = format!("DELETE FROM {}", collection.name());
        let res = sqlx::query(&sql).execute(&self.pool).await?;
        Ok(res.rows_affected())
    }
}
