//! pgvector (PostgreSQL) vector store backend.
//!
//! Provides [`PgVectorStore`], a [`VectorStore`] built on
//! [sqlx](https://docs.rs/sqlx) and the
//! [pgvector](https://github.com/pgvector/pgvector) extension. Chunks live
//! in a single `doc_chunks` table keyed by `(slug, chunk_index)`; nearest
//! lookups rank with the cosine distance operator `<=>` so the database can
//! use a vector index when one exists and fall back to a scan when not;
//! either way the contract matches the local store's.
//!
//! This module is only available when the `pgvector` feature is enabled.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::document::{DocChunk, SearchResult};
use crate::embedding::check_dimensions;
use crate::error::{Result, SearchError};
use crate::store::{SearchFilter, VectorStore};

const TABLE: &str = "doc_chunks";

/// A [`VectorStore`] backed by PostgreSQL with the pgvector extension.
pub struct PgVectorStore {
    pool: PgPool,
    dimensions: usize,
}

impl PgVectorStore {
    /// Connect to `database_url` and ensure the extension and table exist.
    ///
    /// Fails with [`SearchError::StoreUnavailable`] if the connection cannot
    /// be established; callers on the query path are expected to fall back
    /// to the local store rather than crash.
    pub async fn connect(database_url: &str, dimensions: usize) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| SearchError::store("pgvector", format!("connect: {e}")))?;
        let store = Self { pool, dimensions };
        store.init().await?;
        Ok(store)
    }

    /// Build a store from an existing connection pool.
    pub async fn from_pool(pool: PgPool, dimensions: usize) -> Result<Self> {
        let store = Self { pool, dimensions };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .map_err(Self::map_err)?;

        let create_sql = format!(
            "CREATE TABLE IF NOT EXISTS {TABLE} (\
                slug TEXT NOT NULL, \
                chunk_index INT NOT NULL, \
                title TEXT NOT NULL, \
                folder TEXT NOT NULL, \
                tags JSONB NOT NULL DEFAULT '[]'::jsonb, \
                body TEXT NOT NULL, \
                embedding vector({}), \
                PRIMARY KEY (slug, chunk_index)\
            )",
            self.dimensions
        );
        sqlx::query(&create_sql).execute(&self.pool).await.map_err(Self::map_err)?;

        debug!(table = TABLE, dimensions = self.dimensions, "pgvector store ready");
        Ok(())
    }

    fn map_err(e: sqlx::Error) -> SearchError {
        SearchError::store("pgvector", e.to_string())
    }

    /// pgvector expects vectors in their text form, `[1.0,2.0,...]`.
    fn vector_literal(embedding: &[f32]) -> String {
        format!("[{}]", embedding.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(","))
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn upsert(&self, chunks: &[DocChunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        for chunk in chunks {
            check_dimensions(self.dimensions, &chunk.embedding)?;
        }

        let upsert_sql = format!(
            "INSERT INTO {TABLE} (slug, chunk_index, title, folder, tags, body, embedding) \
             VALUES ($1, $2, $3, $4, $5::jsonb, $6, $7::vector) \
             ON CONFLICT (slug, chunk_index) DO UPDATE SET \
                title = EXCLUDED.title, \
                folder = EXCLUDED.folder, \
                tags = EXCLUDED.tags, \
                body = EXCLUDED.body, \
                embedding = EXCLUDED.embedding"
        );

        for chunk in chunks {
            let tags_json =
                serde_json::to_string(&chunk.tags).unwrap_or_else(|_| "[]".to_string());
            sqlx::query(&upsert_sql)
                .bind(&chunk.slug)
                .bind(chunk.chunk_index as i32)
                .bind(&chunk.title)
                .bind(&chunk.folder)
                .bind(&tags_json)
                .bind(&chunk.text)
                .bind(Self::vector_literal(&chunk.embedding))
                .execute(&self.pool)
                .await
                .map_err(Self::map_err)?;
        }

        debug!(count = chunks.len(), "upserted chunks to pgvector");
        Ok(())
    }

    async fn nearest(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchResult>> {
        check_dimensions(self.dimensions, embedding)?;

        // <=> is cosine distance (0 = identical); score = 1 - distance.
        // The folder filter lands in WHERE, so LIMIT applies after it.
        let search_sql = if filter.folder.is_some() {
            format!(
                "SELECT slug, chunk_index, title, folder, tags, body, \
                        1 - (embedding <=> $1::vector) AS score \
                 FROM {TABLE} WHERE folder = $3 \
                 ORDER BY embedding <=> $1::vector, slug, chunk_index LIMIT $2"
            )
        } else {
            format!(
                "SELECT slug, chunk_index, title, folder, tags, body, \
                        1 - (embedding <=> $1::vector) AS score \
                 FROM {TABLE} \
                 ORDER BY embedding <=> $1::vector, slug, chunk_index LIMIT $2"
            )
        };

        let mut query = sqlx::query(&search_sql)
            .bind(Self::vector_literal(embedding))
            .bind(limit as i64);
        if let Some(folder) = &filter.folder {
            query = query.bind(folder);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(Self::map_err)?;

        let results = rows
            .iter()
            .map(|row| {
                let tags_value: serde_json::Value = row.get("tags");
                let tags: Vec<String> = serde_json::from_value(tags_value).unwrap_or_default();
                let chunk = DocChunk {
                    slug: row.get("slug"),
                    chunk_index: row.get::<i32, _>("chunk_index") as u32,
                    title: row.get("title"),
                    folder: row.get("folder"),
                    tags,
                    text: row.get("body"),
                    embedding: Vec::new(),
                };
                let score: f64 = row.get("score");
                SearchResult::from_chunk(&chunk, score as f32)
            })
            .collect();

        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {TABLE}"))
            .fetch_one(&self.pool)
            .await
            .map_err(Self::map_err)?;
        let n: i64 = row.get("n");
        Ok(n as usize)
    }

    async fn slugs(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(&format!("SELECT DISTINCT slug FROM {TABLE} ORDER BY slug"))
            .fetch_all(&self.pool)
            .await
            .map_err(Self::map_err)?;
        Ok(rows.iter().map(|row| row.get("slug")).collect())
    }

    async fn remove(&self, slugs: &[&str]) -> Result<usize> {
        if slugs.is_empty() {
            return Ok(0);
        }
        let owned: Vec<String> = slugs.iter().map(|s| s.to_string()).collect();
        let result = sqlx::query(&format!("DELETE FROM {TABLE} WHERE slug = ANY($1)"))
            .bind(&owned)
            .execute(&self.pool)
            .await
            .map_err(Self::map_err)?;
        debug!(slugs = slugs.len(), rows = result.rows_affected(), "removed slugs from pgvector");
        Ok(result.rows_affected() as usize)
    }
}
