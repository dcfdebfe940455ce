//! SQLite vector store backed by the `sqlite-vec` extension.
//!
//! One collection maps to two tables: `<collection>` for chunk rows and
//! `<collection>_embeddings`, a `vec0` virtual table holding one vector per
//! chunk rowid. The `tokio_rusqlite` connection executes closures on a
//! single background thread, which doubles as the per-collection
//! single-writer queue; reads and writes from concurrent tasks are queued
//! rather than interleaved.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Arc;
use std::sync::Once;

use tokio_rusqlite::{Connection, OptionalExtension, ffi};
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::embeddings::EmbeddingProvider;
use crate::types::{Chunk, RagError, SearchOutcome, SearchResult, StoreStats};

use super::{ChunkRecord, MetadataFilter, VectorStore};

/// Persistent vector collection over SQLite + sqlite-vec.
#[derive(Clone)]
pub struct SqliteVectorStore {
    conn: Connection,
    provider: Arc<dyn EmbeddingProvider>,
    config: StoreConfig,
    dimension: usize,
    table: String,
    embeddings_table: String,
}

impl SqliteVectorStore {
    /// Opens (or creates) the collection at `path`.
    ///
    /// Existing data is never destroyed implicitly; the schema is created
    /// only when absent. The embedding dimension is pinned to the provider's
    /// at creation time.
    pub async fn open(
        path: impl AsRef<Path>,
        provider: Arc<dyn EmbeddingProvider>,
        config: StoreConfig,
    ) -> Result<Self, RagError> {
        register_sqlite_vec()?;

        let conn = Connection::open(path)
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;
        conn.call(|conn| {
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))
                .map_err(tokio_rusqlite::Error::Rusqlite)
        })
        .await
        .map_err(|err| RagError::Storage(format!("sqlite-vec unavailable: {err}")))?;

        let table = sanitize_identifier(&config.collection_name);
        let embeddings_table = format!("{table}_embeddings");
        let store = Self {
            conn,
            dimension: provider.dimension(),
            provider,
            config,
            table,
            embeddings_table,
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn collection_name(&self) -> &str {
        &self.config.collection_name
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    async fn ensure_schema(&self) -> Result<(), RagError> {
        let table = self.table.clone();
        let embeddings_table = self.embeddings_table.clone();
        let dimension = self.dimension;
        self.conn
            .call(move |conn| {
                conn.execute_batch(&format!(
                    "CREATE TABLE IF NOT EXISTS {table} (
                        id TEXT PRIMARY KEY,
                        source TEXT,
                        chunk_index INTEGER,
                        content TEXT,
                        metadata TEXT
                    );
                    CREATE INDEX IF NOT EXISTS idx_{table}_source ON {table}(source);
                    CREATE VIRTUAL TABLE IF NOT EXISTS {embeddings_table}
                        USING vec0(embedding float[{dimension}]);"
                ))
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    /// Embeds a batch behind the configured timeout and validates the
    /// dimension of every returned vector.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let vectors = tokio::time::timeout(
            self.config.embed_timeout,
            self.provider.embed_batch(texts),
        )
        .await
        .map_err(|_| {
            RagError::Embedding(format!(
                "provider '{}' timed out after {:?}",
                self.provider.name(),
                self.config.embed_timeout
            ))
        })??;

        if vectors.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "provider '{}' returned {} vectors for {} texts",
                self.provider.name(),
                vectors.len(),
                texts.len()
            )));
        }
        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(RagError::Embedding(format!(
                    "expected dimension {}, provider returned {}",
                    self.dimension,
                    vector.len()
                )));
            }
        }
        Ok(vectors)
    }

    async fn search_inner(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, RagError> {
        let query_batch = [query.to_string()];
        let embedding = self
            .embed_texts(&query_batch)
            .await?
            .pop()
            .ok_or_else(|| RagError::Embedding("empty embedding batch".to_string()))?;
        let embedding_json = serde_json::to_string(&embedding)
            .map_err(|err| RagError::Storage(err.to_string()))?;

        let metric = self.config.metric;
        let table = self.table.clone();
        let embeddings_table = self.embeddings_table.clone();
        let filter = filter.cloned();

        let rows = self
            .conn
            .call(move |conn| {
                let filter_clause = filter
                    .as_ref()
                    .map(|f| {
                        format!(
                            "WHERE json_extract(c.metadata, '$.{}') = ?2",
                            sanitize_identifier(&f.key)
                        )
                    })
                    .unwrap_or_default();
                let sql = format!(
                    "SELECT c.id, c.content, c.metadata,
                            {distance_fn}(e.embedding, vec_f32(?1)) AS distance
                     FROM {table} c
                     JOIN {embeddings_table} e ON e.rowid = c.rowid
                     {filter_clause}
                     ORDER BY distance ASC, c.rowid ASC
                     LIMIT {k}",
                    distance_fn = metric.distance_fn(),
                );
                let mut stmt = conn.prepare(&sql).map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mut collected = Vec::new();
                match &filter {
                    Some(f) => {
                        let rows = stmt
                            .query_map((&embedding_json, &f.value), |row| {
                                Ok((
                                    row.get::<_, String>(0)?,
                                    row.get::<_, String>(1)?,
                                    row.get::<_, String>(2)?,
                                    row.get::<_, f32>(3)?,
                                ))
                            })
                            .map_err(tokio_rusqlite::Error::Rusqlite)?;
                        for row in rows {
                            collected.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                        }
                    }
                    None => {
                        let rows = stmt
                            .query_map([&embedding_json], |row| {
                                Ok((
                                    row.get::<_, String>(0)?,
                                    row.get::<_, String>(1)?,
                                    row.get::<_, String>(2)?,
                                    row.get::<_, f32>(3)?,
                                ))
                            })
                            .map_err(tokio_rusqlite::Error::Rusqlite)?;
                        for row in rows {
                            collected.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                        }
                    }
                }
                Ok(collected)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;

        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, (id, content, metadata_raw, distance))| SearchResult {
                id,
                content,
                metadata: serde_json::from_str(&metadata_raw)
                    .unwrap_or(serde_json::Value::Null),
                score: metric.score_from_distance(distance),
                distance,
                rank: i + 1,
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl VectorStore for SqliteVectorStore {
    async fn add(&self, chunks: &[Chunk]) -> Result<usize, RagError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        // Embed before touching the database: a provider failure leaves the
        // collection unchanged.
        let embeddings = self.embed_texts(&texts).await?;

        let mut rows = Vec::with_capacity(chunks.len());
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            let record = ChunkRecord::from(chunk);
            let embedding_json = serde_json::to_string(&embedding)
                .map_err(|err| RagError::Storage(err.to_string()))?;
            rows.push((record, embedding_json));
        }

        let table = self.table.clone();
        let embeddings_table = self.embeddings_table.clone();
        let written = self
            .conn
            .call(move |conn| {
                let tx = conn
                    .transaction()
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                for (record, embedding_json) in &rows {
                    tx.execute(
                        &format!(
                            "INSERT INTO {table} (id, source, chunk_index, content, metadata)
                             VALUES (?1, ?2, ?3, ?4, ?5)
                             ON CONFLICT(id) DO UPDATE SET
                                 source = excluded.source,
                                 chunk_index = excluded.chunk_index,
                                 content = excluded.content,
                                 metadata = excluded.metadata"
                        ),
                        (
                            &record.id,
                            &record.source,
                            record.chunk_index as i64,
                            &record.content,
                            record.metadata.to_string(),
                        ),
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                    let rowid: i64 = tx
                        .query_row(
                            &format!("SELECT rowid FROM {table} WHERE id = ?1"),
                            [&record.id],
                            |row| row.get(0),
                        )
                        .map_err(tokio_rusqlite::Error::Rusqlite)?;
                    tx.execute(
                        &format!("DELETE FROM {embeddings_table} WHERE rowid = ?1"),
                        [rowid],
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                    tx.execute(
                        &format!(
                            "INSERT INTO {embeddings_table} (rowid, embedding)
                             VALUES (?1, vec_f32(?2))"
                        ),
                        (rowid, embedding_json.as_str()),
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                }
                tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(rows.len())
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;

        debug!(chunks = written, collection = %self.config.collection_name, "upserted chunks");
        Ok(written)
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> SearchOutcome {
        match self.search_inner(query, k, filter).await {
            Ok(results) => SearchOutcome::ok(results),
            Err(err) => {
                warn!(error = %err, "search degraded to empty result");
                SearchOutcome::degraded(err.to_string())
            }
        }
    }

    async fn stats(&self) -> StoreStats {
        let table = self.table.clone();
        let counted = self
            .conn
            .call(move |conn| {
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get::<_, i64>(0)
                })
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await;

        match counted {
            Ok(count) => StoreStats {
                total_chunks: count as usize,
                collection: self.config.collection_name.clone(),
                note: None,
            },
            Err(err) => {
                warn!(error = %err, "stats degraded to zero count");
                StoreStats {
                    total_chunks: 0,
                    collection: self.config.collection_name.clone(),
                    note: Some(format!("collection not accessible: {err}")),
                }
            }
        }
    }

    async fn clear(&self) -> Result<(), RagError> {
        let table = self.table.clone();
        let embeddings_table = self.embeddings_table.clone();
        self.conn
            .call(move |conn| {
                conn.execute_batch(&format!(
                    "DROP TABLE IF EXISTS {embeddings_table};
                     DROP TABLE IF EXISTS {table};"
                ))
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;
        self.ensure_schema().await?;
        debug!(collection = %self.config.collection_name, "collection cleared and recreated");
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, RagError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<String> = ids.to_vec();
        let table = self.table.clone();
        let embeddings_table = self.embeddings_table.clone();
        self.conn
            .call(move |conn| {
                let tx = conn
                    .transaction()
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mut removed = 0usize;
                for id in &ids {
                    tx.execute(
                        &format!(
                            "DELETE FROM {embeddings_table}
                             WHERE rowid IN (SELECT rowid FROM {table} WHERE id = ?1)"
                        ),
                        [id],
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                    removed += tx
                        .execute(&format!("DELETE FROM {table} WHERE id = ?1"), [id])
                        .map_err(tokio_rusqlite::Error::Rusqlite)?;
                }
                tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(removed)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn list(&self, limit: usize) -> Result<Vec<ChunkRecord>, RagError> {
        let table = self.table.clone();
        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT id, source, chunk_index, content, metadata
                         FROM {table} ORDER BY rowid ASC LIMIT ?1"
                    ))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let rows = stmt
                    .query_map([limit as i64], |row| {
                        Ok(ChunkRecord {
                            id: row.get(0)?,
                            source: row.get(1)?,
                            chunk_index: row.get::<_, i64>(2)? as usize,
                            content: row.get(3)?,
                            metadata: row
                                .get::<_, String>(4)
                                .map(|raw| {
                                    serde_json::from_str(&raw).unwrap_or_default()
                                })
                                .unwrap_or_default(),
                        })
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mut records = Vec::new();
                for row in rows {
                    records.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(records)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn get(&self, id: &str) -> Result<Option<ChunkRecord>, RagError> {
        let id = id.to_string();
        let table = self.table.clone();
        self.conn
            .call(move |conn| {
                conn.query_row(
                    &format!(
                        "SELECT id, source, chunk_index, content, metadata
                         FROM {table} WHERE id = ?1"
                    ),
                    [&id],
                    |row| {
                        Ok(ChunkRecord {
                            id: row.get(0)?,
                            source: row.get(1)?,
                            chunk_index: row.get::<_, i64>(2)? as usize,
                            content: row.get(3)?,
                            metadata: row
                                .get::<_, String>(4)
                                .map(|raw| {
                                    serde_json::from_str(&raw).unwrap_or_default()
                                })
                                .unwrap_or_default(),
                        })
                    },
                )
                .optional()
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }
}

/// Collection names become SQL identifiers, so anything outside
/// `[A-Za-z0-9_]` is replaced and a leading digit gets a prefix.
fn sanitize_identifier(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert_str(0, "c_");
    }
    out
}

fn register_sqlite_vec() -> Result<(), RagError> {
    use std::sync::Mutex;

    static INIT: Once = Once::new();
    static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

    INIT.call_once(|| {
        let result = unsafe {
            type SqliteExtensionInit = unsafe extern "C" fn(
                *mut ffi::sqlite3,
                *mut *mut c_char,
                *const ffi::sqlite3_api_routines,
            ) -> i32;

            let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
            let init_fn: SqliteExtensionInit =
                transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
            let rc = ffi::sqlite3_auto_extension(Some(init_fn));
            if rc != 0 {
                Err(format!(
                    "failed to register sqlite-vec extension (code {rc})"
                ))
            } else {
                Ok(())
            }
        };
        *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
    });

    INIT_RESULT
        .lock()
        .expect("init result mutex poisoned")
        .clone()
        .expect("init was called but result not set")
        .map_err(RagError::Storage)
}
