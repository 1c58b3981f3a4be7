//! SQLite persistence for the vector index.
//!
//! One file per knowledge base. A `meta` table carries the format version
//! and a JSON manifest describing how the index was built; the `chunks` table
//! stores chunks with their embeddings (little-endian `f32` blobs) keyed by
//! insertion ordinal. Writes go to a temporary sibling that is renamed over
//! the target, so a reader never sees a half-written index.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use insight_core::{AppError, AppResult};
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::index::{Metric, VectorIndex};
use crate::types::{Chunk, Document, IndexStats};

/// Bumped whenever the on-disk layout changes.
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Settings an index was built with; a loaded index must match the running ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSignature {
    pub embedding_provider: String,
    pub embedding_model: String,
    pub dimension: usize,
    pub metric: Metric,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

/// Self-description stored alongside the persisted index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    #[serde(flatten)]
    pub signature: IndexSignature,
    /// SHA-256 over the ingested documents
    pub corpus_hash: String,
    pub document_count: usize,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

impl IndexManifest {
    pub fn new(
        signature: IndexSignature,
        corpus_hash: String,
        document_count: usize,
        chunk_count: usize,
    ) -> Self {
        Self {
            format_version: INDEX_FORMAT_VERSION,
            signature,
            corpus_hash,
            document_count,
            chunk_count,
            created_at: Utc::now(),
        }
    }

    /// `IndexNotFound` when the index was built with different settings.
    pub fn check_compatible(&self, expected: &IndexSignature) -> AppResult<()> {
        let actual = &self.signature;
        let mut differences = Vec::new();

        if actual.embedding_provider != expected.embedding_provider
            || actual.embedding_model != expected.embedding_model
        {
            differences.push(format!(
                "embedding model {}/{} (configured {}/{})",
                actual.embedding_provider,
                actual.embedding_model,
                expected.embedding_provider,
                expected.embedding_model
            ));
        }
        if actual.dimension != expected.dimension {
            differences.push(format!(
                "dimension {} (configured {})",
                actual.dimension, expected.dimension
            ));
        }
        if actual.metric != expected.metric {
            differences.push(format!(
                "metric {} (configured {})",
                actual.metric, expected.metric
            ));
        }
        if actual.chunk_size != expected.chunk_size || actual.chunk_overlap != expected.chunk_overlap {
            differences.push(format!(
                "chunking {}/{} (configured {}/{})",
                actual.chunk_size, actual.chunk_overlap, expected.chunk_size, expected.chunk_overlap
            ));
        }

        if differences.is_empty() {
            Ok(())
        } else {
            Err(AppError::IndexNotFound(format!(
                "persisted index is incompatible: {}",
                differences.join("; ")
            )))
        }
    }
}

/// An index read back from disk.
#[derive(Debug, Clone)]
pub struct PersistedIndex {
    pub index: VectorIndex,
    pub manifest: IndexManifest,
}

/// Hash of document ids and texts, in corpus order.
pub fn corpus_hash(documents: &[Document]) -> String {
    let mut hasher = Sha256::new();
    for doc in documents {
        hasher.update(doc.id.as_bytes());
        hasher.update([0u8]);
        hasher.update(doc.text.as_bytes());
        hasher.update([0xffu8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Write `index` to `path`, replacing any existing index atomically.
pub fn persist(index: &VectorIndex, manifest: &IndexManifest, path: &Path) -> AppResult<()> {
    if !index.is_empty() && index.dimension() != manifest.signature.dimension {
        return Err(AppError::DimensionMismatch(format!(
            "index dimension {} does not match manifest dimension {}",
            index.dimension(),
            manifest.signature.dimension
        )));
    }
    if index.len() != manifest.chunk_count {
        return Err(AppError::DimensionMismatch(format!(
            "index has {} entries but manifest records {}",
            index.len(),
            manifest.chunk_count
        )));
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Storage(format!("Failed to create index directory {:?}: {}", parent, e))
        })?;
    }

    let tmp = temp_path(path);
    if tmp.exists() {
        fs::remove_file(&tmp).map_err(|e| {
            AppError::Storage(format!("Failed to remove stale {:?}: {}", tmp, e))
        })?;
    }

    if let Err(e) = write_database(index, manifest, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        AppError::Storage(format!("Failed to move index into place at {:?}: {}", path, e))
    })?;

    tracing::info!(
        "Persisted {} chunks ({}-dim) to {:?}",
        index.len(),
        manifest.signature.dimension,
        path
    );
    Ok(())
}

fn write_database(index: &VectorIndex, manifest: &IndexManifest, path: &Path) -> AppResult<()> {
    let storage = |e: rusqlite::Error| AppError::Storage(format!("Failed to write {:?}: {}", path, e));

    let mut conn = Connection::open(path).map_err(storage)?;

    conn.execute_batch(
        r#"
        CREATE TABLE meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE chunks (
            ordinal INTEGER PRIMARY KEY,
            id TEXT NOT NULL UNIQUE,
            document_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            text TEXT NOT NULL,
            start_offset INTEGER NOT NULL,
            end_offset INTEGER NOT NULL,
            page INTEGER,
            embedding BLOB NOT NULL
        );
        "#,
    )
    .map_err(storage)?;

    let manifest_json = serde_json::to_string(manifest)?;

    let tx = conn.transaction().map_err(storage)?;
    tx.execute(
        "INSERT INTO meta (key, value) VALUES ('format_version', ?1), ('manifest', ?2)",
        params![INDEX_FORMAT_VERSION.to_string(), manifest_json],
    )
    .map_err(storage)?;

    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO chunks (ordinal, id, document_id, position, text, start_offset, end_offset, page, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .map_err(storage)?;

        for (ordinal, entry) in index.entries().iter().enumerate() {
            let chunk = &entry.chunk;
            stmt.execute(params![
                ordinal as i64,
                chunk.id,
                chunk.document_id,
                chunk.position as i64,
                chunk.text,
                chunk.start as i64,
                chunk.end as i64,
                chunk.page.map(i64::from),
                embedding_to_bytes(&entry.vector),
            ])
            .map_err(storage)?;
        }
    }

    tx.commit().map_err(storage)?;
    conn.close().map_err(|(_, e)| storage(e))?;
    Ok(())
}

/// Read a persisted index.
///
/// Every failure (missing file, corruption, unknown version, inconsistent
/// contents) is `IndexNotFound`: the caller's remedy is always a rebuild.
pub fn load(path: &Path) -> AppResult<PersistedIndex> {
    let conn = open_existing(path)?;
    let manifest = read_manifest_from(&conn, path)?;

    let mut stmt = conn
        .prepare(
            "SELECT id, document_id, position, text, start_offset, end_offset, page, embedding
             FROM chunks ORDER BY ordinal",
        )
        .map_err(|e| corrupt(path, e))?;

    let rows = stmt
        .query_map([], |row| {
            let chunk = Chunk {
                id: row.get(0)?,
                document_id: row.get(1)?,
                position: row.get::<_, i64>(2)? as usize,
                text: row.get(3)?,
                start: row.get::<_, i64>(4)? as usize,
                end: row.get::<_, i64>(5)? as usize,
                page: row.get::<_, Option<i64>>(6)?.map(|p| p as u32),
            };
            let blob: Vec<u8> = row.get(7)?;
            Ok((chunk, blob))
        })
        .map_err(|e| corrupt(path, e))?;

    let mut chunks = Vec::with_capacity(manifest.chunk_count);
    let mut vectors = Vec::with_capacity(manifest.chunk_count);
    for row in rows {
        let (chunk, blob) = row.map_err(|e| corrupt(path, e))?;
        let vector = bytes_to_embedding(&blob).map_err(|e| corrupt(path, e))?;
        if vector.len() != manifest.signature.dimension {
            return Err(corrupt(
                path,
                format!(
                    "chunk {} has {} dimensions, manifest says {}",
                    chunk.id,
                    vector.len(),
                    manifest.signature.dimension
                ),
            ));
        }
        chunks.push(chunk);
        vectors.push(vector);
    }

    if chunks.len() != manifest.chunk_count {
        return Err(corrupt(
            path,
            format!(
                "found {} chunks, manifest says {}",
                chunks.len(),
                manifest.chunk_count
            ),
        ));
    }

    let index = VectorIndex::build(chunks, vectors, manifest.signature.metric)
        .map_err(|e| corrupt(path, e))?;

    tracing::info!("Loaded {} chunks from {:?}", index.len(), path);
    Ok(PersistedIndex { index, manifest })
}

/// Read only the manifest of a persisted index.
pub fn read_manifest(path: &Path) -> AppResult<IndexManifest> {
    let conn = open_existing(path)?;
    read_manifest_from(&conn, path)
}

/// Manifest plus file size.
pub fn stats(path: &Path) -> AppResult<IndexStats> {
    let manifest = read_manifest(path)?;
    let size_bytes = fs::metadata(path)?.len();
    Ok(IndexStats {
        path: path.to_path_buf(),
        size_bytes,
        manifest,
    })
}

/// Delete a persisted index and any leftover temporary file.
pub fn remove(path: &Path) -> AppResult<()> {
    let tmp = temp_path(path);
    if tmp.exists() {
        fs::remove_file(&tmp)?;
    }

    if !path.exists() {
        return Err(AppError::IndexNotFound(format!("No index at {:?}", path)));
    }

    fs::remove_file(path)?;
    tracing::info!("Removed index at {:?}", path);
    Ok(())
}

fn open_existing(path: &Path) -> AppResult<Connection> {
    if !path.is_file() {
        return Err(AppError::IndexNotFound(format!(
            "No index at {:?}; run ingest first",
            path
        )));
    }

    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| corrupt(path, e))
}

fn read_manifest_from(conn: &Connection, path: &Path) -> AppResult<IndexManifest> {
    let meta = |key: &str| -> AppResult<String> {
        conn.query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| row.get(0))
            .map_err(|e| corrupt(path, e))
    };

    let version: u32 = meta("format_version")?
        .parse()
        .map_err(|e| corrupt(path, format!("bad format version: {}", e)))?;
    if version != INDEX_FORMAT_VERSION {
        return Err(AppError::IndexNotFound(format!(
            "Index at {:?} uses format version {}, this build reads version {}",
            path, version, INDEX_FORMAT_VERSION
        )));
    }

    let manifest: IndexManifest = serde_json::from_str(&meta("manifest")?)
        .map_err(|e| corrupt(path, format!("bad manifest: {}", e)))?;

    Ok(manifest)
}

fn corrupt(path: &Path, detail: impl std::fmt::Display) -> AppError {
    AppError::IndexNotFound(format!("Index at {:?} is unreadable: {}", path, detail))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn bytes_to_embedding(bytes: &[u8]) -> Result<Vec<f32>, String> {
    if bytes.len() % 4 != 0 {
        return Err(format!("embedding blob of {} bytes", bytes.len()));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}
