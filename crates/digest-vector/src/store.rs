//! Durable storage for [`VectorIndex`] on LanceDB.
//!
//! Layout under the store root:
//! - `builds/<build_id>/`: one Lance database per build, holding a `chunks` table
//! - `meta/`: Lance database with a key/value `meta` table; the `active_index`
//!   row holds the JSON [`IndexManifest`] of the build readers should use
//!
//! A build is written completely and row-count checked before the manifest is
//! flipped to it, so an interrupted or failed build never replaces the active
//! one. Builds other than the active one are pruned after a successful flip.

use anyhow::{anyhow, Context};
use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, Int32Array, Int64Array, RecordBatch, StringArray};
use chrono::Utc;
use lancedb::query::ExecutableQuery;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use digest_core::types::{Chunk, IndexedChunk};
use digest_core::{Error, Result};

use crate::index::{IndexFingerprint, VectorIndex};
use crate::schema::build_chunk_schema;
use crate::table::{count_rows, create_table_from_batches, open_db, read_meta, upsert_meta};

const META_TABLE: &str = "meta";
const ACTIVE_KEY: &str = "active_index";
const CHUNKS_TABLE: &str = "chunks";
const WRITE_BATCH_ROWS: usize = 1000;

/// Pointer to the build readers should load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub build_id: String,
    pub fingerprint: IndexFingerprint,
    pub chunk_count: usize,
    pub dim: usize,
    pub built_at: String,
}

#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn meta_dir(&self) -> PathBuf {
        self.root.join("meta")
    }

    fn builds_dir(&self) -> PathBuf {
        self.root.join("builds")
    }

    /// Manifest of the active build, if any build was ever completed.
    pub async fn active_manifest(&self) -> Result<Option<IndexManifest>> {
        self.read_manifest().await.map_err(storage_err)
    }

    /// Write `index` as a new build and make it active.
    pub async fn persist(&self, index: &VectorIndex) -> Result<IndexManifest> {
        let build_id = self.next_build_id();
        let build_dir = self.builds_dir().join(&build_id);
        if let Err(e) = self.write_build(&build_dir, index).await {
            // best effort; the manifest still points at the previous build
            if let Err(cleanup) = tokio::fs::remove_dir_all(&build_dir).await {
                tracing::warn!(dir = %build_dir.display(), error = %cleanup, "failed to remove incomplete build");
            }
            return Err(storage_err(e));
        }

        let manifest = IndexManifest {
            build_id: build_id.clone(),
            fingerprint: index.fingerprint().clone(),
            chunk_count: index.len(),
            dim: index.dim(),
            built_at: Utc::now().to_rfc3339(),
        };
        self.write_manifest(&manifest).await.map_err(storage_err)?;
        tracing::info!(build_id = %build_id, chunks = manifest.chunk_count, dim = manifest.dim, "activated index build");

        self.prune_except(&build_id).await;
        Ok(manifest)
    }

    /// The active build, or `None` when nothing has been persisted yet.
    pub async fn load(&self) -> Result<Option<VectorIndex>> {
        let Some(manifest) = self.read_manifest().await.map_err(storage_err)? else {
            return Ok(None);
        };
        let chunks = self.read_build(&manifest).await.map_err(storage_err)?;
        let index = VectorIndex::build(chunks, manifest.fingerprint.clone())?;
        if index.dim() != manifest.dim {
            return Err(Error::Storage(format!(
                "build {} holds {}-dim vectors, manifest says {}",
                manifest.build_id,
                index.dim(),
                manifest.dim
            )));
        }
        tracing::debug!(build_id = %manifest.build_id, chunks = index.len(), "loaded persisted index");
        Ok(Some(index))
    }

    fn next_build_id(&self) -> String {
        let base = format!("chunks_{}", Utc::now().format("%Y%m%dT%H%M%S%3f"));
        let mut id = base.clone();
        let mut n = 1;
        while self.builds_dir().join(&id).exists() {
            id = format!("{}_{}", base, n);
            n += 1;
        }
        id
    }

    async fn write_build(&self, dir: &Path, index: &VectorIndex) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(dir).await?;
        let dim = i32::try_from(index.dim()).context("embedding dimension too large")?;
        let schema = build_chunk_schema(dim);
        let mut batches = Vec::new();
        for (n, rows) in index.chunks().chunks(WRITE_BATCH_ROWS).enumerate() {
            batches.push(to_record_batch(schema.clone(), n * WRITE_BATCH_ROWS, rows, dim)?);
        }
        let conn = open_db(dir).await?;
        create_table_from_batches(&conn, CHUNKS_TABLE, schema, batches).await?;
        let written = count_rows(&conn, CHUNKS_TABLE).await?;
        if written != index.len() {
            return Err(anyhow!("wrote {} rows, expected {}", written, index.len()));
        }
        Ok(())
    }

    async fn read_build(&self, manifest: &IndexManifest) -> anyhow::Result<Vec<IndexedChunk>> {
        let dir = self.builds_dir().join(&manifest.build_id);
        if !dir.exists() {
            return Err(anyhow!("active build {} is missing at {}", manifest.build_id, dir.display()));
        }
        let conn = open_db(&dir).await?;
        let table = conn.open_table(CHUNKS_TABLE).execute().await?;
        let mut stream = table.query().execute().await?;
        let mut rows: Vec<(i64, IndexedChunk)> = Vec::with_capacity(manifest.chunk_count);
        while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await? {
            rows.extend(from_record_batch(&batch)?);
        }
        if rows.len() != manifest.chunk_count {
            return Err(anyhow!("build {} has {} rows, manifest says {}", manifest.build_id, rows.len(), manifest.chunk_count));
        }
        rows.sort_by_key(|(ordinal, _)| *ordinal);
        Ok(rows.into_iter().map(|(_, c)| c).collect())
    }

    async fn read_manifest(&self) -> anyhow::Result<Option<IndexManifest>> {
        if !self.meta_dir().exists() {
            return Ok(None);
        }
        let conn = open_db(&self.meta_dir()).await?;
        let Some(raw) = read_meta(&conn, META_TABLE, ACTIVE_KEY).await? else {
            return Ok(None);
        };
        let manifest = serde_json::from_str(&raw).context("active index manifest is not valid json")?;
        Ok(Some(manifest))
    }

    async fn write_manifest(&self, manifest: &IndexManifest) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(self.meta_dir()).await?;
        let conn = open_db(&self.meta_dir()).await?;
        upsert_meta(&conn, META_TABLE, ACTIVE_KEY, &serde_json::to_string(manifest)?).await
    }

    async fn prune_except(&self, keep: &str) {
        let mut entries = match tokio::fs::read_dir(self.builds_dir()).await {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "could not list builds for pruning");
                return;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_name().to_string_lossy() == keep {
                continue;
            }
            match tokio::fs::remove_dir_all(entry.path()).await {
                Ok(()) => tracing::debug!(path = %entry.path().display(), "pruned stale build"),
                Err(e) => tracing::warn!(path = %entry.path().display(), error = %e, "failed to prune stale build"),
            }
        }
    }
}

fn storage_err(e: anyhow::Error) -> Error {
    Error::Storage(format!("{:#}", e))
}

fn to_record_batch(schema: Arc<arrow_schema::Schema>, offset: usize, rows: &[IndexedChunk], dim: i32) -> anyhow::Result<RecordBatch> {
    let mut ids = Vec::with_capacity(rows.len());
    let mut ordinals = Vec::with_capacity(rows.len());
    let mut dates = Vec::with_capacity(rows.len());
    let mut paths = Vec::with_capacity(rows.len());
    let mut chunk_indices = Vec::with_capacity(rows.len());
    let mut texts = Vec::with_capacity(rows.len());
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let c = &row.chunk;
        ids.push(format!("{}#{}", c.source_path, c.chunk_index));
        ordinals.push(i64::try_from(offset + i)?);
        dates.push(c.date.clone());
        paths.push(c.source_path.clone());
        chunk_indices.push(i32::try_from(c.chunk_index)?);
        texts.push(c.text.clone());
        vectors.push(Some(row.vector.iter().map(|&x| Some(x)).collect()));
    }
    Ok(RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(Int64Array::from(ordinals)),
            Arc::new(StringArray::from(dates)),
            Arc::new(StringArray::from(paths)),
            Arc::new(Int32Array::from(chunk_indices)),
            Arc::new(StringArray::from(texts)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), dim)),
        ],
    )?)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> anyhow::Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("chunks.{} column missing", name))
}

fn from_record_batch(batch: &RecordBatch) -> anyhow::Result<Vec<(i64, IndexedChunk)>> {
    let ordinals = batch
        .column_by_name("ordinal")
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .ok_or_else(|| anyhow!("chunks.ordinal column missing"))?;
    let chunk_indices = batch
        .column_by_name("chunk_index")
        .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
        .ok_or_else(|| anyhow!("chunks.chunk_index column missing"))?;
    let vectors = batch
        .column_by_name("vector")
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .ok_or_else(|| anyhow!("chunks.vector column missing"))?;
    let dates = string_column(batch, "date")?;
    let paths = string_column(batch, "source_path")?;
    let texts = string_column(batch, "text")?;

    let mut out = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let list = vectors.value(i);
        let vector = list.as_primitive::<Float32Type>().values().iter().copied().collect::<Vec<f32>>();
        out.push((
            ordinals.value(i),
            IndexedChunk {
                chunk: Chunk {
                    text: texts.value(i).to_string(),
                    date: dates.value(i).to_string(),
                    source_path: paths.value(i).to_string(),
                    chunk_index: usize::try_from(chunk_indices.value(i))?,
                },
                vector,
            },
        ));
    }
    Ok(out)
}
