//! LanceDB connection and housekeeping helpers.
//!
//! One connection per database directory. The `meta` key/value table holds
//! the active build pointer.
use anyhow::{anyhow, Result};
use arrow_array::{RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use std::path::Path;
use std::sync::Arc;

use crate::schema::build_meta_schema;

pub async fn open_db(path: &Path) -> Result<Connection> {
    Ok(connect(path.to_string_lossy().as_ref()).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await?;
    Ok(names.iter().any(|n| n == name))
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
    if table_exists(conn, name).await? {
        return Ok(());
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await?;
    Ok(())
}

/// Create `name` from the given batches in one write.
pub async fn create_table_from_batches(
    conn: &Connection,
    name: &str,
    schema: Arc<arrow_schema::Schema>,
    batches: Vec<RecordBatch>,
) -> Result<()> {
    let reader = RecordBatchIterator::new(batches.into_iter().map(Ok), schema);
    conn.create_table(name, Box::new(reader)).execute().await?;
    Ok(())
}

pub async fn count_rows(conn: &Connection, name: &str) -> Result<usize> {
    let t = conn.open_table(name).execute().await?;
    Ok(t.count_rows(None).await?)
}

fn meta_row(key: &str, value: &str) -> Result<RecordBatch> {
    Ok(RecordBatch::try_new(
        build_meta_schema(),
        vec![
            Arc::new(StringArray::from(vec![key])),
            Arc::new(StringArray::from(vec![value])),
            Arc::new(TimestampMillisecondArray::from(vec![Utc::now().timestamp_millis()])),
        ],
    )?)
}

/// Insert or replace the row for `key`. A single merge-insert commit, so
/// readers see either the old value or the new one.
pub async fn upsert_meta(conn: &Connection, table: &str, key: &str, value: &str) -> Result<()> {
    ensure_table(conn, table, build_meta_schema()).await?;
    let t = conn.open_table(table).execute().await?;
    let rows = RecordBatchIterator::new(vec![Ok(meta_row(key, value)?)], build_meta_schema());
    let mut merge = t.merge_insert(&["key"]);
    merge.when_matched_update_all(None).when_not_matched_insert_all();
    merge.execute(Box::new(rows)).await?;
    Ok(())
}

pub async fn read_meta(conn: &Connection, table: &str, key: &str) -> Result<Option<String>> {
    if !table_exists(conn, table).await? {
        return Ok(None);
    }
    let filter = format!("key = '{}'", key.replace('\'', "''"));
    let batches: Vec<RecordBatch> = conn
        .open_table(table)
        .execute()
        .await?
        .query()
        .only_if(filter)
        .limit(1)
        .execute()
        .await?
        .try_collect()
        .await?;
    let Some(batch) = batches.into_iter().find(|b| b.num_rows() > 0) else {
        return Ok(None);
    };
    let values = batch
        .column_by_name("value")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("{}.value column missing", table))?;
    Ok(Some(values.value(0).to_string()))
}
