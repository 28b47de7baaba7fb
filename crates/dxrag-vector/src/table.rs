//! LanceDB connection and housekeeping helpers.
use anyhow::Result;
use lancedb::{connect, Connection};
use lancedb::query::{ExecutableQuery, QueryBase};
use arrow_array::{RecordBatch, RecordBatchIterator};
use arrow_schema::ArrowError;
use std::sync::Arc;

use dxrag_core::types::SearchResult;

use crate::schema::build_protocol_schema;
use crate::search::decode_batch;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

/// Create the protocol table with no rows unless it is already there.
pub async fn ensure_protocol_table(conn: &Connection, name: &str) -> Result<()> {
    if table_exists(conn, name).await? {
        return Ok(());
    }
    let schema = build_protocol_schema();
    let no_rows = RecordBatchIterator::new(Vec::<Result<RecordBatch, ArrowError>>::new(), Arc::clone(&schema));
    conn.create_table(name, Box::new(no_rows)).execute().await?;
    tracing::info!(table = name, "created empty protocol table");
    Ok(())
}

/// Number of stored chunks; a missing table counts as empty.
pub async fn row_count(conn: &Connection, name: &str) -> Result<usize> {
    if !table_exists(conn, name).await? { return Ok(0); }
    Ok(conn.open_table(name).execute().await?.count_rows(None).await?)
}

/// The first `limit` stored chunks, scored 0, for inspection.
pub async fn sample(conn: &Connection, name: &str, limit: usize) -> Result<Vec<SearchResult>> {
    if !table_exists(conn, name).await? { return Ok(vec![]); }
    let table = conn.open_table(name).execute().await?;
    let mut stream = table.query().limit(limit).execute().await?;
    let mut out = Vec::new();
    while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await? {
        out.extend(decode_batch(&batch)?);
    }
    Ok(out)
}
