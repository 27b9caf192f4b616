//! LanceDB connection and table housekeeping.
use anyhow::{bail, Result};
use arrow_array::RecordBatchIterator;
use lancedb::{connect, Connection};
use std::sync::Arc;
use tracing::info;

use crate::schema::{build_chunk_schema, vector_dim};

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
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
    info!(table = name, "LanceDB: created table");
    Ok(())
}

/// Create the chunk table if missing, and refuse an existing one whose vector
/// width differs from `dim`.
pub async fn ensure_chunk_table(conn: &Connection, name: &str, dim: usize) -> Result<()> {
    ensure_table(conn, name, build_chunk_schema(dim)).await?;
    let table = conn.open_table(name).execute().await?;
    let schema = table.schema().await?;
    match vector_dim(&schema) {
        Some(existing) if existing == dim => Ok(()),
        Some(existing) => bail!(
            "LanceDB table '{name}' stores {existing}-dimensional vectors but the embedder produces {dim}; rebuild the index"
        ),
        None => bail!("LanceDB table '{name}' has no vector column"),
    }
}
