// file: src/index/lance.rs
// description: LanceDB table holding embedded chunks
// reference: https://docs.rs/lancedb

use super::{IndexedChunk, VectorStore};
use crate::embedding::check_dimension;
use crate::error::{Result, WorkbenchError};
use crate::models::{Chunk, RetrievedChunk};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
    UInt64Array,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::StreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table, connect};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub struct LanceStore {
    table: Table,
    dimension: usize,
}

/// Arrow schema of the chunk table.
pub fn chunk_schema(dimension: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt64, false),
        Field::new("char_offset", DataType::UInt64, false),
        Field::new("text", DataType::Utf8, false),
        Field::new(
            "embedding",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimension as i32,
            ),
            false,
        ),
    ]))
}

async fn open_connection(storage: &Path) -> Result<Connection> {
    let uri = storage.to_string_lossy();
    connect(&uri)
        .execute()
        .await
        .map_err(|e| WorkbenchError::index_with(format!("failed to connect to LanceDB at {}", uri), e))
}

impl LanceStore {
    /// Writes every entry into a fresh table named `table_name`.
    pub async fn create(
        storage: &Path,
        table_name: &str,
        dimension: usize,
        entries: &[IndexedChunk],
    ) -> Result<Self> {
        let connection = open_connection(storage).await?;
        let schema = chunk_schema(dimension);
        let batch = record_batch(schema.clone(), dimension, entries)?;

        let table = connection
            .create_table(
                table_name,
                RecordBatchIterator::new(vec![Ok(batch)], schema),
            )
            .execute()
            .await
            .map_err(|e| WorkbenchError::index_with(format!("failed to create table {}", table_name), e))?;

        info!("Created table {} with {} rows", table_name, entries.len());
        Ok(Self { table, dimension })
    }

    pub async fn open(storage: &Path, table_name: &str, dimension: usize) -> Result<Self> {
        let connection = open_connection(storage).await?;
        let table = connection
            .open_table(table_name)
            .execute()
            .await
            .map_err(|e| WorkbenchError::index_with(format!("failed to open table {}", table_name), e))?;
        Ok(Self { table, dimension })
    }

    /// Drops tables sharing `prefix` other than `keep`, left over from earlier builds.
    pub async fn drop_stale(storage: &Path, prefix: &str, keep: &str) -> Result<usize> {
        let connection = open_connection(storage).await?;
        let names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| WorkbenchError::index_with("failed to list tables", e))?;

        let mut dropped = 0;
        for name in names
            .iter()
            .filter(|n| n.as_str() != keep && n.starts_with(&format!("{}_", prefix)))
        {
            connection
                .drop_table(name)
                .await
                .map_err(|e| WorkbenchError::index_with(format!("failed to drop table {}", name), e))?;
            debug!("Dropped stale table {}", name);
            dropped += 1;
        }
        Ok(dropped)
    }
}

fn record_batch(
    schema: Arc<Schema>,
    dimension: usize,
    entries: &[IndexedChunk],
) -> Result<RecordBatch> {
    for entry in entries {
        check_dimension(dimension, &entry.embedding)?;
    }

    let ids: StringArray = entries.iter().map(|e| Some(e.chunk.id.as_str())).collect();
    let sources: StringArray = entries.iter().map(|e| Some(e.chunk.source.as_str())).collect();
    let indices: UInt64Array = entries.iter().map(|e| Some(e.chunk.index as u64)).collect();
    let offsets: UInt64Array = entries.iter().map(|e| Some(e.chunk.offset as u64)).collect();
    let texts: StringArray = entries.iter().map(|e| Some(e.chunk.text.as_str())).collect();

    let values: Float32Array = entries
        .iter()
        .flat_map(|e| e.embedding.iter().copied())
        .collect();
    let embeddings = FixedSizeListArray::try_new(
        Arc::new(Field::new("item", DataType::Float32, true)),
        dimension as i32,
        Arc::new(values),
        None,
    )
    .map_err(|e| WorkbenchError::index_with("failed to build embedding column", e))?;

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(ids),
            Arc::new(sources),
            Arc::new(indices),
            Arc::new(offsets),
            Arc::new(texts),
            Arc::new(embeddings),
        ],
    )
    .map_err(|e| WorkbenchError::index_with("failed to build record batch", e))
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| WorkbenchError::index(format!("missing '{}' column", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| WorkbenchError::index(format!("invalid '{}' column type", name)))
}

#[async_trait]
impl VectorStore for LanceStore {
    fn backend(&self) -> &'static str {
        "lance"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn count(&self) -> Result<usize> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| WorkbenchError::index_with("failed to count rows", e))
    }

    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<RetrievedChunk>> {
        check_dimension(self.dimension, query)?;

        let mut stream = self
            .table
            .vector_search(query.to_vec())
            .map_err(|e| WorkbenchError::index_with("failed to create vector search", e))?
            .column("embedding")
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| WorkbenchError::index_with("vector search failed", e))?;

        let mut results = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch.map_err(|e| WorkbenchError::index_with("failed to read result batch", e))?;

            let ids = column::<StringArray>(&batch, "id")?;
            let sources = column::<StringArray>(&batch, "source")?;
            let indices = column::<UInt64Array>(&batch, "chunk_index")?;
            let offsets = column::<UInt64Array>(&batch, "char_offset")?;
            let texts = column::<StringArray>(&batch, "text")?;
            let distances = column::<Float32Array>(&batch, "_distance")?;

            for i in 0..batch.num_rows() {
                let chunk = Chunk {
                    id: ids.value(i).to_string(),
                    source: sources.value(i).to_string(),
                    index: indices.value(i) as usize,
                    offset: offsets.value(i) as usize,
                    text: texts.value(i).to_string(),
                };
                let distance = if distances.is_null(i) { 1.0 } else { distances.value(i) };
                results.push(RetrievedChunk::from_distance(chunk, distance));
            }
        }

        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        debug!("Vector search returned {} results", results.len());
        Ok(results)
    }
}
