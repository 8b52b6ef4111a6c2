use anyhow::{anyhow, bail, Result};
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray, UInt64Array};
use lancedb::Table;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;

use kbase_core::types::Chunk;

use crate::schema::{build_chunks_schema, CHUNKS_TABLE};
use crate::table::{ensure_table, open_db};
use crate::{db_uri, l2_normalize, load_meta, runtime, write_meta, IndexMeta};

/// Append-only writer. Positions continue from the current row count, so
/// appends must follow chunk-collection order.
pub struct VectorIndexWriter {
	rt: Runtime,
	table: Table,
	meta: IndexMeta,
	dim: i32,
	len: usize,
}

impl VectorIndexWriter {
	/// Create or reopen the index at `dir`. Reopening with a different model
	/// identity is an error.
	pub fn open(dir: &Path, meta: IndexMeta) -> Result<Self> {
		std::fs::create_dir_all(dir)?;
		let dim = i32::try_from(meta.dim).map_err(|_| anyhow!("embedding dim {} out of range", meta.dim))?;
		let rt = runtime()?;
		let (table, len) = rt.block_on(async {
			let conn = open_db(&db_uri(dir)).await?;
			match load_meta(&conn).await? {
				Some(existing) if existing != meta => {
					bail!("vector index at {} was built by {} (dim {}), not {} (dim {})", dir.display(), existing.embedder_id, existing.dim, meta.embedder_id, meta.dim)
				}
				Some(_) => {}
				None => write_meta(&conn, &meta).await?,
			}
			ensure_table(&conn, CHUNKS_TABLE, build_chunks_schema(dim)).await?;
			let table = conn.open_table(CHUNKS_TABLE).execute().await?;
			let len = table.count_rows(None).await?;
			Ok::<_, anyhow::Error>((table, len))
		})?;
		tracing::debug!(dir = %dir.display(), rows = len, embedder = %meta.embedder_id, "opened vector index");
		Ok(Self { rt, table, meta, dim, len })
	}

	pub fn meta(&self) -> &IndexMeta { &self.meta }
	pub fn len(&self) -> usize { self.len }
	pub fn is_empty(&self) -> bool { self.len == 0 }

	/// Normalize and append one vector per chunk.
	pub fn append(&mut self, chunks: &[Chunk], embeddings: Vec<Vec<f32>>) -> Result<()> {
		if chunks.len() != embeddings.len() {
			bail!("chunks ({}) and embeddings ({}) length must match", chunks.len(), embeddings.len());
		}
		if chunks.is_empty() {
			return Ok(());
		}
		let mut positions = Vec::with_capacity(chunks.len());
		let mut ids = Vec::with_capacity(chunks.len());
		let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(chunks.len());
		for (i, (chunk, mut embedding)) in chunks.iter().zip(embeddings).enumerate() {
			if embedding.len() != self.meta.dim {
				bail!("embedding for {} has dim {}, index expects {}", chunk.id, embedding.len(), self.meta.dim);
			}
			l2_normalize(&mut embedding);
			positions.push((self.len + i) as u64);
			ids.push(chunk.id.clone());
			vectors.push(Some(embedding.into_iter().map(Some).collect()));
		}
		let schema = build_chunks_schema(self.dim);
		let batch = RecordBatch::try_new(
			schema.clone(),
			vec![
				Arc::new(UInt64Array::from(positions)),
				Arc::new(StringArray::from(ids)),
				Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), self.dim)),
			],
		)?;
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
		let table = &self.table;
		self.rt.block_on(async { table.add(reader).execute().await })?;
		self.len += chunks.len();
		Ok(())
	}

	/// Drop every row at position `>= len`.
	pub fn truncate(&mut self, len: usize) -> Result<()> {
		if len >= self.len {
			return Ok(());
		}
		let table = &self.table;
		self.rt.block_on(async { table.delete(&format!("position >= {}", len)).await })?;
		tracing::info!(from = self.len, to = len, "truncated vector index");
		self.len = len;
		Ok(())
	}
}
