use anyhow::{anyhow, bail, Result};
use arrow_array::{FixedSizeListArray, Float32Array, RecordBatch, UInt64Array};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{DistanceType, Table};
use std::path::Path;
use tokio::runtime::Runtime;

use kbase_core::traits::Embedder;
use kbase_core::types::{Chunk, SearchResult, SourceKind};

use crate::schema::CHUNKS_TABLE;
use crate::table::{open_db, string_column, table_exists};
use crate::{db_uri, inner_product, l2_normalize, load_meta, runtime, IndexMeta};

pub struct VectorSearchEngine {
	rt: Runtime,
	table: Table,
	chunks: Vec<Chunk>,
	embedder: Box<dyn Embedder>,
	meta: IndexMeta,
}

impl VectorSearchEngine {
	/// Open the index at `dir` against its parallel chunk collection. Fails if
	/// the row count differs from `chunks.len()`, any row's `chunk_id` is not
	/// the id of the chunk at its position, or `embedder` is not the model the
	/// index was built with.
	pub fn open(dir: &Path, chunks: Vec<Chunk>, embedder: Box<dyn Embedder>) -> Result<Self> {
		if !dir.is_dir() {
			bail!("vector index directory {} does not exist", dir.display());
		}
		let rt = runtime()?;
		let (table, meta, rows) = rt.block_on(async {
			let conn = open_db(&db_uri(dir)).await?;
			let meta = load_meta(&conn).await?.ok_or_else(|| anyhow!("vector index has no model metadata"))?;
			if !table_exists(&conn, CHUNKS_TABLE).await? {
				bail!("vector index has no {} table", CHUNKS_TABLE);
			}
			let table = conn.open_table(CHUNKS_TABLE).execute().await?;
			let rows = table.count_rows(None).await?;
			Ok::<_, anyhow::Error>((table, meta, rows))
		})?;
		if meta.embedder_id != embedder.model_id() || meta.dim != embedder.dim() {
			bail!("vector index was built by {} (dim {}), loaded embedder is {} (dim {})", meta.embedder_id, meta.dim, embedder.model_id(), embedder.dim());
		}
		if rows != chunks.len() {
			bail!("vector index has {} rows but chunk collection has {} chunks", rows, chunks.len());
		}
		let ids: Vec<RecordBatch> = rt.block_on(async {
			let stream = table.query().select(Select::columns(&["position", "chunk_id"])).execute().await?;
			Ok::<_, anyhow::Error>(stream.try_collect::<Vec<_>>().await?)
		})?;
		for batch in &ids {
			let positions = position_column(batch)?;
			let chunk_ids = string_column(batch, "chunk_id")?;
			for i in 0..batch.num_rows() {
				check_row(&chunks, positions.value(i) as usize, chunk_ids.value(i))?;
			}
		}
		tracing::info!(rows, embedder = %meta.embedder_id, "vector index loaded");
		Ok(Self { rt, table, chunks, embedder, meta })
	}

	/// `k` nearest chunks by inner product of unit vectors (cosine), best first.
	pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
		if query.trim().is_empty() || k == 0 || self.chunks.is_empty() {
			return Ok(Vec::new());
		}
		let mut q = self
			.embedder
			.embed_batch(&[query.to_string()])?
			.into_iter()
			.next()
			.ok_or_else(|| anyhow!("embedder returned no vector for the query"))?;
		l2_normalize(&mut q);

		let table = &self.table;
		let query_vec = q.clone();
		let batches: Vec<RecordBatch> = self.rt.block_on(async {
			let stream = table
				.vector_search(query_vec)?
				.distance_type(DistanceType::Dot)
				.limit(k)
				.execute()
				.await?;
			Ok::<_, anyhow::Error>(stream.try_collect::<Vec<_>>().await?)
		})?;

		let mut scored: Vec<(usize, f32)> = Vec::new();
		for batch in &batches {
			let positions = position_column(batch)?;
			let chunk_ids = string_column(batch, "chunk_id")?;
			let vectors = batch
				.column_by_name("vector")
				.and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
				.ok_or_else(|| anyhow!("vector column missing"))?;
			for i in 0..batch.num_rows() {
				let position = positions.value(i) as usize;
				check_row(&self.chunks, position, chunk_ids.value(i))?;
				let row = vectors.value(i);
				let values = row
					.as_any()
					.downcast_ref::<Float32Array>()
					.ok_or_else(|| anyhow!("vector items are not f32"))?;
				scored.push((position, inner_product(&q, values.values())));
			}
		}
		scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
		scored.truncate(k);
		Ok(scored
			.into_iter()
			.map(|(position, score)| SearchResult {
				chunk: self.chunks[position].clone(),
				search_score: score,
				source: SourceKind::Vector,
			})
			.collect())
	}

	pub fn chunks(&self) -> &[Chunk] { &self.chunks }
	pub fn meta(&self) -> &IndexMeta { &self.meta }
	pub fn len(&self) -> usize { self.chunks.len() }
	pub fn is_empty(&self) -> bool { self.chunks.is_empty() }
}

fn position_column(batch: &RecordBatch) -> Result<&UInt64Array> {
	batch
		.column_by_name("position")
		.and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
		.ok_or_else(|| anyhow!("position column missing"))
}

/// A row must point inside the collection at the chunk it was written for.
fn check_row(chunks: &[Chunk], position: usize, chunk_id: &str) -> Result<()> {
	match chunks.get(position) {
		None => bail!("vector row position {} outside chunk collection of {}", position, chunks.len()),
		Some(chunk) if chunk.id != chunk_id => {
			bail!("vector row {} holds {} but chunk collection has {} there", position, chunk_id, chunk.id)
		}
		Some(_) => Ok(()),
	}
}
