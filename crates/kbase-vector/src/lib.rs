//! kbase-vector
//!
//! LanceDB-backed vector index over chunk embeddings. Rows are append-only and
//! carry their chunk-collection position, so row `i` always resolves to chunk
//! `i`. The async LanceDB API runs on a private tokio runtime; the public
//! surface is synchronous.

use anyhow::{anyhow, Result};
use lancedb::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use search::VectorSearchEngine;
pub use writer::VectorIndexWriter;

use crate::schema::META_TABLE;
use crate::table::{open_db, put_meta, read_meta_entries};

/// Identity of the embedding model behind a vector index. `model` is the
/// loader name used to re-instantiate it; `embedder_id` is what it reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
	pub model: String,
	pub embedder_id: String,
	pub dim: usize,
}

/// Scale `v` to unit length in place; zero vectors stay zero.
pub fn l2_normalize(v: &mut [f32]) {
	let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
	if norm > 0.0 {
		for x in v.iter_mut() {
			*x /= norm;
		}
	}
}

pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
	a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
	Ok(tokio::runtime::Builder::new_multi_thread().worker_threads(2).enable_all().build()?)
}

pub(crate) fn db_uri(dir: &Path) -> String {
	dir.to_string_lossy().to_string()
}

pub(crate) async fn write_meta(conn: &Connection, meta: &IndexMeta) -> Result<()> {
	let entries = [
		("model", meta.model.clone()),
		("embedder_id", meta.embedder_id.clone()),
		("dim", meta.dim.to_string()),
	];
	put_meta(conn, META_TABLE, &entries).await
}

pub(crate) async fn load_meta(conn: &Connection) -> Result<Option<IndexMeta>> {
	let mut entries = read_meta_entries(conn, META_TABLE).await?;
	if entries.is_empty() {
		return Ok(None);
	}
	let mut take = |key: &str| entries.remove(key).ok_or_else(|| anyhow!("vector index meta is missing `{}`", key));
	let model = take("model")?;
	let embedder_id = take("embedder_id")?;
	let dim = take("dim")?.parse::<usize>().map_err(|e| anyhow!("meta.dim is not a number: {}", e))?;
	Ok(Some(IndexMeta { model, embedder_id, dim }))
}

/// Read the recorded model identity of the vector index at `dir`, if any.
pub fn read_meta(dir: &Path) -> Result<Option<IndexMeta>> {
	if !dir.is_dir() {
		return Ok(None);
	}
	let rt = runtime()?;
	rt.block_on(async {
		let conn = open_db(&db_uri(dir)).await?;
		load_meta(&conn).await
	})
}
