//! LanceDB connection and housekeeping helpers.
//!
//! Database open, ensure-table, and a key/value `meta` table recording which
//! embedding model produced the stored vectors.

use anyhow::{anyhow, Result};
use arrow_array::{RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use arrow_schema::Schema;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::ExecutableQuery;
use lancedb::{connect, Connection};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::schema::build_meta_schema;

pub async fn open_db(uri: &str) -> Result<Connection> {
	Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
	Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<Schema>) -> Result<()> {
	if table_exists(conn, name).await? {
		return Ok(());
	}
	conn.create_empty_table(name, schema).execute().await?;
	tracing::debug!(table = name, "created table");
	Ok(())
}

/// Upsert `entries` into the key/value table `table` in one merge.
pub async fn put_meta(conn: &Connection, table: &str, entries: &[(&str, String)]) -> Result<()> {
	if entries.is_empty() {
		return Ok(());
	}
	ensure_table(conn, table, build_meta_schema()).await?;
	let now = Utc::now().timestamp_millis();
	let batch = RecordBatch::try_new(
		build_meta_schema(),
		vec![
			Arc::new(StringArray::from_iter_values(entries.iter().map(|(k, _)| *k))),
			Arc::new(StringArray::from_iter_values(entries.iter().map(|(_, v)| v.as_str()))),
			Arc::new(TimestampMillisecondArray::from(vec![now; entries.len()])),
		],
	)?;
	let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), build_meta_schema()));
	let t = conn.open_table(table).execute().await?;
	let mut merge = t.merge_insert(&["key"]);
	merge.when_matched_update_all(None).when_not_matched_insert_all();
	merge.execute(reader).await?;
	Ok(())
}

/// Every key/value pair in `table`; empty when the table does not exist.
pub async fn read_meta_entries(conn: &Connection, table: &str) -> Result<BTreeMap<String, String>> {
	let mut entries = BTreeMap::new();
	if !table_exists(conn, table).await? {
		return Ok(entries);
	}
	let t = conn.open_table(table).execute().await?;
	let batches: Vec<RecordBatch> = t.query().execute().await?.try_collect().await?;
	for batch in &batches {
		let keys = string_column(batch, "key")?;
		let values = string_column(batch, "value")?;
		for i in 0..batch.num_rows() {
			entries.insert(keys.value(i).to_string(), values.value(i).to_string());
		}
	}
	Ok(entries)
}

pub(crate) fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| anyhow!("{} column missing", name))
}
