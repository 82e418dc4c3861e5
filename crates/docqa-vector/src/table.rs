//! LanceDB connection helpers and the key/value settings table.

use anyhow::{anyhow, Result};
use arrow_array::{RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use arrow_schema::Schema;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use std::sync::Arc;

use crate::schema::build_meta_schema;

pub async fn open_db(uri: &str) -> Result<Connection> {
	Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
	Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

/// Create `name` with zero rows unless it already exists.
pub async fn create_empty_table(conn: &Connection, name: &str, schema: Arc<Schema>) -> Result<()> {
	if table_exists(conn, name).await? {
		return Ok(());
	}
	let empty = RecordBatchIterator::new(Vec::new().into_iter(), schema);
	conn.create_table(name, Box::new(empty)).execute().await?;
	Ok(())
}

/// String settings LanceDB does not keep itself, one row per key.
pub struct MetaTable<'a> {
	conn: &'a Connection,
	name: &'a str,
}

impl<'a> MetaTable<'a> {
	pub fn new(conn: &'a Connection, name: &'a str) -> Self {
		Self { conn, name }
	}

	pub async fn put(&self, key: &str, value: &str) -> Result<()> {
		create_empty_table(self.conn, self.name, build_meta_schema()).await?;
		let table = self.conn.open_table(self.name).execute().await?;
		let row = RecordBatch::try_new(build_meta_schema(), vec![
			Arc::new(StringArray::from(vec![key])),
			Arc::new(StringArray::from(vec![value])),
			Arc::new(TimestampMillisecondArray::from(vec![chrono::Utc::now().timestamp_millis()])),
		])?;
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(row)].into_iter(), build_meta_schema()));
		let mut merge = table.merge_insert(&["key"]);
		merge.when_matched_update_all(None).when_not_matched_insert_all();
		merge.execute(reader).await?;
		Ok(())
	}

	pub async fn get(&self, key: &str) -> Result<Option<String>> {
		if !table_exists(self.conn, self.name).await? {
			return Ok(None);
		}
		let table = self.conn.open_table(self.name).execute().await?;
		let filter = format!("key = '{}'", key.replace('\'', "''"));
		let mut rows = table.query().only_if(filter).limit(1).execute().await?;
		while let Some(batch) = rows.try_next().await? {
			if batch.num_rows() == 0 {
				continue;
			}
			let values = batch
				.column_by_name("value")
				.and_then(|c| c.as_any().downcast_ref::<StringArray>())
				.ok_or_else(|| anyhow!("table '{}' has no value column", self.name))?;
			return Ok(Some(values.value(0).to_string()));
		}
		Ok(None)
	}
}
