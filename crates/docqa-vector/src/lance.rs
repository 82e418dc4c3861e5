//! LanceDB-backed [`VectorIndex`]: one table per index, metric kept in a
//! side `meta` table, upserts through `merge_insert` keyed on `id`.

use anyhow::{anyhow, bail, Result};
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use docqa_core::ranking::{distance_to_score, rank_matches};
use docqa_core::traits::VectorIndex;
use docqa_core::types::{IndexDescription, IndexSpec, Metadata, Metric, RetrievalMatch, VectorRecord};
use docqa_core::Error;

use crate::schema::{build_chunk_schema, vector_dimension};
use crate::table::{create_empty_table, open_db, table_exists, MetaTable};

pub const META_TABLE: &str = "docqa_meta";

pub struct LanceVectorIndex {
	db: Connection,
	last_seq: AtomicU64,
}

impl LanceVectorIndex {
	pub async fn open(uri: &str) -> Result<Self> {
		let db = open_db(uri).await?;
		Ok(Self { db, last_seq: AtomicU64::new(0) })
	}

	/// Reserve `n` consecutive insertion sequence numbers. Seeded from the
	/// wall clock so sequences keep growing across process restarts.
	fn reserve_seq(&self, n: usize) -> u64 {
		let now = u64::try_from(chrono::Utc::now().timestamp_micros()).unwrap_or_default();
		let next = |last: u64| now.max(last + 1);
		// the update closure always returns Some, so Err is unreachable
		let prev = self
			.last_seq
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(next(last) + n as u64 - 1))
			.unwrap_or_else(|last| last);
		next(prev)
	}

	fn meta(&self) -> MetaTable<'_> {
		MetaTable::new(&self.db, META_TABLE)
	}

	async fn stored_metric(&self, name: &str) -> Result<Option<Metric>> {
		match self.meta().get(&metric_key(name)).await? {
			Some(raw) => Ok(Some(raw.parse::<Metric>()?)),
			None => Ok(None),
		}
	}

	/// One `merge_insert` on `id`. With `stale_filter`, target rows matching
	/// the filter that the batch does not touch are deleted in the same commit.
	async fn merge(&self, index: &str, records: Vec<VectorRecord>, stale_filter: Option<String>) -> Result<()> {
		if records.is_empty() && stale_filter.is_none() { return Ok(()); }
		let table = self.open_index(index).await?;
		let dim = vector_dimension(&*table.schema().await?).ok_or_else(|| anyhow!("index '{index}' has no vector column"))?;
		if let Some(bad) = records.iter().find(|r| r.vector.len() != dim) {
			bail!("record '{}' has {} dims, index '{index}' expects {dim}", bad.id, bad.vector.len());
		}

		let seq_base = self.reserve_seq(records.len().max(1));
		let batch = records_to_batch(&records, dim, seq_base)?;
		let schema = batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
		let mut mi = table.merge_insert(&["id"]);
		mi.when_matched_update_all(None).when_not_matched_insert_all();
		if let Some(filter) = stale_filter {
			mi.when_not_matched_by_source_delete(Some(filter));
		}
		mi.execute(reader).await?;
		debug!(index, records = records.len(), "merged batch");
		Ok(())
	}

	async fn open_index(&self, name: &str) -> Result<lancedb::Table> {
		if !table_exists(&self.db, name).await? {
			bail!("index '{name}' does not exist; call ensure_index first");
		}
		Ok(self.db.open_table(name).execute().await?)
	}
}

#[async_trait]
impl VectorIndex for LanceVectorIndex {
	async fn ensure_index(&self, spec: &IndexSpec) -> docqa_core::Result<()> {
		let setup = |e: anyhow::Error| Error::IndexWrite(e.context(format!("ensure index '{}'", spec.name)));

		if table_exists(&self.db, &spec.name).await.map_err(setup)? {
			let table = self.db.open_table(&spec.name).execute().await.map_err(|e| setup(e.into()))?;
			let schema = table.schema().await.map_err(|e| setup(e.into()))?;
			let actual_dim = vector_dimension(&schema).ok_or_else(|| setup(anyhow!("table has no vector column")))?;
			let stored = self.stored_metric(&spec.name).await.map_err(setup)?;
			let actual_metric = stored.unwrap_or(spec.metric);
			if actual_dim != spec.dimension || actual_metric != spec.metric {
				return Err(Error::IndexConfigMismatch {
					name: spec.name.clone(),
					expected_dim: spec.dimension,
					actual_dim,
					expected_metric: spec.metric,
					actual_metric,
				});
			}
			if stored.is_none() {
				self.meta().put(&metric_key(&spec.name), spec.metric.as_str()).await.map_err(setup)?;
			}
			debug!(index = %spec.name, "index already present");
			return Ok(());
		}

		create_empty_table(&self.db, &spec.name, build_chunk_schema(spec.dimension)).await.map_err(setup)?;
		self.meta().put(&metric_key(&spec.name), spec.metric.as_str()).await.map_err(setup)?;
		info!(index = %spec.name, dimension = spec.dimension, metric = %spec.metric, "created index");
		Ok(())
	}

	async fn upsert(&self, index: &str, records: Vec<VectorRecord>) -> Result<()> {
		self.merge(index, records, None).await
	}

	async fn replace_document(&self, index: &str, document_key: &str, records: Vec<VectorRecord>) -> Result<()> {
		// keys are hex digests; the quote escape covers caller-chosen ones
		let prefix = document_key.replace('\'', "''");
		self.merge(index, records, Some(format!("id LIKE '{prefix}:%'"))).await
	}

	async fn search(&self, index: &str, query: &[f32], k: usize) -> Result<Vec<RetrievalMatch>> {
		if k == 0 { return Ok(Vec::new()); }
		let table = self.open_index(index).await?;
		let metric = self.stored_metric(index).await?.unwrap_or_default();
		// fetch past k so score ties at the cut-off can still be re-ordered
		let fetch = k.saturating_mul(2).max(k + 8);
		let mut stream = table
			.vector_search(query.to_vec())?
			.distance_type(distance_type(metric))
			.limit(fetch)
			.execute()
			.await?;

		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			hits.extend(batch_to_matches(&batch, metric)?);
		}
		Ok(rank_matches(hits, k))
	}

	async fn describe_index(&self, name: &str) -> Result<Option<IndexDescription>> {
		if !table_exists(&self.db, name).await? { return Ok(None); }
		let table = self.db.open_table(name).execute().await?;
		let dimension = vector_dimension(&*table.schema().await?).unwrap_or_default();
		let metric = self.stored_metric(name).await?.unwrap_or_default();
		let count = table.count_rows(None).await?;
		Ok(Some(IndexDescription { name: name.to_string(), dimension, metric, count }))
	}
}

fn metric_key(index: &str) -> String { format!("metric:{index}") }

fn distance_type(metric: Metric) -> DistanceType {
	match metric {
		Metric::Cosine => DistanceType::Cosine,
		Metric::Dot => DistanceType::Dot,
		Metric::Euclidean => DistanceType::L2,
	}
}

fn records_to_batch(records: &[VectorRecord], dim: usize, seq_base: u64) -> Result<RecordBatch> {
	let mut ids = Vec::with_capacity(records.len());
	let mut texts = Vec::with_capacity(records.len());
	let mut metas = Vec::with_capacity(records.len());
	let mut seqs = Vec::with_capacity(records.len());
	let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(records.len());
	for (i, r) in records.iter().enumerate() {
		ids.push(r.id.clone());
		texts.push(r.text.clone());
		metas.push(serde_json::to_string(&r.metadata)?);
		seqs.push(i64::try_from(seq_base + i as u64)?);
		vectors.push(Some(r.vector.iter().map(|&x| Some(x)).collect()));
	}
	let batch = RecordBatch::try_new(build_chunk_schema(dim), vec![
		Arc::new(StringArray::from(ids)),
		Arc::new(StringArray::from(texts)),
		Arc::new(StringArray::from(metas)),
		Arc::new(Int64Array::from(seqs)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), dim as i32)),
	])?;
	Ok(batch)
}

fn batch_to_matches(batch: &RecordBatch, metric: Metric) -> Result<Vec<RetrievalMatch>> {
	fn col<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
		batch.column_by_name(name)
			.and_then(|c| c.as_any().downcast_ref::<T>())
			.ok_or_else(|| anyhow!("search result is missing column '{name}'"))
	}
	let ids = col::<StringArray>(batch, "id")?;
	let texts = col::<StringArray>(batch, "text")?;
	let metas = col::<StringArray>(batch, "metadata")?;
	let seqs = col::<Int64Array>(batch, "indexed_seq")?;
	let distances = col::<Float32Array>(batch, "_distance")?;

	let mut out = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let metadata: Metadata = serde_json::from_str(metas.value(i))?;
		out.push(RetrievalMatch {
			id: ids.value(i).to_string(),
			score: distance_to_score(metric, distances.value(i)),
			text: texts.value(i).to_string(),
			metadata,
			indexed_seq: u64::try_from(seqs.value(i)).unwrap_or_default(),
		});
	}
	Ok(out)
}
