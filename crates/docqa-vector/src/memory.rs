use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use docqa_core::ranking::{rank_matches, similarity};
use docqa_core::traits::VectorIndex;
use docqa_core::types::{IndexDescription, IndexSpec, RetrievalMatch, VectorRecord};
use docqa_core::Error;

struct Stored {
	record: VectorRecord,
	seq: u64,
}

struct MemIndex {
	spec: IndexSpec,
	records: HashMap<String, Stored>,
}

/// Brute-force in-process index. Used by tests and `index.backend = "memory"`.
#[derive(Default)]
pub struct InMemoryIndex {
	indexes: RwLock<HashMap<String, MemIndex>>,
	seq: AtomicU64,
}

impl InMemoryIndex {
	pub fn new() -> Self { Self::default() }

	/// Number of records in `index`, or zero if it does not exist.
	pub fn len(&self, index: &str) -> usize {
		self.indexes.read().map(|g| g.get(index).map_or(0, |i| i.records.len())).unwrap_or(0)
	}

	pub fn is_empty(&self, index: &str) -> bool { self.len(index) == 0 }

	/// Insert `records`; with `stale_prefix`, first drop every id under that
	/// prefix that the batch does not rewrite. One lock scope covers both.
	fn write(&self, index: &str, records: Vec<VectorRecord>, stale_prefix: Option<&str>) -> Result<()> {
		let mut guard = self.indexes.write().map_err(|_| anyhow!("index lock poisoned"))?;
		let target = guard.get_mut(index).ok_or_else(|| anyhow!("index '{index}' does not exist; call ensure_index first"))?;
		let dim = target.spec.dimension;
		// validate the whole batch before touching anything
		if let Some(bad) = records.iter().find(|r| r.vector.len() != dim) {
			bail!("record '{}' has {} dims, index '{index}' expects {dim}", bad.id, bad.vector.len());
		}
		if let Some(prefix) = stale_prefix {
			let keep: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
			target.records.retain(|id, _| !id.starts_with(prefix) || keep.contains(id.as_str()));
		}
		for record in records {
			let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
			target.records.insert(record.id.clone(), Stored { record, seq });
		}
		Ok(())
	}
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
	async fn ensure_index(&self, spec: &IndexSpec) -> docqa_core::Result<()> {
		let mut guard = self.indexes.write().map_err(|_| Error::IndexWrite(anyhow!("index lock poisoned")))?;
		if let Some(existing) = guard.get(&spec.name) {
			if existing.spec.dimension != spec.dimension || existing.spec.metric != spec.metric {
				return Err(Error::IndexConfigMismatch {
					name: spec.name.clone(),
					expected_dim: spec.dimension,
					actual_dim: existing.spec.dimension,
					expected_metric: spec.metric,
					actual_metric: existing.spec.metric,
				});
			}
			return Ok(());
		}
		guard.insert(spec.name.clone(), MemIndex { spec: spec.clone(), records: HashMap::new() });
		Ok(())
	}

	async fn upsert(&self, index: &str, records: Vec<VectorRecord>) -> Result<()> {
		self.write(index, records, None)
	}

	async fn replace_document(&self, index: &str, document_key: &str, records: Vec<VectorRecord>) -> Result<()> {
		self.write(index, records, Some(&format!("{document_key}:")))
	}

	async fn search(&self, index: &str, query: &[f32], k: usize) -> Result<Vec<RetrievalMatch>> {
		let guard = self.indexes.read().map_err(|_| anyhow!("index lock poisoned"))?;
		let target = guard.get(index).ok_or_else(|| anyhow!("index '{index}' does not exist"))?;
		if query.len() != target.spec.dimension {
			bail!("query has {} dims, index '{index}' expects {}", query.len(), target.spec.dimension);
		}
		let metric = target.spec.metric;
		let hits = target
			.records
			.values()
			.map(|s| RetrievalMatch {
				id: s.record.id.clone(),
				score: similarity(metric, query, &s.record.vector),
				text: s.record.text.clone(),
				metadata: s.record.metadata.clone(),
				indexed_seq: s.seq,
			})
			.collect();
		Ok(rank_matches(hits, k))
	}

	async fn describe_index(&self, name: &str) -> Result<Option<IndexDescription>> {
		let guard = self.indexes.read().map_err(|_| anyhow!("index lock poisoned"))?;
		Ok(guard.get(name).map(|i| IndexDescription {
			name: name.to_string(),
			dimension: i.spec.dimension,
			metric: i.spec.metric,
			count: i.records.len(),
		}))
	}
}
