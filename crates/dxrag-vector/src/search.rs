use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::{Connection, DistanceType};
use lancedb::query::{QueryBase, ExecutableQuery};
use arrow_array::{Array, Float32Array, ListArray, RecordBatch, StringArray};

use dxrag_core::error::Error;
use dxrag_core::types::{ProtocolChunk, SearchResult, SectionType};

use crate::table::{open_db, table_exists};
use crate::VectorIndex;

/// Cosine nearest-neighbour search over the LanceDB protocol table.
pub struct LanceProtocolIndex { pub(crate) db: Connection, pub(crate) table_name: String }

impl LanceProtocolIndex {
	pub async fn open(uri: &str, table_name: &str) -> Result<Self> {
		let db = open_db(uri).await?;
		Ok(Self { db, table_name: table_name.to_string() })
	}

	pub fn connection(&self) -> &Connection { &self.db }
	pub fn table_name(&self) -> &str { &self.table_name }
}

#[async_trait]
impl VectorIndex for LanceProtocolIndex {
	async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<SearchResult>> {
		if !table_exists(&self.db, &self.table_name).await? {
			tracing::warn!(table = %self.table_name, "protocol table missing; treating index as empty");
			return Ok(vec![]);
		}
		let table = self.db.open_table(&self.table_name).execute().await?;
		let mut stream = table
			.vector_search(query_vec.to_vec())?
			.distance_type(DistanceType::Cosine)
			.limit(k)
			.execute()
			.await?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			hits.extend(decode_batch(&batch)?);
		}
		hits.truncate(k);
		Ok(hits)
	}
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| Error::NotFound(format!("{name} column")).into())
}

/// Turn a result batch into validated search results.
///
/// Rows lacking an `id` or a `protocol_id` are rejected here rather than
/// passed on to scoring. Without a `_distance` column (plain scans) the
/// score is 0.
pub(crate) fn decode_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
	let ids = string_column(batch, "id")?;
	let protocol_ids = string_column(batch, "protocol_id")?;
	let titles = string_column(batch, "title")?;
	let sections = string_column(batch, "section_type")?;
	let contents = string_column(batch, "content")?;
	let codes = batch
		.column_by_name("codes")
		.and_then(|c| c.as_any().downcast_ref::<ListArray>())
		.ok_or_else(|| Error::NotFound("codes column".into()))?;
	let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());

	let mut out = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let result_id = if ids.is_null(i) { String::new() } else { ids.value(i).to_string() };
		if result_id.trim().is_empty() {
			return Err(Error::MalformedPayload { result_id: format!("row {i}"), reason: "empty id".into() }.into());
		}
		if protocol_ids.is_null(i) || protocol_ids.value(i).trim().is_empty() {
			return Err(Error::MalformedPayload { result_id, reason: "missing protocol_id".into() }.into());
		}
		let chunk_codes = if codes.is_null(i) {
			Vec::new()
		} else {
			let list = codes.value(i);
			let values = list
				.as_any()
				.downcast_ref::<StringArray>()
				.ok_or_else(|| Error::MalformedPayload { result_id: result_id.clone(), reason: "codes are not strings".into() })?;
			values.iter().flatten().map(str::to_string).collect()
		};
		let score = distances.map_or(0.0, |d| 1.0 - d.value(i));
		out.push(SearchResult {
			result_id,
			score,
			payload: ProtocolChunk {
				protocol_id: protocol_ids.value(i).to_string(),
				title: titles.value(i).to_string(),
				section_type: SectionType::from_label(sections.value(i)),
				content: contents.value(i).to_string(),
				codes: chunk_codes,
			},
		});
	}
	Ok(out)
}
