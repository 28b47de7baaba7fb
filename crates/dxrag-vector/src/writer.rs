use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use arrow_array::builder::{ListBuilder, StringBuilder};
use arrow_array::{RecordBatch, RecordBatchIterator, FixedSizeListArray, StringArray};
use std::sync::Arc;

use dxrag_core::data_processor::IndexedChunk;
use dxrag_core::error::Error;
use crate::schema::{build_protocol_schema, EMBEDDING_DIM};
use crate::table::{ensure_protocol_table, open_db};

const BATCH_SIZE: usize = 1000;

pub struct ProtocolIndexWriter { pub(crate) db: Connection, pub(crate) table_name: String }

impl ProtocolIndexWriter {
	/// Connect and make sure the protocol table exists, empty if new.
	pub async fn open(uri: &str, table_name: &str) -> Result<Self> {
		let db = open_db(uri).await?;
		ensure_protocol_table(&db, table_name).await?;
		Ok(Self { db, table_name: table_name.to_string() })
	}

	/// Write chunks with their passage embeddings, replacing rows whose `id` already exists.
	pub async fn index(&self, chunks: &[IndexedChunk], embeddings: &[Vec<f32>]) -> Result<usize> {
		if chunks.is_empty() { tracing::info!("no chunks to index"); return Ok(0); }
		if chunks.len() != embeddings.len() {
			return Err(Error::Operation(format!("{} chunks but {} embeddings", chunks.len(), embeddings.len())).into());
		}
		tracing::info!(chunks = chunks.len(), table = %self.table_name, "indexing protocol chunks");
		let pb = ProgressBar::new(chunks.len() as u64);
		pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?.progress_chars("#>-"));
		let mut processed = 0usize;
		for (batch_chunks, batch_vectors) in chunks.chunks(BATCH_SIZE).zip(embeddings.chunks(BATCH_SIZE)) {
			let record_batch = Self::to_record_batch(batch_chunks, batch_vectors)?;
			self.insert_batch(record_batch).await?;
			processed += batch_chunks.len();
			pb.set_position(processed as u64);
		}
		pb.finish_with_message("indexing completed");
		tracing::info!(processed, "protocol chunks indexed");
		Ok(processed)
	}

	/// Upsert on `id`: re-indexing a chunk replaces its row instead of duplicating it.
	async fn insert_batch(&self, record_batch: RecordBatch) -> Result<()> {
		let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		let table = self.db.open_table(&self.table_name).execute().await?;
		let mut merge = table.merge_insert(&["id"]);
		merge.when_matched_update_all(None).when_not_matched_insert_all();
		merge.execute(reader).await?;
		Ok(())
	}

	fn to_record_batch(chunks: &[IndexedChunk], embeddings: &[Vec<f32>]) -> Result<RecordBatch> {
		let mut ids = Vec::new(); let mut protocol_ids = Vec::new(); let mut titles = Vec::new(); let mut sections = Vec::new(); let mut contents = Vec::new();
		let mut codes = ListBuilder::new(StringBuilder::new());
		let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
		for (c, v) in chunks.iter().zip(embeddings) {
			if c.id.trim().is_empty() || c.chunk.protocol_id.trim().is_empty() {
				return Err(Error::MalformedPayload { result_id: c.id.clone(), reason: "empty id or protocol_id".into() }.into());
			}
			if v.len() != EMBEDDING_DIM as usize {
				return Err(Error::MalformedPayload { result_id: c.id.clone(), reason: format!("vector has dimension {}, expected {}", v.len(), EMBEDDING_DIM) }.into());
			}
			ids.push(c.id.clone()); protocol_ids.push(c.chunk.protocol_id.clone()); titles.push(c.chunk.title.clone());
			sections.push(c.chunk.section_type.as_str().to_string()); contents.push(c.chunk.content.clone());
			for code in &c.chunk.codes { codes.values().append_value(code); }
			codes.append(true);
			vectors.push(Some(v.iter().map(|&x| Some(x)).collect()));
		}
		let record_batch = RecordBatch::try_new(build_protocol_schema(), vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(protocol_ids)),
			Arc::new(StringArray::from(titles)),
			Arc::new(StringArray::from(sections)),
			Arc::new(StringArray::from(contents)),
			Arc::new(codes.finish()),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), EMBEDDING_DIM)),
		])?;
		Ok(record_batch)
	}
}
