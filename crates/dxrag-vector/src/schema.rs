use arrow_schema::{Schema, Field, DataType};
use std::sync::Arc;

use dxrag_core::types::EMBEDDING_DIM as DIM;

pub const EMBEDDING_DIM: i32 = DIM as i32;

pub fn build_protocol_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("protocol_id", DataType::Utf8, false),
		Field::new("title", DataType::Utf8, false),
		Field::new("section_type", DataType::Utf8, false),
		Field::new("content", DataType::Utf8, false),
		Field::new("codes", DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))), false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), EMBEDDING_DIM), true),
	]))
}
