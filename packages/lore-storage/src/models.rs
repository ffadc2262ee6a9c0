use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct Persona {
	pub persona_slug: String,
	pub display_name: String,
	pub vector_threshold: Option<f32>,
	pub bm25_min_score: Option<f32>,
	pub topic_aliases: Vec<String>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

/// A chunk joined with the metadata of its owning document.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChunkRecord {
	pub chunk_id: Uuid,
	pub doc_id: Uuid,
	pub chunk_index: i32,
	pub section_path: String,
	pub text: String,
	pub doc_title: Option<String>,
	pub doc_type: Option<String>,
	pub source_url: Option<String>,
}

/// A full-text hit. `score` is the `ts_rank_cd` relevance of the chunk for the query.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LexicalHit {
	pub chunk_id: Uuid,
	pub doc_id: Uuid,
	pub section_path: String,
	pub text: String,
	pub score: f32,
	pub doc_title: Option<String>,
	pub doc_type: Option<String>,
	pub source_url: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct DocumentTags {
	pub doc_id: Uuid,
	pub tags: Vec<String>,
}
