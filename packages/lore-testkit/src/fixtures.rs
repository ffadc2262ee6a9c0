//! Row builders for seeding a [`crate::TestDatabase`] after the schema is in place.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{Error, Result};

pub struct PersonaFixture<'a> {
	pub persona_slug: &'a str,
	pub vector_threshold: Option<f32>,
	pub bm25_min_score: Option<f32>,
	pub topic_aliases: &'a [&'a str],
}
impl<'a> PersonaFixture<'a> {
	pub fn new(persona_slug: &'a str) -> Self {
		Self { persona_slug, vector_threshold: None, bm25_min_score: None, topic_aliases: &[] }
	}
}

pub async fn insert_persona(pool: &PgPool, persona: &PersonaFixture<'_>) -> Result<()> {
	let aliases: Vec<String> =
		persona.topic_aliases.iter().map(|alias| alias.to_string()).collect();

	sqlx::query(
		"\
INSERT INTO personas (persona_slug, display_name, vector_threshold, bm25_min_score, topic_aliases)
VALUES ($1, $1, $2, $3, $4)",
	)
	.bind(persona.persona_slug)
	.bind(persona.vector_threshold)
	.bind(persona.bm25_min_score)
	.bind(aliases)
	.execute(pool)
	.await
	.map_err(|source| Error::Fixture { fixture: "persona", source })?;

	Ok(())
}

/// Inserts a document and grants every persona in `persona_slugs` access to it.
pub async fn insert_document(
	pool: &PgPool,
	title: &str,
	tags: &[&str],
	persona_slugs: &[&str],
) -> Result<Uuid> {
	let doc_id = Uuid::new_v4();
	let tags: Vec<String> = tags.iter().map(|tag| tag.to_string()).collect();

	sqlx::query("INSERT INTO documents (doc_id, title, doc_type, tags) VALUES ($1, $2, 'note', $3)")
		.bind(doc_id)
		.bind(title)
		.bind(tags)
		.execute(pool)
		.await
		.map_err(|source| Error::Fixture { fixture: "document", source })?;

	for persona_slug in persona_slugs {
		sqlx::query("INSERT INTO persona_documents (persona_slug, doc_id) VALUES ($1, $2)")
			.bind(persona_slug)
			.bind(doc_id)
			.execute(pool)
			.await
			.map_err(|source| Error::Fixture { fixture: "persona_document", source })?;
	}

	Ok(doc_id)
}

/// Revokes a persona's access to a document, leaving the document and its chunks in place.
pub async fn unlink_document(pool: &PgPool, persona_slug: &str, doc_id: Uuid) -> Result<()> {
	sqlx::query("DELETE FROM persona_documents WHERE persona_slug = $1 AND doc_id = $2")
		.bind(persona_slug)
		.bind(doc_id)
		.execute(pool)
		.await
		.map_err(|source| Error::Fixture { fixture: "persona_document", source })?;

	Ok(())
}

pub async fn insert_chunk(
	pool: &PgPool,
	doc_id: Uuid,
	chunk_index: i32,
	section_path: &str,
	text: &str,
) -> Result<Uuid> {
	let chunk_id = Uuid::new_v4();

	sqlx::query(
		"\
INSERT INTO document_chunks (chunk_id, doc_id, chunk_index, section_path, text)
VALUES ($1, $2, $3, $4, $5)",
	)
	.bind(chunk_id)
	.bind(doc_id)
	.bind(chunk_index)
	.bind(section_path)
	.bind(text)
	.execute(pool)
	.await
	.map_err(|source| Error::Fixture { fixture: "chunk", source })?;

	Ok(chunk_id)
}

pub async fn insert_conversation(pool: &PgPool, persona_slug: &str) -> Result<Uuid> {
	let conversation_id = Uuid::new_v4();

	sqlx::query("INSERT INTO conversations (conversation_id, persona_slug) VALUES ($1, $2)")
		.bind(conversation_id)
		.bind(persona_slug)
		.execute(pool)
		.await
		.map_err(|source| Error::Fixture { fixture: "conversation", source })?;

	Ok(conversation_id)
}

/// Appends a message at minute `turn` of the conversation timeline, citing `cited_docs` in order.
///
/// Later turns sort as more recent.
pub async fn insert_message(
	pool: &PgPool,
	conversation_id: Uuid,
	role: &str,
	turn: i32,
	cited_docs: &[Uuid],
) -> Result<Uuid> {
	let message_id = Uuid::new_v4();

	sqlx::query(
		"\
INSERT INTO messages (message_id, conversation_id, role, content, created_at)
VALUES ($1, $2, $3, '', '2026-01-01T00:00:00Z'::timestamptz + make_interval(mins => $4))",
	)
	.bind(message_id)
	.bind(conversation_id)
	.bind(role)
	.bind(turn)
	.execute(pool)
	.await
	.map_err(|source| Error::Fixture { fixture: "message", source })?;

	for (cite_order, doc_id) in cited_docs.iter().enumerate() {
		sqlx::query(
			"INSERT INTO message_citations (message_id, cite_order, doc_id) VALUES ($1, $2, $3)",
		)
		.bind(message_id)
		.bind(cite_order as i32)
		.bind(doc_id)
		.execute(pool)
		.await
		.map_err(|source| Error::Fixture { fixture: "message_citation", source })?;
	}

	Ok(message_id)
}
