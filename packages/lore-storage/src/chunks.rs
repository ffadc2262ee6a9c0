use uuid::Uuid;

use crate::{
	Error, Result,
	db::Db,
	models::{ChunkRecord, LexicalHit},
};

/// Relevance-ranked full-text search over the chunks visible to one persona.
///
/// Results are ordered by descending `ts_rank_cd`, ties broken by chunk id so the order is stable.
pub async fn search_lexical(
	db: &Db,
	query: &str,
	persona_slug: &str,
	min_score: f32,
	limit: u32,
) -> Result<Vec<LexicalHit>> {
	if limit == 0 {
		return Err(Error::InvalidArgument("limit must be greater than zero.".to_string()));
	}
	if query.trim().is_empty() {
		return Ok(Vec::new());
	}

	let hits = sqlx::query_as::<_, LexicalHit>(
		"\
WITH q AS (
	SELECT websearch_to_tsquery('english', $1) AS query
),
ranked AS (
	SELECT
		c.chunk_id,
		c.doc_id,
		c.section_path,
		c.text,
		ts_rank_cd(c.text_tsv, q.query) AS score,
		d.title AS doc_title,
		d.doc_type,
		d.source_url
	FROM document_chunks c
	JOIN persona_documents pd ON pd.doc_id = c.doc_id AND pd.persona_slug = $2
	JOIN documents d ON d.doc_id = c.doc_id
	CROSS JOIN q
	WHERE c.text_tsv @@ q.query
)
SELECT chunk_id, doc_id, section_path, text, score, doc_title, doc_type, source_url
FROM ranked
WHERE score >= $3
ORDER BY score DESC, chunk_id
LIMIT $4",
	)
	.bind(query)
	.bind(persona_slug)
	.bind(min_score)
	.bind(i64::from(limit))
	.fetch_all(&db.pool)
	.await?;

	Ok(hits)
}

/// Loads chunk bodies and document metadata for the given ids, keeping only chunks whose document
/// is currently linked to `persona_slug`. Order of the result is unspecified.
pub async fn fetch_chunks(
	db: &Db,
	chunk_ids: &[Uuid],
	persona_slug: &str,
) -> Result<Vec<ChunkRecord>> {
	if chunk_ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows = sqlx::query_as::<_, ChunkRecord>(
		"\
SELECT
	c.chunk_id,
	c.doc_id,
	c.chunk_index,
	c.section_path,
	c.text,
	d.title AS doc_title,
	d.doc_type,
	d.source_url
FROM document_chunks c
JOIN documents d ON d.doc_id = c.doc_id
JOIN persona_documents pd ON pd.doc_id = c.doc_id AND pd.persona_slug = $2
WHERE c.chunk_id = ANY($1)",
	)
	.bind(chunk_ids)
	.bind(persona_slug)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}
