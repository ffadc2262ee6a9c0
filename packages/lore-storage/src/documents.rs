use uuid::Uuid;

use crate::{Result, db::Db, models::DocumentTags};

/// Fetches the tag lists of many documents in one round trip. Unknown ids are absent from the
/// result.
pub async fn fetch_tags(db: &Db, doc_ids: &[Uuid]) -> Result<Vec<DocumentTags>> {
	if doc_ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows = sqlx::query_as::<_, DocumentTags>(
		"\
SELECT doc_id, tags
FROM documents
WHERE doc_id = ANY($1)",
	)
	.bind(doc_ids)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}
