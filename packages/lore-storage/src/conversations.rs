use uuid::Uuid;

use crate::{Error, Result, db::Db};

/// Distinct documents cited by the latest `assistant_turns` assistant messages of a conversation.
pub async fn recently_cited_docs(
	db: &Db,
	conversation_id: Uuid,
	assistant_turns: u32,
) -> Result<Vec<Uuid>> {
	let exists: bool = sqlx::query_scalar(
		"SELECT EXISTS (SELECT 1 FROM conversations WHERE conversation_id = $1)",
	)
	.bind(conversation_id)
	.fetch_one(&db.pool)
	.await?;

	if !exists {
		return Err(Error::NotFound(format!("conversation {conversation_id}")));
	}

	let doc_ids: Vec<Uuid> = sqlx::query_scalar(
		"\
WITH recent AS (
	SELECT message_id
	FROM messages
	WHERE conversation_id = $1 AND role = 'assistant'
	ORDER BY created_at DESC, message_id DESC
	LIMIT $2
)
SELECT DISTINCT c.doc_id
FROM message_citations c
JOIN recent r ON r.message_id = c.message_id
ORDER BY c.doc_id",
	)
	.bind(conversation_id)
	.bind(i64::from(assistant_turns))
	.fetch_all(&db.pool)
	.await?;

	Ok(doc_ids)
}
