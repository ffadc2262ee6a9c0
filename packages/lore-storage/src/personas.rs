use crate::{Result, db::Db, models::Persona};

pub async fn get_persona(db: &Db, persona_slug: &str) -> Result<Option<Persona>> {
	let persona = sqlx::query_as::<_, Persona>(
		"\
SELECT
	persona_slug,
	display_name,
	vector_threshold,
	bm25_min_score,
	topic_aliases,
	created_at,
	updated_at
FROM personas
WHERE persona_slug = $1",
	)
	.bind(persona_slug)
	.fetch_optional(&db.pool)
	.await?;

	Ok(persona)
}
