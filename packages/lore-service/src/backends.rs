//! Postgres and Qdrant implementations of the retrieval seams.

use std::{
	collections::{HashMap, HashSet},
	sync::Arc,
};

use qdrant_client::qdrant::{PointId, ScoredPoint, Value, point_id::PointIdOptions, value::Kind};
use uuid::Uuid;

use crate::{
	BoxFuture, ConversationStore, DocumentTagStore, LexicalIndex, PersonaConfigStore, Result,
	VectorIndex,
	search::{PersonaRecord, RetrievedChunk},
};
use lore_config::VectorDistance;
use lore_storage::{
	chunks, conversations,
	db::Db,
	documents,
	models::{ChunkRecord, LexicalHit},
	personas,
	qdrant::QdrantStore,
};

pub struct PgBackend {
	db: Arc<Db>,
}
impl PgBackend {
	pub fn new(db: Arc<Db>) -> Self {
		Self { db }
	}

	pub fn db(&self) -> Arc<Db> {
		self.db.clone()
	}
}
impl LexicalIndex for PgBackend {
	fn query<'a>(
		&'a self,
		text: &'a str,
		persona_slug: &'a str,
		min_score: f32,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<RetrievedChunk>>> {
		Box::pin(async move {
			let hits =
				chunks::search_lexical(&self.db, text, persona_slug, min_score, limit).await?;

			Ok(hits.into_iter().map(RetrievedChunk::from).collect())
		})
	}
}
impl PersonaConfigStore for PgBackend {
	fn get_config<'a>(
		&'a self,
		persona_slug: &'a str,
	) -> BoxFuture<'a, Result<Option<PersonaRecord>>> {
		Box::pin(async move {
			let persona = personas::get_persona(&self.db, persona_slug).await?;

			Ok(persona.map(|persona| PersonaRecord {
				vector_threshold: persona.vector_threshold,
				bm25_min_score: persona.bm25_min_score,
				topic_aliases: persona.topic_aliases,
			}))
		})
	}
}
impl ConversationStore for PgBackend {
	fn recently_cited_docs<'a>(
		&'a self,
		conversation_id: Uuid,
		assistant_turns: u32,
	) -> BoxFuture<'a, Result<HashSet<Uuid>>> {
		Box::pin(async move {
			let doc_ids =
				conversations::recently_cited_docs(&self.db, conversation_id, assistant_turns)
					.await?;

			Ok(doc_ids.into_iter().collect())
		})
	}
}
impl DocumentTagStore for PgBackend {
	fn get_tags<'a>(
		&'a self,
		doc_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<HashMap<Uuid, Vec<String>>>> {
		Box::pin(async move {
			let rows = documents::fetch_tags(&self.db, doc_ids).await?;

			Ok(rows.into_iter().map(|row| (row.doc_id, row.tags)).collect())
		})
	}
}

/// Dense search in Qdrant, hydrated with chunk text and document metadata from Postgres.
pub struct QdrantVectorIndex {
	qdrant: Arc<QdrantStore>,
	db: Arc<Db>,
}
impl QdrantVectorIndex {
	pub fn new(qdrant: Arc<QdrantStore>, db: Arc<Db>) -> Self {
		Self { qdrant, db }
	}
}
impl VectorIndex for QdrantVectorIndex {
	fn query<'a>(
		&'a self,
		vector: &'a [f32],
		persona_slug: &'a str,
		min_similarity: f32,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<RetrievedChunk>>> {
		Box::pin(async move {
			let points = self.qdrant.search_dense(vector.to_vec(), persona_slug, limit).await?;
			let hits = collect_dense_hits(&points, self.qdrant.distance, min_similarity);
			let chunk_ids: Vec<Uuid> = hits.iter().map(|(chunk_id, _)| *chunk_id).collect();
			let records: HashMap<Uuid, ChunkRecord> =
				chunks::fetch_chunks(&self.db, &chunk_ids, persona_slug)
					.await?
					.into_iter()
					.map(|record| (record.chunk_id, record))
					.collect();
			let mut out = Vec::with_capacity(hits.len());

			for (chunk_id, similarity) in hits {
				let Some(record) = records.get(&chunk_id) else {
					tracing::warn!(
						chunk_id = %chunk_id,
						persona_slug,
						"Vector hit has no chunk row visible to the persona."
					);

					continue;
				};

				out.push(RetrievedChunk {
					chunk_id,
					doc_id: record.doc_id,
					section_path: record.section_path.clone(),
					text: record.text.clone(),
					raw_score: similarity,
					doc_title: record.doc_title.clone(),
					doc_type: record.doc_type.clone(),
					source_url: record.source_url.clone(),
				});
			}

			Ok(out)
		})
	}
}

impl From<LexicalHit> for RetrievedChunk {
	fn from(hit: LexicalHit) -> Self {
		Self {
			chunk_id: hit.chunk_id,
			doc_id: hit.doc_id,
			section_path: hit.section_path,
			text: hit.text,
			raw_score: hit.score,
			doc_title: hit.doc_title,
			doc_type: hit.doc_type,
			source_url: hit.source_url,
		}
	}
}

/// Maps a raw Qdrant score for `distance` onto `[0, 1]`, higher meaning more similar.
pub fn normalize_similarity(distance: VectorDistance, raw: f32) -> f32 {
	if !raw.is_finite() {
		return 0.0;
	}

	match distance {
		VectorDistance::Cosine => raw.clamp(0.0, 1.0),
		VectorDistance::Dot => ((1.0 + raw) / 2.0).clamp(0.0, 1.0),
		VectorDistance::Euclid => 1.0 / (1.0 + raw.max(0.0)),
	}
}

fn collect_dense_hits(
	points: &[ScoredPoint],
	distance: VectorDistance,
	min_similarity: f32,
) -> Vec<(Uuid, f32)> {
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for point in points {
		let chunk_id = point
			.id
			.as_ref()
			.and_then(point_id_to_uuid)
			.or_else(|| payload_uuid(&point.payload, "chunk_id"));
		let Some(chunk_id) = chunk_id else {
			tracing::warn!("Vector hit missing chunk_id.");

			continue;
		};

		if !seen.insert(chunk_id) {
			continue;
		}

		let similarity = normalize_similarity(distance, point.score);

		if similarity < min_similarity {
			continue;
		}

		out.push((chunk_id, similarity));
	}

	out
}

fn point_id_to_uuid(point_id: &PointId) -> Option<Uuid> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Uuid::parse_str(id).ok(),
		_ => None,
	}
}

fn payload_uuid(payload: &HashMap<String, Value>, key: &str) -> Option<Uuid> {
	match &payload.get(key)?.kind {
		Some(Kind::StringValue(text)) => Uuid::parse_str(text).ok(),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn point(id: Option<Uuid>, payload_chunk: Option<Uuid>, score: f32) -> ScoredPoint {
		let mut payload = HashMap::new();

		if let Some(chunk_id) = payload_chunk {
			payload.insert(
				"chunk_id".to_string(),
				Value { kind: Some(Kind::StringValue(chunk_id.to_string())) },
			);
		}

		ScoredPoint {
			id: id.map(|id| PointId {
				point_id_options: Some(PointIdOptions::Uuid(id.to_string())),
			}),
			payload,
			score,
			..Default::default()
		}
	}

	#[test]
	fn similarity_is_normalized_per_metric() {
		assert_eq!(normalize_similarity(VectorDistance::Cosine, 0.8), 0.8);
		assert_eq!(normalize_similarity(VectorDistance::Cosine, -0.3), 0.0);
		assert_eq!(normalize_similarity(VectorDistance::Dot, 0.0), 0.5);
		assert_eq!(normalize_similarity(VectorDistance::Dot, 3.0), 1.0);
		assert_eq!(normalize_similarity(VectorDistance::Euclid, 0.0), 1.0);
		assert_eq!(normalize_similarity(VectorDistance::Euclid, 1.0), 0.5);
		assert_eq!(normalize_similarity(VectorDistance::Cosine, f32::NAN), 0.0);
	}

	#[test]
	fn dense_hits_drop_duplicates_and_low_similarity() {
		let first = Uuid::new_v4();
		let second = Uuid::new_v4();
		let third = Uuid::new_v4();
		let points = vec![
			point(Some(first), None, 0.9),
			point(None, Some(second), 0.7),
			point(Some(first), None, 0.6),
			point(Some(third), None, 0.2),
			point(None, None, 0.95),
		];
		let hits = collect_dense_hits(&points, VectorDistance::Cosine, 0.35);

		assert_eq!(hits, vec![(first, 0.9), (second, 0.7)]);
	}
}
