use std::collections::HashMap;

use qdrant_client::{
	Payload,
	qdrant::{
		Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, Distance, FieldType,
		Filter, PointStruct, Query, QueryPointsBuilder, ScoredPoint, UpsertPointsBuilder, Value,
		Vector, VectorParamsBuilder, VectorsConfigBuilder,
	},
};
use uuid::Uuid;

use crate::{Error, Result};
use lore_config::VectorDistance;

pub const DENSE_VECTOR_NAME: &str = "dense";
pub const PERSONA_SLUGS_FIELD: &str = "persona_slugs";

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
	pub distance: VectorDistance,
}
impl QdrantStore {
	pub fn new(cfg: &lore_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self {
			client,
			collection: cfg.collection.clone(),
			vector_dim: cfg.vector_dim,
			distance: cfg.distance,
		})
	}

	/// Creates the chunk collection and its persona keyword index when missing.
	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(self.collection.as_str()).await? {
			return Ok(());
		}

		let mut vectors_config = VectorsConfigBuilder::default();

		vectors_config.add_named_vector_params(
			DENSE_VECTOR_NAME,
			VectorParamsBuilder::new(u64::from(self.vector_dim), qdrant_distance(self.distance)),
		);

		self.client
			.create_collection(
				CreateCollectionBuilder::new(self.collection.clone())
					.vectors_config(vectors_config),
			)
			.await?;
		self.client
			.create_field_index(CreateFieldIndexCollectionBuilder::new(
				self.collection.clone(),
				PERSONA_SLUGS_FIELD,
				FieldType::Keyword,
			))
			.await?;

		Ok(())
	}

	/// Writes one chunk embedding, visible to every persona in `persona_slugs`.
	pub async fn upsert_chunk(
		&self,
		chunk_id: Uuid,
		doc_id: Uuid,
		persona_slugs: &[String],
		vector: Vec<f32>,
	) -> Result<()> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Chunk vector has {} dimensions, collection expects {}.",
				vector.len(),
				self.vector_dim
			)));
		}

		let mut payload = Payload::new();

		payload.insert("chunk_id", chunk_id.to_string());
		payload.insert("doc_id", doc_id.to_string());
		payload.insert(PERSONA_SLUGS_FIELD, Value::from(serde_json::json!(persona_slugs)));

		let mut vectors = HashMap::new();

		vectors.insert(DENSE_VECTOR_NAME.to_string(), Vector::from(vector));

		let point = PointStruct::new(chunk_id.to_string(), vectors, payload);

		self.client
			.upsert_points(
				UpsertPointsBuilder::new(self.collection.clone(), vec![point]).wait(true),
			)
			.await?;

		Ok(())
	}

	/// Nearest-neighbour query over chunks tagged with `persona_slug`, best first.
	///
	/// Scores are raw Qdrant scores for the collection metric; callers normalize them.
	pub async fn search_dense(
		&self,
		vector: Vec<f32>,
		persona_slug: &str,
		limit: u32,
	) -> Result<Vec<ScoredPoint>> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Query vector has {} dimensions, collection expects {}.",
				vector.len(),
				self.vector_dim
			)));
		}

		let filter =
			Filter::must([Condition::matches(PERSONA_SLUGS_FIELD, persona_slug.to_string())]);
		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector))
			.using(DENSE_VECTOR_NAME)
			.filter(filter)
			.with_payload(true)
			.limit(u64::from(limit));
		let response = self.client.query(search).await?;

		Ok(response.result)
	}
}

fn qdrant_distance(distance: VectorDistance) -> Distance {
	match distance {
		VectorDistance::Cosine => Distance::Cosine,
		VectorDistance::Dot => Distance::Dot,
		VectorDistance::Euclid => Distance::Euclid,
	}
}
