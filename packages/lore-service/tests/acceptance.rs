use std::sync::Arc;

use serde_json::Map;
use uuid::Uuid;

use lore_config::{
	Config, EmbeddingProviderConfig, Postgres, Providers as ProviderConfigs, Qdrant, Ranking,
	Retrieval, Security, Service, Storage, VectorDistance,
};
use lore_service::{
	Backends, BoxFuture, EmbeddingProvider, Providers, Result, RetrievalService, SearchOptions,
};
use lore_storage::{db::Db, qdrant::QdrantStore};
use lore_testkit::{
	TestDatabase,
	fixtures::{self, PersonaFixture},
};

const VECTOR_DIM: u32 = 3;

struct FixedEmbedding;
impl EmbeddingProvider for FixedEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		let vectors = texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect();

		Box::pin(async move { Ok(vectors) })
	}
}

fn live_config(dsn: String, qdrant_url: String, collection: String) -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		storage: Storage {
			postgres: Postgres { dsn, pool_max_conns: 2 },
			qdrant: Qdrant {
				url: qdrant_url,
				collection,
				vector_dim: VECTOR_DIM,
				distance: VectorDistance::Cosine,
			},
		},
		providers: ProviderConfigs {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/".to_string(),
				model: "test".to_string(),
				dimensions: VECTOR_DIM,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		retrieval: Retrieval { bm25_min_score: 0.0, ..Default::default() },
		ranking: Ranking::default(),
		security: Security { bind_localhost_only: true },
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set LORE_PG_DSN and LORE_QDRANT_URL to run."]
async fn hybrid_search_over_live_stores() {
	let (Some(base_dsn), Some(qdrant_url)) =
		(lore_testkit::env_dsn(), lore_testkit::env_qdrant_url())
	else {
		eprintln!(
			"Skipping hybrid_search_over_live_stores; set LORE_PG_DSN and LORE_QDRANT_URL to run."
		);

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let cfg = live_config(
		test_db.dsn().to_string(),
		qdrant_url,
		test_db.collection_name("lore_chunks"),
	);
	let db = Db::connect(&cfg.storage.postgres).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	let qdrant = QdrantStore::new(&cfg.storage.qdrant).expect("Failed to build Qdrant client.");

	qdrant.ensure_collection().await.expect("Failed to create collection.");

	let persona = PersonaFixture { topic_aliases: &["home office"], ..PersonaFixture::new("tax") };

	fixtures::insert_persona(&db.pool, &persona).await.expect("Failed to insert persona.");
	fixtures::insert_persona(&db.pool, &PersonaFixture::new("garden"))
		.await
		.expect("Failed to insert persona.");

	let office_doc = fixtures::insert_document(&db.pool, "Home office", &["office"], &["tax"])
		.await
		.expect("Failed to insert document.");
	let forms_doc = fixtures::insert_document(&db.pool, "Forms", &[], &["tax"])
		.await
		.expect("Failed to insert document.");
	let garden_doc = fixtures::insert_document(&db.pool, "Compost", &[], &["garden"])
		.await
		.expect("Failed to insert document.");
	let office_chunk = fixtures::insert_chunk(
		&db.pool,
		office_doc,
		0,
		"deductions",
		"A dedicated workspace qualifies for the home office deduction.",
	)
	.await
	.expect("Failed to insert chunk.");
	let forms_chunk =
		fixtures::insert_chunk(&db.pool, forms_doc, 0, "", "File the workspace schedule.")
			.await
			.expect("Failed to insert chunk.");
	let orthogonal_chunk =
		fixtures::insert_chunk(&db.pool, forms_doc, 1, "", "Unrelated filing calendar.")
			.await
			.expect("Failed to insert chunk.");
	let garden_chunk =
		fixtures::insert_chunk(&db.pool, garden_doc, 0, "", "A workspace for compost bins.")
			.await
			.expect("Failed to insert chunk.");

	for (chunk_id, doc_id, persona_slug, vector) in [
		(office_chunk, office_doc, "tax", vec![1.0, 0.0, 0.0]),
		(forms_chunk, forms_doc, "tax", vec![0.8, 0.6, 0.0]),
		(orthogonal_chunk, forms_doc, "tax", vec![0.0, 1.0, 0.0]),
		(garden_chunk, garden_doc, "garden", vec![1.0, 0.0, 0.0]),
	] {
		qdrant
			.upsert_chunk(chunk_id, doc_id, &[persona_slug.to_string()], vector)
			.await
			.expect("Failed to upsert chunk vector.");
	}

	let conversation_id = fixtures::insert_conversation(&db.pool, "tax")
		.await
		.expect("Failed to insert conversation.");

	fixtures::insert_message(&db.pool, conversation_id, "assistant", 1, &[forms_doc])
		.await
		.expect("Failed to insert message.");

	let service_pool = db.pool.clone();
	let service = RetrievalService::with_backends(
		cfg,
		Providers::new(Arc::new(FixedEmbedding)),
		Backends::from_stores(db, qdrant),
	);
	let options = SearchOptions {
		conversation_id: Some(conversation_id),
		..SearchOptions::for_persona("tax")
	};
	let response = service.search("workspace", options).await.expect("Search failed.");
	let ids: Vec<Uuid> = response.items.iter().map(|item| item.chunk_id).collect();

	assert!(response.failed_sources.is_empty());
	assert!(!ids.contains(&garden_chunk));
	assert!(!ids.contains(&orthogonal_chunk));
	assert_eq!(ids.len(), 2);

	let office = &response.items[ids.iter().position(|id| *id == office_chunk).expect("Missing.")];
	let forms = &response.items[ids.iter().position(|id| *id == forms_chunk).expect("Missing.")];

	assert_eq!(office.vector_rank, Some(1));
	assert!(office.bm25_rank.is_some());
	assert!(office.tag_boost_applied);
	assert!(!office.citation_boost_applied);
	assert!(forms.citation_boost_applied);
	assert!(!forms.tag_boost_applied);
	assert_eq!(office.doc_title.as_deref(), Some("Home office"));

	fixtures::unlink_document(&service_pool, "tax", forms_doc)
		.await
		.expect("Failed to unlink document.");

	let response = service
		.search("workspace", SearchOptions::for_persona("tax"))
		.await
		.expect("Search failed.");
	let ids: Vec<Uuid> = response.items.iter().map(|item| item.chunk_id).collect();

	// The Qdrant payload still lists the persona; hydration must drop the unlinked document.
	assert_eq!(ids, vec![office_chunk]);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
