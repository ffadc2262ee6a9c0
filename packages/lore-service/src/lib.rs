pub mod backends;
pub mod search;

mod error;

pub use error::{Error, Result};
pub use search::{
	PersonaRecord, RetrievalResult, RetrievalSourceKind, RetrievedChunk, ScoredCandidate,
	SearchOptions, SearchResponse, SourceFailure,
};

use std::{
	collections::{HashMap, HashSet},
	future::Future,
	pin::Pin,
	sync::Arc,
};

use uuid::Uuid;

use lore_config::{Config, EmbeddingProviderConfig};
use lore_providers::embedding;
use lore_storage::{db::Db, qdrant::QdrantStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

/// Dense nearest-neighbour search.
///
/// Implementations return chunks visible to `persona_slug`, best first, with `raw_score`
/// normalized to `[0, 1]` and no entry below `min_similarity`.
pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn query<'a>(
		&'a self,
		vector: &'a [f32],
		persona_slug: &'a str,
		min_similarity: f32,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<RetrievedChunk>>>;
}

/// Keyword relevance search. `raw_score` is on the index's own unbounded scale.
pub trait LexicalIndex
where
	Self: Send + Sync,
{
	fn query<'a>(
		&'a self,
		text: &'a str,
		persona_slug: &'a str,
		min_score: f32,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<RetrievedChunk>>>;
}

pub trait PersonaConfigStore
where
	Self: Send + Sync,
{
	fn get_config<'a>(&'a self, persona_slug: &'a str)
	-> BoxFuture<'a, Result<Option<PersonaRecord>>>;
}

pub trait ConversationStore
where
	Self: Send + Sync,
{
	fn recently_cited_docs<'a>(
		&'a self,
		conversation_id: Uuid,
		assistant_turns: u32,
	) -> BoxFuture<'a, Result<HashSet<Uuid>>>;
}

pub trait DocumentTagStore
where
	Self: Send + Sync,
{
	fn get_tags<'a>(&'a self, doc_ids: &'a [Uuid])
	-> BoxFuture<'a, Result<HashMap<Uuid, Vec<String>>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>) -> Self {
		Self { embedding }
	}
}
impl Default for Providers {
	fn default() -> Self {
		Self { embedding: Arc::new(DefaultProviders) }
	}
}

/// The stores a search reads from.
#[derive(Clone)]
pub struct Backends {
	pub vector: Arc<dyn VectorIndex>,
	pub lexical: Arc<dyn LexicalIndex>,
	pub personas: Arc<dyn PersonaConfigStore>,
	pub conversations: Arc<dyn ConversationStore>,
	pub tags: Arc<dyn DocumentTagStore>,
}
impl Backends {
	/// Postgres serves lexical search and every lookup; Qdrant serves dense search.
	pub fn from_stores(db: Db, qdrant: QdrantStore) -> Self {
		let pg = Arc::new(backends::PgBackend::new(Arc::new(db)));
		let vector = Arc::new(backends::QdrantVectorIndex::new(Arc::new(qdrant), pg.db()));

		Self {
			vector,
			lexical: pg.clone(),
			personas: pg.clone(),
			conversations: pg.clone(),
			tags: pg,
		}
	}
}

pub struct RetrievalService {
	pub cfg: Config,
	pub providers: Providers,
	pub backends: Backends,
}
impl RetrievalService {
	pub fn new(cfg: Config, db: Db, qdrant: QdrantStore) -> Self {
		Self { cfg, providers: Providers::default(), backends: Backends::from_stores(db, qdrant) }
	}

	pub fn with_backends(cfg: Config, providers: Providers, backends: Backends) -> Self {
		Self { cfg, providers, backends }
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}
}
