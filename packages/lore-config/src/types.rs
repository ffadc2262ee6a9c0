use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub ranking: Ranking,
	pub security: Security,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
	/// Metric the collection was created with. Scores are normalized to `[0,1]` per metric.
	#[serde(default)]
	pub distance: VectorDistance,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDistance {
	#[default]
	Cosine,
	Dot,
	Euclid,
}
impl VectorDistance {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Cosine => "cosine",
			Self::Dot => "dot",
			Self::Euclid => "euclid",
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

/// Persona-independent retrieval defaults. A persona may override the two thresholds.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	/// Minimum normalized similarity for a dense hit.
	pub vector_threshold: f32,
	/// Minimum lexical relevance for a full-text hit.
	pub bm25_min_score: f32,
	pub vector_limit: u32,
	pub bm25_limit: u32,
	/// RRF damping constant.
	pub rrf_k: f32,
	/// Number of passages returned after the diversity cap.
	pub top_k: u32,
	/// Upper bound for a single retriever attempt.
	pub source_timeout_ms: u64,
	pub retry: RetrievalRetry,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			vector_threshold: 0.35,
			bm25_min_score: 0.1,
			vector_limit: 20,
			bm25_limit: 20,
			rrf_k: 60.0,
			top_k: 12,
			source_timeout_ms: 10_000,
			retry: RetrievalRetry::default(),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetrievalRetry {
	/// Total attempts per retriever, including the first one.
	pub max_attempts: u32,
	pub backoff_ms: u64,
	pub max_backoff_ms: u64,
}
impl Default for RetrievalRetry {
	fn default() -> Self {
		Self { max_attempts: 2, backoff_ms: 200, max_backoff_ms: 2_000 }
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Ranking {
	pub citation: RankingCitation,
	pub tags: RankingTags,
	pub diversity: RankingDiversity,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RankingCitation {
	pub multiplier: f32,
	/// How many of the latest assistant turns contribute cited documents.
	pub assistant_turns: u32,
}
impl Default for RankingCitation {
	fn default() -> Self {
		Self { multiplier: 1.15, assistant_turns: 2 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RankingTags {
	pub multiplier: f32,
}
impl Default for RankingTags {
	fn default() -> Self {
		Self { multiplier: 1.075 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RankingDiversity {
	pub max_per_doc: u32,
}
impl Default for RankingDiversity {
	fn default() -> Self {
		Self { max_per_doc: 3 }
	}
}

#[derive(Debug, Deserialize)]
pub struct Security {
	pub bind_localhost_only: bool,
}
