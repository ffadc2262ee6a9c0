pub mod policy;
pub mod ranking;
pub mod retrieval;

use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, RetrievalService};
use policy::{PersonaSearchConfig, ResolvedSearchPolicy};
use ranking::{CandidateSet, boost, diversity, fusion};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalSourceKind {
	Vector,
	Lexical,
}
impl RetrievalSourceKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Vector => "vector",
			Self::Lexical => "lexical",
		}
	}
}

/// One retriever hit. `raw_score` is kept for provenance only; fusion reads the list position.
#[derive(Clone, Debug, PartialEq)]
pub struct RetrievedChunk {
	pub chunk_id: Uuid,
	pub doc_id: Uuid,
	pub section_path: String,
	pub text: String,
	pub raw_score: f32,
	pub doc_title: Option<String>,
	pub doc_type: Option<String>,
	pub source_url: Option<String>,
}

/// A ranked list from a single source, rank 1 first.
#[derive(Clone, Debug)]
pub struct RetrievalResult {
	pub source: RetrievalSourceKind,
	pub chunks: Vec<RetrievedChunk>,
}
impl RetrievalResult {
	pub fn empty(source: RetrievalSourceKind) -> Self {
		Self { source, chunks: Vec::new() }
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoredCandidate {
	pub chunk_id: Uuid,
	pub doc_id: Uuid,
	pub section_path: String,
	pub text: String,
	/// Final score after fusion and every boost that applied.
	pub score: f32,
	pub fusion_score: f32,
	pub vector_score: Option<f32>,
	pub bm25_score: Option<f32>,
	pub vector_rank: Option<u32>,
	pub bm25_rank: Option<u32>,
	pub citation_boost_applied: bool,
	pub tag_boost_applied: bool,
	pub fusion_order: u32,
	pub doc_title: Option<String>,
	pub doc_type: Option<String>,
	pub source_url: Option<String>,
}

/// Stored per-persona settings. Absent fields fall back to `[retrieval]` defaults.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PersonaRecord {
	pub vector_threshold: Option<f32>,
	pub bm25_min_score: Option<f32>,
	pub topic_aliases: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchOptions {
	pub persona_slug: String,
	#[serde(default)]
	pub conversation_id: Option<Uuid>,
	#[serde(default)]
	pub vector_threshold: Option<f32>,
	#[serde(default)]
	pub bm25_min_score: Option<f32>,
	#[serde(default)]
	pub vector_limit: Option<u32>,
	#[serde(default)]
	pub bm25_limit: Option<u32>,
	#[serde(default)]
	pub rrf_k: Option<f32>,
	#[serde(default)]
	pub citation_multiplier: Option<f32>,
	#[serde(default)]
	pub citation_turns: Option<u32>,
	#[serde(default)]
	pub tag_multiplier: Option<f32>,
	#[serde(default)]
	pub max_per_doc: Option<u32>,
	#[serde(default)]
	pub limit: Option<u32>,
}
impl SearchOptions {
	pub fn for_persona(persona_slug: impl Into<String>) -> Self {
		Self { persona_slug: persona_slug.into(), ..Default::default() }
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SourceFailure {
	pub source: RetrievalSourceKind,
	pub message: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchResponse {
	pub trace_id: Uuid,
	pub persona_slug: String,
	pub items: Vec<ScoredCandidate>,
	/// Sources that failed while the other one succeeded.
	pub failed_sources: Vec<SourceFailure>,
	pub vector_count: usize,
	pub lexical_count: usize,
}

impl RetrievalService {
	/// Ranks the chunks most relevant to `query_text` for one persona.
	///
	/// Vector and lexical retrieval run concurrently; their lists are fused with RRF, boosted by
	/// recent citations then by tags, capped per document and truncated. A single failed source
	/// degrades the result; both failing is [`Error::RetrievalFailed`].
	pub async fn search(&self, query_text: &str, options: SearchOptions) -> Result<SearchResponse> {
		let query = query_text.trim();
		let persona_slug = options.persona_slug.trim();

		if query.is_empty() {
			return Err(Error::InvalidRequest { message: "query must not be empty.".to_string() });
		}
		if persona_slug.is_empty() {
			return Err(Error::InvalidRequest {
				message: "persona_slug must not be empty.".to_string(),
			});
		}

		let trace_id = Uuid::new_v4();
		let started = Instant::now();
		let persona = self.resolve_persona(persona_slug).await;
		let policy = policy::resolve_search_policy(&self.cfg, &options, &persona)?;
		let (vector, lexical) = tokio::join!(
			retrieval::vector_search(
				&self.cfg,
				&self.providers,
				self.backends.vector.as_ref(),
				query,
				persona_slug,
				policy.vector_threshold,
				policy.vector_limit,
			),
			retrieval::lexical_search(
				&self.cfg,
				self.backends.lexical.as_ref(),
				query,
				persona_slug,
				policy.bm25_min_score,
				policy.bm25_limit,
			),
		);
		let mut failed_sources = Vec::new();
		let (vector, lexical) = match (vector, lexical) {
			(Err(vector_err), Err(lexical_err)) => {
				tracing::warn!(
					%trace_id,
					persona_slug,
					vector_error = %vector_err,
					lexical_error = %lexical_err,
					"All retrieval sources failed."
				);

				return Err(Error::RetrievalFailed {
					vector: vector_err.to_string(),
					lexical: lexical_err.to_string(),
				});
			},
			(vector, lexical) => (
				settle_source(trace_id, RetrievalSourceKind::Vector, vector, &mut failed_sources),
				settle_source(trace_id, RetrievalSourceKind::Lexical, lexical, &mut failed_sources),
			),
		};
		let vector_count = vector.chunks.len();
		let lexical_count = lexical.chunks.len();
		let candidates = fusion::fuse(vector, lexical, policy.rrf_k);

		tracing::debug!(
			%trace_id,
			vector_count,
			lexical_count,
			fused = candidates.len(),
			"Fused retrieval lists."
		);

		let candidates =
			self.apply_citation_stage(trace_id, candidates, options.conversation_id, &policy).await;
		let candidates =
			self.apply_tag_stage(trace_id, candidates, query, &persona, &policy).await;
		let mut items = diversity::deduplicate_by_doc(candidates, policy.max_per_doc);

		items.truncate(policy.limit as usize);

		tracing::info!(
			%trace_id,
			persona_slug,
			vector_count,
			lexical_count,
			failed_sources = failed_sources.len(),
			returned = items.len(),
			elapsed_ms = started.elapsed().as_millis() as u64,
			"Search completed."
		);

		Ok(SearchResponse {
			trace_id,
			persona_slug: persona_slug.to_string(),
			items,
			failed_sources,
			vector_count,
			lexical_count,
		})
	}

	async fn resolve_persona(&self, persona_slug: &str) -> PersonaSearchConfig {
		let record = match self.backends.personas.get_config(persona_slug).await {
			Ok(Some(record)) => Some(record),
			Ok(None) => {
				tracing::debug!(persona_slug, "No stored persona configuration; using defaults.");

				None
			},
			Err(err) => {
				tracing::warn!(
					persona_slug,
					error = %err,
					"Persona configuration lookup failed; using defaults."
				);

				None
			},
		};

		policy::resolve_persona_config(&self.cfg, persona_slug, record)
	}

	async fn apply_citation_stage(
		&self,
		trace_id: Uuid,
		candidates: CandidateSet,
		conversation_id: Option<Uuid>,
		policy: &ResolvedSearchPolicy,
	) -> CandidateSet {
		let Some(conversation_id) = conversation_id else { return candidates };

		if candidates.is_empty() {
			return candidates;
		}

		match self
			.backends
			.conversations
			.recently_cited_docs(conversation_id, policy.citation_turns)
			.await
		{
			Ok(cited_docs) =>
				boost::apply_citation_boost(candidates, &cited_docs, policy.citation_multiplier),
			Err(err) => {
				tracing::warn!(
					%trace_id,
					%conversation_id,
					error = %err,
					"Citation lookup failed; skipping citation boost."
				);

				candidates
			},
		}
	}

	async fn apply_tag_stage(
		&self,
		trace_id: Uuid,
		candidates: CandidateSet,
		query: &str,
		persona: &PersonaSearchConfig,
		policy: &ResolvedSearchPolicy,
	) -> CandidateSet {
		if persona.topic_aliases.is_empty() || candidates.is_empty() {
			return candidates;
		}

		let doc_ids = candidates.doc_ids();

		match self.backends.tags.get_tags(&doc_ids).await {
			Ok(doc_tags) => {
				let boosted = boost::tag_boost_docs(&doc_tags, query, &persona.topic_aliases);

				boost::apply_tag_boost(candidates, &boosted, policy.tag_multiplier)
			},
			Err(err) => {
				tracing::warn!(
					%trace_id,
					persona_slug = persona.persona_slug.as_str(),
					error = %err,
					"Document tag lookup failed; skipping tag boost."
				);

				candidates
			},
		}
	}
}

fn settle_source(
	trace_id: Uuid,
	source: RetrievalSourceKind,
	result: Result<RetrievalResult>,
	failed_sources: &mut Vec<SourceFailure>,
) -> RetrievalResult {
	match result {
		Ok(result) => result,
		Err(err) => {
			tracing::warn!(
				%trace_id,
				source = source.as_str(),
				error = %err,
				"Retrieval source failed; fusing the remaining source."
			);

			failed_sources.push(SourceFailure { source, message: err.to_string() });

			RetrievalResult::empty(source)
		},
	}
}
