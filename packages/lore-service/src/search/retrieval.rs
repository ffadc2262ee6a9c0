use std::{future::Future, time::Duration};

use tokio::time;

use crate::{
	Error, LexicalIndex, Providers, Result, VectorIndex,
	search::{RetrievalResult, RetrievalSourceKind, RetrievedChunk, ranking::cmp_f32_desc},
};
use lore_config::{Config, RetrievalRetry};

/// Embeds the query once and runs a persona-scoped nearest-neighbour search.
pub async fn vector_search(
	cfg: &Config,
	providers: &Providers,
	index: &dyn VectorIndex,
	query: &str,
	persona_slug: &str,
	threshold: f32,
	limit: u32,
) -> Result<RetrievalResult> {
	let source = RetrievalSourceKind::Vector;
	let chunks = with_retry(&cfg.retrieval.retry, source_timeout(cfg), source, || async move {
		let texts = [query.to_string()];
		let mut vectors = providers.embedding.embed(&cfg.providers.embedding, &texts).await?;
		let Some(vector) = vectors.pop().filter(|_| vectors.is_empty()) else {
			return Err(Error::ProviderMismatch {
				message: "Embedding provider must return exactly one vector.".to_string(),
			});
		};

		if vector.len() != cfg.storage.qdrant.vector_dim as usize {
			return Err(Error::ProviderMismatch {
				message: format!(
					"Embedding has {} dimensions, expected {}.",
					vector.len(),
					cfg.storage.qdrant.vector_dim
				),
			});
		}

		index.query(&vector, persona_slug, threshold, limit).await
	})
	.await?;

	Ok(RetrievalResult { source, chunks: rank_hits(chunks, threshold, limit) })
}

/// Persona-scoped keyword search.
pub async fn lexical_search(
	cfg: &Config,
	index: &dyn LexicalIndex,
	query: &str,
	persona_slug: &str,
	min_score: f32,
	limit: u32,
) -> Result<RetrievalResult> {
	let source = RetrievalSourceKind::Lexical;
	let chunks = with_retry(&cfg.retrieval.retry, source_timeout(cfg), source, || {
		index.query(query, persona_slug, min_score, limit)
	})
	.await?;

	Ok(RetrievalResult { source, chunks: rank_hits(chunks, min_score, limit) })
}

/// Runs `op` until it succeeds, fails with a non-retryable error or attempts run out.
///
/// Each attempt is bounded by `timeout`; the delay between attempts doubles up to
/// `max_backoff_ms`.
pub async fn with_retry<T, F, Fut>(
	retry: &RetrievalRetry,
	timeout: Duration,
	source: RetrievalSourceKind,
	mut op: F,
) -> Result<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let max_attempts = retry.max_attempts.max(1);
	let max_backoff = Duration::from_millis(retry.max_backoff_ms);
	let mut backoff = Duration::from_millis(retry.backoff_ms).min(max_backoff);
	let mut attempt = 1;

	loop {
		let err = match time::timeout(timeout, op()).await {
			Ok(Ok(value)) => return Ok(value),
			Ok(Err(err)) => err,
			Err(_) => Error::Timeout {
				message: format!(
					"{} retrieval exceeded {} ms.",
					source.as_str(),
					timeout.as_millis()
				),
			},
		};

		if attempt >= max_attempts || !err.is_retryable() {
			return Err(err);
		}

		tracing::warn!(
			source = source.as_str(),
			attempt,
			max_attempts,
			error = %err,
			"Retrieval attempt failed; retrying."
		);

		time::sleep(backoff).await;

		backoff = backoff.saturating_mul(2).min(max_backoff);
		attempt += 1;
	}
}

fn source_timeout(cfg: &Config) -> Duration {
	Duration::from_millis(cfg.retrieval.source_timeout_ms)
}

/// Enforces the threshold and best-first order whatever the backend returned.
fn rank_hits(mut chunks: Vec<RetrievedChunk>, min_score: f32, limit: u32) -> Vec<RetrievedChunk> {
	chunks.retain(|chunk| chunk.raw_score.is_finite() && chunk.raw_score >= min_score);
	chunks.sort_by(|left, right| cmp_f32_desc(left.raw_score, right.raw_score));
	chunks.truncate(limit as usize);

	chunks
}
