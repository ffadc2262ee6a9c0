mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, Postgres, Providers, Qdrant, Ranking, RankingCitation,
	RankingDiversity, RankingTags, Retrieval, RetrievalRetry, Security, Service, Storage,
	VectorDistance,
};

use std::{fs, path::Path};

/// Upper bound for any boost multiplier. Keeps boosted RRF scores finite.
pub const MAX_BOOST_MULTIPLIER: f32 = 1_000.0;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}

	validate_retrieval(cfg)?;
	validate_ranking(cfg)?;

	Ok(())
}

fn validate_retrieval(cfg: &Config) -> Result<()> {
	let retrieval = &cfg.retrieval;

	for (label, value) in [
		("retrieval.vector_threshold", retrieval.vector_threshold),
		("retrieval.bm25_min_score", retrieval.bm25_min_score),
		("retrieval.rrf_k", retrieval.rrf_k),
	] {
		ensure_non_negative(label, value)?;
	}

	if retrieval.vector_threshold > 1.0 {
		return Err(Error::Validation {
			message: "retrieval.vector_threshold must be 1.0 or less.".to_string(),
		});
	}

	for (label, value) in [
		("retrieval.vector_limit", retrieval.vector_limit),
		("retrieval.bm25_limit", retrieval.bm25_limit),
		("retrieval.top_k", retrieval.top_k),
		("retrieval.retry.max_attempts", retrieval.retry.max_attempts),
	] {
		if value == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if retrieval.source_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "retrieval.source_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if retrieval.retry.max_backoff_ms < retrieval.retry.backoff_ms {
		return Err(Error::Validation {
			message: "retrieval.retry.max_backoff_ms must be at least retrieval.retry.backoff_ms."
				.to_string(),
		});
	}

	Ok(())
}

fn validate_ranking(cfg: &Config) -> Result<()> {
	for (label, value) in [
		("ranking.citation.multiplier", cfg.ranking.citation.multiplier),
		("ranking.tags.multiplier", cfg.ranking.tags.multiplier),
	] {
		ensure_non_negative(label, value)?;

		if value > MAX_BOOST_MULTIPLIER {
			return Err(Error::Validation {
				message: format!("{label} must be {MAX_BOOST_MULTIPLIER} or less."),
			});
		}
	}

	if cfg.ranking.citation.assistant_turns == 0 {
		return Err(Error::Validation {
			message: "ranking.citation.assistant_turns must be greater than zero.".to_string(),
		});
	}
	if cfg.ranking.diversity.max_per_doc == 0 {
		return Err(Error::Validation {
			message: "ranking.diversity.max_per_doc must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn ensure_non_negative(label: &str, value: f32) -> Result<()> {
	if !value.is_finite() {
		return Err(Error::Validation { message: format!("{label} must be a finite number.") });
	}
	if value < 0.0 {
		return Err(Error::Validation { message: format!("{label} must be zero or greater.") });
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	let api_base = cfg.providers.embedding.api_base.trim_end_matches('/').to_string();

	cfg.providers.embedding.api_base = api_base;
	cfg.storage.qdrant.collection = cfg.storage.qdrant.collection.trim().to_string();
}
