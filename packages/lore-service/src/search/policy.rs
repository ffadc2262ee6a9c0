use std::collections::BTreeSet;

use lore_config::{Config, MAX_BOOST_MULTIPLIER};

use crate::{
	Error, Result,
	search::{PersonaRecord, SearchOptions, ranking::boost},
};

/// Persona settings resolved once per query.
#[derive(Clone, Debug, PartialEq)]
pub struct PersonaSearchConfig {
	pub persona_slug: String,
	pub vector_threshold: f32,
	pub bm25_min_score: f32,
	/// NFKC-normalized, lowercased, non-empty aliases.
	pub topic_aliases: BTreeSet<String>,
}

/// Every knob a single search runs with after request overrides and persona settings are
/// applied over the configured defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedSearchPolicy {
	pub vector_threshold: f32,
	pub bm25_min_score: f32,
	pub vector_limit: u32,
	pub bm25_limit: u32,
	pub rrf_k: f32,
	pub citation_multiplier: f32,
	pub citation_turns: u32,
	pub tag_multiplier: f32,
	pub max_per_doc: u32,
	pub limit: u32,
}

pub fn resolve_persona_config(
	cfg: &Config,
	persona_slug: &str,
	record: Option<PersonaRecord>,
) -> PersonaSearchConfig {
	let record = record.unwrap_or_default();
	let vector_threshold = record
		.vector_threshold
		.filter(|value| value.is_finite() && (0.0..=1.0).contains(value))
		.unwrap_or(cfg.retrieval.vector_threshold);
	let bm25_min_score = record
		.bm25_min_score
		.filter(|value| value.is_finite() && *value >= 0.0)
		.unwrap_or(cfg.retrieval.bm25_min_score);
	let topic_aliases = record
		.topic_aliases
		.iter()
		.map(|alias| boost::normalize_term(alias))
		.filter(|alias| !alias.is_empty())
		.collect();

	PersonaSearchConfig {
		persona_slug: persona_slug.to_string(),
		vector_threshold,
		bm25_min_score,
		topic_aliases,
	}
}

/// Request overrides win over persona settings, which win over `[retrieval]`/`[ranking]`.
pub fn resolve_search_policy(
	cfg: &Config,
	options: &SearchOptions,
	persona: &PersonaSearchConfig,
) -> Result<ResolvedSearchPolicy> {
	let policy = ResolvedSearchPolicy {
		vector_threshold: options.vector_threshold.unwrap_or(persona.vector_threshold),
		bm25_min_score: options.bm25_min_score.unwrap_or(persona.bm25_min_score),
		vector_limit: options.vector_limit.unwrap_or(cfg.retrieval.vector_limit),
		bm25_limit: options.bm25_limit.unwrap_or(cfg.retrieval.bm25_limit),
		rrf_k: options.rrf_k.unwrap_or(cfg.retrieval.rrf_k),
		citation_multiplier: options
			.citation_multiplier
			.unwrap_or(cfg.ranking.citation.multiplier),
		citation_turns: options.citation_turns.unwrap_or(cfg.ranking.citation.assistant_turns),
		tag_multiplier: options.tag_multiplier.unwrap_or(cfg.ranking.tags.multiplier),
		max_per_doc: options.max_per_doc.unwrap_or(cfg.ranking.diversity.max_per_doc),
		limit: options.limit.unwrap_or(cfg.retrieval.top_k),
	};

	validate_policy(&policy)?;

	Ok(policy)
}

fn validate_policy(policy: &ResolvedSearchPolicy) -> Result<()> {
	ensure_non_negative("vector_threshold", policy.vector_threshold)?;

	if policy.vector_threshold > 1.0 {
		return Err(invalid("vector_threshold must be 1.0 or less."));
	}

	ensure_non_negative("bm25_min_score", policy.bm25_min_score)?;
	ensure_non_negative("rrf_k", policy.rrf_k)?;

	for (label, value) in [
		("citation_multiplier", policy.citation_multiplier),
		("tag_multiplier", policy.tag_multiplier),
	] {
		ensure_non_negative(label, value)?;

		if value > MAX_BOOST_MULTIPLIER {
			return Err(invalid(&format!("{label} must be {MAX_BOOST_MULTIPLIER} or less.")));
		}
	}

	for (label, value) in [
		("vector_limit", policy.vector_limit),
		("bm25_limit", policy.bm25_limit),
		("citation_turns", policy.citation_turns),
		("max_per_doc", policy.max_per_doc),
		("limit", policy.limit),
	] {
		if value == 0 {
			return Err(invalid(&format!("{label} must be greater than zero.")));
		}
	}

	Ok(())
}

fn ensure_non_negative(label: &str, value: f32) -> Result<()> {
	if !value.is_finite() {
		return Err(invalid(&format!("{label} must be a finite number.")));
	}
	if value < 0.0 {
		return Err(invalid(&format!("{label} must be zero or greater.")));
	}

	Ok(())
}

fn invalid(message: &str) -> Error {
	Error::InvalidRequest { message: message.to_string() }
}

#[cfg(test)]
mod tests {
	use super::*;

	const SAMPLE_CONFIG: &str = r#"
[service]
http_bind = "127.0.0.1:8080"
log_level = "info"

[storage.postgres]
dsn = "postgres://localhost/lore"
pool_max_conns = 4

[storage.qdrant]
url = "http://127.0.0.1:6334"
collection = "lore_chunks"
vector_dim = 3

[providers.embedding]
provider_id = "local"
api_base = "http://127.0.0.1:9"
api_key = "secret"
path = "/v1/embeddings"
model = "stub"
dimensions = 3
timeout_ms = 1000
default_headers = {}

[security]
bind_localhost_only = true
"#;

	fn config() -> Config {
		toml::from_str(SAMPLE_CONFIG).expect("Failed to parse test config.")
	}

	#[test]
	fn persona_values_override_defaults() {
		let cfg = config();
		let persona = resolve_persona_config(
			&cfg,
			"tax",
			Some(PersonaRecord {
				vector_threshold: Some(0.5),
				bm25_min_score: None,
				topic_aliases: vec!["  Taxes ".to_string(), "".to_string(), "ＩＲＳ".to_string()],
			}),
		);

		assert_eq!(persona.vector_threshold, 0.5);
		assert_eq!(persona.bm25_min_score, 0.1);
		assert_eq!(
			persona.topic_aliases,
			BTreeSet::from(["irs".to_string(), "taxes".to_string()])
		);
	}

	#[test]
	fn out_of_range_persona_values_fall_back() {
		let cfg = config();
		let persona = resolve_persona_config(
			&cfg,
			"tax",
			Some(PersonaRecord {
				vector_threshold: Some(f32::NAN),
				bm25_min_score: Some(-1.0),
				topic_aliases: Vec::new(),
			}),
		);

		assert_eq!(persona.vector_threshold, 0.35);
		assert_eq!(persona.bm25_min_score, 0.1);
	}

	#[test]
	fn request_overrides_win() {
		let cfg = config();
		let persona = resolve_persona_config(&cfg, "tax", None);
		let options = SearchOptions {
			vector_threshold: Some(0.2),
			max_per_doc: Some(1),
			limit: Some(5),
			..SearchOptions::for_persona("tax")
		};
		let policy =
			resolve_search_policy(&cfg, &options, &persona).expect("Policy must resolve.");

		assert_eq!(policy.vector_threshold, 0.2);
		assert_eq!(policy.max_per_doc, 1);
		assert_eq!(policy.limit, 5);
		assert_eq!(policy.rrf_k, 60.0);
		assert_eq!(policy.citation_multiplier, 1.15);
		assert_eq!(policy.citation_turns, 2);
		assert_eq!(policy.tag_multiplier, 1.075);
		assert_eq!(policy.vector_limit, 20);
		assert_eq!(policy.bm25_limit, 20);
	}

	#[test]
	fn invalid_overrides_are_rejected() {
		let cfg = config();
		let persona = resolve_persona_config(&cfg, "tax", None);

		for options in [
			SearchOptions { vector_threshold: Some(1.5), ..SearchOptions::for_persona("tax") },
			SearchOptions { tag_multiplier: Some(f32::NAN), ..SearchOptions::for_persona("tax") },
			SearchOptions { citation_multiplier: Some(-1.0), ..SearchOptions::for_persona("tax") },
			SearchOptions { limit: Some(0), ..SearchOptions::for_persona("tax") },
			SearchOptions { max_per_doc: Some(0), ..SearchOptions::for_persona("tax") },
			SearchOptions { citation_turns: Some(0), ..SearchOptions::for_persona("tax") },
			SearchOptions { tag_multiplier: Some(3e38), ..SearchOptions::for_persona("tax") },
		] {
			let err = resolve_search_policy(&cfg, &options, &persona)
				.expect_err("Expected invalid override.");

			assert!(matches!(err, Error::InvalidRequest { .. }), "Unexpected error: {err}");
		}
	}
}
