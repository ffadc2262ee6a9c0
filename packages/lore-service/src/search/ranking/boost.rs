use std::collections::{BTreeSet, HashMap, HashSet};

use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::search::ranking::CandidateSet;

/// Canonical form for tag, alias and query matching: NFKC, lowercased, trimmed.
pub fn normalize_term(value: &str) -> String {
	value.nfkc().collect::<String>().to_lowercase().trim().to_string()
}

/// Multiplies the score of every candidate from a recently cited document.
pub fn apply_citation_boost(
	mut candidates: CandidateSet,
	cited_docs: &HashSet<Uuid>,
	multiplier: f32,
) -> CandidateSet {
	if cited_docs.is_empty() {
		return candidates;
	}

	for candidate in candidates.iter_mut() {
		if cited_docs.contains(&candidate.doc_id) {
			candidate.score *= multiplier;
			candidate.citation_boost_applied = true;
		}
	}

	candidates
}

/// Documents with at least one tag found in the query, or overlapping a persona topic alias in
/// either direction.
///
/// `topic_aliases` must already be normalized with [`normalize_term`].
pub fn tag_boost_docs(
	doc_tags: &HashMap<Uuid, Vec<String>>,
	query_text: &str,
	topic_aliases: &BTreeSet<String>,
) -> HashSet<Uuid> {
	let query = normalize_term(query_text);
	let mut out = HashSet::new();

	for (doc_id, tags) in doc_tags {
		let qualifies = tags.iter().map(|tag| normalize_term(tag)).any(|tag| {
			!tag.is_empty()
				&& (query.contains(tag.as_str())
					|| topic_aliases.iter().any(|alias| {
						alias.contains(tag.as_str()) || tag.contains(alias.as_str())
					}))
		});

		if qualifies {
			out.insert(*doc_id);
		}
	}

	out
}

pub fn apply_tag_boost(
	mut candidates: CandidateSet,
	boosted_docs: &HashSet<Uuid>,
	multiplier: f32,
) -> CandidateSet {
	if boosted_docs.is_empty() {
		return candidates;
	}

	for candidate in candidates.iter_mut() {
		if boosted_docs.contains(&candidate.doc_id) {
			candidate.score *= multiplier;
			candidate.tag_boost_applied = true;
		}
	}

	candidates
}
