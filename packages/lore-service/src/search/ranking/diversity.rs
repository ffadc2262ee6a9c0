use std::collections::HashMap;

use uuid::Uuid;

use crate::search::{ScoredCandidate, ranking::CandidateSet};

/// Ranks candidates and keeps at most `max_per_doc` per document.
///
/// One pass over the ranked list: once a document reaches the cap its later candidates are
/// dropped, never swapped for earlier ones. Candidates without a finite score are dropped.
pub fn deduplicate_by_doc(candidates: CandidateSet, max_per_doc: u32) -> Vec<ScoredCandidate> {
	let mut per_doc: HashMap<Uuid, u32> = HashMap::new();
	let mut out = Vec::new();

	for candidate in candidates.into_ranked() {
		if !candidate.score.is_finite() {
			tracing::warn!(
				chunk_id = %candidate.chunk_id,
				"Dropping candidate with non-finite score."
			);

			continue;
		}

		let count = per_doc.entry(candidate.doc_id).or_insert(0);

		if *count >= max_per_doc {
			continue;
		}

		*count += 1;

		out.push(candidate);
	}

	out
}
