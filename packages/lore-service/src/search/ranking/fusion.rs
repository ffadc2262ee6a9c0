use std::collections::HashSet;

use crate::search::{
	RetrievalResult, RetrievalSourceKind, RetrievedChunk, ScoredCandidate, ranking::CandidateSet,
};

/// Reciprocal Rank Fusion contribution of a 1-based `rank`.
pub fn rrf_contribution(k: f32, rank: u32) -> f32 {
	1.0 / (k + rank as f32)
}

/// Merges the vector and lexical lists into one candidate set scored by RRF.
///
/// Vector hits are inserted first, then lexical hits not already present. Only list positions
/// contribute to the score; raw source scores are carried for provenance. A chunk repeated
/// within one list counts once, at its best rank, and ranks are counted over the list with those
/// repeats removed.
pub fn fuse(vector: RetrievalResult, lexical: RetrievalResult, k: f32) -> CandidateSet {
	let mut set = CandidateSet::default();

	for result in [vector, lexical] {
		let source = result.source;
		let mut seen = HashSet::new();

		for chunk in result.chunks {
			if !seen.insert(chunk.chunk_id) {
				continue;
			}

			let rank = seen.len() as u32;

			add_ranked(&mut set, source, rank, rrf_contribution(k, rank), chunk);
		}
	}

	set
}

fn add_ranked(
	set: &mut CandidateSet,
	source: RetrievalSourceKind,
	rank: u32,
	contribution: f32,
	chunk: RetrievedChunk,
) {
	if let Some(existing) = set.get_mut(&chunk.chunk_id) {
		existing.fusion_score += contribution;
		existing.score = existing.fusion_score;

		record_source(existing, source, rank, chunk.raw_score);

		return;
	}

	let fusion_order = set.len() as u32;
	let mut candidate = ScoredCandidate {
		chunk_id: chunk.chunk_id,
		doc_id: chunk.doc_id,
		section_path: chunk.section_path,
		text: chunk.text,
		score: contribution,
		fusion_score: contribution,
		vector_score: None,
		bm25_score: None,
		vector_rank: None,
		bm25_rank: None,
		citation_boost_applied: false,
		tag_boost_applied: false,
		fusion_order,
		doc_title: chunk.doc_title,
		doc_type: chunk.doc_type,
		source_url: chunk.source_url,
	};

	record_source(&mut candidate, source, rank, chunk.raw_score);
	set.push(candidate);
}

fn record_source(
	candidate: &mut ScoredCandidate,
	source: RetrievalSourceKind,
	rank: u32,
	raw_score: f32,
) {
	match source {
		RetrievalSourceKind::Vector => {
			candidate.vector_rank = Some(rank);
			candidate.vector_score = Some(raw_score);
		},
		RetrievalSourceKind::Lexical => {
			candidate.bm25_rank = Some(rank);
			candidate.bm25_score = Some(raw_score);
		},
	}
}

#[cfg(test)]
mod tests {
	use uuid::Uuid;

	use super::*;
	use crate::search::ranking::test_support::{chunk, result};

	const EPS: f32 = 1e-6;

	#[test]
	fn overlapping_lists_sum_contributions() {
		let doc = Uuid::new_v4();
		let (c1, c2, c3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
		let vector =
			result(RetrievalSourceKind::Vector, vec![chunk(c1, doc, 0.9), chunk(c2, doc, 0.8)]);
		let lexical =
			result(RetrievalSourceKind::Lexical, vec![chunk(c2, doc, 4.0), chunk(c3, doc, 2.0)]);
		let set = fuse(vector, lexical, 60.0);

		assert_eq!(set.len(), 3);

		let score = |id: Uuid| set.get(&id).expect("Missing candidate.").score;

		assert!((score(c1) - 1.0 / 61.0).abs() < EPS);
		assert!((score(c2) - (1.0 / 62.0 + 1.0 / 61.0)).abs() < EPS);
		assert!((score(c3) - 1.0 / 62.0).abs() < EPS);

		let both = set.get(&c2).expect("Missing candidate.");

		assert_eq!(both.vector_rank, Some(2));
		assert_eq!(both.bm25_rank, Some(1));
		assert_eq!(both.vector_score, Some(0.8));
		assert_eq!(both.bm25_score, Some(4.0));

		let order: Vec<Uuid> =
			set.into_ranked().into_iter().map(|candidate| candidate.chunk_id).collect();

		assert_eq!(order, vec![c2, c1, c3]);
	}

	#[test]
	fn disjoint_lists_keep_single_source_scores() {
		let doc = Uuid::new_v4();
		let vector_ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
		let lexical_ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
		let vector = result(
			RetrievalSourceKind::Vector,
			vector_ids.iter().map(|id| chunk(*id, doc, 0.5)).collect(),
		);
		let lexical = result(
			RetrievalSourceKind::Lexical,
			lexical_ids.iter().map(|id| chunk(*id, doc, 1.0)).collect(),
		);
		let set = fuse(vector, lexical, 60.0);

		assert_eq!(set.len(), 7);

		for (idx, id) in vector_ids.iter().chain(lexical_ids.iter()).enumerate() {
			let candidate = set.get(id).expect("Missing candidate.");
			let rank = if idx < 3 { idx + 1 } else { idx - 3 + 1 };

			assert!((candidate.score - 1.0 / (60.0 + rank as f32)).abs() < EPS);
			assert_eq!(candidate.fusion_order, idx as u32);
		}
	}

	#[test]
	fn repeated_chunk_in_one_list_keeps_best_rank() {
		let doc = Uuid::new_v4();
		let (c1, c2) = (Uuid::new_v4(), Uuid::new_v4());
		let vector = result(
			RetrievalSourceKind::Vector,
			vec![chunk(c1, doc, 0.9), chunk(c2, doc, 0.8), chunk(c1, doc, 0.7)],
		);
		let set = fuse(vector, result(RetrievalSourceKind::Lexical, Vec::new()), 60.0);
		let first = set.get(&c1).expect("Missing candidate.");

		assert_eq!(set.len(), 2);
		assert_eq!(first.vector_rank, Some(1));
		assert!((first.score - 1.0 / 61.0).abs() < EPS);
	}

	#[test]
	fn repeats_do_not_consume_ranks() {
		let doc = Uuid::new_v4();
		let (c1, c2, c3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
		let hits = vec![
			chunk(c1, doc, 5.0),
			chunk(c1, doc, 4.0),
			chunk(c2, doc, 3.0),
			chunk(c3, doc, 2.0),
		];
		let lexical = result(RetrievalSourceKind::Lexical, hits);
		let set = fuse(result(RetrievalSourceKind::Vector, Vec::new()), lexical, 60.0);
		let second = set.get(&c2).expect("Missing candidate.");
		let third = set.get(&c3).expect("Missing candidate.");

		assert_eq!(second.bm25_rank, Some(2));
		assert!((second.score - 1.0 / 62.0).abs() < EPS);
		assert_eq!(third.bm25_rank, Some(3));
	}

	#[test]
	fn empty_lists_fuse_to_empty_set() {
		let set = fuse(
			result(RetrievalSourceKind::Vector, Vec::new()),
			result(RetrievalSourceKind::Lexical, Vec::new()),
			60.0,
		);

		assert!(set.is_empty());
	}
}
