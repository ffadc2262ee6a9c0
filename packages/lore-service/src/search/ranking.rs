pub mod boost;
pub mod diversity;
pub mod fusion;

use std::{
	cmp::Ordering,
	collections::{HashMap, HashSet},
};

use uuid::Uuid;

use crate::search::ScoredCandidate;

/// Fused candidates keyed by chunk id, kept in fusion insertion order.
#[derive(Clone, Debug, Default)]
pub struct CandidateSet {
	candidates: Vec<ScoredCandidate>,
	by_chunk: HashMap<Uuid, usize>,
}
impl CandidateSet {
	pub fn len(&self) -> usize {
		self.candidates.len()
	}

	pub fn is_empty(&self) -> bool {
		self.candidates.is_empty()
	}

	pub fn get(&self, chunk_id: &Uuid) -> Option<&ScoredCandidate> {
		self.by_chunk.get(chunk_id).map(|idx| &self.candidates[*idx])
	}

	pub fn iter(&self) -> impl Iterator<Item = &ScoredCandidate> {
		self.candidates.iter()
	}

	/// Distinct owning documents, in first-seen order.
	pub fn doc_ids(&self) -> Vec<Uuid> {
		let mut seen = HashSet::new();

		self.candidates
			.iter()
			.filter(|candidate| seen.insert(candidate.doc_id))
			.map(|candidate| candidate.doc_id)
			.collect()
	}

	/// Candidates by descending score, equal scores in fusion order.
	pub fn into_ranked(self) -> Vec<ScoredCandidate> {
		let mut candidates = self.candidates;

		candidates.sort_by(cmp_candidates);

		candidates
	}

	pub(crate) fn get_mut(&mut self, chunk_id: &Uuid) -> Option<&mut ScoredCandidate> {
		self.by_chunk.get(chunk_id).map(|idx| &mut self.candidates[*idx])
	}

	pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ScoredCandidate> {
		self.candidates.iter_mut()
	}

	pub(crate) fn push(&mut self, candidate: ScoredCandidate) {
		self.by_chunk.insert(candidate.chunk_id, self.candidates.len());
		self.candidates.push(candidate);
	}
}

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

fn cmp_candidates(left: &ScoredCandidate, right: &ScoredCandidate) -> Ordering {
	cmp_f32_desc(left.score, right.score).then_with(|| left.fusion_order.cmp(&right.fusion_order))
}

#[cfg(test)]
pub(crate) mod test_support {
	use uuid::Uuid;

	use crate::search::{RetrievalResult, RetrievalSourceKind, RetrievedChunk};

	pub fn chunk(chunk_id: Uuid, doc_id: Uuid, raw_score: f32) -> RetrievedChunk {
		RetrievedChunk {
			chunk_id,
			doc_id,
			section_path: String::new(),
			text: format!("chunk {chunk_id}"),
			raw_score,
			doc_title: None,
			doc_type: None,
			source_url: None,
		}
	}

	pub fn result(source: RetrievalSourceKind, chunks: Vec<RetrievedChunk>) -> RetrievalResult {
		RetrievalResult { source, chunks }
	}
}
