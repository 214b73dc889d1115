use crate::{
    document::Document,
    vector_store::{StoreRecord, StoredVector},
};

/// Anything that may carry an embedding and can therefore be ranked.
pub trait HasEmbedding {
    fn embedding(&self) -> Option<&[f32]>;
}

impl HasEmbedding for StoredVector {
    fn embedding(&self) -> Option<&[f32]> {
        self.data.as_ref().map(|d| d.float32.as_slice())
    }
}

impl HasEmbedding for StoreRecord {
    fn embedding(&self) -> Option<&[f32]> {
        Some(&self.data.float32)
    }
}

impl HasEmbedding for Document {
    fn embedding(&self) -> Option<&[f32]> {
        Some(Document::embedding(self))
    }
}

/// Cosine of the angle between `a` and `b`, in `[-1, 1]`.
///
/// Zero-magnitude vectors, and vectors of different lengths, have a
/// similarity of `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    // rounding can push a self-comparison just past 1
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Cosine similarity remapped linearly from `[-1, 1]` to `[0, 100]`.
pub fn cosine_similarity_percentage(a: &[f32], b: &[f32]) -> f32 {
    (cosine_similarity(a, b) + 1.0) / 2.0 * 100.0
}

/// Scores every candidate whose embedding matches the length of `query` and
/// returns the `top_k` best, highest first. Equal scores keep their input order.
pub fn rank_by_similarity<'a, C: HasEmbedding>(
    query: &[f32],
    candidates: &'a [C],
    top_k: usize,
) -> Vec<(&'a C, f32)> {
    let mut results = candidates
        .iter()
        .filter_map(|c| {
            c.embedding()
                .filter(|e| e.len() == query.len())
                .map(|e| (c, cosine_similarity(query, e)))
        })
        .collect::<Vec<_>>();
    results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(top_k);
    results
}
