//! Deterministic text embeddings and vector similarity.
//!
//! There is no external embedding service. Any entity lacking an
//! embedding gets one derived from a descriptive text:
//!   1. a hash-seeded N(0, 0.1) vector (same text → same vector),
//!   2. plus a constant bias over a fixed coordinate band for each marker
//!      word found in the text,
//!   3. L2-normalised.
//!
//! The marker bands are what make a customer and a pattern that share
//! "enterprise" or "underutilization" land close to each other.

use crate::{
    error::{AgentError, AgentResult},
    rng::SeededRng,
};
use std::ops::Range;

struct MarkerBand {
    markers: &'static [&'static str],
    band:    Range<usize>,
}

const MARKER_BANDS: [MarkerBand; 4] = [
    MarkerBand { markers: &["enterprise"],            band: 0..64 },
    MarkerBand { markers: &["high risk", "critical"], band: 64..128 },
    MarkerBand { markers: &["underutilization"],      band: 128..192 },
    MarkerBand { markers: &["support", "billing"],    band: 192..256 },
];

const MARKER_BIAS: f32 = 0.35;
const NOISE_STD: f64 = 0.1;

/// Embed `text` into a unit vector of length `dim`.
pub fn embed_text(text: &str, dim: usize) -> Vec<f32> {
    let normalized = text.to_lowercase();
    let mut rng = SeededRng::from_text(&normalized);
    let mut vector: Vec<f32> = (0..dim).map(|_| rng.normal(0.0, NOISE_STD) as f32).collect();

    for band in &MARKER_BANDS {
        if band.markers.iter().any(|m| normalized.contains(m)) {
            let end = band.band.end.min(dim);
            for v in &mut vector[band.band.start.min(end)..end] {
                *v += MARKER_BIAS;
            }
        }
    }

    l2_normalize(&mut vector);
    vector
}

pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity in [-1, 1]. A zero vector is similar to nothing (0.0).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> AgentResult<f64> {
    if a.len() != b.len() {
        return Err(AgentError::DimensionMismatch { expected: a.len(), actual: b.len() });
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EMBEDDING_DIM;

    #[test]
    fn same_text_same_vector() {
        let a = embed_text("enterprise support escalation", EMBEDDING_DIM);
        let b = embed_text("enterprise support escalation", EMBEDDING_DIM);
        assert_eq!(a, b);
        assert_eq!(a.len(), EMBEDDING_DIM);
    }

    #[test]
    fn embeddings_are_unit_length() {
        let v = embed_text("smb discount offer", EMBEDDING_DIM);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn shared_markers_raise_similarity() {
        let customer = embed_text("ana@acme.io enterprise high risk underutilization", EMBEDDING_DIM);
        let matching = embed_text("enterprise feature adoption underutilization", EMBEDDING_DIM);
        let unrelated = embed_text("smb discount offer", EMBEDDING_DIM);
        let close = cosine_similarity(&customer, &matching).unwrap();
        let far = cosine_similarity(&customer, &unrelated).unwrap();
        assert!(close > far + 0.3, "close={close} far={far}");
    }

    #[test]
    fn small_dimensions_clip_marker_bands() {
        let v = embed_text("enterprise billing", 100);
        assert_eq!(v.len(), 100);
    }

    #[test]
    fn cosine_edge_cases() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!(matches!(
            cosine_similarity(&[1.0], &[1.0, 0.0]),
            Err(AgentError::DimensionMismatch { expected: 1, actual: 2 })
        ));
    }
}
