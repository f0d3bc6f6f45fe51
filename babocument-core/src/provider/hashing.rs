//! Local feature-hashing embedding provider.
//!
//! Produces fixed-width vectors without a model download or network access.
//! Each lower-cased alphanumeric token contributes itself plus its padded
//! character trigrams, so "bioprinting" and "printing" share most of their
//! features. Features are hashed with SHA-256, which keeps vectors identical
//! across builds and platforms.

use super::types::*;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Deterministic bag-of-features embedder.
#[derive(Debug, Clone)]
pub struct HashingProvider {
    dimension: usize,
}

impl HashingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Computes the embedding synchronously.
    ///
    /// The result is L2-normalized unless the text has no tokens, in which
    /// case it is the zero vector.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }

        // BTreeMap keeps summation order stable
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        for token in tokenize(text) {
            for feature in features(&token) {
                *counts.entry(feature).or_insert(0) += 1;
            }
        }

        for (feature, count) in &counts {
            let (index, sign) = bucket(feature, self.dimension);
            vector[index] += sign * (1.0 + (*count as f32).ln());
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Provider for HashingProvider {
    fn name(&self) -> &str {
        "hashing"
    }

    async fn embed(&self, text: &str, _model: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
}

fn features(token: &str) -> Vec<String> {
    let padded: Vec<char> = std::iter::once('<')
        .chain(token.chars())
        .chain(std::iter::once('>'))
        .collect();

    let mut features = Vec::with_capacity(padded.len());
    features.push(format!("w:{}", token));
    for window in padded.windows(3) {
        features.push(format!("t:{}", window.iter().collect::<String>()));
    }
    features
}

/// Maps a feature to a vector slot and a sign.
fn bucket(feature: &str, dimension: usize) -> (usize, f32) {
    let digest = Sha256::digest(feature.as_bytes());
    let mut index_bytes = [0u8; 8];
    index_bytes.copy_from_slice(&digest[..8]);
    let index = (u64::from_le_bytes(index_bytes) % dimension as u64) as usize;
    let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
    (index, sign)
}
