use serde::{Deserialize, Serialize};

/// A dense embedding vector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    pub fn values(&self) -> &[f32] {
        &self.data
    }

    /// False if any component is NaN or infinite; such embeddings are
    /// never indexed.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    /// Dot product; 0.0 when the dimensions differ.
    #[inline]
    pub fn dot(&self, other: &Vector) -> f32 {
        if self.dim() != other.dim() {
            return 0.0;
        }
        self.data.iter().zip(&other.data).map(|(a, b)| a * b).sum()
    }

    #[inline]
    pub fn norm(&self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Cosine similarity; 0.0 for mismatched dimensions or zero vectors.
    pub fn cosine_similarity(&self, other: &Vector) -> f32 {
        let denom = self.norm() * other.norm();
        if self.dim() != other.dim() || denom == 0.0 {
            return 0.0;
        }
        self.dot(other) / denom
    }

    /// Unit-length copy. A zero vector stays zero.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let norm = self.norm();
        if norm <= f32::EPSILON {
            return self.clone();
        }
        Self::new(self.data.iter().map(|x| x / norm).collect())
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}
