use crate::error::{RecError, Result};
use crate::utils::squared_euclidean;
use crate::utils::validation::validate_embedding;
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub position: usize,
    pub distance: f32,
}

/// Exact nearest-neighbor index over squared L2 distance.
///
/// Vectors live in one contiguous buffer in insertion order. A position is
/// the insertion index and never changes: there is no removal or compaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatL2Index {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RecError::invalid("Index dimension must be greater than 0"));
        }
        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }

    /// One entry per matrix row, positions equal to row numbers.
    pub fn build(embeddings: &Array2<f32>) -> Result<Self> {
        let mut index = Self::new(embeddings.ncols())?;
        index.data.reserve(embeddings.len());
        for row in embeddings.rows() {
            index.add(&row.to_vec())?;
        }
        Ok(index)
    }

    pub fn from_vectors<V: AsRef<[f32]>>(dimension: usize, vectors: &[V]) -> Result<Self> {
        let mut index = Self::new(dimension)?;
        for vector in vectors {
            index.add(vector.as_ref())?;
        }
        Ok(index)
    }

    /// Appends a vector and returns its position.
    pub fn add(&mut self, vector: &[f32]) -> Result<usize> {
        self.check_dimension(vector)?;
        validate_embedding(vector)?;
        self.data.extend_from_slice(vector);
        Ok(self.len() - 1)
    }

    /// Up to `k` entries ordered by ascending distance; equal distances keep
    /// the lower position first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.check_dimension(query)?;
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<SearchHit> = self
            .data
            .par_chunks(self.dimension)
            .enumerate()
            .map(|(position, vector)| SearchHit {
                position,
                distance: squared_euclidean(query, vector),
            })
            .collect();

        let by_distance = |a: &SearchHit, b: &SearchHit| -> Ordering {
            a.distance
                .total_cmp(&b.distance)
                .then(a.position.cmp(&b.position))
        };
        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, by_distance);
            hits.truncate(k);
        }
        hits.sort_unstable_by(by_distance);
        Ok(hits)
    }

    pub fn reconstruct(&self, position: usize) -> Result<Vec<f32>> {
        self.vector(position).map(|v| v.to_vec())
    }

    pub fn vector(&self, position: usize) -> Result<&[f32]> {
        if position >= self.len() {
            return Err(RecError::IndexOutOfRange {
                position,
                count: self.len(),
            });
        }
        let start = position * self.dimension;
        Ok(&self.data[start..start + self.dimension])
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Structural checks for an index that arrived through deserialization.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(RecError::validation("Index dimension is 0"));
        }
        if self.data.len() % self.dimension != 0 {
            return Err(RecError::validation(format!(
                "Index buffer of {} floats is not a multiple of dimension {}",
                self.data.len(),
                self.dimension
            )));
        }
        if !crate::utils::all_finite(&self.data) {
            return Err(RecError::validation("Index contains NaN or Infinity"));
        }
        Ok(())
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(RecError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> FlatL2Index {
        FlatL2Index::build(&array![[0.0, 0.0], [1.0, 0.0], [0.0, 2.0], [3.0, 3.0]]).unwrap()
    }

    #[test]
    fn search_orders_by_ascending_distance() {
        let index = sample();
        let hits = index.search(&[0.1, 0.0], 3).unwrap();

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].position, 0);
        assert_eq!(hits[1].position, 1);
        assert_eq!(hits[2].position, 2);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!((hits[1].distance - 0.81).abs() < 1e-6);
    }

    #[test]
    fn self_query_finds_itself_first() {
        let index = sample();
        let query = index.reconstruct(3).unwrap();
        let hits = index.search(&query, 2).unwrap();
        assert_eq!(hits[0].position, 3);
        assert_eq!(hits[0].distance, 0.0);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn k_larger_than_index() {
        let hits = sample().search(&[0.0, 0.0], 50).unwrap();
        assert_eq!(hits.len(), 4);
        assert!(sample().search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn ties_prefer_lower_position() {
        let index = FlatL2Index::from_vectors(2, &[vec![1.0, 1.0], vec![0.0, 0.0], vec![1.0, 1.0]]).unwrap();
        let hits = index.search(&[1.0, 1.0], 2).unwrap();
        assert_eq!(hits[0].position, 0);
        assert_eq!(hits[1].position, 2);
    }

    #[test]
    fn reconstruct_returns_inserted_vector() {
        let index = sample();
        assert_eq!(index.reconstruct(2).unwrap(), vec![0.0, 2.0]);
        assert!(matches!(
            index.reconstruct(4),
            Err(RecError::IndexOutOfRange { position: 4, count: 4 })
        ));
    }

    #[test]
    fn dimension_is_enforced() {
        let mut index = FlatL2Index::new(3).unwrap();
        assert!(index.add(&[1.0, 2.0]).is_err());
        assert_eq!(index.add(&[1.0, 2.0, 3.0]).unwrap(), 0);
        assert!(matches!(
            index.search(&[1.0], 1),
            Err(RecError::DimensionMismatch { expected: 3, actual: 1 })
        ));
        assert!(FlatL2Index::new(0).is_err());
    }

    #[test]
    fn non_finite_vectors_are_rejected() {
        let mut index = FlatL2Index::new(2).unwrap();
        assert!(matches!(index.add(&[f32::NAN, 0.0]), Err(RecError::Validation(_))));
        assert!(index.is_empty());
        assert!(FlatL2Index::build(&array![[0.0, 1.0], [f32::INFINITY, 0.0]]).is_err());
    }

    #[test]
    fn validate_catches_ragged_buffer() {
        let mut index = sample();
        assert!(index.validate().is_ok());
        index.data.push(1.0);
        assert!(index.validate().is_err());
    }
}
