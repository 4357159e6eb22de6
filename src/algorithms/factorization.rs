//! Truncated SVD of the user × item matrix.
//!
//! Uses the randomized range finder (Gaussian sketch, a few power iterations,
//! then an exact SVD of the small projected matrix). The sketch comes from a
//! seeded generator and every step is deterministic, so identical input and
//! seed give bit-identical embeddings.

use crate::algorithms::initializer::gaussian_matrix;
use crate::error::{RecError, Result};
use nalgebra::DMatrix;
use ndarray::Array2;
use std::cmp::Ordering;
use tracing::{debug, info};

pub const DEFAULT_SEED: u64 = 42;

/// Relative to the leading singular value.
const NULL_COMPONENT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct LatentFactors {
    /// One row per user: U·Σ.
    pub user_embeddings: Array2<f32>,
    /// One row per item, in matrix column order: the right singular vectors.
    pub item_embeddings: Array2<f32>,
    pub singular_values: Vec<f32>,
}

impl LatentFactors {
    pub fn dimension(&self) -> usize {
        self.item_embeddings.ncols()
    }
}

#[derive(Debug, Clone)]
pub struct LatentFactorizer {
    seed: u64,
    oversamples: usize,
    power_iterations: usize,
}

impl Default for LatentFactorizer {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl LatentFactorizer {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            oversamples: 10,
            power_iterations: 5,
        }
    }

    pub fn with_oversamples(mut self, oversamples: usize) -> Self {
        self.oversamples = oversamples;
        self
    }

    pub fn with_power_iterations(mut self, power_iterations: usize) -> Self {
        self.power_iterations = power_iterations;
        self
    }

    pub fn fit(&self, matrix: &Array2<f32>, dim: usize) -> Result<LatentFactors> {
        let (num_users, num_items) = matrix.dim();
        if dim == 0 || dim > num_users.min(num_items) {
            return Err(RecError::invalid(format!(
                "embedding dimension {} must be in 1..={} for a {}x{} matrix",
                dim,
                num_users.min(num_items),
                num_users,
                num_items
            )));
        }
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(RecError::Factorization("matrix contains NaN or Infinity".into()));
        }

        let a = DMatrix::<f64>::from_fn(num_users, num_items, |i, j| matrix[[i, j]] as f64);

        // Orthonormal basis approximating the range of A
        let sketch_width = (dim + self.oversamples).min(num_items);
        let omega = gaussian_matrix(num_items, sketch_width, self.seed);
        let mut q = (&a * omega).qr().q();
        for _ in 0..self.power_iterations {
            q = a.tr_mul(&q).qr().q();
            q = (&a * &q).qr().q();
        }

        let projected = q.tr_mul(&a);
        let svd = projected.svd(true, true);
        let u_small = svd
            .u
            .ok_or_else(|| RecError::Factorization("SVD failed to compute U".into()))?;
        let v_t = svd
            .v_t
            .ok_or_else(|| RecError::Factorization("SVD failed to compute V^T".into()))?;
        let sigma = svd.singular_values;
        let u = q * u_small;

        let mut order: Vec<usize> = (0..sigma.len()).collect();
        order.sort_by(|&x, &y| sigma[y].partial_cmp(&sigma[x]).unwrap_or(Ordering::Equal));
        if order.len() < dim {
            return Err(RecError::Factorization(format!(
                "only {} components available, {} requested",
                order.len(),
                dim
            )));
        }

        // Singular vectors of null components are arbitrary; they stay zero
        let null_tolerance = order.first().map_or(0.0, |&k| sigma[k]) * NULL_COMPONENT_TOLERANCE;

        let mut user_embeddings = Array2::<f32>::zeros((num_users, dim));
        let mut item_embeddings = Array2::<f32>::zeros((num_items, dim));
        let mut singular_values = Vec::with_capacity(dim);

        for (component, &k) in order.iter().take(dim).enumerate() {
            if sigma[k] <= null_tolerance {
                singular_values.push(0.0);
                continue;
            }

            // Largest-magnitude item loading is made positive
            let pivot = (0..num_items)
                .max_by(|&x, &y| {
                    v_t[(k, x)]
                        .abs()
                        .partial_cmp(&v_t[(k, y)].abs())
                        .unwrap_or(Ordering::Equal)
                        .then(y.cmp(&x))
                })
                .unwrap_or(0);
            let sign = if v_t[(k, pivot)] < 0.0 { -1.0 } else { 1.0 };

            for item in 0..num_items {
                item_embeddings[[item, component]] = (sign * v_t[(k, item)]) as f32;
            }
            for user in 0..num_users {
                user_embeddings[[user, component]] = (sign * u[(user, k)] * sigma[k]) as f32;
            }
            singular_values.push(sigma[k] as f32);
        }

        debug!("Leading singular values: {:?}", &singular_values[..singular_values.len().min(5)]);
        info!(
            "Factorized {}x{} interaction matrix into {} latent dimensions",
            num_users, num_items, dim
        );

        Ok(LatentFactors {
            user_embeddings,
            item_embeddings,
            singular_values,
        })
    }
}
