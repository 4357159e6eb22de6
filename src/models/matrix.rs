use crate::error::{RecError, Result};
use crate::models::InteractionRecord;
use crate::utils::validation::validate_interaction;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// User × item rating matrix over dense, pre-declared id ranges.
///
/// Every declared item is a column even when nobody rated it, so column `j`
/// always means item `j`. Users without a single record still get a zero row
/// for factorization but are not part of the training population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionMatrix {
    ratings: Array2<f32>,
    users: BTreeSet<u32>,
}

impl InteractionMatrix {
    /// Later records for the same (user, item) cell overwrite earlier ones.
    pub fn from_records(records: &[InteractionRecord], num_users: usize, num_items: usize) -> Result<Self> {
        if num_items == 0 {
            return Err(RecError::invalid("Item universe cannot be empty"));
        }

        let mut ratings = Array2::<f32>::zeros((num_users, num_items));
        let mut users = BTreeSet::new();

        for record in records {
            validate_interaction(record, num_users, num_items)?;
            ratings[[record.user_id as usize, record.item_id as usize]] = record.rating;
            users.insert(record.user_id);
        }

        Ok(Self { ratings, users })
    }

    pub fn ratings(&self) -> &Array2<f32> {
        &self.ratings
    }

    pub fn num_users(&self) -> usize {
        self.ratings.nrows()
    }

    pub fn num_items(&self) -> usize {
        self.ratings.ncols()
    }

    pub fn active_users(&self) -> usize {
        self.users.len()
    }

    pub fn contains_user(&self, user_id: u32) -> bool {
        self.users.contains(&user_id)
    }

    pub fn user_row(&self, user_id: u32) -> Option<ArrayView1<'_, f32>> {
        if !self.contains_user(user_id) {
            return None;
        }
        Some(self.ratings.row(user_id as usize))
    }

    /// Items the user rated strictly above `threshold`, ascending by id.
    /// `None` when the user is outside the training population.
    pub fn liked_items(&self, user_id: u32, threshold: f32) -> Option<Vec<u32>> {
        let row = self.user_row(user_id)?;
        Some(
            row.iter()
                .enumerate()
                .filter(|&(_, &rating)| rating > threshold)
                .map(|(item, _)| item as u32)
                .collect(),
        )
    }

    pub fn nonzero_count(&self) -> usize {
        self.ratings.iter().filter(|&&r| r != 0.0).count()
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_items() == 0 {
            return Err(RecError::validation("Interaction matrix has no item columns"));
        }
        if let Some(&max_user) = self.users.iter().next_back() {
            if max_user as usize >= self.num_users() {
                return Err(RecError::validation(format!(
                    "User {} listed but matrix has only {} rows",
                    max_user,
                    self.num_users()
                )));
            }
        }
        if self.ratings.iter().any(|r| !r.is_finite()) {
            return Err(RecError::validation("Interaction matrix contains NaN or Infinity"));
        }
        Ok(())
    }
}
