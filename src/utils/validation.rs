use crate::error::{RecError, Result};
use crate::models::*;

pub fn validate_session(session: &Session) -> Result<()> {
    if session.session_id.is_empty() {
        return Err(RecError::validation("Session ID cannot be empty"));
    }

    for visit in &session.visits {
        if visit.label.is_empty() {
            return Err(RecError::validation(format!(
                "Session {} has an empty page label at position {}",
                session.session_id, visit.position
            )));
        }
    }

    // Positions must be strictly increasing
    for pair in session.visits.windows(2) {
        if pair[1].position <= pair[0].position {
            return Err(RecError::validation(format!(
                "Session {} positions not strictly increasing ({} then {})",
                session.session_id, pair[0].position, pair[1].position
            )));
        }
    }

    Ok(())
}

pub fn validate_interaction(record: &InteractionRecord, num_users: usize, num_items: usize) -> Result<()> {
    if record.user_id as usize >= num_users {
        return Err(RecError::validation(format!(
            "User ID {} outside declared range [0, {})",
            record.user_id, num_users
        )));
    }

    if record.item_id as usize >= num_items {
        return Err(RecError::validation(format!(
            "Item ID {} outside declared range [0, {})",
            record.item_id, num_items
        )));
    }

    if !record.rating.is_finite() {
        return Err(RecError::validation("Rating contains invalid values (NaN or Infinity)"));
    }

    Ok(())
}

/// The catalog must list every item exactly once, ordered by id from 0.
pub fn validate_catalog(catalog: &[CatalogItem]) -> Result<()> {
    for (position, item) in catalog.iter().enumerate() {
        if item.item_id as usize != position {
            return Err(RecError::validation(format!(
                "Catalog entry at position {} has item ID {}",
                position, item.item_id
            )));
        }
    }
    Ok(())
}

pub fn validate_embedding(embedding: &[f32]) -> Result<()> {
    if embedding.is_empty() {
        return Err(RecError::validation("Embedding cannot be empty"));
    }

    if !crate::utils::all_finite(embedding) {
        return Err(RecError::validation("Embedding contains invalid values (NaN or Infinity)"));
    }

    Ok(())
}

pub fn validate_top_k(top_k: usize) -> Result<()> {
    if top_k > 1000 {
        return Err(RecError::invalid("Number of recommendations too large (max 1000)"));
    }
    Ok(())
}
