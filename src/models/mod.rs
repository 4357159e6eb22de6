pub mod matrix;

pub use matrix::InteractionMatrix;

use serde::{Deserialize, Serialize};

/// One page (category) view inside a browsing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageVisit {
    pub label: String,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub visits: Vec<PageVisit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub user_id: u32,
    pub item_id: u32,
    pub rating: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub item_id: u32,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub user_id: u32,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub user_id: u32,
    pub based_on_item: String,
    pub recommendations: Vec<RecommendationItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub item_id: u32,
    pub title: String,
    pub similarity_score: f32,
}

/// Result of a recommendation request. Only `Recommended` carries items; the
/// other two are expected outcomes the caller must handle, not failures.
#[derive(Debug, Clone, PartialEq)]
pub enum RecommendOutcome {
    Recommended(RecommendationResponse),
    /// The user has no rows in the training population.
    NotFound,
    /// The user exists but never rated anything above the like threshold.
    NoHistory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePrediction {
    pub state: String,
    pub probability: f64,
}

impl Session {
    pub fn new(session_id: impl Into<String>, labels: &[&str]) -> Self {
        Self {
            session_id: session_id.into(),
            visits: labels
                .iter()
                .enumerate()
                .map(|(i, label)| PageVisit {
                    label: label.to_string(),
                    position: i as u32 + 1,
                })
                .collect(),
        }
    }

    pub fn labels(&self) -> Vec<String> {
        self.visits.iter().map(|v| v.label.clone()).collect()
    }

    pub fn has_transitions(&self) -> bool {
        self.visits.len() >= 2
    }
}

impl InteractionRecord {
    pub fn new(user_id: u32, item_id: u32, rating: f32) -> Self {
        Self {
            user_id,
            item_id,
            rating,
        }
    }
}

impl CatalogItem {
    pub fn new(item_id: u32, title: impl Into<String>) -> Self {
        Self {
            item_id,
            title: title.into(),
        }
    }
}
