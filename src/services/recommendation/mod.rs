use crate::config::RecommendationConfig;
use crate::error::Result;
use crate::models::*;
use crate::services::snapshot::ModelSnapshot;
use crate::utils::round_to;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Item-to-item recommender anchored on the user's latest liked item.
///
/// The served snapshot sits behind an `Arc` that readers clone once per
/// request, so `install` swaps models atomically while requests in flight
/// keep the snapshot they started with.
pub struct RecommendationService {
    snapshot: RwLock<Arc<ModelSnapshot>>,
    like_threshold: f32,
}

impl RecommendationService {
    pub fn new(snapshot: Arc<ModelSnapshot>, config: &RecommendationConfig) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
            like_threshold: config.like_threshold,
        }
    }

    pub fn snapshot(&self) -> Arc<ModelSnapshot> {
        self.snapshot.read().clone()
    }

    pub fn install(&self, snapshot: Arc<ModelSnapshot>) {
        let id = snapshot.metadata().id.clone();
        *self.snapshot.write() = snapshot;
        info!("Installed model snapshot {}", id);
    }

    pub fn index_size(&self) -> usize {
        self.snapshot.read().len()
    }

    /// The anchor is the highest liked item id: the interaction log carries
    /// no timestamps, so id order stands in for recency.
    pub fn recommend(&self, user_id: u32, top_k: usize) -> Result<RecommendOutcome> {
        let snapshot = self.snapshot();

        let Some(liked) = snapshot.interactions().liked_items(user_id, self.like_threshold) else {
            debug!("User {} is outside the training population", user_id);
            return Ok(RecommendOutcome::NotFound);
        };
        let Some(&anchor) = liked.iter().max() else {
            debug!("User {} has no ratings above {}", user_id, self.like_threshold);
            return Ok(RecommendOutcome::NoHistory);
        };

        let anchor_position = anchor as usize;
        let query = snapshot.index().reconstruct(anchor_position)?;
        let hits = snapshot.index().search(&query, top_k.saturating_add(1))?;

        let recommendations = hits
            .into_iter()
            .filter(|hit| hit.position != anchor_position)
            .take(top_k)
            .map(|hit| {
                Ok(RecommendationItem {
                    item_id: hit.position as u32,
                    title: snapshot.title(hit.position)?.to_string(),
                    // Display heuristic, not a probability; negative for far items
                    similarity_score: round_to(1.0 - hit.distance as f64, 4) as f32,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RecommendOutcome::Recommended(RecommendationResponse {
            user_id,
            based_on_item: snapshot.title(anchor_position)?.to_string(),
            recommendations,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::FlatL2Index;
    use crate::config::Config;
    use ndarray::Array2;

    fn service(records: &[InteractionRecord]) -> RecommendationService {
        let embeddings = Array2::from_shape_fn((8, 2), |(i, j)| (i * (j + 1)) as f32 * 0.1);
        let index = FlatL2Index::build(&embeddings).unwrap();
        let catalog = (0..8).map(|i| CatalogItem::new(i, format!("Product {}", i))).collect();
        let matrix = InteractionMatrix::from_records(records, 10, 8).unwrap();
        let snapshot = ModelSnapshot::new(index, catalog, matrix, 42).unwrap();
        RecommendationService::new(Arc::new(snapshot), &Config::default().recommendation)
    }

    #[test]
    fn unknown_user_is_not_found() {
        let svc = service(&[InteractionRecord::new(1, 0, 5.0)]);
        assert_eq!(svc.recommend(7, 3).unwrap(), RecommendOutcome::NotFound);
    }

    #[test]
    fn no_likes_is_no_history() {
        let svc = service(&[InteractionRecord::new(7, 2, 3.0), InteractionRecord::new(7, 5, 1.0)]);
        assert_eq!(svc.recommend(7, 3).unwrap(), RecommendOutcome::NoHistory);
    }

    #[test]
    fn anchors_on_highest_liked_item_and_skips_it() {
        let svc = service(&[
            InteractionRecord::new(7, 2, 5.0),
            InteractionRecord::new(7, 5, 2.0),
            InteractionRecord::new(7, 1, 4.0),
        ]);
        let RecommendOutcome::Recommended(response) = svc.recommend(7, 3).unwrap() else {
            panic!("expected recommendations");
        };

        assert_eq!(response.user_id, 7);
        assert_eq!(response.based_on_item, "Product 2");
        assert_eq!(response.recommendations.len(), 3);
        assert!(response.recommendations.iter().all(|r| r.item_id != 2));
        // Neighbors of item 2 on the line are 1 and 3 at squared distance 0.05
        assert_eq!(response.recommendations[0].item_id, 1);
        assert_eq!(response.recommendations[1].item_id, 3);
        assert_eq!(response.recommendations[0].similarity_score, 0.95);
        assert_eq!(response.recommendations[0].title, "Product 1");
    }

    #[test]
    fn unbounded_top_k_returns_every_other_item() {
        let svc = service(&[InteractionRecord::new(0, 4, 5.0)]);
        let RecommendOutcome::Recommended(response) = svc.recommend(0, usize::MAX).unwrap() else {
            panic!("expected recommendations");
        };
        assert_eq!(response.recommendations.len(), 7);
        assert!(response.recommendations.iter().all(|r| r.item_id != 4));
    }

    #[test]
    fn zero_top_k_returns_empty_list() {
        let svc = service(&[InteractionRecord::new(0, 4, 5.0)]);
        let RecommendOutcome::Recommended(response) = svc.recommend(0, 0).unwrap() else {
            panic!("expected recommendations");
        };
        assert!(response.recommendations.is_empty());
        assert_eq!(response.based_on_item, "Product 4");
    }

    #[test]
    fn install_swaps_snapshot() {
        let svc = service(&[InteractionRecord::new(0, 4, 5.0)]);
        let before = svc.snapshot();

        let index = FlatL2Index::build(&Array2::zeros((2, 2))).unwrap();
        let catalog = vec![CatalogItem::new(0, "a"), CatalogItem::new(1, "b")];
        let matrix = InteractionMatrix::from_records(&[InteractionRecord::new(0, 1, 5.0)], 1, 2).unwrap();
        svc.install(Arc::new(ModelSnapshot::new(index, catalog, matrix, 1).unwrap()));

        assert_eq!(before.len(), 8);
        assert_eq!(svc.index_size(), 2);
    }
}
