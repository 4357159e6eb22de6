pub mod routes;

use crate::algorithms::TransitionTable;
use crate::error::Result;
use crate::models::*;
use crate::services::recommendation::RecommendationService;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub engine: String,
    pub items_indexed: usize,
    pub snapshot_id: String,
    pub transitions_loaded: bool,
}

/// Request-facing wrapper around both engines that keeps serving counters.
pub struct ServingService {
    recommendation_service: Arc<RecommendationService>,
    transitions: Option<Arc<TransitionTable>>,
    serving_stats: DashMap<String, u64>,
}

impl ServingService {
    pub fn new(recommendation_service: Arc<RecommendationService>, transitions: Option<Arc<TransitionTable>>) -> Self {
        Self {
            recommendation_service,
            transitions,
            serving_stats: DashMap::new(),
        }
    }

    pub fn serve_recommendations(&self, user_id: u32, top_k: usize) -> Result<RecommendOutcome> {
        self.increment_stat("total_requests");
        let start_time = Instant::now();

        let outcome = match self.recommendation_service.recommend(user_id, top_k) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.increment_stat("failed_requests");
                error!("Recommendation for user {} hit a model consistency fault: {}", user_id, e);
                return Err(e);
            }
        };

        let latency = start_time.elapsed().as_micros() as u64;
        self.update_latency_stat(latency);

        match &outcome {
            RecommendOutcome::Recommended(response) => {
                self.increment_stat("successful_requests");
                info!(
                    "Served {} recommendations for user {} in {}us",
                    response.recommendations.len(),
                    user_id,
                    latency
                );
            }
            RecommendOutcome::NotFound => self.increment_stat("unknown_users"),
            RecommendOutcome::NoHistory => self.increment_stat("no_history"),
        }
        Ok(outcome)
    }

    /// `None` when no transition model was loaded at startup.
    pub fn predict_next(&self, state: &str, k: usize) -> Option<Vec<StatePrediction>> {
        let table = self.transitions.as_ref()?;
        self.increment_stat("predict_requests");
        Some(table.predict(state, k))
    }

    pub fn health_check(&self) -> HealthStatus {
        let snapshot = self.recommendation_service.snapshot();
        HealthStatus {
            status: "online".to_string(),
            engine: "flat-l2".to_string(),
            items_indexed: snapshot.len(),
            snapshot_id: snapshot.metadata().id.clone(),
            transitions_loaded: self.transitions.is_some(),
        }
    }

    pub fn get_serving_stats(&self) -> HashMap<String, u64> {
        let mut stats: HashMap<String, u64> = self
            .serving_stats
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        if let (Some(&total), Some(&samples)) = (stats.get("latency_total_us"), stats.get("latency_samples")) {
            if samples > 0 {
                stats.insert("avg_latency_us".to_string(), total / samples);
            }
        }
        stats
    }

    fn increment_stat(&self, key: &str) {
        *self.serving_stats.entry(key.to_string()).or_insert(0) += 1;
    }

    /// Each counter is updated under its own shard lock, so concurrent
    /// requests never lose a sample. The average is derived on read.
    fn update_latency_stat(&self, latency_us: u64) {
        *self
            .serving_stats
            .entry("latency_total_us".to_string())
            .or_insert(0) += latency_us;
        self.increment_stat("latency_samples");
        self.serving_stats
            .entry("max_latency_us".to_string())
            .and_modify(|max| *max = (*max).max(latency_us))
            .or_insert(latency_us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{FlatL2Index, TransitionModel};
    use crate::config::Config;
    use crate::services::snapshot::ModelSnapshot;
    use ndarray::array;

    fn serving(with_transitions: bool) -> ServingService {
        let index = FlatL2Index::build(&array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]).unwrap();
        let catalog = (0..3).map(|i| CatalogItem::new(i, format!("Item {}", i))).collect();
        let matrix = InteractionMatrix::from_records(
            &[InteractionRecord::new(0, 0, 5.0), InteractionRecord::new(1, 1, 2.0)],
            2,
            3,
        )
        .unwrap();
        let snapshot = ModelSnapshot::new(index, catalog, matrix, 42).unwrap();
        let recommender = Arc::new(RecommendationService::new(
            Arc::new(snapshot),
            &Config::default().recommendation,
        ));
        let transitions = with_transitions.then(|| {
            Arc::new(TransitionModel::default().train(vec![vec!["Trousers", "Sale"]]))
        });
        ServingService::new(recommender, transitions)
    }

    #[test]
    fn counts_each_outcome() {
        let svc = serving(true);
        svc.serve_recommendations(0, 2).unwrap();
        svc.serve_recommendations(1, 2).unwrap();
        svc.serve_recommendations(9, 2).unwrap();

        let stats = svc.get_serving_stats();
        assert_eq!(stats["total_requests"], 3);
        assert_eq!(stats["successful_requests"], 1);
        assert_eq!(stats["no_history"], 1);
        assert_eq!(stats["unknown_users"], 1);
        assert!(stats.contains_key("avg_latency_us"));
    }

    #[test]
    fn concurrent_requests_keep_every_sample() {
        let svc = serving(false);
        std::thread::scope(|scope| {
            for t in 0..8u32 {
                let svc = &svc;
                scope.spawn(move || {
                    for _ in 0..50 {
                        svc.serve_recommendations(t % 3, 2).unwrap();
                    }
                });
            }
        });

        let stats = svc.get_serving_stats();
        assert_eq!(stats["total_requests"], 400);
        assert_eq!(stats["latency_samples"], 400);
        assert!(stats["avg_latency_us"] <= stats["max_latency_us"]);
    }

    #[test]
    fn health_reports_index_size() {
        let health = serving(false).health_check();
        assert_eq!(health.items_indexed, 3);
        assert_eq!(health.status, "online");
        assert!(!health.transitions_loaded);
    }

    #[test]
    fn prediction_requires_loaded_model() {
        assert!(serving(false).predict_next("Trousers", 3).is_none());

        let predictions = serving(true).predict_next("Trousers", 3).unwrap();
        assert_eq!(predictions[0].state, "Sale");
        assert_eq!(predictions[0].probability, 1.0);
        assert!(serving(true).predict_next("Skirts", 3).unwrap().is_empty());
    }
}
