pub mod algorithms;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::RecError;
pub use models::*;

use algorithms::TransitionTable;
use anyhow::Result;
use services::snapshot::ModelSnapshot;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub recommendation_service: Arc<services::recommendation::RecommendationService>,
    pub serving_service: Arc<services::serving::ServingService>,
}

impl AppState {
    /// Loads the model snapshot (fatal on any problem) and, if present, the
    /// transition document.
    pub async fn new(config: Config) -> Result<Self> {
        let model = config.model.clone();
        let (snapshot, transitions) = tokio::task::spawn_blocking(move || -> Result<_> {
            let snapshot = ModelSnapshot::load(&model.snapshot_path)?;
            let transitions = if Path::new(&model.transitions_path).exists() {
                Some(TransitionTable::load(&model.transitions_path)?)
            } else {
                warn!(
                    "No transition model at {}, next-page prediction disabled",
                    model.transitions_path
                );
                None
            };
            Ok((snapshot, transitions))
        })
        .await??;

        Ok(Self::from_parts(config, snapshot, transitions))
    }

    pub fn from_parts(config: Config, snapshot: ModelSnapshot, transitions: Option<TransitionTable>) -> Self {
        let config = Arc::new(config);

        let recommendation_service = Arc::new(services::recommendation::RecommendationService::new(
            Arc::new(snapshot),
            &config.recommendation,
        ));

        let serving_service = Arc::new(services::serving::ServingService::new(
            recommendation_service.clone(),
            transitions.map(Arc::new),
        ));

        info!(
            "Serving {} indexed items",
            recommendation_service.index_size()
        );

        Self {
            config,
            recommendation_service,
            serving_service,
        }
    }
}

pub async fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
