pub mod synthetic;

use crate::algorithms::{FlatL2Index, LatentFactorizer, TransitionModel, TransitionTable};
use crate::config::Config;
use crate::error::{RecError, Result};
use crate::models::*;
use crate::services::dataset;
use crate::services::snapshot::ModelSnapshot;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainingStats {
    pub sessions_total: usize,
    pub sessions_used: usize,
    pub transition_states: usize,
    pub users: usize,
    pub active_users: usize,
    pub items: usize,
    pub interactions: usize,
    pub embedding_dim: usize,
    pub leading_singular_value: Option<f32>,
    pub elapsed_ms: u64,
}

/// Offline batch pipeline: sessions into a transition table, interactions and
/// catalog into a model snapshot.
#[derive(Clone)]
pub struct TrainingService {
    config: Arc<Config>,
}

impl TrainingService {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub fn factorizer(&self) -> LatentFactorizer {
        LatentFactorizer::new(self.config.training.seed)
            .with_oversamples(self.config.training.oversamples)
            .with_power_iterations(self.config.training.power_iterations)
    }

    pub fn train_transitions(&self, sessions: &[Session], stats: &mut TrainingStats) -> TransitionTable {
        let table = TransitionModel::new(self.config.training.probability_precision).train_sessions(sessions);
        stats.sessions_total = sessions.len();
        stats.sessions_used = sessions.iter().filter(|s| s.has_transitions()).count();
        stats.transition_states = table.len();
        table
    }

    /// Factorizes the interaction matrix and bundles the item index with the
    /// catalog and the matrix. Index position `i` is item `i`.
    pub fn build_snapshot(
        &self,
        records: &[InteractionRecord],
        catalog: Vec<CatalogItem>,
        num_users: usize,
        stats: &mut TrainingStats,
    ) -> Result<ModelSnapshot> {
        let num_items = catalog.len();
        let matrix = InteractionMatrix::from_records(records, num_users, num_items)?;
        info!(
            "Built {}x{} interaction matrix ({} non-zero cells, {} active users)",
            num_users,
            num_items,
            matrix.nonzero_count(),
            matrix.active_users()
        );

        let dim = self.config.training.embedding_dim;
        let factors = self.factorizer().fit(matrix.ratings(), dim)?;
        let index = FlatL2Index::build(&factors.item_embeddings)?;
        info!("Built vector index with {} item vectors of dimension {}", index.len(), dim);

        stats.users = num_users;
        stats.active_users = matrix.active_users();
        stats.items = num_items;
        stats.interactions = records.len();
        stats.embedding_dim = dim;
        stats.leading_singular_value = factors.singular_values.first().copied();

        ModelSnapshot::new(index, catalog, matrix, self.config.training.seed)
    }

    pub fn run_transitions(&self, sessions_path: impl AsRef<Path>, stats: &mut TrainingStats) -> Result<TransitionTable> {
        let sessions = dataset::load_sessions(sessions_path)?;
        let table = self.train_transitions(&sessions, stats);
        if table.is_empty() {
            warn!("No session had two or more visits; transition table is empty");
        }
        table.save(&self.config.model.transitions_path)?;
        Ok(table)
    }

    /// `num_users` defaults to one past the highest user id in the log.
    pub fn run_snapshot(
        &self,
        interactions_path: impl AsRef<Path>,
        catalog_path: impl AsRef<Path>,
        num_users: Option<usize>,
        stats: &mut TrainingStats,
    ) -> Result<ModelSnapshot> {
        let records = dataset::load_interactions(interactions_path)?;
        let catalog = dataset::load_catalog(catalog_path)?;
        let num_users = match num_users {
            Some(n) => n,
            None => records
                .iter()
                .map(|r| r.user_id as usize + 1)
                .max()
                .ok_or_else(|| RecError::invalid("Interaction log is empty"))?,
        };

        let snapshot = self.build_snapshot(&records, catalog, num_users, stats)?;
        snapshot.save(&self.config.model.snapshot_path)?;
        Ok(snapshot)
    }

    /// Generates seeded data, writes it next to the model files and trains
    /// both models from it.
    pub fn run_synthetic(&self, spec: &synthetic::SyntheticSpec, data_dir: impl AsRef<Path>) -> Result<TrainingStats> {
        let started = Instant::now();
        let data_dir = data_dir.as_ref();
        let data = synthetic::generate(spec);
        info!(
            "Generated {} items, {} interactions and {} sessions",
            data.catalog.len(),
            data.interactions.len(),
            data.sessions.len()
        );

        let sessions_path = data_dir.join("sessions.json");
        let interactions_path = data_dir.join("interactions.json");
        let catalog_path = data_dir.join("catalog.json");
        dataset::write_json(&sessions_path, &data.sessions)?;
        dataset::write_json(&interactions_path, &data.interactions)?;
        dataset::write_json(&catalog_path, &data.catalog)?;

        let mut stats = TrainingStats::default();
        self.run_transitions(&sessions_path, &mut stats)?;
        self.run_snapshot(&interactions_path, &catalog_path, Some(spec.num_users), &mut stats)?;
        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        Ok(stats)
    }
}
