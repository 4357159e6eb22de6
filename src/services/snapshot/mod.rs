use crate::algorithms::FlatL2Index;
use crate::error::{RecError, Result};
use crate::models::{CatalogItem, InteractionMatrix};
use crate::utils::validation::validate_catalog;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub embedding_dim: usize,
    pub seed: u64,
}

/// Everything the recommender needs at request time, persisted and loaded as
/// one unit. Index position `i`, catalog entry `i` and matrix column `i` all
/// describe item `i`; construction and loading refuse anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    format_version: u32,
    metadata: SnapshotMetadata,
    index: FlatL2Index,
    catalog: Vec<CatalogItem>,
    interactions: InteractionMatrix,
}

impl ModelSnapshot {
    pub fn new(
        index: FlatL2Index,
        catalog: Vec<CatalogItem>,
        interactions: InteractionMatrix,
        seed: u64,
    ) -> Result<Self> {
        let snapshot = Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            metadata: SnapshotMetadata {
                id: uuid::Uuid::new_v4().to_string(),
                created_at: Utc::now(),
                embedding_dim: index.dimension(),
                seed,
            },
            index,
            catalog,
            interactions,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn validate(&self) -> Result<()> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(RecError::snapshot(format!(
                "unsupported format version {} (expected {})",
                self.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        self.index.validate().map_err(|e| RecError::snapshot(e.to_string()))?;
        self.interactions
            .validate()
            .map_err(|e| RecError::snapshot(e.to_string()))?;
        validate_catalog(&self.catalog).map_err(|e| RecError::snapshot(e.to_string()))?;

        if self.index.dimension() != self.metadata.embedding_dim {
            return Err(RecError::snapshot(format!(
                "index dimension {} differs from recorded embedding dimension {}",
                self.index.dimension(),
                self.metadata.embedding_dim
            )));
        }
        if self.index.len() != self.catalog.len() {
            return Err(RecError::snapshot(format!(
                "index holds {} items but catalog lists {}",
                self.index.len(),
                self.catalog.len()
            )));
        }
        if self.index.len() != self.interactions.num_items() {
            return Err(RecError::snapshot(format!(
                "index holds {} items but interaction matrix has {} columns",
                self.index.len(),
                self.interactions.num_items()
            )));
        }
        Ok(())
    }

    /// Writes to a sibling temp file first so a crash never leaves a
    /// half-written snapshot at `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;

        info!(
            "Saved snapshot {} ({} items, dim {}) to {}",
            self.metadata.id,
            self.len(),
            self.metadata.embedding_dim,
            path.display()
        );
        Ok(())
    }

    /// Any failure here is a `SnapshotLoad` error; the caller should not serve.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| RecError::snapshot(format!("cannot open {}: {}", path.display(), e)))?;
        let snapshot: ModelSnapshot = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| RecError::snapshot(format!("corrupt snapshot {}: {}", path.display(), e)))?;
        snapshot.validate()?;

        info!(
            "Loaded snapshot {} created {} ({} items, {} users)",
            snapshot.metadata.id,
            snapshot.metadata.created_at,
            snapshot.len(),
            snapshot.interactions.active_users()
        );
        Ok(snapshot)
    }

    pub fn index(&self) -> &FlatL2Index {
        &self.index
    }

    pub fn catalog(&self) -> &[CatalogItem] {
        &self.catalog
    }

    pub fn interactions(&self) -> &InteractionMatrix {
        &self.interactions
    }

    pub fn metadata(&self) -> &SnapshotMetadata {
        &self.metadata
    }

    pub fn title(&self, position: usize) -> Result<&str> {
        self.catalog
            .get(position)
            .map(|item| item.title.as_str())
            .ok_or(RecError::IndexOutOfRange {
                position,
                count: self.catalog.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
