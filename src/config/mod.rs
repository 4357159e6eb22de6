use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub recommendation: RecommendationConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

/// Where trained artifacts live on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub snapshot_path: String,
    pub transitions_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    pub default_top_k: usize,
    /// Ratings strictly above this value count as a like.
    pub like_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub embedding_dim: usize,
    pub seed: u64,
    pub oversamples: usize,
    pub power_iterations: usize,
    /// Decimal digits kept in stored transition probabilities.
    pub probability_precision: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                workers: num_cpus::get(),
            },
            model: ModelConfig {
                snapshot_path: "data/model_snapshot.json".to_string(),
                transitions_path: "data/markov_model.json".to_string(),
            },
            recommendation: RecommendationConfig {
                default_top_k: 5,
                like_threshold: 3.0,
            },
            training: TrainingConfig {
                embedding_dim: 50,
                seed: 42,
                oversamples: 10,
                power_iterations: 5,
                probability_precision: 2,
            },
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("NAVIREC").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
