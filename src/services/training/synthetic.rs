//! Seeded synthetic data for demos and load tests.

use crate::algorithms::initializer::seeded_rng;
use crate::models::*;
use rand::Rng;

const ADJECTIVES: &[&str] = &["Sleek", "Durable", "Wireless", "Ergonomic", "Vintage", "Smart", "Luxury"];
const NOUNS: &[&str] = &["Watch", "Phone", "Laptop", "Shoes", "Headphones", "Camera", "Bag"];
const CATEGORIES: &[&str] = &["Trousers", "Skirts", "Blouses", "Sale"];

#[derive(Debug, Clone)]
pub struct SyntheticSpec {
    pub num_users: usize,
    pub num_items: usize,
    pub num_interactions: usize,
    pub num_sessions: usize,
    pub seed: u64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            num_users: 5_000,
            num_items: 10_000,
            num_interactions: 100_000,
            num_sessions: 18_000,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticData {
    pub catalog: Vec<CatalogItem>,
    pub interactions: Vec<InteractionRecord>,
    pub sessions: Vec<Session>,
}

pub fn generate(spec: &SyntheticSpec) -> SyntheticData {
    let mut rng = seeded_rng(spec.seed);

    let catalog = (0..spec.num_items as u32)
        .map(|id| {
            let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
            let noun = NOUNS[rng.gen_range(0..NOUNS.len())];
            CatalogItem::new(id, format!("{} {} {}", adjective, noun, id))
        })
        .collect();

    let interactions = if spec.num_users == 0 || spec.num_items == 0 {
        Vec::new()
    } else {
        (0..spec.num_interactions)
            .map(|_| {
                InteractionRecord::new(
                    rng.gen_range(0..spec.num_users as u32),
                    rng.gen_range(0..spec.num_items as u32),
                    rng.gen_range(1..=5) as f32,
                )
            })
            .collect()
    };

    let sessions = (0..spec.num_sessions)
        .map(|n| {
            let length = rng.gen_range(1..=8);
            let labels: Vec<&str> = (0..length)
                .map(|_| CATEGORIES[rng.gen_range(0..CATEGORIES.len())])
                .collect();
            Session::new(n.to_string(), &labels)
        })
        .collect();

    SyntheticData {
        catalog,
        interactions,
        sessions,
    }
}
