pub mod factorization;
pub mod initializer;
pub mod markov;
pub mod retriever;

pub use factorization::{LatentFactorizer, LatentFactors};
pub use markov::{TransitionModel, TransitionTable};
pub use retriever::{FlatL2Index, SearchHit};
