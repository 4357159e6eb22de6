pub mod dataset;
pub mod recommendation;
pub mod serving;
pub mod snapshot;
pub mod training;
