// src/matching/mod.rs
pub mod name;
pub mod org_model;
pub mod similarity;

pub use org_model::PairMatchModel;
pub use similarity::SimilarityMetric;
