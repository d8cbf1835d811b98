pub mod cache;
pub mod candidates;
pub mod features;
pub mod ranking;
pub mod recommender;
pub mod scoring;

pub use cache::{CacheKey, RecommendationCache};
pub use candidates::CandidateGenerator;
pub use features::{FeatureBuilder, FeatureVector};
pub use ranking::Ranker;
pub use recommender::{RecommendRequest, Recommender};
pub use scoring::{ScoreStrategy, ScoringEngine};
