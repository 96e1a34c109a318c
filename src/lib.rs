pub mod cli;
pub mod config;
pub mod db;
pub mod distance;
pub mod extractor;
pub mod feature;
mod metrics;
pub mod module;
pub mod query;
pub mod retriever;
pub mod score;
pub mod segment;
mod server;
mod session;
pub mod utils;

pub use config::Opts;
pub use db::SqliteStore;
pub use extractor::{FeatureExtractor, Processed};
pub use feature::{DominantChannelHistogram, FeatureTransform, FeatureVector};
pub use module::FeatureModule;
pub use query::{QueryConfig, RetrieverConfig};
pub use retriever::FeatureRetriever;
pub use score::{CorrespondenceFunction, ScoreElement};
pub use segment::{Frame, Pixel, Segment};
