pub mod api;
pub mod chain;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod events;
pub mod orchestration;

pub use chain::{ChainReadError, ChainReader, MockChainReader, RpcChainReader};
pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{Address, AssetRegistry, ChainEvent, TransactionRecord, UserPositionSnapshot};
pub use engine::{EventNormalizer, MetricsCalculator};
pub use error::AppError;
pub use orchestration::{BackfillCoordinator, Pipeline, PipelineStats, PositionUpdater};
