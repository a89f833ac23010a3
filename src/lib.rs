// Kivo Library - topic research pipeline shared by the CLI and embedders
//
// Text processing, similarity, dedup, clustering and summarization are pure
// functions. The runner adds background runs on top; db and housekeeping
// keep a history of finished runs.

// Pipeline stages
pub mod cluster;
pub mod dedup;
pub mod pipeline;
pub mod sentiment;
pub mod similarity;
pub mod summary;
pub mod text;

// Data model and errors
pub mod error;
pub mod models;

// Runs, storage and configuration
pub mod config;
pub mod db;
pub mod export;
pub mod housekeeping;
pub mod run_store;
pub mod runner;

// Re-export key types for convenience
pub use cluster::{cluster_items, Cluster};
pub use config::{read_settings, write_settings, Settings};
pub use dedup::dedupe;
pub use error::{ErrorCode, ResearchError};
pub use models::{
    PipelineMode, ProcessedItem, RawItem, ResearchPayload, ResearchRequest, ResearchSummary,
    Source,
};
pub use pipeline::{run_pipeline, select_pipeline, PipelineParams, ResearchPipeline};
pub use run_store::{RunStatus, RunStatusView};
pub use runner::ResearchRunner;
pub use similarity::jaccard;
pub use summary::summarize;
