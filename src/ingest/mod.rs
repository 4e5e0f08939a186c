//! Ingestion pipeline: filtering, orchestration, retention and scheduling.

pub mod engine;
pub mod filter;
pub mod scheduler;
pub mod sweeper;

pub use engine::{IngestEngine, RefreshSummary, SourceOutcome, SourceStats};
pub use filter::SkipReason;
pub use scheduler::{next_daily_run, Scheduler};
pub use sweeper::RetentionSweeper;
