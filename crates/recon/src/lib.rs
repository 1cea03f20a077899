//! `recongrid-recon`: statement ↔ estimate reconciliation.
//!
//! Pure engine crate: receives pre-loaded tables, returns annotated tables
//! and a run summary. No CLI or file-format dependencies.

pub mod config;
pub mod dates;
pub mod engine;
pub mod enrich;
pub mod error;
pub mod financial;
pub mod join;
pub mod key;
pub mod layout;
pub mod model;
pub mod postprocess;
pub mod progress;
pub mod scrape;
pub mod summary;

pub use config::{DuplicatePolicy, Profile};
pub use engine::run;
pub use error::ReconError;
pub use model::{MatchStatus, ReconInput, ReconOutput, RunContext, RunReport, RunSummary};
