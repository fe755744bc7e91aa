//! `caseflow-recon`: case-management reconciliation engine.
//!
//! Pure engine crate: receives loaded tables, returns deduplicated facts,
//! client rows, silver intermediates and audit reports. No file system,
//! no clock.

pub mod assemble;
pub mod collapse;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod flags;
pub mod model;
pub mod monthly;
pub mod normalize;
pub mod quality;
pub mod table;
pub mod unify;

pub use config::ReconConfig;
pub use engine::{reconcile, ReconInput, ReconResult};
pub use error::ReconError;
pub use table::{Dataset, Table};
