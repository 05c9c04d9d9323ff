//! `edcrecon-recon`: authorization-code reconciliation engine.
//!
//! Pure engine crate: receives materialized grids and decoded log text,
//! returns extracted codes, differences and diagnostics.
//! No CLI or IO dependencies.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod locate;
pub mod log;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod settlement;

pub use cache::{CacheKey, ExtractionCache};
pub use config::{KeywordGroup, ReconOptions, SettlementConfig};
pub use engine::reconcile;
pub use error::ReconError;
pub use log::{extract_log, extract_log_codes, LogExtraction, LogFilter};
pub use model::{
    AuthCode, CellValue, ColumnLocation, Diagnostic, Grid, LogRecord, ReconMode, ReconResult,
    ReconSummary, ReconWarning, Severity,
};
pub use settlement::{extract_settlement, extract_settlement_codes, SettlementExtraction};
