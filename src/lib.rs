//! BOM import job service
//!
//! Starts background Bill-of-Materials imports for BOM Creator Tool documents,
//! keeping at most one running import per document, and reports their progress.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
