pub mod api;
pub mod bom;
pub mod document;
pub mod job;
