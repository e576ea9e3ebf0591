pub mod bom_creator;
pub mod bom_tree;
pub mod documents;
pub mod housekeeping;
pub mod inventory;
pub mod job_service;
pub mod jobs;
pub mod queue;
mod repository_error;

pub use repository_error::RepositoryError;
