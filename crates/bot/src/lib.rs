pub mod config;
pub mod error;
pub mod reindex_job;
pub mod routes;
pub mod state;
