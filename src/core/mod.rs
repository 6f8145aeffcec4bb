pub mod types;
pub mod note;
pub mod database;
pub mod config;
pub mod error;
pub mod cache;
pub mod stats;
pub mod transaction;
