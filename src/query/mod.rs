pub mod filter;
pub mod matcher;
pub mod planner;
pub mod types;
