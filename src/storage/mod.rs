pub mod db;
pub mod engine;
pub mod file_lock;
pub mod layout;
pub mod sub_store;
pub mod wal;
