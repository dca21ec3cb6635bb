//! Storage module for huddle
//!
//! - `db`: SQLite - agent process records shared across supervisor restarts
//! - `json`: JSON - settings files

mod db;
mod json;

pub use db::{ProcessRecord, ProcessRecordStore, PROCESS_DB_FILE};
pub use json::JsonStore;
