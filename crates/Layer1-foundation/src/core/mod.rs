//! Core Module - identity types shared by every layer
//!
//! - `types.rs`: `Role`, `ChatroomId`

pub mod types;

pub use types::{ChatroomId, Role};
