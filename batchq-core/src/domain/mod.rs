//! Core domain types
//!
//! These types are shared between the server (which persists and processes
//! them) and the client/CLI (which display them).

pub mod file;
pub mod job;
pub mod stats;
