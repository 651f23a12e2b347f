//! Data Transfer Objects for the queue HTTP API
//!
//! Request and response bodies exchanged between the server, the client
//! crate and the downstream extraction service.

pub mod extraction;
pub mod job;
