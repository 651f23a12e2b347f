//! batchq Core
//!
//! Core types and pure logic shared by the batchq services.
//!
//! This crate contains:
//! - Domain types: Jobs, files, extraction results and queue statistics
//! - DTOs: Request/response bodies of the queue HTTP API
//! - Grouping: Bin-packing of a job's files into downstream call groups

pub mod domain;
pub mod dto;
pub mod grouping;
