//! Bsub Core
//!
//! Core types shared by the bsub.io client library and command-line tool.
//!
//! This crate contains:
//! - Domain types: Jobs, job types, granted authorizations
//! - DTOs: Wire representations of the bsub.io HTTP API
//! - Benchmarks: Result sets and the comparison between two of them

pub mod bench;
pub mod domain;
pub mod dto;
