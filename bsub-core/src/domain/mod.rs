//! Core domain types
//!
//! This module contains the domain structures shared between the HTTP client
//! (which decodes them) and the command-line tool (which renders them).

pub mod auth;
pub mod job;
