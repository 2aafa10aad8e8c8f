//! Data Transfer Objects for the bsub.io HTTP API
//!
//! These are the request and response bodies exactly as they travel on the
//! wire. Domain types are unwrapped from them by the client.

pub mod auth;
pub mod job;
