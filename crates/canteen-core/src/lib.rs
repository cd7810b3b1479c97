//! Service plumbing shared by Canteen binaries: health endpoints, request ids,
//! timestamp serialization, tracing setup and environment configuration.

pub mod config;
pub mod health;
pub mod middleware;
pub mod serde;
pub mod tracing;
