//! Domain types shared across Canteen crates.
//!
//! This crate contains only pure types with no framework dependencies.
//! Import in `usecase/` and `domain/` layers; never in `infra/` or `handlers/`.

pub mod calendar;
pub mod error;
pub mod meal;
pub mod pagination;
pub mod role;
pub mod token;
