//! Session types shared by Canteen services.
//!
//! Provides session JWT issue/validation, the session cookie builders and the
//! `Session` extractor.

pub mod cookie;
pub mod session;
pub mod token;
