//! Core plumbing shared by every subsystem: error types and configuration.

pub mod config;
pub mod errors;
