//! Activity logging: JSONL append-only with graceful degradation to stderr.

pub mod jsonl;

pub use jsonl::JsonlLogger;
