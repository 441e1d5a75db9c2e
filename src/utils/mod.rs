//! Utility functions and helpers for the agrocache service.
//!
//! # Submodules
//!
//! - `logging`: Tracing initialization and credential redaction.
//! - `retry`: Exponential backoff used when (re)connecting to the cache store.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod logging;
pub mod retry;
