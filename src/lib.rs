// agrocache - fail-open Redis cache layer and performance monitor
// Author: kelexine (https://github.com/kelexine)

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod server;
pub mod utils;
