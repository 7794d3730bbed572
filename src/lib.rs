//! Workload-aware assignment engine with a stale-tolerant shared cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
