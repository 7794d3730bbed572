//! Domain layer: entities, enumerations and the pure scoring/aggregation rules.

pub mod entities;
pub mod error;
pub mod scoring;
pub mod types;
pub mod workload;
