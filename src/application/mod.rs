//! Services coordinating the registry, the shared cache and the backing
//! data source.

pub mod access;
pub mod availability;
pub mod bulk;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod filters;
pub mod notify;
pub mod outcome;
pub mod registry;
pub mod repos;
