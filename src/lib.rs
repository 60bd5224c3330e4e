//! vrp-dispatch core
//!
//! Builds capacitated multi-depot routing payloads from warehouses, stock and
//! pending orders, submits them to an external OR-Tools solver service, and
//! tracks the resulting asynchronous jobs through to enriched route plans.

pub mod traits;
pub mod model;
pub mod error;
pub mod haversine;
pub mod matcher;
pub mod priority;
pub mod payload;
pub mod validation;
pub mod ortools;
pub mod cache;
pub mod jobs;
pub mod enrich;
