//! Seams to the collaborators the dispatch core depends on.
//!
//! These are intentionally minimal. Applications implement them over their own
//! storage, HTTP stack and cache; the crate ships an HTTP transport and an
//! in-memory cache for the common case.

use std::time::Duration;

use serde_json::Value;

use crate::cache::SubmissionMetadata;
use crate::error::{DataAccessError, TransportError};
use crate::model::{FleetSnapshot, Inventory, Order, Warehouse, WarehouseId};

/// Source of warehouses, stock and pending orders for an optimization run.
pub trait FleetDataSource {
    /// Active warehouses with coordinates and vehicle/driver metadata.
    fn active_warehouses(&self) -> Result<Vec<Warehouse>, DataAccessError>;

    /// Current stock of the given warehouses.
    fn inventory_for(&self, warehouse_ids: &[WarehouseId]) -> Result<Inventory, DataAccessError>;

    /// Pending orders for the current delivery window.
    fn pending_orders(&self) -> Result<Vec<Order>, DataAccessError>;

    /// Everything one run needs, fetched in one go.
    fn snapshot(&self) -> Result<FleetSnapshot, DataAccessError> {
        let warehouses = self.active_warehouses()?;
        let ids: Vec<_> = warehouses.iter().map(|warehouse| warehouse.id).collect();
        let inventory = self.inventory_for(&ids)?;
        let orders = self.pending_orders()?;
        Ok(FleetSnapshot {
            warehouses,
            inventory,
            orders,
        })
    }
}

/// A fixed snapshot serves as its own data source.
impl FleetDataSource for FleetSnapshot {
    fn active_warehouses(&self) -> Result<Vec<Warehouse>, DataAccessError> {
        Ok(self.warehouses.clone())
    }

    fn inventory_for(&self, _warehouse_ids: &[WarehouseId]) -> Result<Inventory, DataAccessError> {
        Ok(self.inventory.clone())
    }

    fn pending_orders(&self) -> Result<Vec<Order>, DataAccessError> {
        Ok(self.orders.clone())
    }

    fn snapshot(&self) -> Result<FleetSnapshot, DataAccessError> {
        Ok(self.clone())
    }
}

/// JSON-over-HTTP access to the external solver.
///
/// Paths are relative to the solver's base URL. Implementations must apply
/// `timeout` to the whole request and report it as [`TransportError::Timeout`].
/// A non-success HTTP status is a [`TransportError::Status`], never `Ok`.
pub trait SolverTransport {
    fn post_json(&self, path: &str, body: &Value, timeout: Duration) -> Result<Value, TransportError>;

    fn get_json(&self, path: &str, timeout: Duration) -> Result<Value, TransportError>;
}

/// Best-effort key-value store for submission metadata.
///
/// Never authoritative: an empty cache only loses the count annotations on
/// enriched results.
pub trait MetadataCache {
    fn get(&self, job_id: &str) -> Option<SubmissionMetadata>;

    fn put(&self, job_id: &str, metadata: SubmissionMetadata, ttl: Duration);
}
