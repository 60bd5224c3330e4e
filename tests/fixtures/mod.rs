//! Test fixtures for vrp-dispatch.
//!
//! Provides realistic test data including:
//! - Real Varna locations (from OpenStreetMap)
//! - Snapshot builders for warehouses, stock and orders
//! - A recording stub solver transport

#![allow(dead_code)]

pub mod varna_locations;

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::Value;

use vrp_dispatch::error::{DataAccessError, TransportError};
use vrp_dispatch::model::{
    Coordinate, FleetSnapshot, Inventory, Order, StockLine, Warehouse, WarehouseId,
};
use vrp_dispatch::traits::{FleetDataSource, SolverTransport};

pub use varna_locations::*;

// ============================================================================
// Snapshot builders
// ============================================================================

/// Builder for a fleet snapshot using the Varna locations.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    snapshot: FleetSnapshot,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add warehouse `index` of [`WAREHOUSES`] with id `index + 1`.
    pub fn warehouse(mut self, index: usize) -> Self {
        let location = &WAREHOUSES[index];
        self.snapshot.warehouses.push(Warehouse::new(
            index as u64 + 1,
            location.name,
            Coordinate::new(location.lat, location.lng),
        ));
        self
    }

    pub fn stock(mut self, warehouse_id: WarehouseId, product_id: u64, quantity: u64) -> Self {
        self.snapshot.inventory.push(StockLine {
            warehouse_id,
            product_id,
            quantity,
        });
        self
    }

    /// Add an order at delivery address `index` of [`DELIVERIES`].
    pub fn order(mut self, id: u64, index: usize, items: &[(u64, u64)]) -> Self {
        let location = &DELIVERIES[index];
        let mut order = Order::new(id, Coordinate::new(location.lat, location.lng));
        order.client_address = Some(location.name.to_string());
        for &(product_id, quantity) in items {
            order = order.with_item(product_id, quantity);
        }
        self.snapshot.orders.push(order);
        self
    }

    pub fn raw_order(mut self, order: Order) -> Self {
        self.snapshot.orders.push(order);
        self
    }

    pub fn build(self) -> FleetSnapshot {
        self.snapshot
    }
}

/// Three warehouses, two products, five orders.
pub fn city_snapshot() -> FleetSnapshot {
    SnapshotBuilder::new()
        .warehouse(0)
        .warehouse(1)
        .warehouse(2)
        .stock(1, 100, 20)
        .stock(1, 200, 5)
        .stock(2, 100, 6)
        .stock(3, 200, 12)
        .order(501, 0, &[(100, 4)])
        .order(502, 1, &[(100, 2), (200, 1)])
        .order(503, 2, &[(200, 3)])
        .order(504, 3, &[(100, 1)])
        .order(505, 6, &[(200, 2)])
        .build()
}

/// A data source that always fails.
pub struct BrokenDataSource;

impl FleetDataSource for BrokenDataSource {
    fn active_warehouses(&self) -> Result<Vec<Warehouse>, DataAccessError> {
        Err(DataAccessError("connection refused".to_string()))
    }

    fn inventory_for(&self, _warehouse_ids: &[WarehouseId]) -> Result<Inventory, DataAccessError> {
        Err(DataAccessError("connection refused".to_string()))
    }

    fn pending_orders(&self) -> Result<Vec<Order>, DataAccessError> {
        Err(DataAccessError("connection refused".to_string()))
    }
}

// ============================================================================
// Recording stub transport
// ============================================================================

/// One request seen by [`StubTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
    pub timeout: Duration,
}

/// Serves canned responses in order and records every request.
#[derive(Debug, Default)]
pub struct StubTransport {
    responses: Mutex<VecDeque<Result<Value, TransportError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    calls: AtomicUsize,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, response: Result<Value, TransportError>) -> Self {
        self.push(response);
        self
    }

    pub fn push(&self, response: Result<Value, TransportError>) {
        self.responses
            .lock()
            .expect("responses lock")
            .push_back(response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    fn answer(&self, request: RecordedRequest) -> Result<Value, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let url = request.path.clone();
        self.requests.lock().expect("requests lock").push(request);
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| {
                Err(TransportError::Network {
                    url,
                    message: "no canned response left".to_string(),
                })
            })
    }
}

impl SolverTransport for StubTransport {
    fn post_json(&self, path: &str, body: &Value, timeout: Duration) -> Result<Value, TransportError> {
        self.answer(RecordedRequest {
            method: "POST",
            path: path.to_string(),
            body: Some(body.clone()),
            timeout,
        })
    }

    fn get_json(&self, path: &str, timeout: Duration) -> Result<Value, TransportError> {
        self.answer(RecordedRequest {
            method: "GET",
            path: path.to_string(),
            body: None,
            timeout,
        })
    }
}
