//! Builds the solver-ready optimization payload for one run.
//!
//! Location indices follow a fixed convention the map UI depends on:
//! depots come first in warehouse order, then orders in order-list order, so
//! `location_index < depot_count` is a depot and anything else is the order
//! at `location_index - depot_count`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{DataQualityWarning, InputError};
use crate::matcher::{match_orders_to_warehouses, MatchRecord};
use crate::model::{Inventory, Order, OrderId, ProductId, Warehouse, WarehouseId};
use crate::priority::score_order_with_diagnostics;

/// How the solver should spread orders across warehouses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStrategy {
    #[default]
    OrtoolsBalanced,
    ClosestWithInventory,
    ClosestAny,
    #[serde(rename = "least_assigned_orders")]
    LeastAssigned,
    LeastTotalLoad,
}

impl AssignmentStrategy {
    pub const fn all() -> [Self; 5] {
        [
            Self::OrtoolsBalanced,
            Self::ClosestWithInventory,
            Self::ClosestAny,
            Self::LeastAssigned,
            Self::LeastTotalLoad,
        ]
    }

    /// Identifier the solver expects in the `strategy` field.
    pub const fn id(&self) -> &'static str {
        match self {
            Self::OrtoolsBalanced => "ortools_balanced",
            Self::ClosestWithInventory => "closest_with_inventory",
            Self::ClosestAny => "closest_any",
            Self::LeastAssigned => "least_assigned_orders",
            Self::LeastTotalLoad => "least_total_load",
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::OrtoolsBalanced => "OR-Tools Balanced",
            Self::ClosestWithInventory => "Closest Driver with Inventory",
            Self::ClosestAny => "Closest Driver (Any)",
            Self::LeastAssigned => "Least Assigned Orders",
            Self::LeastTotalLoad => "Least Total Load",
        }
    }

    pub const fn description(&self) -> &'static str {
        match self {
            Self::OrtoolsBalanced => "Optimizes routes with balanced load distribution",
            Self::ClosestWithInventory => "Assigns orders to the nearest driver who has the required inventory",
            Self::ClosestAny => "Assigns orders to the nearest driver regardless of inventory (may need restocking)",
            Self::LeastAssigned => "Assigns orders to the driver with the fewest current assignments",
            Self::LeastTotalLoad => "Assigns orders to the driver with the lowest current load",
        }
    }
}

/// Dense product-to-column numbering, valid for one run only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductIndex {
    product_ids: Vec<ProductId>,
    columns: HashMap<ProductId, usize>,
}

impl ProductIndex {
    /// Number products in first-seen order: stock of the listed warehouses,
    /// then stock of any other warehouse (ascending id), then order items.
    pub fn build(warehouses: &[Warehouse], inventory: &Inventory, orders: &[&Order]) -> Self {
        let mut index = Self::default();
        for warehouse in warehouses {
            for line in inventory.lines(warehouse.id) {
                index.insert(line.product_id);
            }
        }
        for warehouse_id in inventory.warehouse_ids() {
            for line in inventory.lines(warehouse_id) {
                index.insert(line.product_id);
            }
        }
        for order in orders {
            for item in &order.items {
                index.insert(item.product_id);
            }
        }
        index
    }

    fn insert(&mut self, product_id: ProductId) {
        if !self.columns.contains_key(&product_id) {
            self.columns.insert(product_id, self.product_ids.len());
            self.product_ids.push(product_id);
        }
    }

    pub fn column(&self, product_id: ProductId) -> Option<usize> {
        self.columns.get(&product_id).copied()
    }

    pub fn len(&self) -> usize {
        self.product_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.product_ids.is_empty()
    }

    /// Product id for each column.
    pub fn product_ids(&self) -> &[ProductId] {
        &self.product_ids
    }

    /// Spread `(product, quantity)` pairs over the columns. Unknown products
    /// are dropped, repeated products are summed.
    pub fn vector<I>(&self, quantities: I) -> Vec<u64>
    where
        I: IntoIterator<Item = (ProductId, u64)>,
    {
        let mut vector = vec![0u64; self.len()];
        for (product_id, quantity) in quantities {
            if let Some(column) = self.column(product_id) {
                vector[column] = vector[column].saturating_add(quantity);
            }
        }
        vector
    }
}

/// Canonical multi-depot CVRP request sent to the solver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationPayload {
    /// `[lat, lng]` per location, depots first.
    pub locations: Vec<[f64; 2]>,
    pub vehicle_capacities: Vec<Vec<u64>>,
    pub demands: Vec<Vec<u64>>,
    pub num_vehicles: usize,
    pub depot_indices: Vec<usize>,
    /// Urgency score per order, aligned with `demands`.
    #[serde(default)]
    pub priorities: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<AssignmentStrategy>,
    /// Service time in seconds per location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_times: Option<Vec<u32>>,
    /// `[open, close]` seconds from midnight per location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_windows: Option<Vec<[u32; 2]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub return_routes: bool,
}

impl OptimizationPayload {
    pub fn depot_count(&self) -> usize {
        self.vehicle_capacities.len()
    }

    pub fn order_count(&self) -> usize {
        self.demands.len()
    }
}

/// Explicit vehicle layout for the start/end variant of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetLayout {
    pub num_vehicles: usize,
    pub starts: Vec<usize>,
    pub ends: Vec<usize>,
}

/// Optional extras layered onto the simple multi-depot payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayloadOptions {
    pub strategy: Option<AssignmentStrategy>,
    /// Uniform service time at every order stop. Depots get zero.
    pub service_time_secs: Option<u32>,
    pub time_windows: Option<Vec<[u32; 2]>>,
    pub fleet: Option<FleetLayout>,
    pub return_routes: bool,
}

impl PayloadOptions {
    pub fn with_strategy(mut self, strategy: AssignmentStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_service_time(mut self, secs: u32) -> Self {
        self.service_time_secs = Some(secs);
        self
    }

    pub fn with_fleet(mut self, fleet: FleetLayout) -> Self {
        self.fleet = Some(fleet);
        self
    }
}

/// A built payload plus everything needed to interpret it later.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRun {
    pub payload: OptimizationPayload,
    pub product_index: ProductIndex,
    /// Warehouse id per depot location, in payload order.
    pub warehouse_ids: Vec<WarehouseId>,
    /// Order id per order location, in payload order.
    pub order_ids: Vec<OrderId>,
    pub matches: Vec<MatchRecord>,
    pub warnings: Vec<DataQualityWarning>,
}

/// Build the optimization payload for a snapshot.
///
/// Orders without client coordinates are left out; see [`prepare_run`] for the
/// warnings and match report that go with the payload.
///
/// # Errors
///
/// Fails when there are no warehouses, no (locatable) orders, or a coordinate
/// is outside the valid range.
pub fn build_payload(
    warehouses: &[Warehouse],
    inventory: &Inventory,
    orders: &[Order],
) -> Result<OptimizationPayload, InputError> {
    prepare_run(warehouses, inventory, orders, &PayloadOptions::default()).map(|run| run.payload)
}

/// Build the payload, match report and data-quality warnings for one run.
///
/// # Errors
///
/// Same conditions as [`build_payload`].
pub fn prepare_run(
    warehouses: &[Warehouse],
    inventory: &Inventory,
    orders: &[Order],
    options: &PayloadOptions,
) -> Result<PreparedRun, InputError> {
    if warehouses.is_empty() {
        return Err(InputError::NoWarehouses);
    }
    if orders.is_empty() {
        return Err(InputError::NoOrders);
    }
    for warehouse in warehouses {
        if !warehouse.location.is_valid() || warehouse.location.is_unlocatable() {
            return Err(InputError::MalformedCoordinate {
                entity: "warehouse",
                id: warehouse.id,
                lat: warehouse.location.lat,
                lng: warehouse.location.lng,
            });
        }
    }

    let mut warnings = Vec::new();
    let (located, excluded) = locatable_orders(orders)?;
    warnings.extend(excluded);
    if located.is_empty() {
        return Err(InputError::NoLocatableOrders { excluded: orders.len() });
    }

    let product_index = ProductIndex::build(warehouses, inventory, &located);

    let mut locations = Vec::with_capacity(warehouses.len() + located.len());
    let mut vehicle_capacities = Vec::with_capacity(warehouses.len());
    for warehouse in warehouses {
        locations.push(warehouse.location.as_lat_lng());
        vehicle_capacities.push(product_index.vector(
            inventory
                .lines(warehouse.id)
                .iter()
                .map(|line| (line.product_id, line.quantity)),
        ));
    }

    let mut demands = Vec::with_capacity(located.len());
    let mut priorities = Vec::with_capacity(located.len());
    for order in &located {
        if order.items.is_empty() {
            warnings.push(DataQualityWarning::OrderWithoutItems { order_id: order.id });
        }
        locations.push(order.location.as_lat_lng());
        demands.push(product_index.vector(
            order.items.iter().map(|item| (item.product_id, item.quantity)),
        ));

        let (priority, warning) = score_order_with_diagnostics(order);
        priorities.push(priority);
        warnings.extend(warning);
    }

    let depot_count = warehouses.len();
    let order_count = located.len();
    let (num_vehicles, starts, ends) = match &options.fleet {
        Some(fleet) => (
            fleet.num_vehicles,
            Some(fleet.starts.clone()),
            Some(fleet.ends.clone()),
        ),
        None => (depot_count, None, None),
    };
    let service_times = options.service_time_secs.map(|secs| {
        std::iter::repeat_n(0, depot_count)
            .chain(std::iter::repeat_n(secs, order_count))
            .collect()
    });

    let payload = OptimizationPayload {
        locations,
        vehicle_capacities,
        demands,
        num_vehicles,
        depot_indices: (0..depot_count).collect(),
        priorities,
        strategy: options.strategy,
        service_times,
        time_windows: options.time_windows.clone(),
        starts,
        ends,
        return_routes: options.return_routes,
    };

    let matches = match_orders_to_warehouses(located.iter().copied(), warehouses, inventory);

    for warning in &warnings {
        tracing::warn!(%warning, "data quality warning");
    }
    tracing::debug!(
        depots = depot_count,
        orders = order_count,
        products = product_index.len(),
        warnings = warnings.len(),
        "built optimization payload"
    );

    Ok(PreparedRun {
        payload,
        product_index,
        warehouse_ids: warehouses.iter().map(|warehouse| warehouse.id).collect(),
        order_ids: located.iter().map(|order| order.id).collect(),
        matches,
        warnings,
    })
}

/// Split orders into those with usable client coordinates and a warning for
/// each `0,0` order left out.
///
/// # Errors
///
/// Fails on non-finite or out-of-range coordinates, which point at corrupt
/// upstream data rather than a missing geocode.
pub fn locatable_orders(
    orders: &[Order],
) -> Result<(Vec<&Order>, Vec<DataQualityWarning>), InputError> {
    let mut located = Vec::with_capacity(orders.len());
    let mut excluded = Vec::new();
    for order in orders {
        if order.location.is_unlocatable() {
            excluded.push(DataQualityWarning::UnlocatableOrder { order_id: order.id });
        } else if order.location.is_valid() {
            located.push(order);
        } else {
            return Err(InputError::MalformedCoordinate {
                entity: "order",
                id: order.id,
                lat: order.location.lat,
                lng: order.location.lng,
            });
        }
    }
    Ok((located, excluded))
}
