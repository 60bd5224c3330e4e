//! Annotate finished jobs with the entities behind each location index.
//!
//! Location indices below the depot count are warehouses; the rest are orders
//! at `location_index - depot_count`. Enrichment only adds detail next to the
//! solver result and never rewrites it.

use serde::Serialize;

use crate::cache::SubmissionMetadata;
use crate::error::DataAccessError;
use crate::jobs::{JobStatus, RouteStop, SolverResult};
use crate::model::{FleetSnapshot, Inventory, Order, OrderId, Warehouse, WarehouseId};
use crate::priority::score_order_with_diagnostics;

/// What a location index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LocationRef {
    Depot { index: usize },
    Order { index: usize },
}

impl LocationRef {
    pub fn from_index(location_index: usize, depot_count: usize) -> Self {
        if location_index < depot_count {
            Self::Depot {
                index: location_index,
            }
        } else {
            Self::Order {
                index: location_index - depot_count,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepotDetail {
    pub index: usize,
    pub id: WarehouseId,
    pub name: String,
    pub vehicle_no: Option<String>,
    pub driver_name: Option<String>,
    pub location: [f64; 2],
    pub capacity: u64,
}

impl DepotDetail {
    fn new(index: usize, warehouse: &Warehouse, inventory: &Inventory) -> Self {
        let vehicle = warehouse.vehicle.as_ref();
        Self {
            index,
            id: warehouse.id,
            name: warehouse.name.clone(),
            vehicle_no: vehicle.map(|vehicle| vehicle.vehicle_no.clone()),
            driver_name: vehicle.and_then(|vehicle| vehicle.driver_name.clone()),
            location: warehouse.location.as_lat_lng(),
            capacity: inventory.capacity(warehouse.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDetail {
    pub index: usize,
    pub id: OrderId,
    pub order_no: String,
    pub client_name: Option<String>,
    pub client_address: Option<String>,
    pub client_phone: Option<String>,
    pub location: [f64; 2],
    pub items_count: usize,
    pub total: f64,
    pub priority: u8,
}

impl OrderDetail {
    fn new(index: usize, order: &Order) -> Self {
        let (priority, _) = score_order_with_diagnostics(order);
        Self {
            index,
            id: order.id,
            order_no: order.order_no.clone(),
            client_name: order.client_name.clone(),
            client_address: order.client_address.clone(),
            client_phone: order.client_phone.clone(),
            location: order.location.as_lat_lng(),
            items_count: order.items.len(),
            total: order.total,
            priority,
        }
    }
}

/// A route stop with a human-readable label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopLabel {
    pub location_index: usize,
    pub location: LocationRef,
    pub label: String,
    pub load: f64,
}

/// Detail for every location of a finished run.
///
/// `warehouses` and `orders` are aligned with payload positions; an entry is
/// `None` when that entity no longer exists in the data source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunDetail {
    pub depot_count: usize,
    pub warehouses: Vec<Option<DepotDetail>>,
    pub orders: Vec<Option<OrderDetail>>,
    pub routes: Vec<Vec<StopLabel>>,
}

impl RunDetail {
    /// Align the snapshot with the submitted payload.
    ///
    /// With cached entity ids the alignment is exact. Without them the current
    /// warehouses and locatable orders are assumed to be in submission order,
    /// which holds only if nothing changed since.
    pub fn build(
        snapshot: &FleetSnapshot,
        metadata: Option<&SubmissionMetadata>,
        result: &SolverResult,
    ) -> Self {
        let warehouses: Vec<Option<DepotDetail>> =
            match metadata.filter(|metadata| !metadata.warehouse_ids.is_empty()) {
                Some(metadata) => metadata
                    .warehouse_ids
                    .iter()
                    .enumerate()
                    .map(|(index, id)| {
                        snapshot
                            .warehouses
                            .iter()
                            .find(|warehouse| warehouse.id == *id)
                            .map(|warehouse| DepotDetail::new(index, warehouse, &snapshot.inventory))
                    })
                    .collect(),
                None => snapshot
                    .warehouses
                    .iter()
                    .enumerate()
                    .map(|(index, warehouse)| {
                        Some(DepotDetail::new(index, warehouse, &snapshot.inventory))
                    })
                    .collect(),
            };

        let orders: Vec<Option<OrderDetail>> =
            match metadata.filter(|metadata| !metadata.order_ids.is_empty()) {
                Some(metadata) => metadata
                    .order_ids
                    .iter()
                    .enumerate()
                    .map(|(index, id)| {
                        snapshot
                            .orders
                            .iter()
                            .find(|order| order.id == *id)
                            .map(|order| OrderDetail::new(index, order))
                    })
                    .collect(),
                None => snapshot
                    .orders
                    .iter()
                    .filter(|order| !order.location.is_unlocatable() && order.location.is_valid())
                    .enumerate()
                    .map(|(index, order)| Some(OrderDetail::new(index, order)))
                    .collect(),
            };

        let depot_count = metadata.map_or(warehouses.len(), |metadata| metadata.warehouses_count);
        let routes = result
            .stop_sequences()
            .into_iter()
            .map(|route| {
                route
                    .iter()
                    .map(|stop| label_stop(stop, depot_count, &warehouses, &orders))
                    .collect()
            })
            .collect();

        Self {
            depot_count,
            warehouses,
            orders,
            routes,
        }
    }
}

fn label_stop(
    stop: &RouteStop,
    depot_count: usize,
    warehouses: &[Option<DepotDetail>],
    orders: &[Option<OrderDetail>],
) -> StopLabel {
    let location = LocationRef::from_index(stop.location_index, depot_count);
    let label = match location {
        LocationRef::Depot { index } => match warehouses.get(index).and_then(Option::as_ref) {
            Some(depot) => depot.name.clone(),
            None => format!("Depot #{}", index + 1),
        },
        LocationRef::Order { index } => match orders.get(index).and_then(Option::as_ref) {
            Some(order) if !order.order_no.is_empty() => format!("Order #{}", order.order_no),
            _ => format!("Order #{}", index + 1),
        },
    };
    StopLabel {
        location_index: stop.location_index,
        location,
        label,
        load: stop.load,
    }
}

/// A job status plus, for finished jobs, current entity detail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedStatus {
    pub status: JobStatus,
    pub detail: Option<RunDetail>,
    /// Set when detail could not be loaded; the status is still valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail_error: Option<String>,
}

/// Enrich `status` with data from `fetch`, which is only called for done jobs.
pub fn enrich_status<F>(status: JobStatus, fetch: F) -> EnrichedStatus
where
    F: FnOnce() -> Result<FleetSnapshot, DataAccessError>,
{
    let JobStatus::Done { result, metadata } = &status else {
        return EnrichedStatus {
            status,
            detail: None,
            detail_error: None,
        };
    };

    match fetch() {
        Ok(snapshot) => {
            let detail = RunDetail::build(&snapshot, metadata.as_ref(), result);
            EnrichedStatus {
                status,
                detail: Some(detail),
                detail_error: None,
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "could not load detail for finished job");
            EnrichedStatus {
                status,
                detail: None,
                detail_error: Some(err.to_string()),
            }
        }
    }
}
