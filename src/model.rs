//! Snapshot records consumed by an optimization run.
//!
//! Everything here is a read-only snapshot supplied by the data-access
//! collaborator. Nothing in this crate mutates warehouses, stock or orders.

use std::collections::HashMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::haversine::distance_meters;

pub type WarehouseId = u64;
pub type ProductId = u64;
pub type OrderId = u64;

/// A point in decimal degrees.
///
/// Deserializes from `{"lat": .., "lng": ..}` or from the legacy `"lng,lat"`
/// string some depot records still carry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// A `0,0` pair is what the data layer reports for a client with no geocode.
    pub fn is_unlocatable(&self) -> bool {
        self.lat == 0.0 && self.lng == 0.0
    }

    /// Finite and inside the latitude/longitude ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// `[lat, lng]`, the tuple order used everywhere on the wire.
    pub fn as_lat_lng(&self) -> [f64; 2] {
        [self.lat, self.lng]
    }

    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        distance_meters(self.lat, self.lng, other.lat, other.lng)
    }

    /// Parse the legacy `"lng,lat"` string form some depot records carry.
    ///
    /// Surrounding whitespace is tolerated. Returns `None` for anything that
    /// does not yield a valid coordinate.
    pub fn parse_lng_lat(raw: &str) -> Option<Self> {
        let (lng, lat) = raw.split_once(',')?;
        let coordinate = Self::new(lat.trim().parse().ok()?, lng.trim().parse().ok()?);
        coordinate.is_valid().then_some(coordinate)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CoordinateRepr {
    Object { lat: f64, lng: f64 },
    LngLat(String),
}

impl<'de> Deserialize<'de> for Coordinate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match CoordinateRepr::deserialize(deserializer)? {
            CoordinateRepr::Object { lat, lng } => Ok(Self::new(lat, lng)),
            CoordinateRepr::LngLat(raw) => Self::parse_lng_lat(&raw)
                .ok_or_else(|| D::Error::custom(format!("invalid \"lng,lat\" coordinate '{raw}'"))),
        }
    }
}

/// Vehicle and driver currently assigned to a mobile warehouse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub vehicle_no: String,
    pub driver_name: Option<String>,
}

/// A mobile warehouse (depot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    pub location: Coordinate,
    pub vehicle: Option<VehicleInfo>,
}

impl Warehouse {
    pub fn new(id: WarehouseId, name: impl Into<String>, location: Coordinate) -> Self {
        Self {
            id,
            name: name.into(),
            location,
            vehicle: None,
        }
    }

    pub fn with_vehicle(mut self, vehicle: VehicleInfo) -> Self {
        self.vehicle = Some(vehicle);
        self
    }
}

/// On-hand quantity of one product in one warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub quantity: u64,
}

/// Stock lines grouped by warehouse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    by_warehouse: HashMap<WarehouseId, Vec<StockLine>>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lines(lines: impl IntoIterator<Item = StockLine>) -> Self {
        let mut inventory = Self::new();
        for line in lines {
            inventory.push(line);
        }
        inventory
    }

    pub fn push(&mut self, line: StockLine) {
        self.by_warehouse.entry(line.warehouse_id).or_default().push(line);
    }

    /// Raw lines for a warehouse, empty when it has none.
    pub fn lines(&self, warehouse_id: WarehouseId) -> &[StockLine] {
        self.by_warehouse
            .get(&warehouse_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Quantity per product for a warehouse. Duplicate lines are summed.
    pub fn stock_for(&self, warehouse_id: WarehouseId) -> HashMap<ProductId, u64> {
        let mut stock = HashMap::new();
        for line in self.lines(warehouse_id) {
            let quantity = stock.entry(line.product_id).or_insert(0u64);
            *quantity = quantity.saturating_add(line.quantity);
        }
        stock
    }

    /// Total on-hand units held by a warehouse.
    pub fn capacity(&self, warehouse_id: WarehouseId) -> u64 {
        self.lines(warehouse_id)
            .iter()
            .fold(0u64, |total, line| total.saturating_add(line.quantity))
    }

    /// Warehouse ids with at least one line, ascending.
    pub fn warehouse_ids(&self) -> Vec<WarehouseId> {
        let mut ids: Vec<_> = self.by_warehouse.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// One requested product on an order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u64,
    pub unit_amount: f64,
}

impl OrderItem {
    pub const fn new(product_id: ProductId, quantity: u64) -> Self {
        Self {
            product_id,
            quantity,
            unit_amount: 0.0,
        }
    }
}

/// A pending same-day order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_no: String,
    pub client_name: Option<String>,
    pub client_address: Option<String>,
    pub client_phone: Option<String>,
    pub location: Coordinate,
    pub items: Vec<OrderItem>,
    /// Delivery timestamp as stored upstream, parsed lazily by the priority scorer.
    pub delivery_at: Option<String>,
    pub total: f64,
}

impl Order {
    pub fn new(id: OrderId, location: Coordinate) -> Self {
        Self {
            id,
            order_no: id.to_string(),
            client_name: None,
            client_address: None,
            client_phone: None,
            location,
            items: Vec::new(),
            delivery_at: None,
            total: 0.0,
        }
    }

    pub fn with_item(mut self, product_id: ProductId, quantity: u64) -> Self {
        self.items.push(OrderItem::new(product_id, quantity));
        self
    }

    pub fn with_delivery_at(mut self, delivery_at: impl Into<String>) -> Self {
        self.delivery_at = Some(delivery_at.into());
        self
    }

    pub fn with_total(mut self, total: f64) -> Self {
        self.total = total;
        self
    }

    /// Requested quantity per product. Repeated products are summed.
    pub fn requested(&self) -> HashMap<ProductId, u64> {
        let mut requested = HashMap::new();
        for item in &self.items {
            let quantity = requested.entry(item.product_id).or_insert(0u64);
            *quantity = quantity.saturating_add(item.quantity);
        }
        requested
    }
}

/// Everything one optimization run reads from the data layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub warehouses: Vec<Warehouse>,
    pub inventory: Inventory,
    pub orders: Vec<Order>,
}

impl FleetSnapshot {
    /// Keep only the given orders, preserving snapshot order.
    pub fn restrict_to_orders(mut self, order_ids: &[OrderId]) -> Self {
        self.orders.retain(|order| order_ids.contains(&order.id));
        self
    }
}
