//! Real Varna locations for realistic test fixtures.
//!
//! Coordinates sourced from OpenStreetMap.

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }
}

// ============================================================================
// Warehouses (depots)
// ============================================================================

pub const WAREHOUSES: &[Location] = &[
    Location::new("Varna West Industrial Zone", 43.2187, 27.8654),
    Location::new("Asparuhovo Depot", 43.1818, 27.8985),
    Location::new("Vladislavovo Depot", 43.2585, 27.8859),
];

// ============================================================================
// Delivery addresses
// ============================================================================

pub const DELIVERIES: &[Location] = &[
    Location::new("Cathedral of the Assumption", 43.2050, 27.9105),
    Location::new("Sea Garden Entrance", 43.2036, 27.9198),
    Location::new("Grand Mall Varna", 43.2175, 27.8981),
    Location::new("Delfinarium", 43.2137, 27.9387),
    Location::new("Varna Archaeological Museum", 43.2082, 27.9143),
    Location::new("Palace of Culture and Sports", 43.2155, 27.9006),
    Location::new("Mall Varna", 43.2239, 27.8746),
    Location::new("Galata Beach", 43.1705, 27.9381),
];
