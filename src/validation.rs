//! Structural checks run on a payload before it is sent to the solver.

use std::fmt;

use serde::Serialize;

use crate::error::ValidationError;
use crate::payload::OptimizationPayload;

/// A single defect found in a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ValidationIssue {
    NoDepots,
    NoOrders,
    DepotMissingCoordinates { depot_index: usize },
    OrderMissingCoordinates { order_index: usize },
    LocationCountMismatch { locations: usize, expected: usize },
    VectorWidthMismatch { location_index: usize, width: usize, expected: usize },
    DepotIndicesMismatch,
    VehicleCountMismatch { num_vehicles: usize, expected: usize },
    EndpointOutOfRange { location_index: usize },
    AnnotationLengthMismatch { field: &'static str, len: usize, expected: usize },
    /// Non-fatal: the order is still routed with an all-zero demand.
    OrderWithoutDemand { order_index: usize },
}

impl ValidationIssue {
    /// Fatal issues block submission; the rest are reported as warnings.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::OrderWithoutDemand { .. })
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDepots => write!(f, "payload has no depots"),
            Self::NoOrders => write!(f, "payload has no orders"),
            Self::DepotMissingCoordinates { depot_index } => {
                write!(f, "depot {depot_index} has no usable coordinates")
            }
            Self::OrderMissingCoordinates { order_index } => {
                write!(f, "order {order_index} has no usable coordinates")
            }
            Self::LocationCountMismatch { locations, expected } => {
                write!(f, "{locations} locations for {expected} depots and orders")
            }
            Self::VectorWidthMismatch { location_index, width, expected } => write!(
                f,
                "vector for location {location_index} has {width} columns, expected {expected}"
            ),
            Self::DepotIndicesMismatch => write!(f, "depot_indices do not cover the depot prefix"),
            Self::VehicleCountMismatch { num_vehicles, expected } => {
                write!(f, "num_vehicles is {num_vehicles}, expected {expected}")
            }
            Self::EndpointOutOfRange { location_index } => {
                write!(f, "vehicle endpoint {location_index} is not a known location")
            }
            Self::AnnotationLengthMismatch { field, len, expected } => {
                write!(f, "{field} has {len} entries, expected {expected}")
            }
            Self::OrderWithoutDemand { order_index } => {
                write!(f, "order {order_index} has no line items")
            }
        }
    }
}

/// Outcome of [`validate_payload`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// Warnings on success, every fatal issue otherwise.
    pub fn into_result(self) -> Result<Vec<ValidationIssue>, ValidationError> {
        if self.issues.is_empty() {
            Ok(self.warnings)
        } else {
            Err(ValidationError { issues: self.issues })
        }
    }

    fn push(&mut self, issue: ValidationIssue) {
        if issue.is_fatal() {
            self.issues.push(issue);
        } else {
            self.warnings.push(issue);
        }
    }
}

fn has_coordinates(location: &[f64; 2]) -> bool {
    let [lat, lng] = *location;
    lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng)
        && !(lat == 0.0 && lng == 0.0)
}

/// Check a payload for everything that would make the solver reject or
/// misread it. Collects every issue rather than stopping at the first.
pub fn validate_payload(payload: &OptimizationPayload) -> ValidationReport {
    let mut report = ValidationReport::default();
    let depots = payload.vehicle_capacities.len();
    let orders = payload.demands.len();
    let expected_locations = depots + orders;

    if depots == 0 {
        report.push(ValidationIssue::NoDepots);
    }
    if orders == 0 {
        report.push(ValidationIssue::NoOrders);
    }
    if payload.locations.len() != expected_locations {
        report.push(ValidationIssue::LocationCountMismatch {
            locations: payload.locations.len(),
            expected: expected_locations,
        });
    }

    for (index, location) in payload.locations.iter().enumerate() {
        if has_coordinates(location) {
            continue;
        }
        if index < depots {
            report.push(ValidationIssue::DepotMissingCoordinates { depot_index: index });
        } else {
            report.push(ValidationIssue::OrderMissingCoordinates { order_index: index - depots });
        }
    }

    let width = payload
        .vehicle_capacities
        .first()
        .or(payload.demands.first())
        .map_or(0, Vec::len);
    for (location_index, vector) in payload
        .vehicle_capacities
        .iter()
        .chain(payload.demands.iter())
        .enumerate()
    {
        if vector.len() != width {
            report.push(ValidationIssue::VectorWidthMismatch {
                location_index,
                width: vector.len(),
                expected: width,
            });
        }
    }

    if !payload.depot_indices.iter().copied().eq(0..depots) {
        report.push(ValidationIssue::DepotIndicesMismatch);
    }

    validate_fleet(payload, depots, &mut report);
    validate_annotations(payload, orders, &mut report);

    for (order_index, demand) in payload.demands.iter().enumerate() {
        if demand.iter().all(|quantity| *quantity == 0) {
            report.push(ValidationIssue::OrderWithoutDemand { order_index });
        }
    }

    report
}

fn validate_fleet(payload: &OptimizationPayload, depots: usize, report: &mut ValidationReport) {
    let explicit = payload.starts.is_some() || payload.ends.is_some();
    if !explicit {
        if payload.num_vehicles != depots {
            report.push(ValidationIssue::VehicleCountMismatch {
                num_vehicles: payload.num_vehicles,
                expected: depots,
            });
        }
        return;
    }

    for (field, endpoints) in [("starts", &payload.starts), ("ends", &payload.ends)] {
        let Some(endpoints) = endpoints else { continue };
        if endpoints.len() != payload.num_vehicles {
            report.push(ValidationIssue::AnnotationLengthMismatch {
                field,
                len: endpoints.len(),
                expected: payload.num_vehicles,
            });
        }
        for &location_index in endpoints {
            if location_index >= payload.locations.len() {
                report.push(ValidationIssue::EndpointOutOfRange { location_index });
            }
        }
    }
}

fn validate_annotations(payload: &OptimizationPayload, orders: usize, report: &mut ValidationReport) {
    if payload.priorities.len() != orders {
        report.push(ValidationIssue::AnnotationLengthMismatch {
            field: "priorities",
            len: payload.priorities.len(),
            expected: orders,
        });
    }
    let locations = payload.locations.len();
    if let Some(service_times) = &payload.service_times {
        if service_times.len() != locations {
            report.push(ValidationIssue::AnnotationLengthMismatch {
                field: "service_times",
                len: service_times.len(),
                expected: locations,
            });
        }
    }
    if let Some(time_windows) = &payload.time_windows {
        if time_windows.len() != locations {
            report.push(ValidationIssue::AnnotationLengthMismatch {
                field: "time_windows",
                len: time_windows.len(),
                expected: locations,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_payload() -> OptimizationPayload {
        OptimizationPayload {
            locations: vec![[43.21, 27.91], [43.22, 27.92]],
            vehicle_capacities: vec![vec![10]],
            demands: vec![vec![5]],
            num_vehicles: 1,
            depot_indices: vec![0],
            priorities: vec![5],
            ..OptimizationPayload::default()
        }
    }

    #[test]
    fn test_valid_payload_has_no_issues() {
        let report = validate_payload(&valid_payload());
        assert!(report.is_valid(), "{:?}", report.issues);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_empty_payload_reports_both_sides() {
        let report = validate_payload(&OptimizationPayload::default());
        assert!(report.issues.contains(&ValidationIssue::NoDepots));
        assert!(report.issues.contains(&ValidationIssue::NoOrders));
    }

    #[test]
    fn test_zero_coordinates_flag_the_right_side() {
        let mut payload = valid_payload();
        payload.locations = vec![[0.0, 0.0], [f64::NAN, 27.92]];

        let report = validate_payload(&payload);
        assert!(report.issues.contains(&ValidationIssue::DepotMissingCoordinates { depot_index: 0 }));
        assert!(report.issues.contains(&ValidationIssue::OrderMissingCoordinates { order_index: 0 }));
    }

    #[test]
    fn test_shape_mismatch() {
        let mut payload = valid_payload();
        payload.demands = vec![vec![5, 1]];
        payload.locations.push([43.3, 27.9]);

        let report = validate_payload(&payload);
        assert!(report.issues.contains(&ValidationIssue::VectorWidthMismatch {
            location_index: 1,
            width: 2,
            expected: 1,
        }));
        assert!(report.issues.contains(&ValidationIssue::LocationCountMismatch {
            locations: 3,
            expected: 2,
        }));
    }

    #[test]
    fn test_zero_demand_is_only_a_warning() {
        let mut payload = valid_payload();
        payload.demands = vec![vec![0]];

        let warnings = validate_payload(&payload).into_result().unwrap();
        assert_eq!(warnings, vec![ValidationIssue::OrderWithoutDemand { order_index: 0 }]);
    }

    #[test]
    fn test_explicit_fleet_endpoints() {
        let mut payload = valid_payload();
        payload.num_vehicles = 2;
        payload.starts = Some(vec![0, 0]);
        payload.ends = Some(vec![0, 7]);

        let report = validate_payload(&payload);
        assert_eq!(report.issues, vec![ValidationIssue::EndpointOutOfRange { location_index: 7 }]);
    }

    #[test]
    fn test_vehicle_count_must_match_depots_without_endpoints() {
        let mut payload = valid_payload();
        payload.num_vehicles = 3;

        let report = validate_payload(&payload);
        assert_eq!(
            report.issues,
            vec![ValidationIssue::VehicleCountMismatch { num_vehicles: 3, expected: 1 }]
        );
    }
}
