//! Urgency score per order from delivery time and order value.

use chrono::{DateTime, NaiveDateTime, Timelike};

use crate::error::DataQualityWarning;
use crate::model::Order;

const BASE_SCORE: u8 = 5;
const MAX_SCORE: u8 = 10;
const MIN_SCORE: u8 = 1;

/// Naive layouts seen in upstream delivery timestamps.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

/// Hour of day of a delivery timestamp.
///
/// Timestamps with an offset keep their own wall-clock hour; naive ones are
/// taken as local delivery time.
pub fn parse_delivery_hour(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.hour());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|timestamp| timestamp.hour())
}

fn time_bonus(hour: u32) -> u8 {
    match hour {
        0..10 => 3,
        10..14 => 1,
        _ => 0,
    }
}

fn value_bonus(total: f64) -> u8 {
    if total > 1000.0 {
        2
    } else if total > 500.0 {
        1
    } else {
        0
    }
}

/// Score an order in `[1, 10]`, logging a warning when the delivery time
/// cannot be used.
pub fn score_order(order: &Order) -> u8 {
    let (score, warning) = score_order_with_diagnostics(order);
    if let Some(warning) = warning {
        tracing::warn!(%warning, "scoring without delivery-time bonus");
    }
    score
}

/// Score an order and return the data-quality warning, if any, instead of
/// logging it.
pub fn score_order_with_diagnostics(order: &Order) -> (u8, Option<DataQualityWarning>) {
    let (time, warning) = match order.delivery_at.as_deref() {
        Some(raw) => match parse_delivery_hour(raw) {
            Some(hour) => (time_bonus(hour), None),
            None => (
                0,
                Some(DataQualityWarning::UnparsableDeliveryTime {
                    order_id: order.id,
                    raw: raw.to_string(),
                }),
            ),
        },
        None => (0, Some(DataQualityWarning::MissingDeliveryTime { order_id: order.id })),
    };

    let score = (BASE_SCORE + time + value_bonus(order.total)).clamp(MIN_SCORE, MAX_SCORE);
    (score, warning)
}
