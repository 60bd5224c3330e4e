//! Order-to-warehouse feasibility and proximity matching.
//!
//! This is a diagnostic ranking pass, not an allocator: every order is
//! evaluated against the full stock of every warehouse, with no reservation
//! carried from one order to the next.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{Inventory, Order, OrderId, ProductId, Warehouse, WarehouseId};

/// Score of an order no warehouse can fully serve. Real scores are always
/// positive.
pub const NO_MATCH_SCORE: f64 = -1.0;

/// Weight of inventory depth relative to proximity.
const DEPTH_WEIGHT: f64 = 0.1;

/// A product the warehouse cannot supply in the requested quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Shortage {
    pub product_id: ProductId,
    pub required: u64,
    pub available: u64,
}

impl Shortage {
    pub const fn missing(&self) -> u64 {
        self.required.saturating_sub(self.available)
    }
}

/// Best source warehouse for one order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRecord {
    pub order_index: usize,
    pub order_id: OrderId,
    /// Position in the warehouse list, `None` when nothing is feasible.
    pub warehouse_index: Option<usize>,
    pub warehouse_id: Option<WarehouseId>,
    /// Higher is better; [`NO_MATCH_SCORE`] when unmatched.
    pub score: f64,
    pub distance_meters: Option<f64>,
    /// For unmatched orders, what the nearest warehouse is missing.
    pub shortages: Vec<Shortage>,
}

impl MatchRecord {
    pub fn is_matched(&self) -> bool {
        self.warehouse_index.is_some()
    }
}

/// Products in `order` that `stock` cannot cover, sorted by product id.
/// Empty means the warehouse can serve the whole order.
pub fn inventory_shortages(stock: &HashMap<ProductId, u64>, order: &Order) -> Vec<Shortage> {
    shortages_for(stock, &order.requested())
}

fn shortages_for(stock: &HashMap<ProductId, u64>, requested: &HashMap<ProductId, u64>) -> Vec<Shortage> {
    let mut shortages: Vec<_> = requested
        .iter()
        .filter_map(|(&product_id, &required)| {
            let available = stock.get(&product_id).copied().unwrap_or(0);
            (available < required).then_some(Shortage {
                product_id,
                required,
                available,
            })
        })
        .collect();
    shortages.sort_unstable_by_key(|shortage| shortage.product_id);
    shortages
}

/// Proximity dominates; stock depth of the requested products breaks near-ties
/// in favour of the warehouse with more slack.
fn pair_score(distance: f64, stock: &HashMap<ProductId, u64>, requested: &HashMap<ProductId, u64>) -> f64 {
    let depth: u64 = requested
        .keys()
        .map(|product_id| stock.get(product_id).copied().unwrap_or(0))
        .fold(0, u64::saturating_add);
    1000.0 / distance.max(1.0) + DEPTH_WEIGHT * depth as f64
}

/// Pick the best feasible warehouse for each order.
///
/// Returns one record per order, in input order. Among feasible warehouses the
/// strictly highest score wins; ties keep the earlier warehouse.
pub fn match_orders_to_warehouses<'a, I>(
    orders: I,
    warehouses: &[Warehouse],
    inventory: &Inventory,
) -> Vec<MatchRecord>
where
    I: IntoIterator<Item = &'a Order>,
{
    let stocks: Vec<_> = warehouses
        .iter()
        .map(|warehouse| inventory.stock_for(warehouse.id))
        .collect();

    orders
        .into_iter()
        .enumerate()
        .map(|(order_index, order)| match_order(order_index, order, warehouses, &stocks))
        .collect()
}

fn match_order(
    order_index: usize,
    order: &Order,
    warehouses: &[Warehouse],
    stocks: &[HashMap<ProductId, u64>],
) -> MatchRecord {
    let requested = order.requested();
    let mut best: Option<(usize, f64, f64)> = None;
    let mut nearest_infeasible: Option<(f64, Vec<Shortage>)> = None;

    for (warehouse_index, (warehouse, stock)) in warehouses.iter().zip(stocks).enumerate() {
        let distance = warehouse.location.distance_to(&order.location);
        let shortages = shortages_for(stock, &requested);

        if !shortages.is_empty() {
            if nearest_infeasible.as_ref().is_none_or(|(nearest, _)| distance < *nearest) {
                nearest_infeasible = Some((distance, shortages));
            }
            continue;
        }

        let score = pair_score(distance, stock, &requested);
        if best.is_none_or(|(_, best_score, _)| score > best_score) {
            best = Some((warehouse_index, score, distance));
        }
    }

    match best {
        Some((warehouse_index, score, distance)) => MatchRecord {
            order_index,
            order_id: order.id,
            warehouse_index: Some(warehouse_index),
            warehouse_id: Some(warehouses[warehouse_index].id),
            score,
            distance_meters: Some(distance),
            shortages: Vec::new(),
        },
        None => {
            tracing::debug!(order_id = order.id, "no warehouse can serve order");
            MatchRecord {
                order_index,
                order_id: order.id,
                warehouse_index: None,
                warehouse_id: None,
                score: NO_MATCH_SCORE,
                distance_meters: None,
                shortages: nearest_infeasible.map(|(_, shortages)| shortages).unwrap_or_default(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Coordinate, StockLine};

    fn stock(warehouse_id: WarehouseId, product_id: ProductId, quantity: u64) -> StockLine {
        StockLine { warehouse_id, product_id, quantity }
    }

    #[test]
    fn test_fully_stocked_warehouse_is_matched() {
        let warehouses = vec![Warehouse::new(1, "W1", Coordinate::new(43.21, 27.91))];
        let inventory = Inventory::from_lines([stock(1, 100, 10)]);
        let orders = vec![Order::new(1, Coordinate::new(43.22, 27.92)).with_item(100, 5)];

        let matches = match_orders_to_warehouses(&orders, &warehouses, &inventory);

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].order_index, 0);
        assert_eq!(matches[0].warehouse_index, Some(0));
        assert_eq!(matches[0].warehouse_id, Some(1));
        assert!(matches[0].score > 0.0);
    }

    #[test]
    fn test_huge_stock_depth_saturates() {
        let warehouses = vec![Warehouse::new(1, "W1", Coordinate::new(43.21, 27.91))];
        let inventory = Inventory::from_lines([stock(1, 100, u64::MAX), stock(1, 200, u64::MAX)]);
        let orders = vec![
            Order::new(1, Coordinate::new(43.22, 27.92))
                .with_item(100, 1)
                .with_item(200, 1),
        ];

        let matches = match_orders_to_warehouses(&orders, &warehouses, &inventory);

        assert!(matches[0].is_matched());
        assert!(matches[0].score.is_finite());
    }

    #[test]
    fn test_exact_quantity_is_enough() {
        let warehouses = vec![Warehouse::new(1, "W1", Coordinate::new(43.21, 27.91))];
        let inventory = Inventory::from_lines([stock(1, 100, 5)]);
        let orders = vec![Order::new(1, Coordinate::new(43.22, 27.92)).with_item(100, 5)];

        let matches = match_orders_to_warehouses(&orders, &warehouses, &inventory);
        assert!(matches[0].is_matched());
    }

    #[test]
    fn test_insufficient_stock_is_unmatched() {
        let warehouses = vec![
            Warehouse::new(1, "Near", Coordinate::new(43.21, 27.91)),
            Warehouse::new(2, "Far", Coordinate::new(43.50, 27.50)),
        ];
        let inventory = Inventory::from_lines([stock(1, 100, 4), stock(2, 200, 9)]);
        let orders = vec![Order::new(1, Coordinate::new(43.22, 27.92)).with_item(100, 5)];

        let matches = match_orders_to_warehouses(&orders, &warehouses, &inventory);

        assert_eq!(matches[0].warehouse_index, None);
        assert_eq!(matches[0].score, NO_MATCH_SCORE);
        assert_eq!(
            matches[0].shortages,
            vec![Shortage { product_id: 100, required: 5, available: 4 }],
            "shortages come from the nearest warehouse"
        );
    }

    #[test]
    fn test_closer_warehouse_wins() {
        let warehouses = vec![
            Warehouse::new(1, "Far", Coordinate::new(43.50, 27.50)),
            Warehouse::new(2, "Near", Coordinate::new(43.215, 27.915)),
        ];
        let inventory = Inventory::from_lines([stock(1, 100, 50), stock(2, 100, 5)]);
        let orders = vec![Order::new(1, Coordinate::new(43.22, 27.92)).with_item(100, 5)];

        let matches = match_orders_to_warehouses(&orders, &warehouses, &inventory);
        assert_eq!(matches[0].warehouse_id, Some(2));
    }

    #[test]
    fn test_depth_breaks_distance_ties() {
        let location = Coordinate::new(43.21, 27.91);
        let warehouses = vec![
            Warehouse::new(1, "Shallow", location),
            Warehouse::new(2, "Deep", location),
        ];
        let inventory = Inventory::from_lines([stock(1, 100, 5), stock(2, 100, 20)]);
        let orders = vec![Order::new(1, Coordinate::new(43.22, 27.92)).with_item(100, 5)];

        let matches = match_orders_to_warehouses(&orders, &warehouses, &inventory);
        assert_eq!(matches[0].warehouse_id, Some(2));
    }

    #[test]
    fn test_exact_tie_keeps_first_warehouse() {
        let location = Coordinate::new(43.21, 27.91);
        let warehouses = vec![
            Warehouse::new(1, "First", location),
            Warehouse::new(2, "Second", location),
        ];
        let inventory = Inventory::from_lines([stock(1, 100, 8), stock(2, 100, 8)]);
        let orders = vec![Order::new(1, Coordinate::new(43.22, 27.92)).with_item(100, 5)];

        let matches = match_orders_to_warehouses(&orders, &warehouses, &inventory);
        assert_eq!(matches[0].warehouse_index, Some(0));
    }

    #[test]
    fn test_no_cross_order_reservation() {
        let warehouses = vec![Warehouse::new(1, "W1", Coordinate::new(43.21, 27.91))];
        let inventory = Inventory::from_lines([stock(1, 100, 5)]);
        let orders = vec![
            Order::new(1, Coordinate::new(43.22, 27.92)).with_item(100, 5),
            Order::new(2, Coordinate::new(43.23, 27.93)).with_item(100, 5),
        ];

        let matches = match_orders_to_warehouses(&orders, &warehouses, &inventory);
        assert!(matches.iter().all(MatchRecord::is_matched));
        assert_eq!(inventory.capacity(1), 5);
    }

    #[test]
    fn test_score_within_one_meter_is_capped() {
        let requested = HashMap::from([(100, 1)]);
        let stock = HashMap::from([(100, 10)]);
        assert_eq!(pair_score(0.0, &stock, &requested), 1000.0 + 1.0);
        assert_eq!(pair_score(0.5, &stock, &requested), 1000.0 + 1.0);
    }

    #[test]
    fn test_inventory_shortages_lists_every_gap() {
        let stock = HashMap::from([(1, 3), (2, 10)]);
        let order = Order::new(1, Coordinate::new(43.22, 27.92))
            .with_item(3, 1)
            .with_item(1, 4)
            .with_item(2, 10);

        let shortages = inventory_shortages(&stock, &order);
        assert_eq!(
            shortages,
            vec![
                Shortage { product_id: 1, required: 4, available: 3 },
                Shortage { product_id: 3, required: 1, available: 0 },
            ]
        );
        assert_eq!(shortages[0].missing(), 1);
    }
}
