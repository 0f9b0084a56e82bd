use crate::core::clock::Clock;
use crate::core::error::{EngineError, Result};
use crate::core::ids::OrderId;
use crate::core::order::{LineItem, Order, OrderStatus};
use crate::core::partner::{PartnerId, ProductId};
use crate::pricing::catalog::Catalog;
use crate::settlement::engine::{SettlementEngine, SettlementOutcome};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of a status update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub order_id: OrderId,
    pub previous: OrderStatus,
    pub current: OrderStatus,
    /// Present when the update entered `delivered`.
    pub settlement: Option<SettlementOutcome>,
}

/// Holds orders and drives their status pipeline.
///
/// A status change holds the order's entry for its whole duration, so two
/// concurrent "delivered" updates for one order run one after the other
/// and the second one sees `delivered` as its previous status.
pub struct OrderDesk {
    catalog: Arc<Catalog>,
    settlement: Arc<SettlementEngine>,
    clock: Arc<dyn Clock>,
    orders: DashMap<OrderId, Order>,
}

impl OrderDesk {
    pub fn new(catalog: Arc<Catalog>, settlement: Arc<SettlementEngine>, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog,
            settlement,
            clock,
            orders: DashMap::new(),
        }
    }

    /// Check out an order. Prices are frozen on the line items here.
    ///
    /// Partner orders sell at the partner's price; direct orders sell at
    /// the catalog cost price.
    pub fn place_order(&self, partner: Option<PartnerId>, items: &[(ProductId, u32)]) -> Result<Order> {
        let mut lines = Vec::with_capacity(items.len());
        for (product_id, quantity) in items {
            let product = self.catalog.product(product_id)?;
            if !product.active {
                return Err(EngineError::InactiveProduct(product_id.clone()));
            }
            let unit_price_sold = match &partner {
                Some(partner) => {
                    let entry = self
                        .catalog
                        .partner_product(partner, product_id)
                        .ok_or_else(|| EngineError::NotConfigured {
                            partner: partner.clone(),
                            product: product_id.clone(),
                        })?;
                    if !entry.active {
                        return Err(EngineError::InactiveProduct(product_id.clone()));
                    }
                    entry.selling_price
                }
                None => product.cost_price,
            };
            lines.push(LineItem::new(
                product_id.clone(),
                *quantity,
                unit_price_sold,
                product.cost_price,
            )?);
        }

        let order = Order::new(partner, lines, self.clock.now())?;
        let total = order.total()?;
        log::info!(
            "order {} placed for {} ({} line(s), total {})",
            order.id(),
            order
                .partner_id()
                .map(PartnerId::to_string)
                .unwrap_or_else(|| "direct sale".to_string()),
            order.line_items().len(),
            total
        );
        self.orders.insert(order.id(), order.clone());
        Ok(order)
    }

    /// Move an order along the pipeline.
    ///
    /// Entering `delivered` settles the order first; if settlement fails the
    /// status is left untouched and the error is returned so the caller can
    /// retry. Repeating the current status is a no-op.
    pub fn update_status(&self, order_id: OrderId, next: OrderStatus) -> Result<StatusChange> {
        let mut order = self
            .orders
            .get_mut(&order_id)
            .ok_or(EngineError::UnknownOrder(order_id))?;
        let previous = order.status();

        if !previous.can_transition_to(next) {
            log::warn!(
                "rejected status change for order {}: {} -> {}",
                order_id,
                previous,
                next
            );
            return Err(EngineError::transition(previous, next));
        }

        let settlement = if next == OrderStatus::Delivered {
            Some(self.settlement.settle_order(&order, previous)?)
        } else {
            None
        };

        if previous != next {
            order.set_status(next, self.clock.now());
            log::debug!("order {} moved {} -> {}", order_id, previous, next);
        }
        Ok(StatusChange {
            order_id,
            previous,
            current: next,
            settlement,
        })
    }

    pub fn order(&self, order_id: OrderId) -> Result<Order> {
        self.orders
            .get(&order_id)
            .map(|o| o.clone())
            .ok_or(EngineError::UnknownOrder(order_id))
    }

    /// A partner's orders, newest first.
    pub fn orders_for_partner(&self, partner: &PartnerId) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| o.partner_id() == Some(partner))
            .map(|o| o.clone())
            .collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        orders
    }
}
