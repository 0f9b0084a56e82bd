use crate::core::error::{EngineError, Result};
use crate::core::ids::OrderId;
use crate::core::money::{checked, ensure_unit_price};
use crate::core::partner::{PartnerId, ProductId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of an order in the fulfilment pipeline.
///
/// The pipeline only moves forward. `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    fn rank(self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Confirmed => 1,
            OrderStatus::Preparing => 2,
            OrderStatus::OutForDelivery => 3,
            OrderStatus::Delivered => 4,
            OrderStatus::Cancelled => 5,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Whether an order may move from `self` to `next`.
    ///
    /// Staying in the same status is allowed and means "nothing to do".
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        if self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        next == OrderStatus::Cancelled || next.rank() > self.rank()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One line of an order. Immutable once the order is placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Price charged per unit, frozen at checkout.
    pub unit_price_sold: Decimal,
    /// Product cost per unit when the order was placed.
    pub unit_cost_at_order: Decimal,
}

impl LineItem {
    pub fn new(
        product_id: ProductId,
        quantity: u32,
        unit_price_sold: Decimal,
        unit_cost_at_order: Decimal,
    ) -> Result<Self> {
        if quantity == 0 {
            return Err(EngineError::InvalidAmount(format!(
                "quantity for {} must be positive",
                product_id
            )));
        }
        if unit_price_sold < Decimal::ZERO {
            return Err(EngineError::InvalidAmount(format!(
                "unit price for {} must not be negative, got {}",
                product_id, unit_price_sold
            )));
        }
        ensure_unit_price(format_args!("unit price for {}", product_id), unit_price_sold)?;
        Ok(Self {
            product_id,
            quantity,
            unit_price_sold,
            unit_cost_at_order,
        })
    }

    pub fn subtotal(&self) -> Result<Decimal> {
        checked(
            self.unit_price_sold.checked_mul(Decimal::from(self.quantity)),
            "line subtotal",
        )
    }
}

/// A customer order placed through a storefront.
///
/// `partner_id == None` marks a direct sale by the admin, which earns
/// no partner profit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    partner_id: Option<PartnerId>,
    status: OrderStatus,
    line_items: Vec<LineItem>,
    created_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(
        partner_id: Option<PartnerId>,
        line_items: Vec<LineItem>,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        if line_items.is_empty() {
            return Err(EngineError::EmptyOrder);
        }
        let order = Self {
            id: OrderId::new(),
            partner_id,
            status: OrderStatus::Pending,
            line_items,
            created_at,
            delivered_at: None,
        };
        order.total()?;
        Ok(order)
    }

    // --- Accessors ---

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn partner_id(&self) -> Option<&PartnerId> {
        self.partner_id.as_ref()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    /// Amount the customer paid.
    pub fn total(&self) -> Result<Decimal> {
        self.line_items.iter().try_fold(Decimal::ZERO, |total, item| {
            checked(total.checked_add(item.subtotal()?), "order total")
        })
    }

    pub(crate) fn set_status(&mut self, status: OrderStatus, at: DateTime<Utc>) {
        if status == OrderStatus::Delivered && self.delivered_at.is_none() {
            self.delivered_at = Some(at);
        }
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(qty: u32, price: Decimal) -> LineItem {
        LineItem::new(ProductId::new("burger"), qty, price, dec!(20.00)).unwrap()
    }

    #[test]
    fn test_pipeline_moves_forward_only() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Delivered));
        assert!(Preparing.can_transition_to(Cancelled));
        assert!(!Preparing.can_transition_to(Confirmed));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(Delivered.can_transition_to(Delivered));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let result = LineItem::new(ProductId::new("x"), 0, dec!(1), dec!(1));
        assert!(matches!(result, Err(EngineError::InvalidAmount(_))));
    }

    #[test]
    fn test_unit_price_above_cap_rejected() {
        let price = crate::core::money::MAX_UNIT_PRICE + dec!(1);
        let result = LineItem::new(ProductId::new("x"), 1, price, dec!(1));
        assert!(matches!(result, Err(EngineError::InvalidAmount(_))));
    }

    #[test]
    fn test_overflowing_total_is_an_error() {
        let huge = LineItem {
            product_id: ProductId::new("x"),
            quantity: 100,
            unit_price_sold: Decimal::MAX / dec!(10),
            unit_cost_at_order: dec!(1),
        };
        assert!(matches!(huge.subtotal(), Err(EngineError::InvalidAmount(_))));
        let result = Order::new(None, vec![huge], Utc::now());
        assert!(matches!(result, Err(EngineError::InvalidAmount(_))));
    }

    #[test]
    fn test_empty_order_rejected() {
        let result = Order::new(None, vec![], Utc::now());
        assert_eq!(result.unwrap_err(), EngineError::EmptyOrder);
    }

    #[test]
    fn test_order_total() {
        let order = Order::new(
            Some(PartnerId::new("p")),
            vec![item(3, dec!(28.00)), item(1, dec!(10.50))],
            Utc::now(),
        )
        .unwrap();
        assert_eq!(order.total().unwrap(), dec!(94.50));
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[test]
    fn test_delivered_at_recorded_once() {
        let mut order = Order::new(None, vec![item(1, dec!(5))], Utc::now()).unwrap();
        let at = Utc::now();
        order.set_status(OrderStatus::Delivered, at);
        order.set_status(OrderStatus::Delivered, at + chrono::Duration::hours(1));
        assert_eq!(order.delivered_at(), Some(at));
    }
}
