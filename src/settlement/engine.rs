use crate::core::clock::Clock;
use crate::core::error::{EngineError, Result};
use crate::core::ids::{OrderId, TransactionId};
use crate::core::money::{checked, round_currency};
use crate::core::order::{LineItem, Order, OrderStatus};
use crate::core::partner::PartnerId;
use crate::core::settings::{CostBasis, SettingsHandle};
use crate::ledger::balance::{Bucket, TransactionKind, TransactionRef};
use crate::ledger::store::LedgerStore;
use crate::pricing::catalog::Catalog;
use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Inbound "order delivered" event for callers that keep order state
/// outside this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryEvent {
    pub order_id: OrderId,
    pub partner_id: Option<PartnerId>,
    pub line_items: Vec<LineItem>,
    /// Status the order had before this update.
    pub previous_status: OrderStatus,
}

impl DeliveryEvent {
    pub fn from_order(order: &Order, previous_status: OrderStatus) -> Self {
        Self {
            order_id: order.id(),
            partner_id: order.partner_id().cloned(),
            line_items: order.line_items().to_vec(),
            previous_status,
        }
    }
}

/// What settling a delivery did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SettlementOutcome {
    Posted {
        partner_id: PartnerId,
        amount: Decimal,
        transaction_id: TransactionId,
    },
    /// No partner on the order.
    DirectSale,
    /// The order was already delivered; nothing posted again.
    AlreadyDelivered,
    /// Margins summed to zero or less; nothing posted.
    NoProfit { profit: Decimal },
}

/// Turns delivered orders into partner profit.
///
/// # Algorithm
///
/// 1. Skip direct sales and repeated deliveries.
/// 2. Per line: `(unit_price_sold - cost) * quantity`, with cost taken
///    according to [`CostBasis`].
/// 3. Sum the lines. Losing lines offset winning ones.
/// 4. Post nothing unless the sum is positive.
/// 5. In one ledger transaction: credit pending, grow `total_earned`,
///    append the `sale` entry and open a maturity lot.
pub struct SettlementEngine {
    catalog: Arc<Catalog>,
    store: Arc<LedgerStore>,
    settings: SettingsHandle,
    clock: Arc<dyn Clock>,
}

impl SettlementEngine {
    pub fn new(
        catalog: Arc<Catalog>,
        store: Arc<LedgerStore>,
        settings: SettingsHandle,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            store,
            settings,
            clock,
        }
    }

    /// Total partner profit across `items`, before rounding.
    pub fn order_profit(&self, items: &[LineItem], basis: CostBasis) -> Result<Decimal> {
        let mut profit = Decimal::ZERO;
        for item in items {
            let cost = match basis {
                CostBasis::CurrentAtDelivery => self.catalog.cost_price(&item.product_id)?,
                CostBasis::FrozenAtOrder => item.unit_cost_at_order,
            };
            let margin = checked(item.unit_price_sold.checked_sub(cost), "line margin")?;
            let line = checked(margin.checked_mul(Decimal::from(item.quantity)), "line profit")?;
            profit = checked(profit.checked_add(line), "order profit")?;
        }
        Ok(profit)
    }

    pub fn settle(&self, event: &DeliveryEvent) -> Result<SettlementOutcome> {
        self.settle_lines(
            event.order_id,
            event.partner_id.as_ref(),
            &event.line_items,
            event.previous_status,
        )
    }

    pub fn settle_order(&self, order: &Order, previous_status: OrderStatus) -> Result<SettlementOutcome> {
        self.settle_lines(
            order.id(),
            order.partner_id(),
            order.line_items(),
            previous_status,
        )
    }

    fn settle_lines(
        &self,
        order_id: OrderId,
        partner: Option<&PartnerId>,
        items: &[LineItem],
        previous_status: OrderStatus,
    ) -> Result<SettlementOutcome> {
        let Some(partner) = partner else {
            log::debug!("order {} is a direct sale; no partner profit", order_id);
            return Ok(SettlementOutcome::DirectSale);
        };
        if previous_status == OrderStatus::Delivered {
            log::debug!("order {} was already delivered; skipping settlement", order_id);
            return Ok(SettlementOutcome::AlreadyDelivered);
        }

        let settings = self.settings.current();
        let profit = round_currency(self.order_profit(items, settings.cost_basis)?);
        if profit <= Decimal::ZERO {
            log::debug!(
                "order {} for partner {} has no profit ({}); nothing posted",
                order_id,
                partner,
                profit
            );
            return Ok(SettlementOutcome::NoProfit { profit });
        }

        let now = self.clock.now();
        let matures_at = Duration::try_days(i64::from(settings.min_days_to_withdraw))
            .and_then(|hold| now.checked_add_signed(hold))
            .ok_or_else(|| {
                EngineError::InvalidConfig(format!(
                    "holding period of {} days puts maturity out of range",
                    settings.min_days_to_withdraw
                ))
            })?;
        let entry = self.store.transact(partner, |book| {
            book.credit(Bucket::Pending, profit)?;
            book.record_earning(profit);
            let entry = book.append(
                TransactionKind::Sale,
                profit,
                TransactionRef::Order(order_id),
                None,
                now,
            );
            book.add_lot(entry.id, profit, matures_at);
            Ok(entry)
        })?;

        log::info!(
            "settled order {}: {} credited to partner {} (pending until {})",
            order_id,
            profit,
            partner,
            matures_at
        );
        Ok(SettlementOutcome::Posted {
            partner_id: partner.clone(),
            amount: profit,
            transaction_id: entry.id,
        })
    }
}
