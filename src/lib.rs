//! # storefront-ledger
//!
//! Pricing, balance and settlement engine for multi-tenant delivery
//! storefronts.
//!
//! An admin owns the catalog and its cost prices. Partners resell a subset
//! of it at their own selling price; every delivered order turns the margin
//! into partner balance, which matures after a holding period and can then
//! be withdrawn.
//!
//! ## Architecture
//!
//! - **core** — Identifiers, money, orders, settings, clock, errors
//! - **pricing** — Catalog data and the cost/selling price resolver
//! - **settlement** — Converts delivered orders into posted profit
//! - **ledger** — Per-partner balances, transaction history, maturity
//! - **withdrawal** — Cash-out requests and admin resolution
//! - **orders** — Order status pipeline that triggers settlement
//! - **simulation** — Scenario replay and random load generation

pub mod core;
pub mod ledger;
pub mod orders;
pub mod pricing;
pub mod services;
pub mod settlement;
pub mod simulation;
pub mod withdrawal;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::core::clock::{Clock, ManualClock, SystemClock};
    pub use crate::core::error::{EngineError, Result};
    pub use crate::core::ids::{OrderId, TransactionId, WithdrawalId};
    pub use crate::core::order::{LineItem, Order, OrderStatus};
    pub use crate::core::partner::{PartnerId, ProductId};
    pub use crate::core::settings::{CostBasis, PaymentSettings};
    pub use crate::ledger::{Bucket, DateRange, PartnerBalance, PartnerTransaction, TransactionKind};
    pub use crate::services::Services;
    pub use crate::settlement::{DeliveryEvent, SettlementOutcome};
    pub use crate::withdrawal::{Decision, Withdrawal, WithdrawalStatus};
}
