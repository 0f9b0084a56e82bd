use crate::core::ids::{OrderId, WithdrawalId};
use crate::core::partner::{PartnerId, ProductId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised by the pricing, settlement, ledger and withdrawal services.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("selling price {selling} must exceed cost price {cost}")]
    InvalidPrice { selling: Decimal, cost: Decimal },

    #[error("partner {partner} has not priced product {product}")]
    NotConfigured {
        partner: PartnerId,
        product: ProductId,
    },

    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },

    #[error("amount {amount} is below the minimum of {minimum}")]
    BelowMinimum { amount: Decimal, minimum: Decimal },

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("ledger inconsistency for partner {partner}: {detail}")]
    LedgerInconsistency { partner: PartnerId, detail: String },

    #[error("unknown product {0}")]
    UnknownProduct(ProductId),

    #[error("product {0} is not active")]
    InactiveProduct(ProductId),

    #[error("unknown order {0}")]
    UnknownOrder(OrderId),

    #[error("unknown withdrawal {0}")]
    UnknownWithdrawal(WithdrawalId),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid payout destination: {0}")]
    InvalidDestination(String),

    #[error("order has no line items")]
    EmptyOrder,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// Whether the caller can act on this error.
    ///
    /// A ledger inconsistency signals a bug and needs manual reconciliation.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, EngineError::LedgerInconsistency { .. })
    }

    pub(crate) fn transition(from: impl ToString, to: impl ToString) -> Self {
        EngineError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
