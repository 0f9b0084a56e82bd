use crate::core::ids::{OrderId, TransactionId, WithdrawalId};
use crate::core::money::within_tolerance;
use crate::core::partner::PartnerId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which running total a credit or debit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// Earned, still inside the holding period.
    Pending,
    /// Earned and withdrawable.
    Available,
    /// Backing a withdrawal request that is not yet paid or released.
    Reserved,
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Pending => f.write_str("pending"),
            Bucket::Available => f.write_str("available"),
            Bucket::Reserved => f.write_str("reserved"),
        }
    }
}

/// Running totals for one partner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerBalance {
    pub partner_id: PartnerId,
    pub available_balance: Decimal,
    pub pending_balance: Decimal,
    pub reserved_balance: Decimal,
    pub total_earned: Decimal,
    pub total_withdrawn: Decimal,
}

impl PartnerBalance {
    pub fn empty(partner_id: PartnerId) -> Self {
        Self {
            partner_id,
            available_balance: Decimal::ZERO,
            pending_balance: Decimal::ZERO,
            reserved_balance: Decimal::ZERO,
            total_earned: Decimal::ZERO,
            total_withdrawn: Decimal::ZERO,
        }
    }

    pub fn bucket(&self, bucket: Bucket) -> Decimal {
        match bucket {
            Bucket::Pending => self.pending_balance,
            Bucket::Available => self.available_balance,
            Bucket::Reserved => self.reserved_balance,
        }
    }

    pub(crate) fn bucket_mut(&mut self, bucket: Bucket) -> &mut Decimal {
        match bucket {
            Bucket::Pending => &mut self.pending_balance,
            Bucket::Available => &mut self.available_balance,
            Bucket::Reserved => &mut self.reserved_balance,
        }
    }

    /// Everything earned and not yet paid out: `total_earned - total_withdrawn`.
    pub fn net(&self) -> Decimal {
        self.total_earned - self.total_withdrawn
    }

    /// Sum of the three buckets.
    pub fn held(&self) -> Decimal {
        self.available_balance + self.pending_balance + self.reserved_balance
    }

    /// `available + pending + reserved == total_earned - total_withdrawn`
    pub fn is_consistent(&self) -> bool {
        within_tolerance(self.held(), self.net())
    }
}

impl fmt::Display for PartnerBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Balance: {} ===", self.partner_id)?;
        writeln!(f, "Available:       {}", self.available_balance)?;
        writeln!(f, "Pending:         {}", self.pending_balance)?;
        writeln!(f, "Reserved:        {}", self.reserved_balance)?;
        writeln!(f, "Total earned:    {}", self.total_earned)?;
        write!(f, "Total withdrawn: {}", self.total_withdrawn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Sale,
    Withdrawal,
    Adjustment,
    Refund,
}

impl TransactionKind {
    /// Kinds that count towards `total_earned`.
    pub fn is_earning(self) -> bool {
        !matches!(self, TransactionKind::Withdrawal)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionKind::Sale => "sale",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::Adjustment => "adjustment",
            TransactionKind::Refund => "refund",
        };
        f.pad(s)
    }
}

/// What caused a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum TransactionRef {
    Order(OrderId),
    Withdrawal(WithdrawalId),
    Manual,
}

/// Immutable entry in a partner's transaction history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerTransaction {
    pub id: TransactionId,
    pub partner_id: PartnerId,
    pub kind: TransactionKind,
    /// Signed: credits positive, debits negative.
    pub amount: Decimal,
    /// `total_earned - total_withdrawn` right after this entry.
    pub balance_after: Decimal,
    pub reference: TransactionRef,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Inclusive time window for history queries. Open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at <= to)
    }
}
