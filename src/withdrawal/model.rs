use crate::core::error::{EngineError, Result};
use crate::core::ids::WithdrawalId;
use crate::core::partner::PartnerId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a cash-out request.
///
/// ```text
/// pending ──> approved ──> paid
///    │
///    ├──> paid
///    ├──> rejected
///    └──> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Paid,
}

impl WithdrawalStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WithdrawalStatus::Rejected | WithdrawalStatus::Cancelled | WithdrawalStatus::Paid
        )
    }

    /// Funds are still held in the reserved bucket.
    pub fn holds_funds(self) -> bool {
        matches!(self, WithdrawalStatus::Pending | WithdrawalStatus::Approved)
    }

    pub fn can_transition_to(self, next: WithdrawalStatus) -> bool {
        use WithdrawalStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Pending, Paid)
                | (Approved, Paid)
        )
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
            WithdrawalStatus::Cancelled => "cancelled",
            WithdrawalStatus::Paid => "paid",
        };
        f.write_str(s)
    }
}

/// PIX key the payout is sent to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PixKey(String);

impl PixKey {
    pub fn parse(raw: &str) -> Result<Self> {
        let key = raw.trim();
        if key.is_empty() {
            return Err(EngineError::InvalidDestination(
                "PIX key must not be empty".to_string(),
            ));
        }
        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PixKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: WithdrawalId,
    pub partner_id: PartnerId,
    pub amount: Decimal,
    pub status: WithdrawalStatus,
    pub pix_key: PixKey,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Admin decision on a withdrawal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Pay,
    Reject,
}

impl Decision {
    pub fn target(self) -> WithdrawalStatus {
        match self {
            Decision::Approve => WithdrawalStatus::Approved,
            Decision::Pay => WithdrawalStatus::Paid,
            Decision::Reject => WithdrawalStatus::Rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine() {
        use WithdrawalStatus::*;
        assert!(Pending.can_transition_to(Paid));
        assert!(Approved.can_transition_to(Paid));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Paid.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
        for terminal in [Paid, Rejected, Cancelled] {
            assert!(terminal.is_terminal());
            assert!(!terminal.holds_funds());
        }
    }

    #[test]
    fn test_pix_key_trimmed() {
        assert_eq!(PixKey::parse("  a@b.com ").unwrap().as_str(), "a@b.com");
        assert!(matches!(
            PixKey::parse("   "),
            Err(EngineError::InvalidDestination(_))
        ));
    }
}
