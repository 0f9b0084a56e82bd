//! Scripted scenarios: a JSON list of admin, partner and customer actions
//! replayed against a fresh set of services on a manual clock.

use crate::core::clock::ManualClock;
use crate::core::error::{EngineError, Result};
use crate::core::ids::{OrderId, WithdrawalId};
use crate::core::order::OrderStatus;
use crate::core::partner::{PartnerId, ProductId};
use crate::core::settings::PaymentSettings;
use crate::ledger::balance::{PartnerBalance, PartnerTransaction};
use crate::ledger::DateRange;
use crate::services::Services;
use crate::withdrawal::model::{Decision, Withdrawal};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemInput {
    pub product: ProductId,
    pub quantity: u32,
}

/// One scripted action. Orders and withdrawals are referred to by labels
/// chosen in the script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Product {
        id: ProductId,
        cost: Decimal,
        #[serde(default = "default_true")]
        active: bool,
    },
    SetCost {
        product: ProductId,
        cost: Decimal,
    },
    Price {
        partner: PartnerId,
        product: ProductId,
        price: Decimal,
    },
    Order {
        label: String,
        #[serde(default)]
        partner: Option<PartnerId>,
        items: Vec<ItemInput>,
    },
    Status {
        order: String,
        status: OrderStatus,
    },
    AdvanceDays {
        days: i64,
    },
    Sweep,
    Withdraw {
        label: String,
        partner: PartnerId,
        amount: Decimal,
        pix_key: String,
    },
    Resolve {
        withdrawal: String,
        decision: Decision,
        #[serde(default)]
        notes: Option<String>,
    },
    Cancel {
        withdrawal: String,
    },
    Adjust {
        partner: PartnerId,
        amount: Decimal,
        note: String,
    },
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub settings: Option<PaymentSettings>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    pub steps: Vec<Step>,
}

/// A step the services refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub step: usize,
    pub error: String,
    pub recoverable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerStatement {
    pub balance: PartnerBalance,
    pub transactions: Vec<PartnerTransaction>,
    pub withdrawals: Vec<Withdrawal>,
    pub consistent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    pub applied: usize,
    pub rejected: Vec<Rejection>,
    pub statements: Vec<PartnerStatement>,
}

impl std::fmt::Display for ReplayReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Replay ===")?;
        writeln!(f, "Steps applied:  {}", self.applied)?;
        writeln!(f, "Steps rejected: {}", self.rejected.len())?;
        for r in &self.rejected {
            writeln!(f, "  step {}: {}", r.step, r.error)?;
        }
        for s in &self.statements {
            writeln!(f)?;
            writeln!(f, "{}", s.balance)?;
            writeln!(
                f,
                "Reconciled:      {}",
                if s.consistent { "yes" } else { "NO" }
            )?;
            for tx in &s.transactions {
                writeln!(
                    f,
                    "  {} {:>10} {:>12} -> {}",
                    tx.created_at.format("%Y-%m-%d %H:%M"),
                    tx.kind,
                    tx.amount,
                    tx.balance_after
                )?;
            }
            for w in &s.withdrawals {
                writeln!(f, "  withdrawal {} {} [{}]", w.id, w.amount, w.status)?;
            }
        }
        Ok(())
    }
}

struct Replayer<'a> {
    services: &'a Services,
    clock: &'a ManualClock,
    orders: HashMap<String, OrderId>,
    withdrawals: HashMap<String, WithdrawalId>,
}

impl Replayer<'_> {
    fn order(&self, label: &str) -> Result<OrderId> {
        self.orders
            .get(label)
            .copied()
            .ok_or_else(|| EngineError::InvalidConfig(format!("unknown order label '{}'", label)))
    }

    fn withdrawal(&self, label: &str) -> Result<WithdrawalId> {
        self.withdrawals.get(label).copied().ok_or_else(|| {
            EngineError::InvalidConfig(format!("unknown withdrawal label '{}'", label))
        })
    }

    fn apply(&mut self, step: &Step) -> Result<()> {
        let s = self.services;
        match step {
            Step::Product { id, cost, active } => s.catalog.upsert_product(id.clone(), *cost, *active),
            Step::SetCost { product, cost } => s.catalog.set_cost_price(product, *cost),
            Step::Price {
                partner,
                product,
                price,
            } => s.resolver.set_selling_price(partner, product, *price).map(|_| ()),
            Step::Order {
                label,
                partner,
                items,
            } => {
                let items: Vec<(ProductId, u32)> = items
                    .iter()
                    .map(|i| (i.product.clone(), i.quantity))
                    .collect();
                let order = s.orders.place_order(partner.clone(), &items)?;
                self.orders.insert(label.clone(), order.id());
                Ok(())
            }
            Step::Status { order, status } => {
                let id = self.order(order)?;
                s.orders.update_status(id, *status).map(|_| ())
            }
            Step::AdvanceDays { days } => {
                let by = Duration::try_days(*days).ok_or_else(|| {
                    EngineError::InvalidConfig(format!("cannot advance by {} days", days))
                })?;
                self.clock.advance(by)
            }
            Step::Sweep => s.ledger.sweep_matured().map(|_| ()),
            Step::Withdraw {
                label,
                partner,
                amount,
                pix_key,
            } => {
                let w = s.withdrawals.request_withdrawal(partner, *amount, pix_key)?;
                self.withdrawals.insert(label.clone(), w.id);
                Ok(())
            }
            Step::Resolve {
                withdrawal,
                decision,
                notes,
            } => {
                let id = self.withdrawal(withdrawal)?;
                s.withdrawals
                    .resolve_withdrawal(id, *decision, notes.clone())
                    .map(|_| ())
            }
            Step::Cancel { withdrawal } => {
                let id = self.withdrawal(withdrawal)?;
                s.withdrawals.cancel(id).map(|_| ())
            }
            Step::Adjust {
                partner,
                amount,
                note,
            } => s.ledger.adjust(partner, *amount, note.clone()).map(|_| ()),
        }
    }
}

/// Replay a scenario against fresh services.
///
/// Refused steps are recorded and the replay carries on, the way a live
/// system keeps serving other requests after a validation error.
pub fn replay(scenario: &Scenario, settings: PaymentSettings) -> Result<ReplayReport> {
    let settings = scenario.settings.clone().unwrap_or(settings);
    settings.validate()?;
    let clock = Arc::new(ManualClock::new(scenario.start.unwrap_or_else(Utc::now)));
    let services = Services::new(settings, clock.clone());

    let mut replayer = Replayer {
        services: &services,
        clock: clock.as_ref(),
        orders: HashMap::new(),
        withdrawals: HashMap::new(),
    };
    let mut applied = 0;
    let mut rejected = Vec::new();
    for (i, step) in scenario.steps.iter().enumerate() {
        match replayer.apply(step) {
            Ok(()) => applied += 1,
            Err(e) => {
                log::debug!("step {} refused: {}", i, e);
                rejected.push(Rejection {
                    step: i,
                    recoverable: e.is_recoverable(),
                    error: e.to_string(),
                });
            }
        }
    }

    let mut statements = Vec::new();
    for partner in services.store.partners() {
        let balance = services.ledger.get_balance(&partner)?;
        let transactions = services
            .ledger
            .list_transactions(&partner, DateRange::all())?;
        let withdrawals = services.withdrawals.list_withdrawals(Some(&partner), None)?;
        let consistent = services.ledger.reconcile(&partner)?.is_consistent();
        statements.push(PartnerStatement {
            balance,
            transactions,
            withdrawals,
            consistent,
        });
    }

    Ok(ReplayReport {
        applied,
        rejected,
        statements,
    })
}
