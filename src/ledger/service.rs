use crate::core::clock::Clock;
use crate::core::error::{EngineError, Result};
use crate::core::money::round_currency;
use crate::core::partner::PartnerId;
use crate::ledger::balance::{
    Bucket, DateRange, PartnerBalance, PartnerTransaction, TransactionKind, TransactionRef,
};
use crate::ledger::book::ReconciliationReport;
use crate::ledger::store::LedgerStore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Summary of one maturity sweep across all partners.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub partners_updated: usize,
    pub amount_matured: Decimal,
    pub partners_skipped: Vec<PartnerId>,
}

/// Read surface over partner balances plus the maturity and
/// reconciliation jobs.
pub struct BalanceLedger {
    store: Arc<LedgerStore>,
    clock: Arc<dyn Clock>,
}

impl BalanceLedger {
    pub fn new(store: Arc<LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Current balance, with any matured sales moved to available first.
    ///
    /// A partner without sales gets an all-zero balance; nothing is stored.
    /// A frozen ledger is still readable but is not matured.
    pub fn get_balance(&self, partner: &PartnerId) -> Result<PartnerBalance> {
        let now = self.clock.now();
        let ripe = self
            .store
            .read(partner, |book| book.has_ripe_lots(now))?
            .unwrap_or(false);
        if ripe && !self.store.is_frozen(partner) {
            self.store
                .transact_existing(partner, |book| book.mature(now))?;
        }
        Ok(self
            .store
            .read(partner, |book| book.balance().clone())?
            .unwrap_or_else(|| PartnerBalance::empty(partner.clone())))
    }

    /// History inside `range`, newest first.
    pub fn list_transactions(
        &self,
        partner: &PartnerId,
        range: DateRange,
    ) -> Result<Vec<PartnerTransaction>> {
        let entries = self.store.read(partner, |book| {
            book.transactions()
                .iter()
                .rev()
                .filter(|tx| range.contains(tx.created_at))
                .cloned()
                .collect::<Vec<_>>()
        })?;
        let mut entries = entries.unwrap_or_default();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    /// Mature every partner's ripe sales. Frozen partners are skipped.
    pub fn sweep_matured(&self) -> Result<SweepReport> {
        let now = self.clock.now();
        let mut report = SweepReport::default();
        for partner in self.store.partners() {
            if self.store.is_frozen(&partner) {
                log::warn!("maturity sweep skipped frozen partner {}", partner);
                report.partners_skipped.push(partner);
                continue;
            }
            let moved = self
                .store
                .transact_existing(&partner, |book| book.mature(now))?
                .unwrap_or(Decimal::ZERO);
            if moved > Decimal::ZERO {
                report.partners_updated += 1;
                report.amount_matured += moved;
            }
        }
        log::info!(
            "maturity sweep moved {} for {} partner(s)",
            report.amount_matured,
            report.partners_updated
        );
        Ok(report)
    }

    /// Re-derive a partner's totals from its history.
    ///
    /// Any discrepancy freezes the partner's ledger.
    pub fn reconcile(&self, partner: &PartnerId) -> Result<ReconciliationReport> {
        let report = self
            .store
            .read(partner, |book| book.reconcile())?
            .unwrap_or_else(|| ReconciliationReport {
                balance: PartnerBalance::empty(partner.clone()),
                earned_from_history: Decimal::ZERO,
                withdrawn_from_history: Decimal::ZERO,
                transaction_count: 0,
                discrepancies: Vec::new(),
            });
        if !report.is_consistent() {
            let detail = report.discrepancies.join("; ");
            log::error!(
                "reconciliation failed for partner {}: {} (mutations halted)",
                partner,
                detail
            );
            self.store.freeze(partner, detail)?;
        }
        Ok(report)
    }

    /// Admin correction on the available bucket.
    ///
    /// Positive amounts credit, negative amounts debit. Counted in
    /// `total_earned` and recorded as an `adjustment` entry.
    pub fn adjust(
        &self,
        partner: &PartnerId,
        amount: Decimal,
        note: impl Into<String>,
    ) -> Result<PartnerTransaction> {
        let amount = round_currency(amount);
        if amount == Decimal::ZERO {
            return Err(EngineError::InvalidAmount(
                "adjustment must not be zero".to_string(),
            ));
        }
        let note = note.into();
        let now = self.clock.now();
        let entry = self.store.transact(partner, |book| {
            if amount > Decimal::ZERO {
                book.credit(Bucket::Available, amount)?;
            } else {
                book.debit(Bucket::Available, -amount)?;
            }
            book.record_earning(amount);
            Ok(book.append(
                TransactionKind::Adjustment,
                amount,
                TransactionRef::Manual,
                Some(note),
                now,
            ))
        })?;
        log::info!("adjustment of {} posted for partner {}", amount, partner);
        Ok(entry)
    }

    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }
}
