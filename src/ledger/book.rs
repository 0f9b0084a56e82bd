use crate::core::error::{EngineError, Result};
use crate::core::ids::{TransactionId, WithdrawalId};
use crate::core::money::within_tolerance;
use crate::core::partner::PartnerId;
use crate::ledger::balance::{
    Bucket, PartnerBalance, PartnerTransaction, TransactionKind, TransactionRef,
};
use crate::withdrawal::model::Withdrawal;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Profit from one sale waiting out the holding period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingLot {
    pub transaction_id: TransactionId,
    pub amount: Decimal,
    pub matures_at: DateTime<Utc>,
}

/// Everything the ledger knows about one partner.
///
/// The book is only mutated inside [`LedgerStore::transact`], which
/// rolls back every change made by a failed closure. Undo state covers
/// open items only (pending lots, unresolved withdrawals), so the cost of
/// a transaction does not grow with the partner's history.
///
/// [`LedgerStore::transact`]: crate::ledger::store::LedgerStore::transact
#[derive(Debug, Clone)]
pub struct PartnerBook {
    balance: PartnerBalance,
    transactions: Vec<PartnerTransaction>,
    /// Ordered by `matures_at`.
    lots: VecDeque<PendingLot>,
    lots_total: Decimal,
    lot_journal: Vec<LotChange>,
    open_withdrawals: Vec<Withdrawal>,
    closed_withdrawals: Vec<Withdrawal>,
}

#[derive(Debug, Clone)]
enum LotChange {
    Added(TransactionId),
    /// Lots taken off the front of the queue, in queue order.
    Matured(Vec<PendingLot>),
}

/// State needed to undo a failed transaction. History and closed
/// withdrawals are append-only, so their lengths are enough.
#[derive(Debug, Clone)]
pub(crate) struct Checkpoint {
    balance: PartnerBalance,
    open_withdrawals: Vec<Withdrawal>,
    closed_len: usize,
    transactions_len: usize,
}

impl PartnerBook {
    pub fn new(partner_id: PartnerId) -> Self {
        Self {
            balance: PartnerBalance::empty(partner_id),
            transactions: Vec::new(),
            lots: VecDeque::new(),
            lots_total: Decimal::ZERO,
            lot_journal: Vec::new(),
            open_withdrawals: Vec::new(),
            closed_withdrawals: Vec::new(),
        }
    }

    // --- Reads ---

    pub fn partner_id(&self) -> &PartnerId {
        &self.balance.partner_id
    }

    pub fn balance(&self) -> &PartnerBalance {
        &self.balance
    }

    /// History in posting order (oldest first).
    pub fn transactions(&self) -> &[PartnerTransaction] {
        &self.transactions
    }

    /// Lots still inside the holding period, earliest maturity first.
    pub fn pending_lots(&self) -> &VecDeque<PendingLot> {
        &self.lots
    }

    /// Every withdrawal: resolved ones in resolution order, then open ones.
    pub fn withdrawals(&self) -> impl Iterator<Item = &Withdrawal> {
        self.closed_withdrawals
            .iter()
            .chain(self.open_withdrawals.iter())
    }

    /// Withdrawals still holding reserved funds.
    pub fn open_withdrawals(&self) -> &[Withdrawal] {
        &self.open_withdrawals
    }

    pub fn withdrawal(&self, id: WithdrawalId) -> Option<&Withdrawal> {
        self.open_withdrawals
            .iter()
            .find(|w| w.id == id)
            .or_else(|| self.closed_withdrawals.iter().find(|w| w.id == id))
    }

    /// No history, no open items and all totals zero.
    pub(crate) fn is_blank(&self) -> bool {
        self.transactions.is_empty()
            && self.lots.is_empty()
            && self.open_withdrawals.is_empty()
            && self.closed_withdrawals.is_empty()
            && self.balance == PartnerBalance::empty(self.balance.partner_id.clone())
    }

    // --- Primitives ---

    pub fn credit(&mut self, bucket: Bucket, amount: Decimal) -> Result<()> {
        ensure_positive(amount)?;
        *self.balance.bucket_mut(bucket) += amount;
        Ok(())
    }

    /// Fails with `InsufficientFunds` rather than drive a bucket negative.
    pub fn debit(&mut self, bucket: Bucket, amount: Decimal) -> Result<()> {
        ensure_positive(amount)?;
        let current = self.balance.bucket(bucket);
        if amount > current {
            return Err(EngineError::InsufficientFunds {
                available: current,
                requested: amount,
            });
        }
        *self.balance.bucket_mut(bucket) -= amount;
        Ok(())
    }

    pub fn transfer(&mut self, from: Bucket, to: Bucket, amount: Decimal) -> Result<()> {
        self.debit(from, amount)?;
        self.credit(to, amount)
    }

    /// Signed change to `total_earned`.
    pub fn record_earning(&mut self, amount: Decimal) {
        self.balance.total_earned += amount;
    }

    pub fn record_withdrawn(&mut self, amount: Decimal) {
        self.balance.total_withdrawn += amount;
    }

    /// Append an entry to the history. `balance_after` is taken from the
    /// current totals, so update them first.
    pub fn append(
        &mut self,
        kind: TransactionKind,
        amount: Decimal,
        reference: TransactionRef,
        description: Option<String>,
        at: DateTime<Utc>,
    ) -> PartnerTransaction {
        let entry = PartnerTransaction {
            id: TransactionId::new(),
            partner_id: self.balance.partner_id.clone(),
            kind,
            amount,
            balance_after: self.balance.net(),
            reference,
            description,
            created_at: at,
        };
        self.transactions.push(entry.clone());
        entry
    }

    pub fn add_lot(&mut self, transaction_id: TransactionId, amount: Decimal, matures_at: DateTime<Utc>) {
        let at = self.lots.partition_point(|lot| lot.matures_at <= matures_at);
        self.lots.insert(
            at,
            PendingLot {
                transaction_id,
                amount,
                matures_at,
            },
        );
        self.lots_total += amount;
        self.lot_journal.push(LotChange::Added(transaction_id));
    }

    /// True when at least one lot has finished its holding period.
    pub fn has_ripe_lots(&self, now: DateTime<Utc>) -> bool {
        self.lots.front().map_or(false, |lot| lot.matures_at <= now)
    }

    /// Move every lot whose holding period has ended from pending to
    /// available. Returns the amount moved.
    pub fn mature(&mut self, now: DateTime<Utc>) -> Result<Decimal> {
        let ripe_count = self.lots.partition_point(|lot| lot.matures_at <= now);
        if ripe_count == 0 {
            return Ok(Decimal::ZERO);
        }
        let ripe: Vec<PendingLot> = self.lots.drain(..ripe_count).collect();
        let moved: Decimal = ripe.iter().map(|lot| lot.amount).sum();
        self.lots_total -= moved;
        let count = ripe.len();
        self.lot_journal.push(LotChange::Matured(ripe));

        if moved > Decimal::ZERO {
            self.transfer(Bucket::Pending, Bucket::Available, moved)?;
            log::debug!(
                "matured {} from {} sale(s) for partner {}",
                moved,
                count,
                self.balance.partner_id
            );
        }
        Ok(moved)
    }

    /// Record a new, unresolved withdrawal.
    pub fn push_withdrawal(&mut self, withdrawal: Withdrawal) {
        self.open_withdrawals.push(withdrawal);
    }

    /// Apply `f` to an open withdrawal and return its new state. A
    /// withdrawal that reaches a terminal status moves to the closed list.
    /// Resolved withdrawals cannot be changed.
    pub fn update_withdrawal(
        &mut self,
        id: WithdrawalId,
        f: impl FnOnce(&mut Withdrawal),
    ) -> Option<Withdrawal> {
        let at = self.open_withdrawals.iter().position(|w| w.id == id)?;
        f(&mut self.open_withdrawals[at]);
        if self.open_withdrawals[at].status.is_terminal() {
            let closed = self.open_withdrawals.remove(at);
            self.closed_withdrawals.push(closed.clone());
            Some(closed)
        } else {
            Some(self.open_withdrawals[at].clone())
        }
    }

    // --- Consistency ---

    /// Checks the invariants every committed book must satisfy.
    ///
    /// Full history reconciliation lives in [`PartnerBook::reconcile`];
    /// this check only looks at the running totals and open items.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let b = &self.balance;
        for bucket in [Bucket::Pending, Bucket::Available, Bucket::Reserved] {
            if b.bucket(bucket) < Decimal::ZERO {
                return Err(format!("{} bucket is negative: {}", bucket, b.bucket(bucket)));
            }
        }
        if !b.is_consistent() {
            return Err(format!(
                "buckets hold {} but earned - withdrawn is {}",
                b.held(),
                b.net()
            ));
        }
        if !within_tolerance(self.lots_total, b.pending_balance) {
            return Err(format!(
                "pending lots total {} but pending balance is {}",
                self.lots_total, b.pending_balance
            ));
        }
        if let Some(w) = self.open_withdrawals.iter().find(|w| !w.status.holds_funds()) {
            return Err(format!("withdrawal {} is {} but still open", w.id, w.status));
        }
        let open: Decimal = self.open_withdrawals.iter().map(|w| w.amount).sum();
        if !within_tolerance(open, b.reserved_balance) {
            return Err(format!(
                "open withdrawals total {} but reserved balance is {}",
                open, b.reserved_balance
            ));
        }
        Ok(())
    }

    /// Re-derive totals from the transaction history.
    pub fn reconcile(&self) -> ReconciliationReport {
        let mut earned_from_history = Decimal::ZERO;
        let mut withdrawn_from_history = Decimal::ZERO;
        for tx in &self.transactions {
            if tx.kind.is_earning() {
                earned_from_history += tx.amount;
            } else {
                withdrawn_from_history -= tx.amount;
            }
        }

        let mut discrepancies = Vec::new();
        if !within_tolerance(earned_from_history, self.balance.total_earned) {
            discrepancies.push(format!(
                "total_earned {} but history sums to {}",
                self.balance.total_earned, earned_from_history
            ));
        }
        if !within_tolerance(withdrawn_from_history, self.balance.total_withdrawn) {
            discrepancies.push(format!(
                "total_withdrawn {} but history sums to {}",
                self.balance.total_withdrawn, withdrawn_from_history
            ));
        }
        let lots: Decimal = self.lots.iter().map(|l| l.amount).sum();
        if !within_tolerance(lots, self.lots_total) {
            discrepancies.push(format!(
                "pending lots sum to {} but their running total is {}",
                lots, self.lots_total
            ));
        }
        if let Err(detail) = self.check_invariants() {
            discrepancies.push(detail);
        }

        ReconciliationReport {
            balance: self.balance.clone(),
            earned_from_history,
            withdrawn_from_history,
            transaction_count: self.transactions.len(),
            discrepancies,
        }
    }

    pub(crate) fn checkpoint(&mut self) -> Checkpoint {
        self.lot_journal.clear();
        Checkpoint {
            balance: self.balance.clone(),
            open_withdrawals: self.open_withdrawals.clone(),
            closed_len: self.closed_withdrawals.len(),
            transactions_len: self.transactions.len(),
        }
    }

    /// Forget the undo journal of a committed transaction.
    pub(crate) fn commit(&mut self) {
        self.lot_journal.clear();
    }

    pub(crate) fn rollback(&mut self, checkpoint: Checkpoint) {
        while let Some(change) = self.lot_journal.pop() {
            match change {
                LotChange::Added(id) => {
                    if let Some(at) = self.lots.iter().position(|l| l.transaction_id == id) {
                        if let Some(lot) = self.lots.remove(at) {
                            self.lots_total -= lot.amount;
                        }
                    }
                }
                LotChange::Matured(ripe) => {
                    for lot in ripe.into_iter().rev() {
                        self.lots_total += lot.amount;
                        self.lots.push_front(lot);
                    }
                }
            }
        }
        self.balance = checkpoint.balance;
        self.open_withdrawals = checkpoint.open_withdrawals;
        self.closed_withdrawals.truncate(checkpoint.closed_len);
        self.transactions.truncate(checkpoint.transactions_len);
    }
}

fn ensure_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(EngineError::InvalidAmount(format!(
            "ledger amounts must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

/// Outcome of re-deriving a partner's totals from its history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub balance: PartnerBalance,
    pub earned_from_history: Decimal,
    pub withdrawn_from_history: Decimal,
    pub transaction_count: usize,
    pub discrepancies: Vec<String>,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.discrepancies.is_empty()
    }
}
