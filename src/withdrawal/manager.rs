use crate::core::clock::Clock;
use crate::core::error::{EngineError, Result};
use crate::core::ids::WithdrawalId;
use crate::core::partner::PartnerId;
use crate::core::settings::SettingsHandle;
use crate::ledger::balance::{Bucket, TransactionKind, TransactionRef};
use crate::ledger::book::PartnerBook;
use crate::ledger::store::LedgerStore;
use crate::withdrawal::model::{Decision, PixKey, Withdrawal, WithdrawalStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Validates cash-out requests and applies admin decisions.
///
/// Requested funds leave `available` for the `reserved` bucket at request
/// time, so the same money can never back two requests. Paying finalizes
/// the debit; rejecting or cancelling returns the funds to `available`.
pub struct WithdrawalManager {
    store: Arc<LedgerStore>,
    settings: SettingsHandle,
    clock: Arc<dyn Clock>,
}

impl WithdrawalManager {
    pub fn new(store: Arc<LedgerStore>, settings: SettingsHandle, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            settings,
            clock,
        }
    }

    pub fn request_withdrawal(
        &self,
        partner: &PartnerId,
        amount: Decimal,
        pix_key: &str,
    ) -> Result<Withdrawal> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::InvalidAmount(format!(
                "withdrawal amount must be positive, got {}",
                amount
            )));
        }
        let minimum = self.settings.current().min_withdrawal_amount;
        if amount < minimum {
            return Err(EngineError::BelowMinimum { amount, minimum });
        }
        let pix_key = PixKey::parse(pix_key)?;

        let now = self.clock.now();
        let withdrawal = Withdrawal {
            id: WithdrawalId::new(),
            partner_id: partner.clone(),
            amount,
            status: WithdrawalStatus::Pending,
            pix_key,
            requested_at: now,
            processed_at: None,
            notes: None,
        };

        let created = self.store.transact_existing(partner, |book| {
            book.mature(now)?;
            book.transfer(Bucket::Available, Bucket::Reserved, amount)?;
            book.push_withdrawal(withdrawal.clone());
            Ok(())
        })?;
        if created.is_none() {
            return Err(EngineError::InsufficientFunds {
                available: Decimal::ZERO,
                requested: amount,
            });
        }

        self.store.index_withdrawal(withdrawal.id, partner);
        log::info!(
            "withdrawal {} of {} requested by partner {}",
            withdrawal.id,
            amount,
            partner
        );
        Ok(withdrawal)
    }

    /// Apply an admin decision to a withdrawal.
    pub fn resolve_withdrawal(
        &self,
        id: WithdrawalId,
        decision: Decision,
        notes: Option<String>,
    ) -> Result<Withdrawal> {
        self.transition(id, decision.target(), notes)
    }

    pub fn approve(&self, id: WithdrawalId, notes: Option<String>) -> Result<Withdrawal> {
        self.transition(id, WithdrawalStatus::Approved, notes)
    }

    pub fn pay(&self, id: WithdrawalId, notes: Option<String>) -> Result<Withdrawal> {
        self.transition(id, WithdrawalStatus::Paid, notes)
    }

    pub fn reject(&self, id: WithdrawalId, notes: Option<String>) -> Result<Withdrawal> {
        self.transition(id, WithdrawalStatus::Rejected, notes)
    }

    /// Partner withdraws its own request before the admin acts on it.
    pub fn cancel(&self, id: WithdrawalId) -> Result<Withdrawal> {
        self.transition(id, WithdrawalStatus::Cancelled, None)
    }

    pub fn withdrawal(&self, id: WithdrawalId) -> Result<Withdrawal> {
        let partner = self
            .store
            .withdrawal_owner(id)
            .ok_or(EngineError::UnknownWithdrawal(id))?;
        self.store
            .read(&partner, |book| book.withdrawal(id).cloned())?
            .flatten()
            .ok_or(EngineError::UnknownWithdrawal(id))
    }

    /// Withdrawals, newest first, optionally filtered by partner and status.
    pub fn list_withdrawals(
        &self,
        partner: Option<&PartnerId>,
        status: Option<WithdrawalStatus>,
    ) -> Result<Vec<Withdrawal>> {
        let partners = match partner {
            Some(p) => vec![p.clone()],
            None => self.store.partners(),
        };
        let mut out = Vec::new();
        for p in &partners {
            let found = self.store.read(p, |book| {
                book.withdrawals()
                    .filter(|w| status.map_or(true, |s| w.status == s))
                    .cloned()
                    .collect::<Vec<_>>()
            })?;
            out.extend(found.unwrap_or_default());
        }
        out.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(out)
    }

    fn transition(
        &self,
        id: WithdrawalId,
        next: WithdrawalStatus,
        notes: Option<String>,
    ) -> Result<Withdrawal> {
        let partner = self
            .store
            .withdrawal_owner(id)
            .ok_or(EngineError::UnknownWithdrawal(id))?;
        let now = self.clock.now();

        let result = self
            .store
            .transact(&partner, |book| apply_transition(book, id, next, notes, now));
        match &result {
            Ok(w) => log::info!(
                "withdrawal {} for partner {} is now {} ({})",
                id,
                partner,
                w.status,
                w.amount
            ),
            Err(EngineError::InvalidTransition { from, to }) => log::warn!(
                "withdrawal {} cannot move {} -> {}; probable double submission",
                id,
                from,
                to
            ),
            Err(_) => {}
        }
        result
    }
}

fn apply_transition(
    book: &mut PartnerBook,
    id: WithdrawalId,
    next: WithdrawalStatus,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<Withdrawal> {
    let current = book
        .withdrawal(id)
        .ok_or(EngineError::UnknownWithdrawal(id))?;
    if !current.status.can_transition_to(next) {
        return Err(EngineError::transition(current.status, next));
    }
    let amount = current.amount;

    match next {
        WithdrawalStatus::Paid => {
            book.debit(Bucket::Reserved, amount)?;
            book.record_withdrawn(amount);
            book.append(
                TransactionKind::Withdrawal,
                -amount,
                TransactionRef::Withdrawal(id),
                notes.clone(),
                now,
            );
        }
        WithdrawalStatus::Rejected | WithdrawalStatus::Cancelled => {
            book.transfer(Bucket::Reserved, Bucket::Available, amount)?;
        }
        WithdrawalStatus::Approved | WithdrawalStatus::Pending => {}
    }

    book.update_withdrawal(id, |withdrawal| {
        withdrawal.status = next;
        if next.is_terminal() {
            withdrawal.processed_at = Some(now);
        }
        if notes.is_some() {
            withdrawal.notes = notes;
        }
    })
    .ok_or(EngineError::UnknownWithdrawal(id))
}
