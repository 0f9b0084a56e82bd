use crate::core::error::{EngineError, Result};
use crate::core::ids::WithdrawalId;
use crate::core::partner::PartnerId;
use crate::ledger::book::PartnerBook;
use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct Slot {
    book: PartnerBook,
    /// Set when a committed state was found inconsistent.
    frozen: Option<String>,
    /// Dropped from the map after a failed first transaction; holders of a
    /// stale handle must look the partner up again.
    retired: bool,
}

type SlotRef = Arc<Mutex<Slot>>;

/// Transactional storage for partner books.
///
/// Each partner's book sits behind its own lock, so mutations for one
/// partner are serialized while different partners proceed in parallel.
#[derive(Debug, Default)]
pub struct LedgerStore {
    books: DashMap<PartnerId, SlotRef>,
    withdrawal_index: DashMap<WithdrawalId, PartnerId>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the partner's book, creating the book if needed.
    ///
    /// Either every change made by `f` is committed or none is. After `f`
    /// succeeds the book's invariants are checked; a violation freezes the
    /// partner and fails with `LedgerInconsistency`. A book created for a
    /// transaction that fails is discarded again.
    pub fn transact<T>(
        &self,
        partner: &PartnerId,
        f: impl FnOnce(&mut PartnerBook) -> Result<T>,
    ) -> Result<T> {
        loop {
            let slot = self.slot_or_create(partner);
            let mut guard = Self::lock(partner, &slot)?;
            if guard.retired {
                continue;
            }
            let result = Self::apply(partner, &mut guard, f);
            if result.is_err() && guard.frozen.is_none() && guard.book.is_blank() {
                guard.retired = true;
                self.books
                    .remove_if(partner, |_, current| Arc::ptr_eq(current, &slot));
            }
            return result;
        }
    }

    /// Like [`transact`](Self::transact), but returns `Ok(None)` without
    /// creating anything when the partner has no book yet.
    pub fn transact_existing<T>(
        &self,
        partner: &PartnerId,
        f: impl FnOnce(&mut PartnerBook) -> Result<T>,
    ) -> Result<Option<T>> {
        let Some(slot) = self.slot(partner) else {
            return Ok(None);
        };
        let mut guard = Self::lock(partner, &slot)?;
        if guard.retired {
            return Ok(None);
        }
        Self::apply(partner, &mut guard, f).map(Some)
    }

    /// Read-only access to a partner's book.
    pub fn read<T>(&self, partner: &PartnerId, f: impl FnOnce(&PartnerBook) -> T) -> Result<Option<T>> {
        match self.slot(partner) {
            Some(slot) => {
                let guard = Self::lock(partner, &slot)?;
                if guard.retired {
                    return Ok(None);
                }
                Ok(Some(f(&guard.book)))
            }
            None => Ok(None),
        }
    }

    pub fn contains(&self, partner: &PartnerId) -> bool {
        self.books.contains_key(partner)
    }

    /// All partners with a book, sorted.
    pub fn partners(&self) -> Vec<PartnerId> {
        let mut partners: Vec<PartnerId> = self.books.iter().map(|e| e.key().clone()).collect();
        partners.sort();
        partners
    }

    pub fn is_frozen(&self, partner: &PartnerId) -> bool {
        let Some(slot) = self.slot(partner) else {
            return false;
        };
        let frozen = match Self::lock(partner, &slot) {
            Ok(guard) => guard.frozen.is_some(),
            Err(_) => true,
        };
        frozen
    }

    /// Stop all mutation for a partner until [`unfreeze`](Self::unfreeze).
    pub fn freeze(&self, partner: &PartnerId, reason: impl Into<String>) -> Result<()> {
        let reason = reason.into();
        loop {
            let slot = self.slot_or_create(partner);
            let mut guard = Self::lock(partner, &slot)?;
            if guard.retired {
                continue;
            }
            guard.frozen = Some(reason);
            return Ok(());
        }
    }

    /// Lift a freeze after manual reconciliation.
    pub fn unfreeze(&self, partner: &PartnerId) -> Result<()> {
        if let Some(slot) = self.slot(partner) {
            let mut guard = Self::lock(partner, &slot)?;
            if guard.frozen.take().is_some() {
                log::warn!("ledger for partner {} unfrozen by operator", partner);
            }
        }
        Ok(())
    }

    pub(crate) fn index_withdrawal(&self, id: WithdrawalId, partner: &PartnerId) {
        self.withdrawal_index.insert(id, partner.clone());
    }

    pub fn withdrawal_owner(&self, id: WithdrawalId) -> Option<PartnerId> {
        self.withdrawal_index.get(&id).map(|p| p.clone())
    }

    fn slot(&self, partner: &PartnerId) -> Option<SlotRef> {
        self.books.get(partner).map(|slot| Arc::clone(slot.value()))
    }

    fn slot_or_create(&self, partner: &PartnerId) -> SlotRef {
        let entry = self.books.entry(partner.clone()).or_insert_with(|| {
            Arc::new(Mutex::new(Slot {
                book: PartnerBook::new(partner.clone()),
                frozen: None,
                retired: false,
            }))
        });
        Arc::clone(entry.value())
    }

    fn lock<'a>(partner: &PartnerId, slot: &'a SlotRef) -> Result<MutexGuard<'a, Slot>> {
        // A poisoned lock means a mutation panicked halfway through.
        slot.lock().map_err(|_| EngineError::LedgerInconsistency {
            partner: partner.clone(),
            detail: "book lock poisoned by an interrupted mutation".to_string(),
        })
    }

    fn apply<T>(
        partner: &PartnerId,
        guard: &mut Slot,
        f: impl FnOnce(&mut PartnerBook) -> Result<T>,
    ) -> Result<T> {
        if let Some(reason) = &guard.frozen {
            return Err(EngineError::LedgerInconsistency {
                partner: partner.clone(),
                detail: format!("ledger frozen: {}", reason),
            });
        }

        let checkpoint = guard.book.checkpoint();
        let outcome = f(&mut guard.book);
        let output = match outcome {
            Ok(output) => output,
            Err(e) => {
                guard.book.rollback(checkpoint);
                return Err(e);
            }
        };

        if let Err(detail) = guard.book.check_invariants() {
            guard.book.rollback(checkpoint);
            log::error!(
                "ledger inconsistency for partner {}: {} (mutations halted)",
                partner,
                detail
            );
            guard.frozen = Some(detail.clone());
            return Err(EngineError::LedgerInconsistency {
                partner: partner.clone(),
                detail,
            });
        }
        guard.book.commit();
        Ok(output)
    }
}
