//! Per-partner running totals and the append-only transaction history.

pub mod balance;
pub mod book;
pub mod service;
pub mod store;

pub use balance::{Bucket, DateRange, PartnerBalance, PartnerTransaction, TransactionKind, TransactionRef};
pub use book::{PartnerBook, PendingLot, ReconciliationReport};
pub use service::{BalanceLedger, SweepReport};
pub use store::LedgerStore;
