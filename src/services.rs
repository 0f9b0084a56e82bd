use crate::core::clock::Clock;
use crate::core::settings::{PaymentSettings, SettingsHandle};
use crate::ledger::{BalanceLedger, LedgerStore};
use crate::orders::OrderDesk;
use crate::pricing::{Catalog, PriceResolver};
use crate::settlement::SettlementEngine;
use crate::withdrawal::WithdrawalManager;
use std::sync::Arc;

/// Every service wired to one shared store, settings handle and clock.
///
/// Nothing here is global; build one per process (or per test) and pass
/// references to whoever needs them.
pub struct Services {
    pub settings: SettingsHandle,
    pub catalog: Arc<Catalog>,
    pub store: Arc<LedgerStore>,
    pub resolver: PriceResolver,
    pub settlement: Arc<SettlementEngine>,
    pub orders: OrderDesk,
    pub ledger: BalanceLedger,
    pub withdrawals: WithdrawalManager,
}

impl Services {
    pub fn new(settings: PaymentSettings, clock: Arc<dyn Clock>) -> Self {
        let settings = SettingsHandle::new(settings);
        let catalog = Arc::new(Catalog::new());
        let store = Arc::new(LedgerStore::new());
        let settlement = Arc::new(SettlementEngine::new(
            catalog.clone(),
            store.clone(),
            settings.clone(),
            clock.clone(),
        ));
        Self {
            resolver: PriceResolver::new(catalog.clone(), clock.clone()),
            orders: OrderDesk::new(catalog.clone(), settlement.clone(), clock.clone()),
            ledger: BalanceLedger::new(store.clone(), clock.clone()),
            withdrawals: WithdrawalManager::new(store.clone(), settings.clone(), clock),
            settings,
            catalog,
            store,
            settlement,
        }
    }
}
