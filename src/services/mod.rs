use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::events::EventSender;
use crate::store::{CommissionStore, OrderStore, ReorderStore, StockStore};

// Core services
pub mod commissions;
pub mod orders;
pub mod reconciliation;
pub mod stock_ledger;

/// Per-key async lock table. Guards one aggregate's (or one ledger key's)
/// read-modify-write cycle without serializing unrelated keys; locks are
/// created lazily on first use and never removed.
#[derive(Debug)]
pub struct KeyedLocks<K: Eq + Hash + Clone> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Acquires the lock for `key`, creating it on first use.
    pub async fn acquire(&self, key: K) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

/// Services layer that encapsulates the business logic used by the caller's
/// API or UI layer.
#[derive(Clone)]
pub struct AppServices {
    pub stock_ledger: Arc<stock_ledger::StockLedger>,
    pub orders: Arc<orders::OrderService>,
    pub commissions: Arc<commissions::CommissionService>,
    pub reconciliation: Arc<reconciliation::ReconciliationService>,
}

impl AppServices {
    /// Wires the full service stack over the supplied stores and catalog.
    /// All services share one stock ledger so per-key serialization holds
    /// across order receipts and commission toggles alike.
    pub fn new(
        stock_store: Arc<dyn StockStore>,
        order_store: Arc<dyn OrderStore>,
        commission_store: Arc<dyn CommissionStore>,
        reorder_store: Arc<dyn ReorderStore>,
        catalog: Arc<dyn Catalog>,
        config: Arc<AppConfig>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        let stock_ledger = Arc::new(stock_ledger::StockLedger::new(
            stock_store,
            event_sender.clone(),
        ));
        let orders = Arc::new(orders::OrderService::new(
            order_store,
            reorder_store,
            stock_ledger.clone(),
            catalog.clone(),
            config.clone(),
            event_sender.clone(),
        ));
        let commissions = Arc::new(commissions::CommissionService::new(
            commission_store,
            stock_ledger.clone(),
            config,
            event_sender.clone(),
        ));
        let reconciliation = Arc::new(reconciliation::ReconciliationService::new(
            orders.clone(),
            catalog,
            event_sender,
        ));

        Self {
            stock_ledger,
            orders,
            commissions,
            reconciliation,
        }
    }
}
