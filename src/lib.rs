//! Fulfillment & reconciliation engine for a multi-location warehouse.
//!
//! This crate tracks item stock across a main warehouse and mobile vehicle
//! locations, drives replenishment orders and commission pick-lists through
//! their lifecycles, and matches externally parsed delivery notes against
//! open orders. Persistence, catalog lookups and the OCR step are injected
//! collaborators; the crate owns the invariants, not the I/O.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod catalog;
pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod services;
pub mod store;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::events::{Event, EventSender};
use crate::services::AppServices;
use crate::store::{CommissionStore, OrderStore, ReorderStore, StockStore};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub event_sender: Arc<EventSender>,
    pub services: AppServices,
}

impl AppState {
    /// Builds the full engine over the supplied stores and catalog, plus the
    /// receiving end of the event channel. The caller decides what consumes
    /// the receiver; [`events::process_events`] is the default loop.
    pub fn new(
        stock_store: Arc<dyn StockStore>,
        order_store: Arc<dyn OrderStore>,
        commission_store: Arc<dyn CommissionStore>,
        reorder_store: Arc<dyn ReorderStore>,
        catalog: Arc<dyn Catalog>,
        config: Arc<AppConfig>,
    ) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(config.event_channel_capacity);
        let event_sender = Arc::new(EventSender::new(tx));
        let services = AppServices::new(
            stock_store,
            order_store,
            commission_store,
            reorder_store,
            catalog,
            config.clone(),
            Some(event_sender.clone()),
        );

        (
            Self {
                config,
                event_sender,
                services,
            },
            rx,
        )
    }

    pub fn stock_ledger(&self) -> Arc<services::stock_ledger::StockLedger> {
        self.services.stock_ledger.clone()
    }

    pub fn order_service(&self) -> Arc<services::orders::OrderService> {
        self.services.orders.clone()
    }

    pub fn commission_service(&self) -> Arc<services::commissions::CommissionService> {
        self.services.commissions.clone()
    }

    pub fn reconciliation_service(&self) -> Arc<services::reconciliation::ReconciliationService> {
        self.services.reconciliation.clone()
    }
}
