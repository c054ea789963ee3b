// Core aggregates
pub mod commission;
pub mod order;

// Stock ledger records
pub mod stock;

// Reconciliation input/output
pub mod delivery;
