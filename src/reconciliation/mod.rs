//! Reconciliation between the invoice collection and the GST ledger

pub mod backfill;

pub use backfill::*;
