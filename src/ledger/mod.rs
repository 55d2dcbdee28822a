//! Ledger module containing entry recording and invoice synchronization

pub mod core;
pub mod entry;
pub mod sync;

pub use self::core::*;
pub use entry::{invoice_entry_id, LedgerEntryBuilder, INVOICE_ENTRY_PREFIX};
pub use sync::*;
