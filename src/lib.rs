//! # GST Ledger
//!
//! Indian GST bookkeeping for a small-business invoicing system: a ledger of collected and
//! paid tax, kept in step with invoices, summarized per period and filed as returns.
//!
//! ## Features
//!
//! - **Tax calculation**: line and document totals with an exact CGST/SGST split
//! - **GST ledger**: manual entries, merge updates and idempotent deletes over any store
//! - **Invoice sync**: one collected entry per invoice, upserted at a deterministic ID
//! - **Backfill**: batched catch-up for invoices that never got an entry
//! - **Returns**: period summaries, reports and monthly or quarterly return filing
//! - **Storage abstraction**: database-agnostic design with trait-based storage
//!
//! ## Quick Start
//!
//! ```rust
//! use gst_ledger::{compute_document_totals, LineItem};
//! use bigdecimal::BigDecimal;
//!
//! let items = vec![LineItem::new(
//!     BigDecimal::from(2),
//!     BigDecimal::from(500),
//!     BigDecimal::from(18),
//! )];
//! let totals = compute_document_totals(&items, BigDecimal::from(0));
//!
//! assert_eq!(totals.tax_amount, BigDecimal::from(180));
//! assert_eq!(totals.cgst, totals.sgst);
//! assert_eq!(totals.total, BigDecimal::from(1180));
//! ```

pub mod config;
pub mod ledger;
pub mod period;
pub mod reconciliation;
pub mod render;
pub mod returns;
pub mod tax;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::*;
pub use ledger::*;
pub use period::*;
pub use reconciliation::*;
pub use render::*;
pub use returns::*;
pub use tax::gst::*;
pub use traits::*;
pub use types::*;

// Re-export entry derivations for convenience
pub use ledger::entry::patterns;
