//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use tokio::sync::watch;

use crate::types::*;

/// Storage abstraction for the GST ledger collection
///
/// This trait allows the GST core to work with any document store by implementing
/// these methods. A single document write is expected to be atomic; nothing else is.
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    /// Get an entry by ID
    async fn get_entry(&self, entry_id: &str) -> LedgerResult<Option<LedgerEntry>>;

    /// Write an entry at its own ID, replacing any document already there
    async fn put_entry(&self, entry: &LedgerEntry) -> LedgerResult<()>;

    /// Insert an entry under a store-generated ID and return the stored entry
    async fn create_entry(&self, entry: LedgerEntry) -> LedgerResult<LedgerEntry>;

    /// Merge a partial update into an existing entry
    ///
    /// Fails with [`LedgerError::EntryNotFound`] if the entry does not exist.
    async fn update_entry(
        &self,
        entry_id: &str,
        patch: &LedgerEntryPatch,
    ) -> LedgerResult<LedgerEntry>;

    /// Delete an entry; deleting a missing entry succeeds
    async fn delete_entry(&self, entry_id: &str) -> LedgerResult<()>;

    /// All entries whose `invoice_id` equals the given invoice
    async fn find_entries_by_invoice(&self, invoice_id: &str) -> LedgerResult<Vec<LedgerEntry>>;

    /// All entries, newest date first
    async fn list_entries(&self) -> LedgerResult<Vec<LedgerEntry>>;

    /// Write several entries at their own IDs as one atomic batch
    async fn commit_batch(&self, entries: &[LedgerEntry]) -> LedgerResult<()>;
}

/// Storage abstraction for filed GST returns
#[async_trait]
pub trait ReturnStorage: Send + Sync {
    /// Get a return by ID
    async fn get_return(&self, return_id: &str) -> LedgerResult<Option<ReturnFiling>>;

    /// Insert a return under a store-generated ID and return the stored filing
    async fn create_return(&self, filing: ReturnFiling) -> LedgerResult<ReturnFiling>;

    /// Merge a partial update into an existing return
    async fn update_return(
        &self,
        return_id: &str,
        patch: &ReturnPatch,
    ) -> LedgerResult<ReturnFiling>;

    /// All returns, newest period first
    async fn list_returns(&self) -> LedgerResult<Vec<ReturnFiling>>;

    /// Persist a return and mark every linked ledger entry as filed in one transaction
    ///
    /// Either the return is stored and all entries are flipped, or nothing changes.
    async fn commit_filing(
        &self,
        filing: ReturnFiling,
        entry_ids: &[String],
    ) -> LedgerResult<ReturnFiling>;
}

/// Storage abstraction for the invoice collection owned by the invoicing subsystem
#[async_trait]
pub trait InvoiceStorage: Send + Sync {
    /// Get an invoice by ID
    async fn get_invoice(&self, invoice_id: &str) -> LedgerResult<Option<Invoice>>;

    /// Create or replace an invoice
    async fn save_invoice(&self, invoice: &Invoice) -> LedgerResult<()>;

    /// Delete an invoice
    async fn delete_invoice(&self, invoice_id: &str) -> LedgerResult<()>;

    /// All invoices, newest first
    async fn list_invoices(&self) -> LedgerResult<Vec<Invoice>>;

    /// Subscribe to snapshots of the invoice collection (newest first)
    ///
    /// The receiver observes a fresh snapshot after every invoice write or delete.
    fn subscribe_invoices(&self) -> watch::Receiver<Vec<Invoice>>;
}
