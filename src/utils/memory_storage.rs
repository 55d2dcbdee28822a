//! In-memory storage implementation for testing

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;

use crate::traits::*;
use crate::types::*;

/// Store operations that can be made to fail on purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOp {
    GetEntry,
    PutEntry,
    CreateEntry,
    UpdateEntry,
    DeleteEntry,
    FindEntries,
    ListEntries,
    CommitBatch,
    GetReturn,
    CreateReturn,
    UpdateReturn,
    ListReturns,
    CommitFiling,
    GetInvoice,
    SaveInvoice,
    DeleteInvoice,
    ListInvoices,
}

#[derive(Debug, Default)]
struct FailurePlan {
    /// Fail every call of these operations
    all: HashSet<StorageOp>,
    /// Fail only calls touching this document ID
    keyed: HashSet<(StorageOp, String)>,
}

impl FailurePlan {
    fn should_fail(&self, op: StorageOp, key: &str) -> bool {
        self.all.contains(&op) || self.keyed.contains(&(op, key.to_string()))
    }
}

/// In-memory storage implementation for testing and development
///
/// Clones share the same underlying collections.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    entries: Arc<RwLock<HashMap<String, LedgerEntry>>>,
    returns: Arc<RwLock<HashMap<String, ReturnFiling>>>,
    invoices: Arc<RwLock<HashMap<String, Invoice>>>,
    invoice_snapshots: Arc<watch::Sender<Vec<Invoice>>>,
    failures: Arc<RwLock<FailurePlan>>,
}

fn read<T>(lock: &RwLock<T>) -> LedgerResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| LedgerError::Storage("memory store lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> LedgerResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| LedgerError::Storage("memory store lock poisoned".to_string()))
}

fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        let (sender, _) = watch::channel(Vec::new());
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            returns: Arc::new(RwLock::new(HashMap::new())),
            invoices: Arc::new(RwLock::new(HashMap::new())),
            invoice_snapshots: Arc::new(sender),
            failures: Arc::new(RwLock::new(FailurePlan::default())),
        }
    }

    /// Clear all data and failure switches (useful for testing)
    pub fn clear(&self) -> LedgerResult<()> {
        write(&self.entries)?.clear();
        write(&self.returns)?.clear();
        write(&self.invoices)?.clear();
        *write(&self.failures)? = FailurePlan::default();
        self.publish_invoices()
    }

    /// Make every subsequent call of `op` fail with a storage error
    pub fn fail_on(&self, op: StorageOp) -> LedgerResult<()> {
        write(&self.failures)?.all.insert(op);
        Ok(())
    }

    /// Make calls of `op` that touch document `key` fail with a storage error
    pub fn fail_on_key(&self, op: StorageOp, key: impl Into<String>) -> LedgerResult<()> {
        write(&self.failures)?.keyed.insert((op, key.into()));
        Ok(())
    }

    /// Remove all failure switches
    pub fn clear_failures(&self) -> LedgerResult<()> {
        *write(&self.failures)? = FailurePlan::default();
        Ok(())
    }

    fn check(&self, op: StorageOp, key: &str) -> LedgerResult<()> {
        if read(&self.failures)?.should_fail(op, key) {
            return Err(LedgerError::Storage(format!(
                "injected failure: {:?} on '{}'",
                op, key
            )));
        }
        Ok(())
    }

    fn invoice_snapshot(&self) -> LedgerResult<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = read(&self.invoices)?.values().cloned().collect();
        invoices.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(invoices)
    }

    fn publish_invoices(&self) -> LedgerResult<()> {
        let snapshot = self.invoice_snapshot()?;
        self.invoice_snapshots.send_replace(snapshot);
        Ok(())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStorage for MemoryStorage {
    async fn get_entry(&self, entry_id: &str) -> LedgerResult<Option<LedgerEntry>> {
        self.check(StorageOp::GetEntry, entry_id)?;
        Ok(read(&self.entries)?.get(entry_id).cloned())
    }

    async fn put_entry(&self, entry: &LedgerEntry) -> LedgerResult<()> {
        self.check(StorageOp::PutEntry, &entry.id)?;
        write(&self.entries)?.insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn create_entry(&self, mut entry: LedgerEntry) -> LedgerResult<LedgerEntry> {
        self.check(StorageOp::CreateEntry, &entry.id)?;
        entry.id = generate_id();
        write(&self.entries)?.insert(entry.id.clone(), entry.clone());
        Ok(entry)
    }

    async fn update_entry(
        &self,
        entry_id: &str,
        patch: &LedgerEntryPatch,
    ) -> LedgerResult<LedgerEntry> {
        self.check(StorageOp::UpdateEntry, entry_id)?;
        let mut entries = write(&self.entries)?;
        let entry = entries
            .get_mut(entry_id)
            .ok_or_else(|| LedgerError::EntryNotFound(entry_id.to_string()))?;
        entry.apply_patch(patch);
        Ok(entry.clone())
    }

    async fn delete_entry(&self, entry_id: &str) -> LedgerResult<()> {
        self.check(StorageOp::DeleteEntry, entry_id)?;
        write(&self.entries)?.remove(entry_id);
        Ok(())
    }

    async fn find_entries_by_invoice(&self, invoice_id: &str) -> LedgerResult<Vec<LedgerEntry>> {
        self.check(StorageOp::FindEntries, invoice_id)?;
        let entries = read(&self.entries)?;
        let matching: Vec<LedgerEntry> = entries
            .values()
            .filter(|entry| entry.invoice_id.as_deref() == Some(invoice_id))
            .cloned()
            .collect();
        Ok(matching)
    }

    async fn list_entries(&self) -> LedgerResult<Vec<LedgerEntry>> {
        self.check(StorageOp::ListEntries, "")?;
        let mut entries: Vec<LedgerEntry> = read(&self.entries)?.values().cloned().collect();
        entries.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
        Ok(entries)
    }

    async fn commit_batch(&self, batch: &[LedgerEntry]) -> LedgerResult<()> {
        for entry in batch {
            self.check(StorageOp::CommitBatch, &entry.id)?;
        }
        let mut entries = write(&self.entries)?;
        for entry in batch {
            entries.insert(entry.id.clone(), entry.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl ReturnStorage for MemoryStorage {
    async fn get_return(&self, return_id: &str) -> LedgerResult<Option<ReturnFiling>> {
        self.check(StorageOp::GetReturn, return_id)?;
        Ok(read(&self.returns)?.get(return_id).cloned())
    }

    async fn create_return(&self, mut filing: ReturnFiling) -> LedgerResult<ReturnFiling> {
        self.check(StorageOp::CreateReturn, &filing.period)?;
        filing.id = generate_id();
        write(&self.returns)?.insert(filing.id.clone(), filing.clone());
        Ok(filing)
    }

    async fn update_return(
        &self,
        return_id: &str,
        patch: &ReturnPatch,
    ) -> LedgerResult<ReturnFiling> {
        self.check(StorageOp::UpdateReturn, return_id)?;
        let mut returns = write(&self.returns)?;
        let filing = returns
            .get_mut(return_id)
            .ok_or_else(|| LedgerError::ReturnNotFound(return_id.to_string()))?;
        filing.apply_patch(patch);
        Ok(filing.clone())
    }

    async fn list_returns(&self) -> LedgerResult<Vec<ReturnFiling>> {
        self.check(StorageOp::ListReturns, "")?;
        let mut returns: Vec<ReturnFiling> = read(&self.returns)?.values().cloned().collect();
        returns.sort_by(|a, b| b.period.cmp(&a.period).then_with(|| a.id.cmp(&b.id)));
        Ok(returns)
    }

    async fn commit_filing(
        &self,
        mut filing: ReturnFiling,
        entry_ids: &[String],
    ) -> LedgerResult<ReturnFiling> {
        self.check(StorageOp::CommitFiling, &filing.period)?;

        // Lock order: entries, then returns
        let mut entries = write(&self.entries)?;
        let mut returns = write(&self.returns)?;

        if let Some(missing) = entry_ids.iter().find(|id| !entries.contains_key(*id)) {
            return Err(LedgerError::EntryNotFound(missing.clone()));
        }

        filing.id = generate_id();
        returns.insert(filing.id.clone(), filing.clone());

        let filed = LedgerEntryPatch::filed();
        for id in entry_ids {
            if let Some(entry) = entries.get_mut(id) {
                entry.apply_patch(&filed);
            }
        }

        Ok(filing)
    }
}

#[async_trait]
impl InvoiceStorage for MemoryStorage {
    async fn get_invoice(&self, invoice_id: &str) -> LedgerResult<Option<Invoice>> {
        self.check(StorageOp::GetInvoice, invoice_id)?;
        Ok(read(&self.invoices)?.get(invoice_id).cloned())
    }

    async fn save_invoice(&self, invoice: &Invoice) -> LedgerResult<()> {
        self.check(StorageOp::SaveInvoice, &invoice.id)?;
        write(&self.invoices)?.insert(invoice.id.clone(), invoice.clone());
        self.publish_invoices()
    }

    async fn delete_invoice(&self, invoice_id: &str) -> LedgerResult<()> {
        self.check(StorageOp::DeleteInvoice, invoice_id)?;
        write(&self.invoices)?.remove(invoice_id);
        self.publish_invoices()
    }

    async fn list_invoices(&self) -> LedgerResult<Vec<Invoice>> {
        self.check(StorageOp::ListInvoices, "")?;
        self.invoice_snapshot()
    }

    fn subscribe_invoices(&self) -> watch::Receiver<Vec<Invoice>> {
        self.invoice_snapshots.subscribe()
    }
}
