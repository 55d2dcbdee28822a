//! Store-facing GST ledger that records, updates and aggregates tax events

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use tracing::{debug, info, instrument};

use crate::ledger::entry::patterns;
use crate::period::Period;
use crate::returns::summary::{self, GstFilter, GstReport, PeriodSummary};
use crate::traits::*;
use crate::types::*;

/// GST ledger over a storage backend
pub struct GstLedger<S: LedgerStorage> {
    storage: S,
    actor: Option<String>,
}

impl<S: LedgerStorage> GstLedger<S> {
    /// Create a new ledger with the given storage backend
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            actor: None,
        }
    }

    /// Stamp entries created through this ledger with an authenticated actor
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Record a user-entered ledger entry under a store-generated ID
    ///
    /// The entry starts `unfiled`; its payment status is `paid` for input tax and `pending`
    /// for collected tax. Store failures are returned unchanged.
    #[instrument(skip(self, draft), fields(kind = draft.kind.as_str()))]
    pub async fn add_manual_entry(&self, draft: ManualEntryDraft) -> LedgerResult<LedgerEntry> {
        let entry = patterns::entry_from_draft(draft, self.actor.clone());
        let stored = self.storage.create_entry(entry).await?;
        info!(entry_id = %stored.id, month = %stored.month, "Manual GST entry recorded");
        Ok(stored)
    }

    /// Get an entry by ID
    pub async fn get_entry(&self, entry_id: &str) -> LedgerResult<Option<LedgerEntry>> {
        self.storage.get_entry(entry_id).await
    }

    /// Merge a partial update into an entry
    #[instrument(skip(self, patch))]
    pub async fn update(
        &self,
        entry_id: &str,
        patch: &LedgerEntryPatch,
    ) -> LedgerResult<LedgerEntry> {
        let updated = self.storage.update_entry(entry_id, patch).await?;
        debug!(entry_id, "GST entry updated");
        Ok(updated)
    }

    /// Delete an entry; removing a missing entry is not an error
    #[instrument(skip(self))]
    pub async fn remove(&self, entry_id: &str) -> LedgerResult<()> {
        self.storage.delete_entry(entry_id).await?;
        info!(entry_id, "GST entry removed");
        Ok(())
    }

    /// All entries, newest first
    pub async fn entries(&self) -> LedgerResult<Vec<LedgerEntry>> {
        self.storage.list_entries().await
    }

    /// Entries linked to an invoice
    pub async fn entries_for_invoice(&self, invoice_id: &str) -> LedgerResult<Vec<LedgerEntry>> {
        self.storage.find_entries_by_invoice(invoice_id).await
    }

    /// Entries whose period key matches `period`
    pub async fn entries_for_period(&self, period: &Period) -> LedgerResult<Vec<LedgerEntry>> {
        let entries = self.entries().await?;
        Ok(entries
            .into_iter()
            .filter(|entry| period.matches(entry))
            .collect())
    }

    // Aggregation over the current ledger snapshot
    /// Collected, paid and net tax for a month, quarter or year
    pub async fn summary_for(&self, period: &Period) -> LedgerResult<PeriodSummary> {
        let entries = self.entries().await?;
        Ok(summary::summarize(&entries, period))
    }

    /// Summary for the current calendar month
    pub async fn current_period_summary(&self) -> LedgerResult<PeriodSummary> {
        self.summary_for(&Period::current_month()).await
    }

    pub async fn total_collected(&self) -> LedgerResult<BigDecimal> {
        Ok(summary::total_collected(&self.entries().await?))
    }

    pub async fn total_paid(&self) -> LedgerResult<BigDecimal> {
        Ok(summary::total_paid(&self.entries().await?))
    }

    pub async fn net_liability(&self) -> LedgerResult<BigDecimal> {
        Ok(summary::net_liability(&self.entries().await?))
    }

    /// One summary per month present in the ledger, newest first
    pub async fn monthly_summaries(&self) -> LedgerResult<Vec<PeriodSummary>> {
        Ok(summary::monthly_summaries(&self.entries().await?))
    }

    /// Month-by-month trend since `since`, oldest first
    pub async fn summaries_since(&self, since: NaiveDate) -> LedgerResult<Vec<PeriodSummary>> {
        Ok(summary::summaries_since(&self.entries().await?, since))
    }

    /// Filtered report with matching records
    pub async fn report(&self, filter: &GstFilter) -> LedgerResult<GstReport> {
        summary::report(&self.entries().await?, filter)
    }
}
