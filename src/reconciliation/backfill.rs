//! Catch-up generation of ledger entries for invoices that never got one

use bigdecimal::BigDecimal;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::GstConfig;
use crate::ledger::entry::patterns;
use crate::traits::*;
use crate::types::*;

/// Counts for one backfill pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Invoices selected from the snapshot as missing an entry
    pub candidates: usize,
    pub created: usize,
    /// Entry appeared between the snapshot and the write
    pub skipped_existing: usize,
    /// Left unmarked for a later pass
    pub failed: usize,
    /// Pass stopped between batches on request
    pub abandoned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackfillRun {
    Completed(BackfillReport),
    /// Another pass on this generator was still in flight
    AlreadyRunning,
}

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const ABANDONING: u8 = 2;

/// Returns the generator to idle when a pass ends, however it ends
struct InFlight<'a>(&'a AtomicU8);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(IDLE, Ordering::SeqCst);
    }
}

/// Creates missing invoice ledger entries in bounded, atomically committed batches
pub struct BackfillGenerator<S> {
    storage: S,
    batch_size: usize,
    concurrency: usize,
    actor: Option<String>,
    /// Invoices already handled by this generator
    processed: Mutex<HashSet<String>>,
    /// `IDLE`, `RUNNING`, or `ABANDONING` once a running pass was asked to stop
    state: AtomicU8,
}

impl<S> BackfillGenerator<S>
where
    S: LedgerStorage + InvoiceStorage,
{
    pub fn new(storage: S, config: &GstConfig) -> Self {
        Self {
            storage,
            batch_size: config.backfill_batch_size.max(1),
            concurrency: config.backfill_concurrency.max(1),
            actor: None,
            processed: Mutex::new(HashSet::new()),
            state: AtomicU8::new(IDLE),
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::SeqCst) != IDLE
    }

    /// Ask the running pass to stop before its next batch; a batch already committing
    /// runs to completion
    pub fn abandon(&self) {
        let _ = self
            .state
            .compare_exchange(RUNNING, ABANDONING, Ordering::SeqCst, Ordering::SeqCst);
    }

    fn abandon_requested(&self) -> bool {
        self.state.load(Ordering::SeqCst) == ABANDONING
    }

    pub fn is_processed(&self, invoice_id: &str) -> bool {
        self.processed().contains(invoice_id)
    }

    /// Forget every handled invoice so the next pass reconsiders all of them
    pub fn reset_processed(&self) {
        self.processed().clear();
    }

    fn processed(&self) -> MutexGuard<'_, HashSet<String>> {
        self.processed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unmark(&self, invoice_id: &str) {
        self.processed().remove(invoice_id);
    }

    /// Run one pass over the current invoice collection
    pub async fn run(&self) -> LedgerResult<BackfillRun> {
        let invoices = self.storage.list_invoices().await?;
        self.run_pass(&invoices).await
    }

    /// Run one pass over an invoice snapshot
    ///
    /// Reading the ledger snapshot can fail the whole pass. Past that point failures are
    /// per invoice: they are logged, counted, and the invoice is unmarked so a later pass
    /// retries it.
    #[instrument(skip(self, invoices), fields(invoices = invoices.len()))]
    pub async fn run_pass(&self, invoices: &[Invoice]) -> LedgerResult<BackfillRun> {
        if self
            .state
            .compare_exchange(IDLE, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Backfill pass already in flight, skipping");
            return Ok(BackfillRun::AlreadyRunning);
        }
        let _in_flight = InFlight(&self.state);

        let existing = self.storage.list_entries().await?;
        let covered: HashSet<&str> = existing
            .iter()
            .filter_map(|entry| entry.invoice_id.as_deref())
            .collect();

        let candidates: Vec<&Invoice> = {
            let processed = self.processed();
            invoices
                .iter()
                .filter(|invoice| {
                    invoice.tax_amount > BigDecimal::from(0)
                        && !processed.contains(&invoice.id)
                        && !covered.contains(invoice.id.as_str())
                })
                .collect()
        };

        let mut report = BackfillReport {
            candidates: candidates.len(),
            ..Default::default()
        };
        if candidates.is_empty() {
            return Ok(BackfillRun::Completed(report));
        }
        info!(candidates = candidates.len(), "Backfilling GST entries");

        for chunk in candidates.chunks(self.batch_size) {
            if self.abandon_requested() {
                warn!(created = report.created, "Backfill pass abandoned");
                report.abandoned = true;
                break;
            }
            self.run_batch(chunk, &mut report).await;
        }

        info!(
            created = report.created,
            skipped = report.skipped_existing,
            failed = report.failed,
            "Backfill pass finished"
        );
        Ok(BackfillRun::Completed(report))
    }

    async fn run_batch(&self, chunk: &[&Invoice], report: &mut BackfillReport) {
        // Mark before any write so an overlapping pass cannot pick the same invoices
        {
            let mut processed = self.processed();
            for invoice in chunk {
                processed.insert(invoice.id.clone());
            }
        }

        // Owned invoices keep the pass future `Send` when it runs on a spawned task
        let owned: Vec<Invoice> = chunk.iter().map(|invoice| (*invoice).clone()).collect();
        let prepared: Vec<(String, LedgerResult<Option<LedgerEntry>>)> = stream::iter(owned)
            .map(|invoice: Invoice| async move {
                (invoice.id.clone(), self.prepare(&invoice).await)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut batch = Vec::with_capacity(prepared.len());
        let mut batch_invoice_ids = Vec::with_capacity(prepared.len());
        for (invoice_id, result) in prepared {
            match result {
                Ok(Some(entry)) => {
                    batch_invoice_ids.push(invoice_id);
                    batch.push(entry);
                }
                Ok(None) => report.skipped_existing += 1,
                Err(error) => {
                    error!(invoice_id = %invoice_id, %error, "Backfill failed for invoice");
                    self.unmark(&invoice_id);
                    report.failed += 1;
                }
            }
        }

        if batch.is_empty() {
            return;
        }

        match self.storage.commit_batch(&batch).await {
            Ok(()) => {
                debug!(count = batch.len(), "Backfill batch committed");
                report.created += batch.len();
            }
            Err(error) => {
                error!(count = batch.len(), %error, "Backfill batch commit failed");
                for invoice_id in &batch_invoice_ids {
                    self.unmark(invoice_id);
                }
                report.failed += batch.len();
            }
        }
    }

    /// Entry to write for one invoice, or `None` if it already has one
    async fn prepare(&self, invoice: &Invoice) -> LedgerResult<Option<LedgerEntry>> {
        let Some(entry) = patterns::entry_from_invoice_totals(invoice, self.actor.clone()) else {
            return Ok(None);
        };

        // The snapshot may be stale by now
        if self.storage.get_entry(&entry.id).await?.is_some() {
            debug!(invoice_id = %invoice.id, "GST entry already exists");
            return Ok(None);
        }

        Ok(Some(entry))
    }
}

impl<S> BackfillGenerator<S>
where
    S: LedgerStorage + InvoiceStorage + 'static,
{
    /// Run a pass now and again every time the invoice collection changes
    ///
    /// The task ends when the store drops its invoice subscription.
    pub fn spawn_watcher(self: Arc<Self>) -> JoinHandle<()> {
        let mut snapshots = self.storage.subscribe_invoices();
        tokio::spawn(async move {
            loop {
                let invoices = snapshots.borrow_and_update().clone();
                if !invoices.is_empty() {
                    match self.run_pass(&invoices).await {
                        Ok(BackfillRun::Completed(report)) => {
                            debug!(created = report.created, "Watched backfill pass done")
                        }
                        Ok(BackfillRun::AlreadyRunning) => {}
                        Err(error) => error!(%error, "Watched backfill pass failed"),
                    }
                }
                if snapshots.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}
