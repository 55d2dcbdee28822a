//! Keeps the GST ledger in step with invoice saves and deletes

use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{GstConfig, SyncMode};
use crate::ledger::entry::{invoice_entry_id, patterns};
use crate::traits::*;
use crate::types::*;

/// What synchronizing one invoice did to the ledger
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// No entry existed at the invoice's ID; one was inserted
    Created { entry_id: String },
    /// The entry at the invoice's ID was overwritten
    Updated { entry_id: String },
    /// Invoice has no items or no positive tax; ledger left untouched
    Skipped,
    /// Sync handed to a background task; see the event channel
    Dispatched,
    /// Sync failed after the invoice itself was saved
    Failed { error: LedgerError },
}

/// Completion notice published for every sync attempt
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Completed {
        invoice_id: String,
        outcome: SyncOutcome,
    },
    Failed {
        invoice_id: String,
        error: LedgerError,
    },
}

/// Result of saving an invoice through the synchronizer
#[derive(Debug, Clone, PartialEq)]
pub struct SavedInvoice {
    pub invoice_id: String,
    pub sync: SyncOutcome,
}

/// Derive the invoice's collected entry and upsert it at its deterministic ID
///
/// Filing status, creation time and creator of an existing entry are carried over; every
/// derived field is overwritten.
pub async fn upsert_invoice_entry<S: LedgerStorage + ?Sized>(
    storage: &S,
    invoice: &Invoice,
    actor: Option<String>,
) -> LedgerResult<SyncOutcome> {
    let Some(mut entry) = patterns::entry_from_invoice_items(invoice, actor) else {
        debug!(invoice_id = %invoice.id, "Invoice carries no GST, skipping ledger sync");
        return Ok(SyncOutcome::Skipped);
    };

    match storage.get_entry(&entry.id).await? {
        Some(existing) => {
            entry.status = existing.status;
            entry.created_at = existing.created_at;
            entry.created_by_actor = existing.created_by_actor.or(entry.created_by_actor);
            storage.put_entry(&entry).await?;
            info!(entry_id = %entry.id, tax = %entry.tax_amount, "GST entry updated from invoice");
            Ok(SyncOutcome::Updated { entry_id: entry.id })
        }
        None => {
            storage.put_entry(&entry).await?;
            info!(entry_id = %entry.id, tax = %entry.tax_amount, "GST entry created from invoice");
            Ok(SyncOutcome::Created { entry_id: entry.id })
        }
    }
}

fn publish(
    events: &Option<mpsc::UnboundedSender<SyncEvent>>,
    invoice_id: &str,
    result: &LedgerResult<SyncOutcome>,
) {
    if let Err(error) = result {
        error!(invoice_id, %error, "GST ledger sync failed");
    }

    let Some(sender) = events else {
        return;
    };
    let event = match result {
        Ok(outcome) => SyncEvent::Completed {
            invoice_id: invoice_id.to_string(),
            outcome: outcome.clone(),
        },
        Err(error) => SyncEvent::Failed {
            invoice_id: invoice_id.to_string(),
            error: error.clone(),
        },
    };
    if sender.send(event).is_err() {
        warn!(invoice_id, "Sync event receiver dropped");
    }
}

/// Invoice-to-ledger synchronizer
pub struct InvoiceSynchronizer<S> {
    storage: S,
    mode: SyncMode,
    actor: Option<String>,
    events: Option<mpsc::UnboundedSender<SyncEvent>>,
}

impl<S> InvoiceSynchronizer<S>
where
    S: LedgerStorage + InvoiceStorage + Clone + 'static,
{
    pub fn new(storage: S, config: &GstConfig) -> Self {
        Self {
            storage,
            mode: config.sync_mode,
            actor: None,
            events: None,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Receive a [`SyncEvent`] for every sync this synchronizer runs from now on
    pub fn subscribe_events(&mut self) -> mpsc::UnboundedReceiver<SyncEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.events = Some(sender);
        receiver
    }

    /// Bring the ledger entry for an invoice up to date; store failures are returned
    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id))]
    pub async fn sync_invoice(&self, invoice: &Invoice) -> LedgerResult<SyncOutcome> {
        upsert_invoice_entry(&self.storage, invoice, self.actor.clone()).await
    }

    /// Save an invoice, then synchronize its ledger entry
    ///
    /// A failed invoice write is returned as an error. A failed ledger sync does not undo
    /// the save: it is logged, published as [`SyncEvent::Failed`] and reported in the
    /// returned [`SyncOutcome`]. In detached mode the sync runs on a spawned task and this
    /// call returns [`SyncOutcome::Dispatched`]; detached mode needs a tokio runtime.
    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id))]
    pub async fn save_invoice(&self, invoice: &Invoice) -> LedgerResult<SavedInvoice> {
        self.storage.save_invoice(invoice).await?;

        let sync = match self.mode {
            SyncMode::Inline => {
                let result =
                    upsert_invoice_entry(&self.storage, invoice, self.actor.clone()).await;
                publish(&self.events, &invoice.id, &result);
                match result {
                    Ok(outcome) => outcome,
                    Err(error) => SyncOutcome::Failed { error },
                }
            }
            SyncMode::Detached => {
                let storage = self.storage.clone();
                let invoice = invoice.clone();
                let actor = self.actor.clone();
                let events = self.events.clone();
                tokio::spawn(async move {
                    let result = upsert_invoice_entry(&storage, &invoice, actor).await;
                    publish(&events, &invoice.id, &result);
                });
                SyncOutcome::Dispatched
            }
        };

        Ok(SavedInvoice {
            invoice_id: invoice.id.clone(),
            sync,
        })
    }

    /// Delete an invoice together with every ledger entry linked to it
    ///
    /// Ledger entries go first. If any of them cannot be deleted the invoice is kept and the
    /// error is returned, so no invoice disappears while its tax records remain.
    /// Returns the number of ledger entries removed.
    #[instrument(skip(self))]
    pub async fn delete_invoice(&self, invoice_id: &str) -> LedgerResult<usize> {
        let linked = self.storage.find_entries_by_invoice(invoice_id).await?;
        for entry in &linked {
            self.storage.delete_entry(&entry.id).await?;
        }
        let mut removed = linked.len();

        // An entry at the deterministic id may have lost its invoice link
        let deterministic_id = invoice_entry_id(invoice_id);
        if !linked.iter().any(|entry| entry.id == deterministic_id)
            && self.storage.get_entry(&deterministic_id).await?.is_some()
        {
            self.storage.delete_entry(&deterministic_id).await?;
            removed += 1;
        }

        self.storage.delete_invoice(invoice_id).await?;
        info!(invoice_id, removed, "Invoice and linked GST entries deleted");
        Ok(removed)
    }
}
