//! Ledger entry construction

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::period::PeriodKeys;
use crate::types::*;

/// Prefix of the deterministic ID given to invoice-derived entries
pub const INVOICE_ENTRY_PREFIX: &str = "gst_";

/// Deterministic ledger entry ID for an invoice
///
/// Upserting at this ID is what keeps at most one collected entry per invoice.
pub fn invoice_entry_id(invoice_id: &str) -> String {
    format!("{}{}", INVOICE_ENTRY_PREFIX, invoice_id)
}

/// Entry builder for assembling ledger entries field by field
#[derive(Debug)]
pub struct LedgerEntryBuilder {
    entry: LedgerEntry,
}

impl LedgerEntryBuilder {
    /// Create a new builder; status starts `unfiled` and payment status follows `kind`
    pub fn new(id: String, kind: GstKind, date: NaiveDate, description: String) -> Self {
        let now = chrono::Utc::now().naive_utc();
        let keys = PeriodKeys::from_date(date);
        Self {
            entry: LedgerEntry {
                id,
                kind,
                amount: BigDecimal::from(0),
                tax_amount: BigDecimal::from(0),
                tax_rate_percent: None,
                description,
                status: FilingStatus::Unfiled,
                payment_status: PaymentStatus::from(kind),
                invoice_id: None,
                quotation_id: None,
                dealer_id: None,
                date,
                month: keys.month,
                quarter: keys.quarter,
                year: keys.year,
                customer_name: None,
                customer_tax_id: None,
                created_at: now,
                updated_at: now,
                created_by_actor: None,
            },
        }
    }

    pub fn amounts(mut self, amount: BigDecimal, tax_amount: BigDecimal) -> Self {
        self.entry.amount = amount;
        self.entry.tax_amount = tax_amount;
        self
    }

    pub fn tax_rate(mut self, tax_rate_percent: Option<BigDecimal>) -> Self {
        self.entry.tax_rate_percent = tax_rate_percent;
        self
    }

    pub fn payment_status(mut self, payment_status: PaymentStatus) -> Self {
        self.entry.payment_status = payment_status;
        self
    }

    pub fn invoice(mut self, invoice_id: Option<String>) -> Self {
        self.entry.invoice_id = invoice_id;
        self
    }

    pub fn quotation(mut self, quotation_id: Option<String>) -> Self {
        self.entry.quotation_id = quotation_id;
        self
    }

    pub fn dealer(mut self, dealer_id: Option<String>) -> Self {
        self.entry.dealer_id = dealer_id;
        self
    }

    pub fn customer(mut self, name: Option<String>, tax_id: Option<String>) -> Self {
        self.entry.customer_name = name;
        self.entry.customer_tax_id = tax_id;
        self
    }

    pub fn actor(mut self, actor: Option<String>) -> Self {
        self.entry.created_by_actor = actor;
        self
    }

    pub fn build(self) -> LedgerEntry {
        self.entry
    }
}

/// Common entry derivations
pub mod patterns {
    use super::*;
    use crate::tax::gst::{compute_document_totals, representative_rate};

    fn invoice_description(invoice: &Invoice) -> String {
        format!("GST from invoice #{}", invoice.invoice_number)
    }

    fn invoice_payment_status(invoice: &Invoice) -> PaymentStatus {
        if invoice.is_paid() {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Pending
        }
    }

    fn from_invoice(
        invoice: &Invoice,
        amount: BigDecimal,
        tax_amount: BigDecimal,
        actor: Option<String>,
    ) -> LedgerEntry {
        let items = invoice.line_items();
        LedgerEntryBuilder::new(
            invoice_entry_id(&invoice.id),
            GstKind::Collected,
            invoice.ledger_date(),
            invoice_description(invoice),
        )
        .amounts(amount, tax_amount)
        .tax_rate(representative_rate(&items))
        .payment_status(invoice_payment_status(invoice))
        .invoice(Some(invoice.id.clone()))
        .quotation(invoice.quotation_id.clone())
        .customer(
            Some(invoice.customer_name.clone()),
            invoice.customer_tax_id.clone(),
        )
        .actor(actor)
        .build()
    }

    /// Derive the collected entry for an invoice from its line items
    ///
    /// Returns `None` when the invoice has no items or no positive tax; such invoices are
    /// outside GST scope and get no entry.
    pub fn entry_from_invoice_items(invoice: &Invoice, actor: Option<String>) -> Option<LedgerEntry> {
        if invoice.items.is_empty() {
            return None;
        }

        let round_off = invoice
            .round_off
            .clone()
            .unwrap_or_else(|| BigDecimal::from(0));
        let totals = compute_document_totals(&invoice.line_items(), round_off);
        if totals.tax_amount <= BigDecimal::from(0) {
            return None;
        }

        Some(from_invoice(invoice, totals.total, totals.tax_amount, actor))
    }

    /// Derive the collected entry for an invoice from its stored totals
    ///
    /// Used when catching up on invoices that never got an entry; the stored totals are what
    /// the invoice was issued with.
    pub fn entry_from_invoice_totals(invoice: &Invoice, actor: Option<String>) -> Option<LedgerEntry> {
        if invoice.tax_amount <= BigDecimal::from(0) {
            return None;
        }

        Some(from_invoice(
            invoice,
            invoice.total_amount.clone(),
            invoice.tax_amount.clone(),
            actor,
        ))
    }

    /// Build a manual entry; the ID is left empty for the store to assign
    pub fn entry_from_draft(draft: ManualEntryDraft, actor: Option<String>) -> LedgerEntry {
        LedgerEntryBuilder::new(String::new(), draft.kind, draft.date, draft.description)
            .amounts(draft.amount, draft.tax_amount)
            .tax_rate(draft.tax_rate_percent)
            .invoice(draft.invoice_id)
            .quotation(draft.quotation_id)
            .dealer(draft.dealer_id)
            .customer(draft.customer_name, draft.customer_tax_id)
            .actor(actor)
            .build()
    }
}
