//! Core types and data structures for the GST ledger

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::period::PeriodKeys;
use crate::tax::gst::LineItem;

/// Direction of a GST ledger event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GstKind {
    /// Output tax collected on sales
    Collected,
    /// Input tax paid on purchases (claimable credit)
    Paid,
}

impl GstKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GstKind::Collected => "collected",
            GstKind::Paid => "paid",
        }
    }
}

/// Whether a ledger entry has been included in a filed return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilingStatus {
    Unfiled,
    Filed,
}

/// Settlement state of the underlying sale or purchase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl From<GstKind> for PaymentStatus {
    /// Manual entries: input tax is recorded once paid, collected tax starts pending
    fn from(kind: GstKind) -> Self {
        match kind {
            GstKind::Paid => PaymentStatus::Paid,
            GstKind::Collected => PaymentStatus::Pending,
        }
    }
}

/// A dated tax event in the GST ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// `gst_<invoiceId>` for invoice-derived entries, store-generated otherwise
    pub id: String,
    pub kind: GstKind,
    /// Gross document amount the tax was levied on (tax inclusive for invoices)
    pub amount: BigDecimal,
    pub tax_amount: BigDecimal,
    pub tax_rate_percent: Option<BigDecimal>,
    pub description: String,
    pub status: FilingStatus,
    pub payment_status: PaymentStatus,
    pub invoice_id: Option<String>,
    pub quotation_id: Option<String>,
    pub dealer_id: Option<String>,
    pub date: NaiveDate,
    /// `YYYY-MM`
    pub month: String,
    /// `YYYY-Qn`
    pub quarter: String,
    /// `YYYY`
    pub year: String,
    pub customer_name: Option<String>,
    pub customer_tax_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub created_by_actor: Option<String>,
}

impl LedgerEntry {
    /// Set the entry date and re-derive its period keys
    pub fn set_date(&mut self, date: NaiveDate) {
        let keys = PeriodKeys::from_date(date);
        self.date = date;
        self.month = keys.month;
        self.quarter = keys.quarter;
        self.year = keys.year;
    }

    /// Merge a partial update into the entry
    pub fn apply_patch(&mut self, patch: &LedgerEntryPatch) {
        if let Some(amount) = &patch.amount {
            self.amount = amount.clone();
        }
        if let Some(tax_amount) = &patch.tax_amount {
            self.tax_amount = tax_amount.clone();
        }
        if let Some(rate) = &patch.tax_rate_percent {
            self.tax_rate_percent = Some(rate.clone());
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(payment_status) = patch.payment_status {
            self.payment_status = payment_status;
        }
        if let Some(date) = patch.date {
            self.set_date(date);
        }
        if let Some(dealer_id) = &patch.dealer_id {
            self.dealer_id = Some(dealer_id.clone());
        }
        if let Some(customer_name) = &patch.customer_name {
            self.customer_name = Some(customer_name.clone());
        }
        if let Some(customer_tax_id) = &patch.customer_tax_id {
            self.customer_tax_id = Some(customer_tax_id.clone());
        }
        self.updated_at = chrono::Utc::now().naive_utc();
    }

    pub fn is_filed(&self) -> bool {
        self.status == FilingStatus::Filed
    }
}

/// Partial update for a ledger entry; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryPatch {
    pub amount: Option<BigDecimal>,
    pub tax_amount: Option<BigDecimal>,
    pub tax_rate_percent: Option<BigDecimal>,
    pub description: Option<String>,
    pub status: Option<FilingStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub date: Option<NaiveDate>,
    pub dealer_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_tax_id: Option<String>,
}

impl LedgerEntryPatch {
    /// Patch that marks an entry as filed
    pub fn filed() -> Self {
        Self {
            status: Some(FilingStatus::Filed),
            ..Default::default()
        }
    }
}

/// User-entered standalone ledger record (not derived from an invoice)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualEntryDraft {
    pub kind: GstKind,
    pub amount: BigDecimal,
    pub tax_amount: BigDecimal,
    pub tax_rate_percent: Option<BigDecimal>,
    pub description: String,
    pub date: NaiveDate,
    pub invoice_id: Option<String>,
    pub quotation_id: Option<String>,
    pub dealer_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_tax_id: Option<String>,
}

impl ManualEntryDraft {
    /// Create a draft with only the required fields set
    pub fn new(
        kind: GstKind,
        amount: BigDecimal,
        tax_amount: BigDecimal,
        description: String,
        date: NaiveDate,
    ) -> Self {
        Self {
            kind,
            amount,
            tax_amount,
            tax_rate_percent: None,
            description,
            date,
            invoice_id: None,
            quotation_id: None,
            dealer_id: None,
            customer_name: None,
            customer_tax_id: None,
        }
    }

    pub fn dealer(mut self, dealer_id: impl Into<String>) -> Self {
        self.dealer_id = Some(dealer_id.into());
        self
    }

    pub fn rate(mut self, tax_rate_percent: BigDecimal) -> Self {
        self.tax_rate_percent = Some(tax_rate_percent);
        self
    }
}

/// Invoice lifecycle as maintained by the invoicing subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
    PartiallyPaid,
}

/// Invoice line as stored on the invoice document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub id: String,
    pub description: String,
    pub quantity: BigDecimal,
    pub rate: BigDecimal,
    #[serde(alias = "gstRate")]
    pub tax_rate_percent: BigDecimal,
}

impl InvoiceItem {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        quantity: BigDecimal,
        rate: BigDecimal,
        tax_rate_percent: BigDecimal,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            quantity,
            rate,
            tax_rate_percent,
        }
    }

    /// Numeric view consumed by the tax calculator
    pub fn line_item(&self) -> LineItem {
        LineItem::new(
            self.quantity.clone(),
            self.rate.clone(),
            self.tax_rate_percent.clone(),
        )
    }
}

/// Invoice as owned by the invoicing subsystem; read-only to the GST core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub customer_name: String,
    #[serde(alias = "customerGSTIN")]
    pub customer_tax_id: Option<String>,
    pub quotation_id: Option<String>,
    pub status: InvoiceStatus,
    /// Legacy paid flag kept by older invoice documents
    pub paid: Option<bool>,
    pub items: Vec<InvoiceItem>,
    pub round_off: Option<BigDecimal>,
    pub subtotal: BigDecimal,
    #[serde(alias = "gstAmount")]
    pub tax_amount: BigDecimal,
    pub total_amount: BigDecimal,
    pub invoice_date: Option<NaiveDate>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: NaiveDateTime,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub updated_at: NaiveDateTime,
}

/// Invoice timestamps arrive either as naive UTC or as RFC 3339 with an offset
/// (`2024-06-10T10:00:00.000Z`); both are held as naive UTC
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, ParseError};
    use serde::{de, Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<NaiveDateTime, ParseError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|at| at.naive_utc())
            .or_else(|_| raw.parse::<NaiveDateTime>())
    }
}

impl Invoice {
    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatus::Paid || self.paid == Some(true)
    }

    /// Date the invoice's tax is attributed to
    pub fn ledger_date(&self) -> NaiveDate {
        self.invoice_date.unwrap_or_else(|| self.created_at.date())
    }

    pub fn line_items(&self) -> Vec<LineItem> {
        self.items.iter().map(InvoiceItem::line_item).collect()
    }
}

/// Filing frequency of a GST return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnKind {
    Monthly,
    Quarterly,
}

/// Return lifecycle: `draft -> filed -> paid`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnStatus {
    Draft,
    Filed,
    Paid,
}

impl ReturnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnStatus::Draft => "draft",
            ReturnStatus::Filed => "filed",
            ReturnStatus::Paid => "paid",
        }
    }

    /// Forward-only; staying in the same state is allowed
    pub fn can_transition_to(&self, next: ReturnStatus) -> bool {
        next >= *self
    }
}

impl fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted GST return filing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnFiling {
    pub id: String,
    /// `YYYY-MM` or `YYYY-Qn`
    pub period: String,
    pub kind: ReturnKind,
    pub due_date: NaiveDate,
    pub net_tax: BigDecimal,
    /// Entry ids as they were at filing time
    pub linked_entry_ids: Vec<String>,
    pub total_tax: BigDecimal,
    pub status: ReturnStatus,
    pub filed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ReturnFiling {
    pub fn apply_patch(&mut self, patch: &ReturnPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(filed_at) = patch.filed_at {
            self.filed_at = Some(filed_at);
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(net_tax) = &patch.net_tax {
            self.net_tax = net_tax.clone();
        }
        if let Some(total_tax) = &patch.total_tax {
            self.total_tax = total_tax.clone();
        }
        self.updated_at = chrono::Utc::now().naive_utc();
    }
}

/// Partial update for a return filing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnPatch {
    pub status: Option<ReturnStatus>,
    pub filed_at: Option<NaiveDateTime>,
    pub due_date: Option<NaiveDate>,
    pub net_tax: Option<BigDecimal>,
    pub total_tax: Option<BigDecimal>,
}

impl ReturnPatch {
    /// Flip a return to filed, stamping the filing time
    pub fn filed_at(at: NaiveDateTime) -> Self {
        Self {
            status: Some(ReturnStatus::Filed),
            filed_at: Some(at),
            ..Default::default()
        }
    }

    pub fn paid() -> Self {
        Self {
            status: Some(ReturnStatus::Paid),
            ..Default::default()
        }
    }
}

/// Errors that can occur in the GST ledger system
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Ledger entry not found: {0}")]
    EntryNotFound(String),
    #[error("Return not found: {0}")]
    ReturnNotFound(String),
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid return status transition: {from} -> {to}")]
    InvalidTransition {
        from: ReturnStatus,
        to: ReturnStatus,
    },
}

impl LedgerError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LedgerError::EntryNotFound(_)
                | LedgerError::ReturnNotFound(_)
                | LedgerError::InvoiceNotFound(_)
        )
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> LedgerEntry {
        let now = chrono::Utc::now().naive_utc();
        let date = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let keys = PeriodKeys::from_date(date);
        LedgerEntry {
            id: "e1".to_string(),
            kind: GstKind::Collected,
            amount: BigDecimal::from(1180),
            tax_amount: BigDecimal::from(180),
            tax_rate_percent: Some(BigDecimal::from(18)),
            description: "sample".to_string(),
            status: FilingStatus::Unfiled,
            payment_status: PaymentStatus::Pending,
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
        }
    }

    #[test]
    fn test_patch_rederives_period_keys() {
        let mut entry = sample_entry();
        let patch = LedgerEntryPatch {
            date: NaiveDate::from_ymd_opt(2025, 1, 3),
            ..Default::default()
        };
        entry.apply_patch(&patch);

        assert_eq!(entry.month, "2025-01");
        assert_eq!(entry.quarter, "2025-Q1");
        assert_eq!(entry.year, "2025");
        assert_eq!(entry.tax_amount, BigDecimal::from(180));
    }

    #[test]
    fn test_filed_patch_only_touches_status() {
        let mut entry = sample_entry();
        entry.apply_patch(&LedgerEntryPatch::filed());
        assert!(entry.is_filed());
        assert_eq!(entry.amount, BigDecimal::from(1180));
    }

    #[test]
    fn test_payment_status_from_kind() {
        assert_eq!(PaymentStatus::from(GstKind::Paid), PaymentStatus::Paid);
        assert_eq!(
            PaymentStatus::from(GstKind::Collected),
            PaymentStatus::Pending
        );
    }

    #[test]
    fn test_return_status_is_forward_only() {
        assert!(ReturnStatus::Draft.can_transition_to(ReturnStatus::Filed));
        assert!(ReturnStatus::Filed.can_transition_to(ReturnStatus::Paid));
        assert!(!ReturnStatus::Paid.can_transition_to(ReturnStatus::Draft));
        assert!(!ReturnStatus::Filed.can_transition_to(ReturnStatus::Draft));
    }

    #[test]
    fn test_invoice_deserializes_legacy_field_names() {
        let json = serde_json::json!({
            "id": "INV-001",
            "invoiceNumber": "INV-001",
            "customerName": "Acme",
            "customerGSTIN": "29ABCDE1234F1Z5",
            "quotationId": null,
            "status": "partially_paid",
            "paid": null,
            "items": [{
                "id": "1",
                "description": "Widget",
                "quantity": 2,
                "rate": 500,
                "gstRate": 18
            }],
            "roundOff": null,
            "subtotal": 1000,
            "gstAmount": 180,
            "totalAmount": 1180,
            "invoiceDate": null,
            "createdAt": "2024-06-10T10:00:00.000Z",
            "updatedAt": "2024-06-11T15:30:00+05:30"
        });

        let invoice: Invoice = serde_json::from_value(json).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::PartiallyPaid);
        assert_eq!(invoice.customer_tax_id.as_deref(), Some("29ABCDE1234F1Z5"));
        assert_eq!(invoice.items[0].tax_rate_percent, BigDecimal::from(18));
        assert_eq!(
            invoice.ledger_date(),
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
        );
        assert_eq!(
            invoice.created_at,
            NaiveDate::from_ymd_opt(2024, 6, 10)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap()
        );
        assert_eq!(
            invoice.updated_at,
            NaiveDate::from_ymd_opt(2024, 6, 11)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap()
        );
        assert!(!invoice.is_paid());
    }

    #[test]
    fn test_invoice_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 6, 10)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        for raw in [
            "2024-06-10T10:00:00",
            "2024-06-10T10:00:00.000",
            "2024-06-10T10:00:00Z",
            "2024-06-10T10:00:00.000Z",
            "2024-06-10T15:30:00+05:30",
        ] {
            assert_eq!(timestamp::parse(raw).unwrap(), expected, "{raw}");
        }
        assert!(timestamp::parse("10/06/2024").is_err());
    }

    #[test]
    fn test_invoice_round_trips_through_json() {
        let json = serde_json::json!({
            "id": "INV-002",
            "invoiceNumber": "INV-002",
            "customerName": "Acme",
            "customerTaxId": null,
            "quotationId": null,
            "status": "paid",
            "paid": null,
            "items": [],
            "roundOff": null,
            "subtotal": 0,
            "taxAmount": 0,
            "totalAmount": 0,
            "invoiceDate": "2024-06-12",
            "createdAt": "2024-06-10T10:00:00.000Z",
            "updatedAt": "2024-06-10T10:00:00.000Z"
        });

        let invoice: Invoice = serde_json::from_value(json).unwrap();
        let again: Invoice =
            serde_json::from_value(serde_json::to_value(&invoice).unwrap()).unwrap();
        assert_eq!(again, invoice);
        assert!(again.is_paid());
    }
}
