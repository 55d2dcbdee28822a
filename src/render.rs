//! Fully computed payloads for document and report renderers
//!
//! Renderers format these values; they do no tax arithmetic of their own.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::returns::summary::PeriodSummary;
use crate::tax::gst::{compute_document_totals, compute_line, DocumentTotals};
use crate::types::Invoice;

/// One rendered invoice line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderLine {
    pub description: String,
    pub quantity: BigDecimal,
    pub rate: BigDecimal,
    pub tax_rate_percent: BigDecimal,
    /// Before tax
    pub amount: BigDecimal,
    pub cgst: BigDecimal,
    pub sgst: BigDecimal,
    /// Including tax
    pub total: BigDecimal,
}

/// Everything an invoice renderer prints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRenderData {
    pub invoice_number: String,
    pub customer_name: String,
    pub customer_tax_id: Option<String>,
    pub date: NaiveDate,
    pub lines: Vec<RenderLine>,
    pub totals: DocumentTotals,
    pub show_round_off: bool,
}

impl DocumentRenderData {
    pub fn for_invoice(invoice: &Invoice) -> Self {
        let lines = invoice
            .items
            .iter()
            .map(|item| {
                let line = compute_line(&item.line_item());
                RenderLine {
                    description: item.description.clone(),
                    quantity: item.quantity.clone(),
                    rate: item.rate.clone(),
                    tax_rate_percent: item.tax_rate_percent.clone(),
                    amount: line.amount,
                    cgst: line.cgst,
                    sgst: line.sgst,
                    total: line.line_total,
                }
            })
            .collect();

        let round_off = invoice
            .round_off
            .clone()
            .unwrap_or_else(|| BigDecimal::from(0));
        let totals = compute_document_totals(&invoice.line_items(), round_off);
        let show_round_off = totals.round_off.abs() > threshold();

        Self {
            invoice_number: invoice.invoice_number.clone(),
            customer_name: invoice.customer_name.clone(),
            customer_tax_id: invoice.customer_tax_id.clone(),
            date: invoice.ledger_date(),
            lines,
            totals,
            show_round_off,
        }
    }
}

/// Round-off at or below one paisa is not printed
fn threshold() -> BigDecimal {
    BigDecimal::from(1) / BigDecimal::from(100)
}

/// Row of a GST summary report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    /// `YYYY-MM`
    pub period: String,
    pub collected: BigDecimal,
    pub paid: BigDecimal,
    pub net: BigDecimal,
    pub records: usize,
}

/// GST summary report with a totals line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReportData {
    pub title: String,
    pub rows: Vec<SummaryRow>,
    pub total_collected: BigDecimal,
    pub total_paid: BigDecimal,
    pub total_net: BigDecimal,
}

impl SummaryReportData {
    pub fn new(title: impl Into<String>, summaries: &[PeriodSummary]) -> Self {
        let rows: Vec<SummaryRow> = summaries
            .iter()
            .map(|summary| SummaryRow {
                period: summary.period.clone(),
                collected: summary.collected.clone(),
                paid: summary.paid.clone(),
                net: summary.net.clone(),
                records: summary.record_count,
            })
            .collect();

        let total_collected: BigDecimal = rows.iter().map(|row| &row.collected).sum();
        let total_paid: BigDecimal = rows.iter().map(|row| &row.paid).sum();
        let total_net = &total_collected - &total_paid;

        Self {
            title: title.into(),
            rows,
            total_collected,
            total_paid,
            total_net,
        }
    }
}
