//! Period aggregation over ledger entries
//!
//! Everything here is a pure function of a ledger snapshot.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::period::Period;
use crate::types::*;

/// Collected versus paid tax for one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    pub period: String,
    pub collected: BigDecimal,
    pub paid: BigDecimal,
    /// collected - paid
    pub net: BigDecimal,
    pub record_count: usize,
}

impl PeriodSummary {
    fn from_entries<'a>(
        period: String,
        entries: impl IntoIterator<Item = &'a LedgerEntry>,
    ) -> Self {
        let mut collected = BigDecimal::from(0);
        let mut paid = BigDecimal::from(0);
        let mut record_count = 0;

        for entry in entries {
            match entry.kind {
                GstKind::Collected => collected += &entry.tax_amount,
                GstKind::Paid => paid += &entry.tax_amount,
            }
            record_count += 1;
        }

        let net = &collected - &paid;
        Self {
            period,
            collected,
            paid,
            net,
            record_count,
        }
    }

    /// Positive net means tax is owed for the period
    pub fn is_liability(&self) -> bool {
        self.net > BigDecimal::from(0)
    }
}

/// Summary for one month, quarter or year, matched on the entry's period key
pub fn summarize(entries: &[LedgerEntry], period: &Period) -> PeriodSummary {
    PeriodSummary::from_entries(
        period.key(),
        entries.iter().filter(|entry| period.matches(entry)),
    )
}

fn total_of(entries: &[LedgerEntry], kind: GstKind) -> BigDecimal {
    entries
        .iter()
        .filter(|entry| entry.kind == kind)
        .map(|entry| &entry.tax_amount)
        .sum()
}

/// Tax collected across the whole ledger
pub fn total_collected(entries: &[LedgerEntry]) -> BigDecimal {
    total_of(entries, GstKind::Collected)
}

/// Input tax paid across the whole ledger
pub fn total_paid(entries: &[LedgerEntry]) -> BigDecimal {
    total_of(entries, GstKind::Paid)
}

pub fn net_liability(entries: &[LedgerEntry]) -> BigDecimal {
    total_collected(entries) - total_paid(entries)
}

fn group_by_month<'a>(
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
) -> BTreeMap<String, Vec<&'a LedgerEntry>> {
    let mut months: BTreeMap<String, Vec<&LedgerEntry>> = BTreeMap::new();
    for entry in entries {
        months.entry(entry.month.clone()).or_default().push(entry);
    }
    months
}

/// One summary per month present in the ledger, newest month first
pub fn monthly_summaries(entries: &[LedgerEntry]) -> Vec<PeriodSummary> {
    group_by_month(entries)
        .into_iter()
        .rev()
        .map(|(month, group)| PeriodSummary::from_entries(month, group))
        .collect()
}

/// Monthly summaries for entries dated on or after `since`, oldest month first
pub fn summaries_since(entries: &[LedgerEntry], since: NaiveDate) -> Vec<PeriodSummary> {
    group_by_month(entries.iter().filter(|entry| entry.date >= since))
        .into_iter()
        .map(|(month, group)| PeriodSummary::from_entries(month, group))
        .collect()
}

/// Report selection: a year or a single month of it, optionally narrowed by kind and status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GstFilter {
    pub year: i32,
    /// 1-12; `None` selects the whole year
    pub month: Option<u32>,
    /// `None` selects both kinds
    pub kind: Option<GstKind>,
    /// `None` selects filed and unfiled
    pub status: Option<FilingStatus>,
}

impl GstFilter {
    pub fn year(year: i32) -> Self {
        Self {
            year,
            month: None,
            kind: None,
            status: None,
        }
    }

    pub fn month(year: i32, month: u32) -> Self {
        Self {
            month: Some(month),
            ..Self::year(year)
        }
    }

    pub fn period(&self) -> LedgerResult<Period> {
        match self.month {
            Some(month) => Period::month(self.year, month),
            None => Ok(Period::Year(self.year)),
        }
    }

    fn selects(&self, period: &Period, entry: &LedgerEntry) -> bool {
        period.matches(entry)
            && self.kind.is_none_or(|kind| entry.kind == kind)
            && self.status.is_none_or(|status| entry.status == status)
    }
}

/// Filtered report with the matching records attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GstReport {
    /// `YYYY-MM` or `YYYY`
    pub period: String,
    pub collected: BigDecimal,
    pub paid: BigDecimal,
    pub net: BigDecimal,
    pub records: Vec<LedgerEntry>,
    /// Distinct invoices behind the records
    pub total_invoices: usize,
}

/// Build a report for the filter; fails only on an out-of-range month
pub fn report(entries: &[LedgerEntry], filter: &GstFilter) -> LedgerResult<GstReport> {
    let period = filter.period()?;
    let records: Vec<LedgerEntry> = entries
        .iter()
        .filter(|entry| filter.selects(&period, entry))
        .cloned()
        .collect();

    let summary = PeriodSummary::from_entries(period.key(), &records);
    let total_invoices = records
        .iter()
        .filter_map(|entry| entry.invoice_id.as_deref())
        .collect::<HashSet<_>>()
        .len();

    Ok(GstReport {
        period: summary.period,
        collected: summary.collected,
        paid: summary.paid,
        net: summary.net,
        records,
        total_invoices,
    })
}
