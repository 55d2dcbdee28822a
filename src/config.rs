//! Engine configuration

use serde::{Deserialize, Serialize};
use std::env;

use crate::types::{LedgerError, LedgerResult};

/// Which entry field a filed return sums into its net and total tax
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetTaxBasis {
    /// Sum of `amount` (gross document value). Matches returns filed by earlier releases.
    #[default]
    GrossAmount,
    /// Sum of `tax_amount`
    TaxAmount,
}

/// How a return and its entry status flips are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingWrite {
    /// One atomic store call via `ReturnStorage::commit_filing`
    #[default]
    Transactional,
    /// Persist the return, then update each entry; a failed update leaves it unfiled
    Sequential,
}

/// Whether invoice saves wait for ledger synchronization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    Inline,
    /// Sync runs on a spawned task and reports through the sync event channel
    Detached,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GstConfig {
    pub backfill_batch_size: usize,
    pub backfill_concurrency: usize,
    /// Day of the month following filing on which the return falls due
    pub filing_due_day: u32,
    pub net_tax_basis: NetTaxBasis,
    pub filing_write: FilingWrite,
    pub sync_mode: SyncMode,
    /// Reject backward moves on `draft -> filed -> paid` in `update_return`
    pub enforce_return_transitions: bool,
}

impl Default for GstConfig {
    fn default() -> Self {
        Self {
            backfill_batch_size: 5,
            backfill_concurrency: 5,
            filing_due_day: 20,
            net_tax_basis: NetTaxBasis::default(),
            filing_write: FilingWrite::default(),
            sync_mode: SyncMode::default(),
            enforce_return_transitions: false,
        }
    }
}

impl GstConfig {
    /// Build a config from `GST_*` environment variables, falling back to defaults
    pub fn from_env() -> LedgerResult<Self> {
        let defaults = Self::default();

        let config = Self {
            backfill_batch_size: env::var("GST_BACKFILL_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.backfill_batch_size),
            backfill_concurrency: env::var("GST_BACKFILL_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.backfill_concurrency),
            filing_due_day: env::var("GST_FILING_DUE_DAY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.filing_due_day),
            net_tax_basis: match env::var("GST_NET_TAX_BASIS").ok().as_deref() {
                Some("tax_amount") => NetTaxBasis::TaxAmount,
                Some("gross_amount") | None => NetTaxBasis::GrossAmount,
                Some(other) => {
                    return Err(LedgerError::Validation(format!(
                        "GST_NET_TAX_BASIS must be 'gross_amount' or 'tax_amount', got '{}'",
                        other
                    )))
                }
            },
            filing_write: match env::var("GST_FILING_WRITE").ok().as_deref() {
                Some("sequential") => FilingWrite::Sequential,
                Some("transactional") | None => FilingWrite::Transactional,
                Some(other) => {
                    return Err(LedgerError::Validation(format!(
                        "GST_FILING_WRITE must be 'transactional' or 'sequential', got '{}'",
                        other
                    )))
                }
            },
            sync_mode: match env::var("GST_SYNC_MODE").ok().as_deref() {
                Some("detached") => SyncMode::Detached,
                Some("inline") | None => SyncMode::Inline,
                Some(other) => {
                    return Err(LedgerError::Validation(format!(
                        "GST_SYNC_MODE must be 'inline' or 'detached', got '{}'",
                        other
                    )))
                }
            },
            enforce_return_transitions: env::var("GST_ENFORCE_RETURN_TRANSITIONS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.enforce_return_transitions),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.backfill_batch_size == 0 {
            return Err(LedgerError::Validation(
                "Backfill batch size must be at least 1".to_string(),
            ));
        }
        if self.backfill_concurrency == 0 {
            return Err(LedgerError::Validation(
                "Backfill concurrency must be at least 1".to_string(),
            ));
        }
        // Day 28 exists in every month
        if !(1..=28).contains(&self.filing_due_day) {
            return Err(LedgerError::Validation(format!(
                "Filing due day must be between 1 and 28, got {}",
                self.filing_due_day
            )));
        }
        Ok(())
    }
}
