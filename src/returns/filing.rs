//! Return filing and return lifecycle updates

use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use tracing::{error, info, instrument, warn};

use crate::config::{FilingWrite, GstConfig, NetTaxBasis};
use crate::period::Period;
use crate::returns::summary::{self, PeriodSummary};
use crate::traits::*;
use crate::types::*;

/// Due date of a return filed at `filed_at`: `due_day` of the following month
pub fn due_date_after(filed_at: NaiveDateTime, due_day: u32) -> LedgerResult<NaiveDate> {
    let (year, month) = match filed_at.month() {
        12 => (filed_at.year() + 1, 1),
        month => (filed_at.year(), month + 1),
    };
    NaiveDate::from_ymd_opt(year, month, due_day).ok_or_else(|| {
        LedgerError::Validation(format!(
            "due day {} does not exist in {}-{:02}",
            due_day, year, month
        ))
    })
}

/// Sum of the entries on the configured basis
pub fn net_tax(entries: &[LedgerEntry], basis: NetTaxBasis) -> BigDecimal {
    entries
        .iter()
        .map(|entry| match basis {
            NetTaxBasis::GrossAmount => &entry.amount,
            NetTaxBasis::TaxAmount => &entry.tax_amount,
        })
        .sum()
}

/// Files GST returns and tracks their lifecycle
pub struct ReturnEngine<S> {
    storage: S,
    config: GstConfig,
}

impl<S> ReturnEngine<S>
where
    S: LedgerStorage + ReturnStorage,
{
    pub fn new(storage: S, config: GstConfig) -> Self {
        Self { storage, config }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &GstConfig {
        &self.config
    }

    fn build_return(
        &self,
        period: &Period,
        entries: &[LedgerEntry],
        kind: ReturnKind,
        status: ReturnStatus,
        now: NaiveDateTime,
    ) -> LedgerResult<ReturnFiling> {
        let total = net_tax(entries, self.config.net_tax_basis);
        Ok(ReturnFiling {
            id: String::new(),
            period: period.key(),
            kind,
            due_date: due_date_after(now, self.config.filing_due_day)?,
            net_tax: total.clone(),
            linked_entry_ids: entries.iter().map(|entry| entry.id.clone()).collect(),
            total_tax: total,
            status,
            filed_at: (status != ReturnStatus::Draft).then_some(now),
            created_at: now,
            updated_at: now,
        })
    }

    /// Summary of the ledger for one period
    pub async fn summary_for(&self, period: &Period) -> LedgerResult<PeriodSummary> {
        let entries = self.storage.list_entries().await?;
        Ok(summary::summarize(&entries, period))
    }

    pub async fn current_period_summary(&self) -> LedgerResult<PeriodSummary> {
        self.summary_for(&Period::current_month()).await
    }

    /// File a return over `entries` and mark each of them filed
    pub async fn file_return(
        &self,
        period: &Period,
        entries: &[LedgerEntry],
        kind: ReturnKind,
    ) -> LedgerResult<ReturnFiling> {
        self.file_return_at(period, entries, kind, chrono::Utc::now().naive_utc())
            .await
    }

    /// [`file_return`](Self::file_return) with an explicit filing time
    ///
    /// In sequential mode the return is persisted before the entries are updated. If an
    /// entry update fails the error is returned, the return stays recorded and entries not
    /// yet updated stay unfiled.
    #[instrument(skip(self, entries), fields(period = %period, entries = entries.len()))]
    pub async fn file_return_at(
        &self,
        period: &Period,
        entries: &[LedgerEntry],
        kind: ReturnKind,
        now: NaiveDateTime,
    ) -> LedgerResult<ReturnFiling> {
        let filing = self.build_return(period, entries, kind, ReturnStatus::Filed, now)?;
        let entry_ids = filing.linked_entry_ids.clone();

        let stored = match self.config.filing_write {
            FilingWrite::Transactional => self.storage.commit_filing(filing, &entry_ids).await?,
            FilingWrite::Sequential => {
                let stored = self.storage.create_return(filing).await?;
                let filed = LedgerEntryPatch::filed();
                let mut first_error = None;
                for entry_id in &entry_ids {
                    if let Err(err) = self.storage.update_entry(entry_id, &filed).await {
                        error!(
                            return_id = %stored.id,
                            entry_id = %entry_id,
                            error = %err,
                            "Return recorded but entry could not be marked filed"
                        );
                        first_error.get_or_insert(err);
                    }
                }
                if let Some(err) = first_error {
                    return Err(err);
                }
                stored
            }
        };

        info!(
            return_id = %stored.id,
            net_tax = %stored.net_tax,
            due = %stored.due_date,
            "GST return filed"
        );
        Ok(stored)
    }

    async fn entries_in(&self, period: &Period) -> LedgerResult<Vec<LedgerEntry>> {
        let entries = self.storage.list_entries().await?;
        Ok(entries
            .into_iter()
            .filter(|entry| period.matches(entry))
            .collect())
    }

    /// File a monthly return over every ledger entry dated in the month
    pub async fn file_monthly_return(&self, year: i32, month: u32) -> LedgerResult<ReturnFiling> {
        let period = Period::month(year, month)?;
        let entries = self.entries_in(&period).await?;
        self.file_return(&period, &entries, ReturnKind::Monthly).await
    }

    /// File a quarterly return over every ledger entry dated in the quarter
    pub async fn file_quarterly_return(
        &self,
        year: i32,
        quarter: u32,
    ) -> LedgerResult<ReturnFiling> {
        let period = Period::quarter(year, quarter)?;
        let entries = self.entries_in(&period).await?;
        self.file_return(&period, &entries, ReturnKind::Quarterly).await
    }

    /// Persist a draft return for a month or quarter without touching its entries
    #[instrument(skip(self), fields(period = %period))]
    pub async fn prepare_draft_return(&self, period: &Period) -> LedgerResult<ReturnFiling> {
        let kind = period.return_kind().ok_or_else(|| {
            LedgerError::Validation(format!("no return is filed for period {}", period))
        })?;
        let entries = self.entries_in(period).await?;
        let draft = self.build_return(
            period,
            &entries,
            kind,
            ReturnStatus::Draft,
            chrono::Utc::now().naive_utc(),
        )?;

        let stored = self.storage.create_return(draft).await?;
        info!(return_id = %stored.id, "Draft GST return prepared");
        Ok(stored)
    }

    /// Merge a partial update into a return
    ///
    /// With `enforce_return_transitions` set, a status change must move forward along
    /// `draft -> filed -> paid`.
    #[instrument(skip(self, patch))]
    pub async fn update_return(
        &self,
        return_id: &str,
        patch: &ReturnPatch,
    ) -> LedgerResult<ReturnFiling> {
        if let (true, Some(next)) = (self.config.enforce_return_transitions, patch.status) {
            let current = self
                .storage
                .get_return(return_id)
                .await?
                .ok_or_else(|| LedgerError::ReturnNotFound(return_id.to_string()))?;
            if !current.status.can_transition_to(next) {
                warn!(from = %current.status, to = %next, "Rejected return status change");
                return Err(LedgerError::InvalidTransition {
                    from: current.status,
                    to: next,
                });
            }
        }

        let updated = self.storage.update_return(return_id, patch).await?;
        info!(return_id, status = %updated.status, "GST return updated");
        Ok(updated)
    }

    pub async fn get_return(&self, return_id: &str) -> LedgerResult<Option<ReturnFiling>> {
        self.storage.get_return(return_id).await
    }

    /// All returns, newest period first
    pub async fn list_returns(&self) -> LedgerResult<Vec<ReturnFiling>> {
        self.storage.list_returns().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::entry::LedgerEntryBuilder;
    use crate::utils::memory_storage::{MemoryStorage, StorageOp};

    fn at(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    async fn seed(storage: &MemoryStorage) -> Vec<LedgerEntry> {
        let rows = [
            ("s1", GstKind::Collected, (2024, 6, 5), 1180, 180),
            ("s2", GstKind::Collected, (2024, 6, 18), 590, 90),
            ("p1", GstKind::Paid, (2024, 6, 25), 236, 36),
            ("s3", GstKind::Collected, (2024, 5, 2), 118, 18),
        ];
        let mut entries = Vec::new();
        for (id, kind, (y, m, d), amount, tax) in rows {
            let entry = LedgerEntryBuilder::new(
                id.to_string(),
                kind,
                NaiveDate::from_ymd_opt(y, m, d).unwrap(),
                id.to_string(),
            )
            .amounts(BigDecimal::from(amount), BigDecimal::from(tax))
            .build();
            storage.put_entry(&entry).await.unwrap();
            entries.push(entry);
        }
        entries
    }

    #[test]
    fn test_due_date_rolls_into_next_year() {
        assert_eq!(
            due_date_after(at(2024, 6, 30), 20).unwrap(),
            NaiveDate::from_ymd_opt(2024, 7, 20).unwrap()
        );
        assert_eq!(
            due_date_after(at(2024, 12, 3), 20).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 20).unwrap()
        );
        assert!(due_date_after(at(2024, 1, 15), 30).is_err());
    }

    #[tokio::test]
    async fn test_file_return_marks_every_entry_filed() {
        let storage = MemoryStorage::new();
        let entries = seed(&storage).await;
        let engine = ReturnEngine::new(storage.clone(), GstConfig::default());
        let june: Vec<LedgerEntry> = entries[..3].to_vec();

        let filing = engine
            .file_return_at(
                &Period::month(2024, 6).unwrap(),
                &june,
                ReturnKind::Monthly,
                at(2024, 7, 2),
            )
            .await
            .unwrap();

        assert_eq!(filing.status, ReturnStatus::Filed);
        assert_eq!(filing.period, "2024-06");
        assert_eq!(filing.filed_at, Some(at(2024, 7, 2)));
        assert_eq!(filing.due_date, NaiveDate::from_ymd_opt(2024, 8, 20).unwrap());
        // Gross basis: 1180 + 590 + 236
        assert_eq!(filing.net_tax, BigDecimal::from(2006));
        assert_eq!(filing.linked_entry_ids, vec!["s1", "s2", "p1"]);

        for entry in &june {
            assert!(storage.get_entry(&entry.id).await.unwrap().unwrap().is_filed());
        }
        assert!(!storage.get_entry("s3").await.unwrap().unwrap().is_filed());
        assert_eq!(engine.list_returns().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_tax_amount_basis() {
        let storage = MemoryStorage::new();
        seed(&storage).await;
        let config = GstConfig {
            net_tax_basis: NetTaxBasis::TaxAmount,
            ..Default::default()
        };
        let engine = ReturnEngine::new(storage, config);

        let filing = engine.file_monthly_return(2024, 6).await.unwrap();
        assert_eq!(filing.net_tax, BigDecimal::from(306));
        assert_eq!(filing.total_tax, BigDecimal::from(306));
        assert_eq!(filing.kind, ReturnKind::Monthly);
    }

    #[tokio::test]
    async fn test_quarterly_return_covers_the_quarter() {
        let storage = MemoryStorage::new();
        seed(&storage).await;
        let engine = ReturnEngine::new(storage.clone(), GstConfig::default());

        let filing = engine.file_quarterly_return(2024, 2).await.unwrap();
        assert_eq!(filing.period, "2024-Q2");
        assert_eq!(filing.kind, ReturnKind::Quarterly);
        assert_eq!(filing.linked_entry_ids.len(), 4);
        assert!(storage.get_entry("s3").await.unwrap().unwrap().is_filed());
    }

    #[tokio::test]
    async fn test_transactional_failure_leaves_nothing_behind() {
        let storage = MemoryStorage::new();
        let entries = seed(&storage).await;
        storage.fail_on(StorageOp::CommitFiling).unwrap();
        let engine = ReturnEngine::new(storage.clone(), GstConfig::default());

        let result = engine
            .file_return(&Period::month(2024, 6).unwrap(), &entries[..3], ReturnKind::Monthly)
            .await;

        assert!(matches!(result, Err(LedgerError::Storage(_))));
        assert!(engine.list_returns().await.unwrap().is_empty());
        assert!(!storage.get_entry("s1").await.unwrap().unwrap().is_filed());
    }

    #[tokio::test]
    async fn test_sequential_failure_keeps_the_return() {
        let storage = MemoryStorage::new();
        let entries = seed(&storage).await;
        storage.fail_on_key(StorageOp::UpdateEntry, "s2").unwrap();
        let config = GstConfig {
            filing_write: FilingWrite::Sequential,
            ..Default::default()
        };
        let engine = ReturnEngine::new(storage.clone(), config);

        let result = engine
            .file_return(&Period::month(2024, 6).unwrap(), &entries[..3], ReturnKind::Monthly)
            .await;

        assert!(result.is_err());
        assert_eq!(engine.list_returns().await.unwrap().len(), 1);
        assert!(storage.get_entry("s1").await.unwrap().unwrap().is_filed());
        assert!(!storage.get_entry("s2").await.unwrap().unwrap().is_filed());
    }

    #[tokio::test]
    async fn test_sequential_failure_still_files_the_rest() {
        let storage = MemoryStorage::new();
        let entries = seed(&storage).await;
        storage.fail_on_key(StorageOp::UpdateEntry, "s1").unwrap();
        let config = GstConfig {
            filing_write: FilingWrite::Sequential,
            ..Default::default()
        };
        let engine = ReturnEngine::new(storage.clone(), config);

        let result = engine
            .file_return(&Period::month(2024, 6).unwrap(), &entries[..3], ReturnKind::Monthly)
            .await;

        assert!(matches!(result, Err(LedgerError::Storage(_))));
        assert_eq!(engine.list_returns().await.unwrap().len(), 1);
        assert!(!storage.get_entry("s1").await.unwrap().unwrap().is_filed());
        assert!(storage.get_entry("s2").await.unwrap().unwrap().is_filed());
        assert!(storage.get_entry("p1").await.unwrap().unwrap().is_filed());
        assert!(!storage.get_entry("s3").await.unwrap().unwrap().is_filed());
    }

    #[tokio::test]
    async fn test_draft_then_file() {
        let storage = MemoryStorage::new();
        seed(&storage).await;
        let engine = ReturnEngine::new(storage.clone(), GstConfig::default());

        let draft = engine
            .prepare_draft_return(&Period::month(2024, 6).unwrap())
            .await
            .unwrap();
        assert_eq!(draft.status, ReturnStatus::Draft);
        assert_eq!(draft.filed_at, None);
        assert!(!storage.get_entry("s1").await.unwrap().unwrap().is_filed());

        let filed = engine
            .update_return(&draft.id, &ReturnPatch::filed_at(at(2024, 7, 10)))
            .await
            .unwrap();
        assert_eq!(filed.status, ReturnStatus::Filed);
        assert_eq!(filed.filed_at, Some(at(2024, 7, 10)));

        assert!(engine
            .prepare_draft_return(&Period::Year(2024))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_transition_guard() {
        let storage = MemoryStorage::new();
        seed(&storage).await;

        let open = ReturnEngine::new(storage.clone(), GstConfig::default());
        let filing = open.file_monthly_return(2024, 5).await.unwrap();
        let back_to_draft = ReturnPatch {
            status: Some(ReturnStatus::Draft),
            ..Default::default()
        };

        let guarded = ReturnEngine::new(
            storage.clone(),
            GstConfig {
                enforce_return_transitions: true,
                ..Default::default()
            },
        );
        let err = guarded
            .update_return(&filing.id, &back_to_draft)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InvalidTransition {
                from: ReturnStatus::Filed,
                to: ReturnStatus::Draft,
            }
        );
        assert_eq!(
            guarded
                .update_return(&filing.id, &ReturnPatch::paid())
                .await
                .unwrap()
                .status,
            ReturnStatus::Paid
        );
        assert!(guarded
            .update_return("missing", &ReturnPatch::paid())
            .await
            .unwrap_err()
            .is_not_found());

        // Without the guard any update goes through
        let reopened = open.update_return(&filing.id, &back_to_draft).await.unwrap();
        assert_eq!(reopened.status, ReturnStatus::Draft);
    }
}
