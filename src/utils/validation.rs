//! Validation utilities
//!
//! The calculator and synchronizer assume clean, non-negative numbers. These helpers are
//! for the layer that accepts user input before handing it to the core.

use bigdecimal::BigDecimal;

use crate::period::Period;
use crate::tax::gst::LineItem;
use crate::types::*;

/// Coerce a negative amount to zero
pub fn non_negative(amount: BigDecimal) -> BigDecimal {
    if amount < BigDecimal::from(0) {
        BigDecimal::from(0)
    } else {
        amount
    }
}

/// Coerce an optional or unparsable numeric field to a non-negative amount
pub fn sanitize_amount(raw: Option<&str>) -> BigDecimal {
    raw.and_then(|s| s.trim().parse::<BigDecimal>().ok())
        .map(non_negative)
        .unwrap_or_else(|| BigDecimal::from(0))
}

/// Line item with every negative field clamped to zero
pub fn sanitize_line_item(item: &LineItem) -> LineItem {
    LineItem::new(
        non_negative(item.quantity.clone()),
        non_negative(item.rate.clone()),
        non_negative(item.tax_rate_percent.clone()),
    )
}

/// Invoice with every item's numeric fields clamped to zero
pub fn sanitize_invoice(invoice: &Invoice) -> Invoice {
    let mut clean = invoice.clone();
    for item in &mut clean.items {
        item.quantity = non_negative(item.quantity.clone());
        item.rate = non_negative(item.rate.clone());
        item.tax_rate_percent = non_negative(item.tax_rate_percent.clone());
    }
    clean
}

/// Validate that an amount is not negative
pub fn validate_non_negative(field: &str, amount: &BigDecimal) -> LedgerResult<()> {
    if *amount < BigDecimal::from(0) {
        Err(LedgerError::Validation(format!(
            "{} cannot be negative",
            field
        )))
    } else {
        Ok(())
    }
}

/// Validate a user-entered ledger record before it is stored
pub fn validate_manual_entry(draft: &ManualEntryDraft) -> LedgerResult<()> {
    if draft.description.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Description cannot be empty".to_string(),
        ));
    }

    if draft.description.len() > 500 {
        return Err(LedgerError::Validation(
            "Description cannot exceed 500 characters".to_string(),
        ));
    }

    validate_non_negative("Amount", &draft.amount)?;
    validate_non_negative("Tax amount", &draft.tax_amount)?;
    if let Some(rate) = &draft.tax_rate_percent {
        validate_non_negative("Tax rate", rate)?;
    }

    Ok(())
}

/// Parse a period key such as `2024-06`, `2024-Q2` or `2024`
pub fn parse_period(key: &str) -> LedgerResult<Period> {
    key.trim().parse()
}

/// Validate a GSTIN: 15 uppercase alphanumerics, state code digits first
pub fn validate_tax_id(tax_id: &str) -> LedgerResult<()> {
    let tax_id = tax_id.trim();
    if tax_id.len() != 15 {
        return Err(LedgerError::Validation(format!(
            "GSTIN must be 15 characters, got {}",
            tax_id.len()
        )));
    }

    if !tax_id
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
    {
        return Err(LedgerError::Validation(
            "GSTIN can only contain digits and uppercase letters".to_string(),
        ));
    }

    if !tax_id.chars().take(2).all(|c| c.is_ascii_digit()) {
        return Err(LedgerError::Validation(
            "GSTIN must start with a two-digit state code".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_sanitize_amount() {
        assert_eq!(sanitize_amount(Some("12.5")), "12.5".parse::<BigDecimal>().unwrap());
        assert_eq!(sanitize_amount(Some("-3")), BigDecimal::from(0));
        assert_eq!(sanitize_amount(Some("NaN")), BigDecimal::from(0));
        assert_eq!(sanitize_amount(Some("")), BigDecimal::from(0));
        assert_eq!(sanitize_amount(None), BigDecimal::from(0));
    }

    #[test]
    fn test_sanitize_line_item() {
        let item = LineItem::new(
            BigDecimal::from(-2),
            BigDecimal::from(100),
            BigDecimal::from(-18),
        );
        let clean = sanitize_line_item(&item);
        assert_eq!(clean.quantity, BigDecimal::from(0));
        assert_eq!(clean.rate, BigDecimal::from(100));
        assert_eq!(clean.tax_rate_percent, BigDecimal::from(0));
    }

    #[test]
    fn test_validate_manual_entry() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let draft = ManualEntryDraft::new(
            GstKind::Paid,
            BigDecimal::from(500),
            BigDecimal::from(90),
            "Input credit".to_string(),
            date,
        );
        assert!(validate_manual_entry(&draft).is_ok());

        let blank = ManualEntryDraft {
            description: "  ".to_string(),
            ..draft.clone()
        };
        assert!(validate_manual_entry(&blank).is_err());

        let negative = ManualEntryDraft {
            tax_amount: BigDecimal::from(-1),
            ..draft
        };
        assert!(validate_manual_entry(&negative).is_err());
    }

    #[test]
    fn test_validate_tax_id() {
        assert!(validate_tax_id("29ABCDE1234F1Z5").is_ok());
        assert!(validate_tax_id("29abcde1234f1z5").is_err());
        assert!(validate_tax_id("AB1234567890123").is_err());
        assert!(validate_tax_id("29ABCDE").is_err());
    }

    #[test]
    fn test_parse_period_trims_input() {
        assert_eq!(parse_period(" 2024-Q1 ").unwrap().key(), "2024-Q1");
        assert!(parse_period("2024-00").is_err());
    }
}
