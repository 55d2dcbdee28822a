//! GST (Goods and Services Tax) calculation engine for Indian tax compliance
//!
//! Only intra-state supply is modeled: the tax on every line is split exactly in half
//! between CGST and SGST.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// Standard GST rates for different categories of goods and services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GstCategory {
    /// Essential items (food, medicines, etc.) - 0%
    Essential,
    /// Reduced rate items - 5%
    Reduced,
    /// Standard rate items - 12%
    Standard,
    /// Higher rate items - 18%
    Higher,
    /// Luxury/Sin goods - 28%
    Luxury,
}

impl GstCategory {
    pub const ALL: [GstCategory; 5] = [
        GstCategory::Essential,
        GstCategory::Reduced,
        GstCategory::Standard,
        GstCategory::Higher,
        GstCategory::Luxury,
    ];

    /// Get the standard GST rate percentage for this category
    pub fn rate(&self) -> BigDecimal {
        match self {
            GstCategory::Essential => BigDecimal::from(0),
            GstCategory::Reduced => BigDecimal::from(5),
            GstCategory::Standard => BigDecimal::from(12),
            GstCategory::Higher => BigDecimal::from(18),
            GstCategory::Luxury => BigDecimal::from(28),
        }
    }

    /// Category whose standard rate equals `rate`, if any
    pub fn from_rate(rate: &BigDecimal) -> Option<Self> {
        Self::ALL.into_iter().find(|category| &category.rate() == rate)
    }
}

/// Numeric input for one line; callers sanitize to non-negative values first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub quantity: BigDecimal,
    pub rate: BigDecimal,
    pub tax_rate_percent: BigDecimal,
}

impl LineItem {
    pub fn new(quantity: BigDecimal, rate: BigDecimal, tax_rate_percent: BigDecimal) -> Self {
        Self {
            quantity,
            rate,
            tax_rate_percent,
        }
    }

    pub fn with_category(quantity: BigDecimal, rate: BigDecimal, category: GstCategory) -> Self {
        Self::new(quantity, rate, category.rate())
    }
}

/// Tax breakdown of a single line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineCalculation {
    /// quantity * rate
    pub amount: BigDecimal,
    pub tax_amount: BigDecimal,
    pub cgst: BigDecimal,
    pub sgst: BigDecimal,
    /// amount + tax_amount
    pub line_total: BigDecimal,
}

/// Totals of a whole document (invoice or quotation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub subtotal: BigDecimal,
    pub tax_amount: BigDecimal,
    pub cgst: BigDecimal,
    pub sgst: BigDecimal,
    pub round_off: BigDecimal,
    /// subtotal + tax_amount - round_off
    pub total: BigDecimal,
}

/// Split a tax amount into equal CGST and SGST halves
pub fn split_tax(tax_amount: &BigDecimal) -> (BigDecimal, BigDecimal) {
    let half = tax_amount / BigDecimal::from(2);
    (half.clone(), half)
}

/// Compute amount, tax and the CGST/SGST split for one line
pub fn compute_line(item: &LineItem) -> LineCalculation {
    let amount = &item.quantity * &item.rate;
    let tax_amount = (&amount * &item.tax_rate_percent) / BigDecimal::from(100);
    let (cgst, sgst) = split_tax(&tax_amount);
    let line_total = &amount + &tax_amount;

    LineCalculation {
        amount,
        tax_amount,
        cgst,
        sgst,
        line_total,
    }
}

/// Compute document totals; `round_off` is subtracted from the grand total
pub fn compute_document_totals(items: &[LineItem], round_off: BigDecimal) -> DocumentTotals {
    let lines: Vec<LineCalculation> = items.iter().map(compute_line).collect();

    let subtotal: BigDecimal = lines.iter().map(|line| &line.amount).sum();
    let tax_amount: BigDecimal = lines.iter().map(|line| &line.tax_amount).sum();
    let (cgst, sgst) = split_tax(&tax_amount);
    let total = &subtotal + &tax_amount - &round_off;

    DocumentTotals {
        subtotal,
        tax_amount,
        cgst,
        sgst,
        round_off,
        total,
    }
}

/// Total tax over all lines
pub fn total_tax(items: &[LineItem]) -> BigDecimal {
    items.iter().map(|item| compute_line(item).tax_amount).sum()
}

/// First non-zero tax rate among the lines, used as the document's headline rate
pub fn representative_rate(items: &[LineItem]) -> Option<BigDecimal> {
    items
        .iter()
        .map(|item| &item.tax_rate_percent)
        .find(|rate| **rate > BigDecimal::from(0))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_compute_line() {
        let line = compute_line(&LineItem::new(
            BigDecimal::from(2),
            BigDecimal::from(500),
            BigDecimal::from(18),
        ));

        assert_eq!(line.amount, BigDecimal::from(1000));
        assert_eq!(line.tax_amount, BigDecimal::from(180));
        assert_eq!(line.cgst, BigDecimal::from(90));
        assert_eq!(line.sgst, BigDecimal::from(90));
        assert_eq!(line.line_total, BigDecimal::from(1180));
    }

    #[test]
    fn test_split_is_exact_for_odd_amounts() {
        let quantities = ["0", "1", "3", "7.5", "13"];
        let rates = ["0", "0.01", "99.99", "333.33", "1234.567"];
        let tax_rates = ["0", "5", "12", "18", "28", "0.25"];

        for q in quantities {
            for r in rates {
                for t in tax_rates {
                    let line = compute_line(&LineItem::new(dec(q), dec(r), dec(t)));
                    assert_eq!(&line.cgst + &line.sgst, line.tax_amount, "{q} x {r} @ {t}");
                    assert_eq!(line.cgst, line.sgst);
                }
            }
        }
    }

    #[test]
    fn test_document_totals() {
        let items = vec![
            LineItem::with_category(BigDecimal::from(2), BigDecimal::from(500), GstCategory::Higher),
            LineItem::with_category(BigDecimal::from(1), BigDecimal::from(300), GstCategory::Higher),
        ];

        let totals = compute_document_totals(&items, BigDecimal::from(0));

        assert_eq!(totals.subtotal, BigDecimal::from(1300));
        assert_eq!(totals.tax_amount, BigDecimal::from(234)); // 18% of 1300
        assert_eq!(totals.cgst, BigDecimal::from(117));
        assert_eq!(totals.sgst, BigDecimal::from(117));
        assert_eq!(totals.total, BigDecimal::from(1534));
    }

    #[test]
    fn test_round_off_is_subtracted() {
        let items = vec![LineItem::new(
            BigDecimal::from(3),
            dec("33.33"),
            BigDecimal::from(5),
        )];

        let totals = compute_document_totals(&items, dec("-0.0105"));

        assert_eq!(totals.subtotal, dec("99.99"));
        assert_eq!(totals.tax_amount, dec("4.9995"));
        assert_eq!(totals.total, dec("105"));
    }

    #[test]
    fn test_empty_document() {
        let totals = compute_document_totals(&[], BigDecimal::from(0));
        assert_eq!(totals.total, BigDecimal::from(0));
        assert_eq!(total_tax(&[]), BigDecimal::from(0));
        assert_eq!(representative_rate(&[]), None);
    }

    #[test]
    fn test_representative_rate_skips_exempt_lines() {
        let items = vec![
            LineItem::with_category(BigDecimal::from(1), BigDecimal::from(10), GstCategory::Essential),
            LineItem::with_category(BigDecimal::from(1), BigDecimal::from(10), GstCategory::Standard),
            LineItem::with_category(BigDecimal::from(1), BigDecimal::from(10), GstCategory::Luxury),
        ];
        assert_eq!(representative_rate(&items), Some(BigDecimal::from(12)));
    }

    #[test]
    fn test_category_from_rate() {
        assert_eq!(
            GstCategory::from_rate(&BigDecimal::from(18)),
            Some(GstCategory::Higher)
        );
        assert_eq!(GstCategory::from_rate(&BigDecimal::from(7)), None);
    }
}
