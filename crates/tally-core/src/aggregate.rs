//! # Invoice Aggregation
//!
//! Reduces raw invoice rows to one [`VendorAggregate`] per vendor.
//!
//! ## Rules
//! ```text
//! rows ──► trim vendor name ──► skip blanks ──► group (case-sensitive)
//!                                                   │
//!                                                   ▼
//!                           checked sum in Money (cents), count rows
//!                                                   │
//!                                                   ▼
//!                                  ordered by vendor name (byte order)
//! ```
//!
//! The SQL source pre-groups inside the database and hands its rows to
//! [`merge_subtotals`]; the HTTP feed source calls [`aggregate_invoices`].
//! Both end in the same merge, so vendor names are unique after trimming
//! no matter how the database's own `TRIM()` treats tabs or newlines.

use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::money::Money;
use crate::types::VendorAggregate;
use crate::validation::normalize_vendor_name;

/// One raw invoice, before grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRow {
    pub vendor_name: String,
    pub amount: Money,
}

impl InvoiceRow {
    pub fn new(vendor_name: impl Into<String>, amount: Money) -> Self {
        InvoiceRow {
            vendor_name: vendor_name.into(),
            amount,
        }
    }
}

/// A partial total for one (untrimmed) vendor name, such as a `GROUP BY` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtotal {
    pub vendor_name: String,
    pub invoice_count: i64,
    pub amount: Money,
}

impl Subtotal {
    pub fn new(vendor_name: impl Into<String>, invoice_count: i64, amount: Money) -> Self {
        Subtotal {
            vendor_name: vendor_name.into(),
            invoice_count,
            amount,
        }
    }
}

impl From<InvoiceRow> for Subtotal {
    fn from(row: InvoiceRow) -> Self {
        Subtotal::new(row.vendor_name, 1, row.amount)
    }
}

/// Groups rows by trimmed vendor name and sums their amounts exactly.
///
/// Rows whose vendor name is blank after trimming are skipped. The result
/// is sorted by vendor name and every aggregate carries its row count.
///
/// # Errors
/// [`CoreError::TotalOverflow`] if a vendor's total leaves the `i64` cents
/// range.
pub fn aggregate_invoices<I>(rows: I) -> Result<Vec<VendorAggregate>, CoreError>
where
    I: IntoIterator<Item = InvoiceRow>,
{
    merge_subtotals(rows.into_iter().map(Subtotal::from))
}

/// Merges partial totals whose vendor names are equal after trimming.
///
/// Counts and amounts are re-summed with overflow checks; blank names and
/// negative counts are skipped.
pub fn merge_subtotals<I>(subtotals: I) -> Result<Vec<VendorAggregate>, CoreError>
where
    I: IntoIterator<Item = Subtotal>,
{
    let mut groups: BTreeMap<String, (i64, Money)> = BTreeMap::new();

    for subtotal in subtotals {
        let Some(vendor) = normalize_vendor_name(&subtotal.vendor_name) else {
            continue;
        };
        if subtotal.invoice_count < 0 {
            continue;
        }

        let (count, total) = groups.entry(vendor.clone()).or_insert((0, Money::zero()));
        let merged = count
            .checked_add(subtotal.invoice_count)
            .zip(total.checked_add(subtotal.amount));

        match merged {
            Some((c, t)) => {
                *count = c;
                *total = t;
            }
            None => return Err(CoreError::TotalOverflow { vendor }),
        }
    }

    Ok(groups
        .into_iter()
        .map(|(vendor_name, (count, total_amount))| VendorAggregate {
            vendor_name,
            invoice_count: Some(count),
            total_amount,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row(vendor: &str, cents: i64) -> InvoiceRow {
        InvoiceRow::new(vendor, Money::from_cents(cents))
    }

    #[test]
    fn test_groups_and_sums() {
        let totals = aggregate_invoices(vec![
            row("Acme", 15000),
            row("Globex", 9999),
            row(" Acme", 15000),
            row("Acme ", 15000),
        ])
        .unwrap();

        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].vendor_name, "Acme");
        assert_eq!(totals[0].invoice_count, Some(3));
        assert_eq!(totals[0].total_amount, Money::from_cents(45000));
        assert_eq!(totals[1].vendor_name, "Globex");
        assert_eq!(totals[1].invoice_count, Some(1));
        assert_eq!(totals[1].total_amount, Money::from_cents(9999));
    }

    #[test]
    fn test_case_sensitive_and_skips_blank() {
        let totals = aggregate_invoices(vec![row("acme", 1), row("Acme", 2), row("   ", 5), row("", 7)]).unwrap();

        let names: Vec<_> = totals.iter().map(|a| a.vendor_name.as_str()).collect();
        assert_eq!(names, vec!["Acme", "acme"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate_invoices(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_all_whitespace_kinds_merge_into_one_vendor() {
        let totals = aggregate_invoices(vec![row("Acme", 100), row("Acme\t", 200), row("\nAcme", 300), row("\t", 9)])
            .unwrap();

        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].vendor_name, "Acme");
        assert_eq!(totals[0].invoice_count, Some(3));
        assert_eq!(totals[0].total_amount, Money::from_cents(600));
    }

    #[test]
    fn test_merge_subtotals_resums_and_sorts() {
        let totals = merge_subtotals(vec![
            Subtotal::new("Globex", 1, Money::from_cents(9999)),
            Subtotal::new("Acme\t", 2, Money::from_cents(30000)),
            Subtotal::new("Acme", 1, Money::from_cents(15000)),
            Subtotal::new("\r\n", 4, Money::from_cents(1)),
        ])
        .unwrap();

        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].vendor_name, "Acme");
        assert_eq!(totals[0].invoice_count, Some(3));
        assert_eq!(totals[0].total_amount, Money::from_cents(45000));
        assert_eq!(totals[1].vendor_name, "Globex");
    }

    #[test]
    fn test_overflowing_total_is_an_error() {
        let huge: Money = "90000000000000000".parse().unwrap();
        let result = aggregate_invoices(vec![InvoiceRow::new("Acme", huge), InvoiceRow::new("Acme", huge)]);

        assert!(matches!(result, Err(CoreError::TotalOverflow { ref vendor }) if vendor == "Acme"));
    }

    #[test]
    fn test_large_totals_for_different_vendors_are_fine() {
        let huge: Money = "90000000000000000".parse().unwrap();
        let totals = aggregate_invoices(vec![InvoiceRow::new("Acme", huge), InvoiceRow::new("Globex", huge)]).unwrap();
        assert_eq!(totals.len(), 2);
    }

    #[test]
    fn test_decimal_amounts_do_not_drift() {
        let rows = (0..1000).map(|_| InvoiceRow::new("Acme", "0.10".parse().unwrap()));
        let totals = aggregate_invoices(rows).unwrap();
        assert_eq!(totals[0].total_amount.to_decimal_string(), "100.00");
    }

    fn arb_rows() -> impl Strategy<Value = Vec<(String, i64)>> {
        let vendor = prop::sample::select(vec!["Acme", " Acme", "Globex", "Initech ", "  ", "acme"]);
        prop::collection::vec((vendor.prop_map(str::to_string), -1_000_000i64..1_000_000), 0..64)
    }

    proptest! {
        #[test]
        fn prop_order_independent(rows in arb_rows(), seed in any::<u64>()) {
            let forward: Vec<_> = rows.iter().map(|(v, c)| row(v, *c)).collect();

            let mut shuffled = forward.clone();
            // Deterministic rotate + reverse as a permutation.
            let len = shuffled.len().max(1);
            shuffled.rotate_left((seed as usize) % len);
            shuffled.reverse();

            prop_assert_eq!(aggregate_invoices(forward).unwrap(), aggregate_invoices(shuffled).unwrap());
        }

        #[test]
        fn prop_exact_sum_per_vendor(rows in arb_rows()) {
            let totals = aggregate_invoices(rows.iter().map(|(v, c)| row(v, *c))).unwrap();

            for agg in &totals {
                let expected: i64 = rows
                    .iter()
                    .filter(|(v, _)| v.trim() == agg.vendor_name)
                    .map(|(_, c)| *c)
                    .sum();
                prop_assert_eq!(agg.total_amount.cents(), expected);
            }

            let distinct: std::collections::BTreeSet<_> = rows
                .iter()
                .map(|(v, _)| v.trim())
                .filter(|v| !v.is_empty())
                .collect();
            prop_assert_eq!(totals.len(), distinct.len());
        }
    }
}
