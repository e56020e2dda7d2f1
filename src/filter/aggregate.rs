//! Totals by payment mode for a set of bills.

use crate::model::{Amount, PaymentMode, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// The total tendered through one payment mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentModeTotal {
    pub payment_mode_name: String,
    pub total: Amount,
}

impl PaymentModeTotal {
    pub fn new(payment_mode_name: impl Into<String>, total: impl Into<Amount>) -> Self {
        Self {
            payment_mode_name: payment_mode_name.into(),
            total: total.into(),
        }
    }
}

/// Headline numbers for a set of bills.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillSummary {
    pub bill_count: usize,
    pub payment_count: usize,
    pub total: Amount,
}

/// Groups the payments of `transactions` by payment-mode name and sums the tendered amounts.
///
/// - With no `known_modes` there is nothing to report against and the result is empty.
/// - Every known mode gets an entry, zero if nothing was paid through it, so the result always
///   has a stable set of categories. Known modes come first, in the order given.
/// - When `active_mode_filter` is not empty, only bills whose first payment's mode name is in the
///   filter are counted. The names are compared exactly.
/// - Payment-mode names are used exactly as they appear on the payments. A name that is not a
///   known mode is appended when it is first seen.
pub fn aggregate_by_payment_mode(
    transactions: &[Transaction],
    known_modes: &[PaymentMode],
    active_mode_filter: &BTreeSet<String>,
) -> Vec<PaymentModeTotal> {
    if known_modes.is_empty() {
        return Vec::new();
    }
    if transactions.is_empty() {
        return known_modes
            .iter()
            .map(|mode| PaymentModeTotal::new(mode.name(), Amount::ZERO))
            .collect();
    }

    let mut totals: Vec<PaymentModeTotal> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for mode in known_modes {
        if !index.contains_key(mode.name()) {
            index.insert(mode.name().to_string(), totals.len());
            totals.push(PaymentModeTotal::new(mode.name(), Amount::ZERO));
        }
    }

    let counted = transactions
        .iter()
        .filter(|txn| passes_mode_filter(txn, active_mode_filter));

    for payment in counted.flat_map(|txn| txn.payments()) {
        let name = payment.instance_type_name();
        let ix = match index.get(name) {
            Some(ix) => *ix,
            None => {
                index.insert(name.to_string(), totals.len());
                totals.push(PaymentModeTotal::new(name, Amount::ZERO));
                totals.len() - 1
            }
        };
        totals[ix].total += payment.amount_tendered();
    }

    totals
}

fn passes_mode_filter(txn: &Transaction, active_mode_filter: &BTreeSet<String>) -> bool {
    if active_mode_filter.is_empty() {
        return true;
    }
    txn.payments()
        .first()
        .is_some_and(|first| active_mode_filter.contains(first.instance_type_name()))
}

/// Counts bills and payments and sums every tendered amount.
pub fn summarize(transactions: &[Transaction]) -> BillSummary {
    transactions
        .iter()
        .fold(BillSummary::default(), |mut summary, txn| {
            summary.bill_count += 1;
            summary.payment_count += txn.payments().len();
            summary.total += txn.total_tendered();
            summary
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BillStatus;
    use crate::test::{bill, modes, sample_bills, subsets};

    fn no_filter() -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn total_of(totals: &[PaymentModeTotal], name: &str) -> f64 {
        totals
            .iter()
            .find(|t| t.payment_mode_name == name)
            .map(|t| t.total.value())
            .unwrap_or_else(|| panic!("no total for {name}"))
    }

    #[test]
    fn test_no_known_modes_gives_empty_result() {
        let totals = aggregate_by_payment_mode(&sample_bills(), &[], &no_filter());
        assert!(totals.is_empty());
    }

    #[test]
    fn test_empty_input_gives_zero_per_known_mode() {
        let known = modes(&["Cash", "Insurance", "Mpesa"]);
        let totals = aggregate_by_payment_mode(&[], &known, &no_filter());
        assert_eq!(totals.len(), known.len());
        assert!(totals.iter().all(|t| t.total.is_zero()));
        let names: Vec<&str> = totals.iter().map(|t| t.payment_mode_name.as_str()).collect();
        assert_eq!(names, vec!["Cash", "Insurance", "Mpesa"]);
    }

    #[test]
    fn test_totals_are_conserved() {
        let bills = sample_bills();
        let totals = aggregate_by_payment_mode(&bills, &modes(&["Cash"]), &no_filter());
        let aggregated: f64 = totals.iter().map(|t| t.total.value()).sum();
        let expected: f64 = bills
            .iter()
            .flat_map(|b| b.payments())
            .map(|p| p.amount_tendered().value())
            .sum();
        assert_eq!(aggregated, expected);
    }

    #[test]
    fn test_totals_are_conserved_for_every_subset() {
        let known = modes(&["Cash", "Insurance"]);
        for bills in subsets(&sample_bills()) {
            let totals = aggregate_by_payment_mode(&bills, &known, &no_filter());
            let aggregated: f64 = totals.iter().map(|t| t.total.value()).sum();
            let expected: f64 = bills.iter().map(|b| b.total_tendered().value()).sum();
            assert!((aggregated - expected).abs() < 1e-9, "{aggregated} != {expected}");
            assert!(totals.len() >= known.len());
        }
    }

    #[test]
    fn test_names_are_case_sensitive_and_unknown_modes_appended() {
        let totals =
            aggregate_by_payment_mode(&sample_bills(), &modes(&["Cash", "Mpesa"]), &no_filter());
        let names: Vec<&str> = totals.iter().map(|t| t.payment_mode_name.as_str()).collect();
        assert_eq!(names, vec!["Cash", "Mpesa", "Insurance", "mpesa", "Waiver"]);
        assert_eq!(total_of(&totals, "Cash"), 550.5);
        assert_eq!(total_of(&totals, "Mpesa"), 250.5);
        assert_eq!(total_of(&totals, "mpesa"), 99.5);
        assert_eq!(total_of(&totals, "Insurance"), 1200.0);
    }

    #[test]
    fn test_known_mode_with_no_payments_stays_zero() {
        let bills = vec![bill("1", BillStatus::Paid, "A", &[("Cash", 10.0)])];
        let totals = aggregate_by_payment_mode(&bills, &modes(&["Cash", "Cheque"]), &no_filter());
        assert_eq!(totals.len(), 2);
        assert_eq!(total_of(&totals, "Cash"), 10.0);
        assert_eq!(total_of(&totals, "Cheque"), 0.0);
    }

    #[test]
    fn test_mode_filter_uses_first_payment() {
        let bills = sample_bills();
        let filter = BTreeSet::from(["Insurance".to_string()]);
        let totals = aggregate_by_payment_mode(&bills, &modes(&["Cash", "Insurance"]), &filter);
        // Only b2 leads with Insurance; its trailing Cash payment still counts.
        assert_eq!(total_of(&totals, "Insurance"), 1200.0);
        assert_eq!(total_of(&totals, "Cash"), 50.0);
        assert_eq!(totals.len(), 2);
    }

    #[test]
    fn test_duplicate_known_mode_names_share_a_total() {
        let bills = vec![bill("1", BillStatus::Paid, "A", &[("Cash", 10.0)])];
        let totals = aggregate_by_payment_mode(&bills, &modes(&["Cash", "Cash"]), &no_filter());
        assert_eq!(totals, vec![PaymentModeTotal::new("Cash", 10.0)]);
    }

    #[test]
    fn test_summarize() {
        let summary = summarize(&sample_bills());
        assert_eq!(summary.bill_count, 5);
        assert_eq!(summary.payment_count, 7);
        assert_eq!(summary.total.value(), 2400.5);
    }
}
