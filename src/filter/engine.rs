//! Applies a `FilterSpec` to a list of bills.
//!
//! Each dimension is a small stateless predicate over a single `Transaction`. The predicates are
//! combined with logical AND, and within one dimension any listed value matches (OR).
//!
//! The payment-method dimension is special: it does not only decide inclusion, it prunes each
//! bill's `payments` down to the requested methods. A bill whose payments are all pruned away is
//! then dropped by the paid-view policy, which is always applied.

use crate::filter::FilterSpec;
use crate::model::{Payment, Transaction};
use std::collections::BTreeSet;
use tracing::trace;

type Predicate<'a> = Box<dyn Fn(&Transaction) -> bool + 'a>;

/// Returns a fresh list of the bills in `transactions` that satisfy `spec`. The input is never
/// modified and the relative order of the bills is preserved.
pub fn apply_filters(transactions: &[Transaction], spec: &FilterSpec) -> Vec<Transaction> {
    let methods = lowercase_set(spec.payment_methods());
    let predicates = predicates(spec);

    let filtered: Vec<Transaction> = transactions
        .iter()
        .map(|txn| prune_payments(txn, &methods))
        .filter(has_payments)
        .filter(|txn| predicates.iter().all(|p| p(txn)))
        .collect();

    trace!(
        "apply_filters kept {} of {} bills",
        filtered.len(),
        transactions.len()
    );
    filtered
}

/// The inclusion predicates for every constrained dimension of `spec`. Dimensions with no values
/// contribute no predicate.
fn predicates(spec: &FilterSpec) -> Vec<Predicate<'_>> {
    let mut predicates: Vec<Predicate<'_>> = Vec::new();
    if !spec.service_types().is_empty() {
        predicates.push(Box::new(move |txn: &Transaction| {
            has_service_type(txn, spec.service_types())
        }));
    }
    if !spec.cashiers().is_empty() {
        predicates.push(Box::new(move |txn: &Transaction| {
            has_cashier(txn, spec.cashiers())
        }));
    }
    if let Some(status) = spec.status() {
        predicates.push(Box::new(move |txn: &Transaction| txn.status() == status));
    }
    predicates
}

/// Copies `txn`, keeping only the payments whose mode name matches one of `methods`, ignoring
/// case. `methods` must already be lowercase. An empty `methods` keeps every payment.
fn prune_payments(txn: &Transaction, methods: &BTreeSet<String>) -> Transaction {
    if methods.is_empty() {
        return txn.clone();
    }
    let payments: Vec<Payment> = txn
        .payments()
        .iter()
        .filter(|p| methods.contains(&p.instance_type_name().to_lowercase()))
        .cloned()
        .collect();
    Transaction {
        payments,
        ..txn.clone()
    }
}

/// Only bills with at least one payment belong in a paid view.
fn has_payments(txn: &Transaction) -> bool {
    !txn.payments().is_empty()
}

fn has_service_type(txn: &Transaction, service_types: &BTreeSet<String>) -> bool {
    txn.line_items()
        .iter()
        .any(|item| service_types.contains(item.service_type_uuid()))
}

fn has_cashier(txn: &Transaction, cashier_ids: &BTreeSet<String>) -> bool {
    cashier_ids.contains(txn.cashier().id())
}

fn lowercase_set(values: &BTreeSet<String>) -> BTreeSet<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}
