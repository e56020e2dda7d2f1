//! Derives the values a user can pick from, given a list of bills.
//!
//! These work on either the full store or a filtered set, which is how cascading filters are
//! built: the cashier choices offered for a date range are the cashiers found in that range.

use crate::model::{Cashier, Transaction};
use std::collections::HashSet;

/// Every distinct cashier in `transactions`, keyed by cashier id, in first-encounter order.
///
/// When two bills carry the same cashier id with different display names, the name from the first
/// bill is kept.
pub fn distinct_cashiers(transactions: &[Transaction]) -> Vec<Cashier> {
    let mut seen = HashSet::new();
    transactions
        .iter()
        .map(|txn| txn.cashier())
        .filter(|cashier| seen.insert(cashier.id().to_string()))
        .cloned()
        .collect()
}

/// Every distinct payment-mode name used by a payment in `transactions`, in first-encounter
/// order. Names are compared exactly.
pub fn distinct_payment_mode_names(transactions: &[Transaction]) -> Vec<String> {
    let mut seen = HashSet::new();
    transactions
        .iter()
        .flat_map(|txn| txn.payments())
        .map(|payment| payment.instance_type_name())
        .filter(|name| seen.insert(name.to_string()))
        .map(String::from)
        .collect()
}

/// Every distinct service type uuid found on a line item in `transactions`, in first-encounter
/// order.
pub fn distinct_service_types(transactions: &[Transaction]) -> Vec<String> {
    let mut seen = HashSet::new();
    transactions
        .iter()
        .flat_map(|txn| txn.line_items())
        .map(|item| item.service_type_uuid())
        .filter(|uuid| seen.insert(uuid.to_string()))
        .map(String::from)
        .collect()
}
