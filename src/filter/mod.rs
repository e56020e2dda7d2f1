//! The bill filtering engine: filter specifications, the filter itself, option derivation for
//! cascading filters, and payment-mode aggregation. Everything here is pure and synchronous.
mod aggregate;
mod engine;
mod options;
mod spec;

pub use aggregate::{aggregate_by_payment_mode, summarize, BillSummary, PaymentModeTotal};
pub use engine::apply_filters;
pub use options::{distinct_cashiers, distinct_payment_mode_names, distinct_service_types};
pub use spec::{DateRange, FilterSpec, FilterUpdates};
