//! Types that represent the billing data model, such as `Transaction` and `PaymentMode`.
mod amount;
mod payment_mode;
mod transaction;

pub use amount::{Amount, AmountError};
pub use payment_mode::PaymentMode;
pub use transaction::{BillStatus, Cashier, LineItem, Payment, Transaction};
