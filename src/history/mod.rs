//! Operation History
//!
//! Append-only, per-table audit trail of mutating operations. The ledger is
//! owned by the `Database` session: it starts empty and is discarded with it.
//!
//! ## Guarantees
//!
//! - Entries for a table are kept in append order, which is chronological
//!   for a single session
//! - Entries are never overwritten or reordered
//! - Query operations are not recorded

mod ledger;

pub use ledger::{HistoryLedger, OperationSummary};
