//! Mutation Engines
//!
//! Upsert and delete against registered tables. Every call is a full
//! load-mutate-save cycle and produces one `OperationRecord`, which is
//! appended to the session ledger and returned to the caller.
//!
//! ## Architecture
//!
//! ```text
//! ConfigRegistry ──(dedup columns)──┐
//!                                   ▼
//! TableStore::load ──► UpsertEngine / DeleteEngine ──► TableStore::save
//!                                   │
//!                                   └──► OperationRecord ──► HistoryLedger
//! ```

mod delete;
mod record;
mod stats;
mod upsert;
pub mod upsert_dst;

pub use delete::DeleteEngine;
pub use record::{OperationArgs, OperationKind, OperationRecord, Statistics};
pub use stats::{percent, round2, DeleteStatistics, InsertStatistics};
pub use upsert::UpsertEngine;
pub use upsert_dst::{
    run_upsert_batch, summarize_upsert_batch, UpsertDSTConfig, UpsertDSTHarness, UpsertDSTResult,
};
