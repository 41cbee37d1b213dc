//! Table Persistence
//!
//! Each table is one CSV file holding all of its rows. Every mutating
//! operation re-reads the table and re-persists it in full.
//!
//! ## Architecture
//!
//! ```text
//! Frame → codec::encode → staging file → fsync → rename → <table>.csv
//! ```
//!
//! ## Key Features
//!
//! - **Atomic replace-on-write**: readers never see a partially written file
//! - **Stable column order**: the header is written in frame column order
//! - **Consistent absent markers**: `Null` round-trips as an empty field

mod atomic;
pub mod codec;
mod local;
mod memory;
mod store;

pub(crate) use atomic::write_atomically;
pub use local::LocalCsvStore;
pub use memory::InMemoryTableStore;
pub use store::TableStore;
