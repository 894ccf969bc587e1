//! Event ledger: durable, idempotent, time-ordered append over Redis Stack
//!
//! The ledger is one half of the dual-store architecture. It owns the
//! global ordered log, per-session views, the JSON document store, the
//! dedup index, and the secondary search index. The graph store never
//! reaches in here, and trimming the ledger never touches the graph.

pub mod index;
pub mod store;
pub mod trimmer;

pub use store::RedisLedger;
