//! Graph store: typed nodes and edges over Neo4j with MERGE idempotence
//!
//! Writes are MERGE-based so at-least-once delivery from the ledger
//! converges; retrieval assembles Atlas envelopes and maintenance ages
//! the graph through the retention tiers.

pub mod maintenance;
pub mod queries;
pub mod retrieval;
pub mod store;
pub mod users;

pub use maintenance::GraphStats;
pub use store::GraphStore;
