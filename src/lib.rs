//! Traceability-first context graph for AI agents
//!
//! An immutable stream of agent/tool/LLM events is appended to a Redis
//! ledger and projected into a typed Neo4j knowledge graph that
//! supports intent-aware subgraph retrieval, causal lineage traversal,
//! session-context assembly, and an Ebbinghaus-style forgetting curve
//! that ages the graph through four retention tiers.
//!
//! # Architecture
//!
//! ```text
//! Client ──append──▶ Ledger ──┬─▶ Projector  ──▶ Graph (nodes+edges)
//!                             ├─▶ Enricher   ──▶ Graph (keywords, importance)
//!                             ├─▶ Extractor  ──▶ Graph (prefs, skills, interests)
//!                             └─▶ Consolidator ▶ Graph (summaries, pruning)
//! Client ──query───────────────────────▶ Graph (scored retrieval)
//! ```
//!
//! The two stores are independent: trimming the ledger's hot window
//! never removes graph nodes, and deleting graph nodes never rewrites
//! the ledger. The ledger provides at-least-once delivery; every graph
//! write MERGEs, so redelivery converges.
//!
//! # Modules
//!
//! - [`domain`] - pure models, projection, scoring, and lifecycle rules
//! - [`ledger`] - Redis-backed event ledger
//! - [`graph`] - Neo4j graph store, retrieval, and maintenance
//! - [`worker`] - the four pipeline consumers
//! - [`api`] - thin HTTP adapters
//! - [`config`] - environment-driven configuration (`CG_` prefix)
//! - [`errors`] - error types

pub mod api;
pub mod config;
pub mod domain;
pub mod errors;
pub mod graph;
pub mod ledger;
pub mod worker;

pub use config::Config;
pub use errors::{GraphError, LedgerError, WorkerError};
pub use graph::GraphStore;
pub use ledger::RedisLedger;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
