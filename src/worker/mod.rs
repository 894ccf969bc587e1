//! Pipeline consumers fed by the event ledger
//!
//! Four consumers, each in its own consumer group: projection (nodes
//! and causal/temporal edges), extraction (session knowledge),
//! enrichment (keywords and importance), consolidation (summaries and
//! forgetting). Each consumer processes sequentially; consumers run in
//! parallel with one another.

pub mod consolidation;
pub mod consumer;
pub mod enrichment;
pub mod extraction;
pub mod projection;

pub use consolidation::ConsolidationConsumer;
pub use consumer::{ConsumerRunner, StopSignal, StreamConsumer};
pub use enrichment::EnrichmentConsumer;
pub use extraction::ExtractionConsumer;
pub use projection::ProjectionConsumer;
