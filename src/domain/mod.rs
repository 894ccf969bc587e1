//! Pure domain logic: models, projection, scoring, and lifecycle rules
//!
//! Nothing in this module touches Redis or Neo4j. The ledger, graph,
//! and worker layers compose these functions around I/O.

pub mod atlas;
pub mod consolidation;
pub mod event;
pub mod extraction;
pub mod forgetting;
pub mod graph;
pub mod intent;
pub mod projection;
pub mod resolution;
pub mod scoring;
pub mod traversal;
pub mod validation;

pub use atlas::{
    AtlasEdge, AtlasNode, AtlasResponse, NodeScores, Pagination, Provenance, QueryCapacity,
    QueryMeta,
};
pub use event::{Event, EventQuery, EventStatus};
pub use graph::{
    CausalMechanism, Edge, EdgeKind, EntityKind, EntityNode, EventNode, IntentKind, NodeKind,
    ReferenceRole, RetentionTier, SummaryNode,
};
pub use traversal::{LineageQuery, SubgraphQuery};
