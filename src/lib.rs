//! Multi-tenant property-graph store on SQLite: tenants own graphs, graphs
//! own nodes and edges, and graphs, nodes, and edges carry labels, tags, and
//! embedding vectors. Queries are assembled from declarative entity
//! descriptors with every literal bound as a statement parameter; deletes go
//! through a cascade planner that never leaves dependent rows behind.

pub mod builder;
pub mod cache;
pub mod cancel;
pub mod cascade;
pub mod descriptor;
pub mod errors;
pub mod filter;
pub mod model;
pub mod page;
pub mod predicates;
pub mod record;
pub mod schema;
pub mod store;
pub mod vector_index;

pub use crate::cancel::CancelToken;
pub use crate::cascade::DeleteTarget;
pub use crate::descriptor::{EntityDescriptor, Ordering};
pub use crate::errors::GraphStoreError;
pub use crate::filter::{Expr, FilterOp, FilterValue};
pub use crate::model::{
    Attachment, Credential, Edge, Embedding, EntityType, Graph, Label, Node, StoreStatistics, Tag,
    TagPair, Tenant, User, Vector, VectorIndexConfig,
};
pub use crate::page::{DEFAULT_MAX_RESULTS, EnumerationRequest, EnumerationResult};
pub use crate::record::Entity;
pub use crate::store::{GraphStore, ReadQuery};
pub use crate::vector_index::{BruteForceIndex, VectorIndex, rebuild_vector_index};
