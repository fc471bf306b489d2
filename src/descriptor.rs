use serde::{Deserialize, Serialize};

use crate::errors::GraphStoreError;
use crate::model::EntityType;

/// Result ordering requested by a caller. Created/Guid/Name orderings map to
/// stored columns; Cost is meaningful only for edges and the connectivity
/// orderings only for nodes, where the incident-edge count is derived per
/// query rather than stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ordering {
    CreatedAscending,
    CreatedDescending,
    GuidAscending,
    GuidDescending,
    NameAscending,
    NameDescending,
    CostAscending,
    CostDescending,
    MostConnected,
    LeastConnected,
}

impl Default for Ordering {
    fn default() -> Self {
        Ordering::CreatedDescending
    }
}

impl Ordering {
    pub fn descending(self) -> bool {
        matches!(
            self,
            Ordering::CreatedDescending
                | Ordering::GuidDescending
                | Ordering::NameDescending
                | Ordering::CostDescending
                | Ordering::MostConnected
        )
    }

    /// Whether a continuation token can resume this ordering. Cost and
    /// connectivity have no monotonic immutable marker column, so requests
    /// carrying a token under them are rejected rather than silently
    /// downgraded to created-time comparison.
    pub fn keyset_capable(self) -> bool {
        matches!(
            self,
            Ordering::CreatedAscending
                | Ordering::CreatedDescending
                | Ordering::GuidAscending
                | Ordering::GuidDescending
                | Ordering::NameAscending
                | Ordering::NameDescending
        )
    }

    /// The stored column the ordering sorts on, if any. Guid orderings sort
    /// on the key itself; connectivity orderings have no stored column.
    pub(crate) fn sort_column(
        self,
        descriptor: &EntityDescriptor,
    ) -> Result<Option<&'static str>, GraphStoreError> {
        match self {
            Ordering::CreatedAscending | Ordering::CreatedDescending => Ok(Some("created_utc")),
            Ordering::GuidAscending | Ordering::GuidDescending => Ok(None),
            Ordering::NameAscending | Ordering::NameDescending => {
                descriptor.name_column.map(Some).ok_or_else(|| {
                    GraphStoreError::unsupported(
                        descriptor.entity,
                        "name ordering requires a name column",
                    )
                })
            }
            Ordering::CostAscending | Ordering::CostDescending => Ok(Some("cost")),
            Ordering::MostConnected | Ordering::LeastConnected => Ok(None),
        }
    }
}

/// Which attachment column correlates label/tag/vector rows to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaTarget {
    Graph,
    Node,
    Edge,
}

/// Declarative description of one entity table. The generic query builder is
/// driven entirely by these, keeping per-entity differences as data.
#[derive(Debug)]
pub struct EntityDescriptor {
    pub entity: EntityType,
    pub table: &'static str,
    pub columns: &'static [&'static str],
    pub tenant_column: Option<&'static str>,
    pub graph_column: Option<&'static str>,
    pub node_column: Option<&'static str>,
    pub edge_column: Option<&'static str>,
    pub name_column: Option<&'static str>,
    pub meta_target: Option<MetaTarget>,
    pub orderings: &'static [Ordering],
}

impl EntityDescriptor {
    pub fn supports_ordering(&self, ordering: Ordering) -> bool {
        self.orderings.contains(&ordering)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(&name)
    }

    pub(crate) fn require_ordering(&self, ordering: Ordering) -> Result<(), GraphStoreError> {
        if self.supports_ordering(ordering) {
            Ok(())
        } else {
            Err(GraphStoreError::unsupported(
                self.entity,
                format!("ordering {ordering:?} is not defined for this entity"),
            ))
        }
    }
}

const SCALAR_ORDERINGS: &[Ordering] = &[
    Ordering::CreatedAscending,
    Ordering::CreatedDescending,
    Ordering::GuidAscending,
    Ordering::GuidDescending,
];

const NAMED_ORDERINGS: &[Ordering] = &[
    Ordering::CreatedAscending,
    Ordering::CreatedDescending,
    Ordering::GuidAscending,
    Ordering::GuidDescending,
    Ordering::NameAscending,
    Ordering::NameDescending,
];

const NODE_ORDERINGS: &[Ordering] = &[
    Ordering::CreatedAscending,
    Ordering::CreatedDescending,
    Ordering::GuidAscending,
    Ordering::GuidDescending,
    Ordering::NameAscending,
    Ordering::NameDescending,
    Ordering::MostConnected,
    Ordering::LeastConnected,
];

const EDGE_ORDERINGS: &[Ordering] = &[
    Ordering::CreatedAscending,
    Ordering::CreatedDescending,
    Ordering::GuidAscending,
    Ordering::GuidDescending,
    Ordering::CostAscending,
    Ordering::CostDescending,
];

pub static TENANTS: EntityDescriptor = EntityDescriptor {
    entity: EntityType::Tenant,
    table: "tenants",
    columns: &["guid", "name", "active", "created_utc", "last_update_utc"],
    tenant_column: None,
    graph_column: None,
    node_column: None,
    edge_column: None,
    name_column: Some("name"),
    meta_target: None,
    orderings: NAMED_ORDERINGS,
};

pub static USERS: EntityDescriptor = EntityDescriptor {
    entity: EntityType::User,
    table: "users",
    columns: &[
        "guid",
        "tenant_guid",
        "email",
        "password",
        "active",
        "created_utc",
        "last_update_utc",
    ],
    tenant_column: Some("tenant_guid"),
    graph_column: None,
    node_column: None,
    edge_column: None,
    name_column: None,
    meta_target: None,
    orderings: SCALAR_ORDERINGS,
};

pub static CREDENTIALS: EntityDescriptor = EntityDescriptor {
    entity: EntityType::Credential,
    table: "credentials",
    columns: &[
        "guid",
        "tenant_guid",
        "user_guid",
        "bearer_token",
        "active",
        "created_utc",
        "last_update_utc",
    ],
    tenant_column: Some("tenant_guid"),
    graph_column: None,
    node_column: None,
    edge_column: None,
    name_column: None,
    meta_target: None,
    orderings: SCALAR_ORDERINGS,
};

pub static GRAPHS: EntityDescriptor = EntityDescriptor {
    entity: EntityType::Graph,
    table: "graphs",
    columns: &[
        "guid",
        "tenant_guid",
        "name",
        "data",
        "index_type",
        "index_file",
        "index_dimensionality",
        "index_m",
        "index_ef_construction",
        "index_ef",
        "created_utc",
        "last_update_utc",
    ],
    tenant_column: Some("tenant_guid"),
    graph_column: None,
    node_column: None,
    edge_column: None,
    name_column: Some("name"),
    meta_target: Some(MetaTarget::Graph),
    orderings: NAMED_ORDERINGS,
};

pub static NODES: EntityDescriptor = EntityDescriptor {
    entity: EntityType::Node,
    table: "nodes",
    columns: &[
        "guid",
        "tenant_guid",
        "graph_guid",
        "name",
        "data",
        "created_utc",
        "last_update_utc",
    ],
    tenant_column: Some("tenant_guid"),
    graph_column: Some("graph_guid"),
    node_column: None,
    edge_column: None,
    name_column: Some("name"),
    meta_target: Some(MetaTarget::Node),
    orderings: NODE_ORDERINGS,
};

pub static EDGES: EntityDescriptor = EntityDescriptor {
    entity: EntityType::Edge,
    table: "edges",
    columns: &[
        "guid",
        "tenant_guid",
        "graph_guid",
        "from_guid",
        "to_guid",
        "cost",
        "data",
        "created_utc",
        "last_update_utc",
    ],
    tenant_column: Some("tenant_guid"),
    graph_column: Some("graph_guid"),
    node_column: None,
    edge_column: None,
    name_column: None,
    meta_target: Some(MetaTarget::Edge),
    orderings: EDGE_ORDERINGS,
};

pub static LABELS: EntityDescriptor = EntityDescriptor {
    entity: EntityType::Label,
    table: "labels",
    columns: &[
        "guid",
        "tenant_guid",
        "graph_guid",
        "node_guid",
        "edge_guid",
        "label",
        "created_utc",
        "last_update_utc",
    ],
    tenant_column: Some("tenant_guid"),
    graph_column: Some("graph_guid"),
    node_column: Some("node_guid"),
    edge_column: Some("edge_guid"),
    name_column: None,
    meta_target: None,
    orderings: SCALAR_ORDERINGS,
};

pub static TAGS: EntityDescriptor = EntityDescriptor {
    entity: EntityType::Tag,
    table: "tags",
    columns: &[
        "guid",
        "tenant_guid",
        "graph_guid",
        "node_guid",
        "edge_guid",
        "tag_key",
        "tag_value",
        "created_utc",
        "last_update_utc",
    ],
    tenant_column: Some("tenant_guid"),
    graph_column: Some("graph_guid"),
    node_column: Some("node_guid"),
    edge_column: Some("edge_guid"),
    name_column: None,
    meta_target: None,
    orderings: SCALAR_ORDERINGS,
};

pub static VECTORS: EntityDescriptor = EntityDescriptor {
    entity: EntityType::Vector,
    table: "vectors",
    columns: &[
        "guid",
        "tenant_guid",
        "graph_guid",
        "node_guid",
        "edge_guid",
        "model",
        "dimensionality",
        "content",
        "embedding",
        "created_utc",
        "last_update_utc",
    ],
    tenant_column: Some("tenant_guid"),
    graph_column: Some("graph_guid"),
    node_column: Some("node_guid"),
    edge_column: Some("edge_guid"),
    name_column: None,
    meta_target: None,
    orderings: SCALAR_ORDERINGS,
};
