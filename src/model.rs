use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::GraphStoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Tenant,
    User,
    Credential,
    Graph,
    Node,
    Edge,
    Label,
    Tag,
    Vector,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityType::Tenant => "tenant",
            EntityType::User => "user",
            EntityType::Credential => "credential",
            EntityType::Graph => "graph",
            EntityType::Node => "node",
            EntityType::Edge => "edge",
            EntityType::Label => "label",
            EntityType::Tag => "tag",
            EntityType::Vector => "vector",
        };
        f.write_str(name)
    }
}

/// What a label, tag, or vector row is attached to. Graph attachment means
/// the row belongs to the graph itself rather than to one of its nodes or
/// edges. The node/edge states are mutually exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attachment {
    Graph,
    Node(Uuid),
    Edge(Uuid),
}

impl Attachment {
    pub fn node_guid(&self) -> Option<Uuid> {
        match self {
            Attachment::Node(guid) => Some(*guid),
            _ => None,
        }
    }

    pub fn edge_guid(&self) -> Option<Uuid> {
        match self {
            Attachment::Edge(guid) => Some(*guid),
            _ => None,
        }
    }
}

/// A requested or attached tag. An absent value means "key present, any or
/// no value".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPair {
    pub key: String,
    pub value: Option<String>,
}

impl TagPair {
    pub fn new<K: Into<String>>(key: K, value: Option<String>) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// An embedding attached to a graph, node, or edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub model: String,
    pub dimensionality: i64,
    pub content: String,
    pub vector: Vec<f32>,
}

/// Configuration of the external ANN index associated with a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    pub index_type: String,
    pub index_file: Option<String>,
    pub dimensionality: i64,
    pub m: Option<i64>,
    pub ef_construction: Option<i64>,
    pub ef: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub guid: Uuid,
    pub name: String,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
    pub last_update_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub guid: Uuid,
    pub tenant_guid: Uuid,
    pub email: String,
    pub password: String,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
    pub last_update_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub guid: Uuid,
    pub tenant_guid: Uuid,
    pub user_guid: Uuid,
    pub bearer_token: String,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
    pub last_update_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub guid: Uuid,
    pub tenant_guid: Uuid,
    pub name: String,
    pub data: serde_json::Value,
    pub vector_index: Option<VectorIndexConfig>,
    pub labels: Vec<String>,
    pub tags: Vec<TagPair>,
    pub vectors: Vec<Embedding>,
    pub created_utc: DateTime<Utc>,
    pub last_update_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub guid: Uuid,
    pub tenant_guid: Uuid,
    pub graph_guid: Uuid,
    pub name: String,
    pub data: serde_json::Value,
    pub labels: Vec<String>,
    pub tags: Vec<TagPair>,
    pub vectors: Vec<Embedding>,
    pub created_utc: DateTime<Utc>,
    pub last_update_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub guid: Uuid,
    pub tenant_guid: Uuid,
    pub graph_guid: Uuid,
    pub from_guid: Uuid,
    pub to_guid: Uuid,
    pub cost: f64,
    pub data: serde_json::Value,
    pub labels: Vec<String>,
    pub tags: Vec<TagPair>,
    pub vectors: Vec<Embedding>,
    pub created_utc: DateTime<Utc>,
    pub last_update_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub guid: Uuid,
    pub tenant_guid: Uuid,
    pub graph_guid: Uuid,
    pub attachment: Attachment,
    pub value: String,
    pub created_utc: DateTime<Utc>,
    pub last_update_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub guid: Uuid,
    pub tenant_guid: Uuid,
    pub graph_guid: Uuid,
    pub attachment: Attachment,
    pub key: String,
    pub value: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub last_update_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    pub guid: Uuid,
    pub tenant_guid: Uuid,
    pub graph_guid: Uuid,
    pub attachment: Attachment,
    pub model: String,
    pub dimensionality: i64,
    pub content: String,
    pub embedding: Vec<f32>,
    pub created_utc: DateTime<Utc>,
    pub last_update_utc: DateTime<Utc>,
}

/// Row counts under a tenant or (tenant, graph) scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStatistics {
    pub graphs: i64,
    pub nodes: i64,
    pub edges: i64,
    pub labels: i64,
    pub tags: i64,
    pub vectors: i64,
}

pub(crate) fn require_non_empty(
    entity: EntityType,
    field: &str,
    value: &str,
) -> Result<(), GraphStoreError> {
    if value.trim().is_empty() {
        return Err(GraphStoreError::validation(
            entity,
            format!("{field} must be set"),
        ));
    }
    Ok(())
}

pub(crate) fn require_tenant(entity: EntityType, tenant: Uuid) -> Result<(), GraphStoreError> {
    if tenant.is_nil() {
        return Err(GraphStoreError::validation(entity, "tenant guid must be set"));
    }
    Ok(())
}

pub(crate) fn validate_embedding(
    entity: EntityType,
    embedding: &Embedding,
) -> Result<(), GraphStoreError> {
    require_non_empty(entity, "embedding model", &embedding.model)?;
    if embedding.dimensionality <= 0 {
        return Err(GraphStoreError::validation(
            entity,
            "embedding dimensionality must be positive",
        ));
    }
    if embedding.vector.len() as i64 != embedding.dimensionality {
        return Err(GraphStoreError::validation(
            entity,
            format!(
                "embedding length {} does not match dimensionality {}",
                embedding.vector.len(),
                embedding.dimensionality
            ),
        ));
    }
    Ok(())
}

pub(crate) fn validate_attached_sets(
    entity: EntityType,
    labels: &[String],
    tags: &[TagPair],
    vectors: &[Embedding],
) -> Result<(), GraphStoreError> {
    for label in labels {
        require_non_empty(entity, "label", label)?;
    }
    for tag in tags {
        require_non_empty(entity, "tag key", &tag.key)?;
    }
    for embedding in vectors {
        validate_embedding(entity, embedding)?;
    }
    Ok(())
}
