use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::builder::uuid_text;
use crate::descriptor::{self, EntityDescriptor};
use crate::errors::GraphStoreError;
use crate::model::{
    Attachment, Credential, Edge, Embedding, EntityType, Graph, Label, Node, Tag, TagPair, Tenant,
    User, VectorIndexConfig, require_non_empty, require_tenant, validate_attached_sets,
    validate_embedding,
};
use crate::model::Vector;

/// Binds one entity type to its table: descriptor, column values in
/// descriptor order, row decoding, field validation, and the referential
/// checks that run before any statement executes.
pub trait Entity: Sized + Clone {
    fn descriptor() -> &'static EntityDescriptor;
    fn guid(&self) -> Uuid;
    fn tenant_guid(&self) -> Option<Uuid>;
    fn assign_identity(&mut self, now: DateTime<Utc>);
    fn touch(&mut self, now: DateTime<Utc>);
    fn validate(&self) -> Result<(), GraphStoreError>;
    fn bind_insert(&self) -> Result<Vec<Value>, GraphStoreError>;
    fn update_columns() -> &'static [&'static str];
    fn bind_update(&self) -> Result<Vec<Value>, GraphStoreError>;
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error>;

    fn check_references(&self, _conn: &Connection) -> Result<(), GraphStoreError> {
        Ok(())
    }

    /// For graphs, nodes, and edges: the (graph guid, attachment) their
    /// label/tag/vector rows carry. None for every other entity.
    fn attachment_scope(&self) -> Option<(Uuid, Attachment)> {
        None
    }

    fn attached_sets(&self) -> Option<(&[String], &[TagPair], &[Embedding])> {
        None
    }

    fn set_attached(&mut self, _labels: Vec<String>, _tags: Vec<TagPair>, _vectors: Vec<Embedding>) {}
}

#[derive(Debug)]
struct DecodeError(String);

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for DecodeError {}

fn decode_failure(index: usize, detail: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        rusqlite::types::Type::Text,
        Box::new(DecodeError(detail)),
    )
}

// Fixed-width UTC text keeps lexicographic and chronological order aligned.
const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

pub(crate) fn ts_text(ts: &DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn get_ts(row: &Row<'_>, index: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let text: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| decode_failure(index, format!("bad timestamp {text}: {e}")))
}

fn get_uuid(row: &Row<'_>, index: usize) -> Result<Uuid, rusqlite::Error> {
    let text: String = row.get(index)?;
    Uuid::parse_str(&text).map_err(|e| decode_failure(index, format!("bad guid {text}: {e}")))
}

fn get_opt_uuid(row: &Row<'_>, index: usize) -> Result<Option<Uuid>, rusqlite::Error> {
    let text: Option<String> = row.get(index)?;
    match text {
        None => Ok(None),
        Some(text) => Uuid::parse_str(&text)
            .map(Some)
            .map_err(|e| decode_failure(index, format!("bad guid {text}: {e}"))),
    }
}

fn get_json(row: &Row<'_>, index: usize) -> Result<serde_json::Value, rusqlite::Error> {
    let text: String = row.get(index)?;
    serde_json::from_str(&text).map_err(|e| decode_failure(index, e.to_string()))
}

fn json_value(value: &serde_json::Value, entity: EntityType) -> Result<Value, GraphStoreError> {
    serde_json::to_string(value)
        .map(Value::Text)
        .map_err(|e| GraphStoreError::validation(entity, e.to_string()))
}

fn embedding_text(embedding: &[f32], entity: EntityType) -> Result<Value, GraphStoreError> {
    serde_json::to_string(embedding)
        .map(Value::Text)
        .map_err(|e| GraphStoreError::validation(entity, e.to_string()))
}

fn get_embedding(row: &Row<'_>, index: usize) -> Result<Vec<f32>, rusqlite::Error> {
    let text: String = row.get(index)?;
    serde_json::from_str(&text).map_err(|e| decode_failure(index, e.to_string()))
}

/// Decodes the nullable attachment columns; a row with both set is corrupt.
fn get_attachment(
    row: &Row<'_>,
    node_index: usize,
    edge_index: usize,
) -> Result<Attachment, rusqlite::Error> {
    let node = get_opt_uuid(row, node_index)?;
    let edge = get_opt_uuid(row, edge_index)?;
    match (node, edge) {
        (None, None) => Ok(Attachment::Graph),
        (Some(guid), None) => Ok(Attachment::Node(guid)),
        (None, Some(guid)) => Ok(Attachment::Edge(guid)),
        (Some(_), Some(_)) => Err(decode_failure(
            node_index,
            "attachment row names both a node and an edge".to_string(),
        )),
    }
}

fn attachment_binds(attachment: &Attachment) -> (Value, Value) {
    match attachment {
        Attachment::Graph => (Value::Null, Value::Null),
        Attachment::Node(guid) => (uuid_text(*guid), Value::Null),
        Attachment::Edge(guid) => (Value::Null, uuid_text(*guid)),
    }
}

fn bool_bind(value: bool) -> Value {
    Value::Integer(i64::from(value))
}

const ALL_TABLES: &[&str] = &[
    "tenants",
    "users",
    "credentials",
    "graphs",
    "nodes",
    "edges",
    "labels",
    "tags",
    "vectors",
];

/// GUIDs identify rows across the whole store, not per table. Creation
/// refuses a guid already claimed by any table.
pub(crate) fn guid_in_use(conn: &Connection, guid: Uuid) -> Result<bool, GraphStoreError> {
    for table in ALL_TABLES {
        if row_exists(conn, table, guid, None)? {
            return Ok(true);
        }
    }
    Ok(false)
}

pub(crate) fn row_exists(
    conn: &Connection,
    table: &str,
    guid: Uuid,
    tenant: Option<Uuid>,
) -> Result<bool, GraphStoreError> {
    let found: Option<i64> = match tenant {
        Some(tenant) => conn
            .query_row(
                &format!("SELECT 1 FROM {table} WHERE guid = ?1 AND tenant_guid = ?2"),
                rusqlite::params![guid.to_string(), tenant.to_string()],
                |row| row.get(0),
            )
            .optional(),
        None => conn
            .query_row(
                &format!("SELECT 1 FROM {table} WHERE guid = ?1"),
                rusqlite::params![guid.to_string()],
                |row| row.get(0),
            )
            .optional(),
    }
    .map_err(|e| GraphStoreError::store(e.to_string()))?;
    Ok(found.is_some())
}

/// A reference must resolve inside the caller's tenant. A row that exists
/// under another tenant is a cross-tenant reference, not a missing row.
fn check_scoped_reference(
    conn: &Connection,
    entity: EntityType,
    table: &str,
    referenced: EntityType,
    guid: Uuid,
    tenant: Uuid,
) -> Result<(), GraphStoreError> {
    if row_exists(conn, table, guid, Some(tenant))? {
        return Ok(());
    }
    if row_exists(conn, table, guid, None)? {
        return Err(GraphStoreError::validation(
            entity,
            format!("{referenced} {guid} belongs to another tenant"),
        ));
    }
    Err(GraphStoreError::not_found(referenced, guid.to_string()))
}

fn check_graph_member(
    conn: &Connection,
    entity: EntityType,
    table: &str,
    referenced: EntityType,
    guid: Uuid,
    tenant: Uuid,
    graph: Uuid,
) -> Result<(), GraphStoreError> {
    let found: Option<String> = conn
        .query_row(
            &format!("SELECT graph_guid FROM {table} WHERE guid = ?1 AND tenant_guid = ?2"),
            rusqlite::params![guid.to_string(), tenant.to_string()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| GraphStoreError::store(e.to_string()))?;
    match found {
        Some(member_graph) if member_graph == graph.to_string() => Ok(()),
        Some(_) => Err(GraphStoreError::validation(
            entity,
            format!("{referenced} {guid} belongs to a different graph"),
        )),
        None => check_scoped_reference(conn, entity, table, referenced, guid, tenant),
    }
}

impl Entity for Tenant {
    fn descriptor() -> &'static EntityDescriptor {
        &descriptor::TENANTS
    }

    fn guid(&self) -> Uuid {
        self.guid
    }

    fn tenant_guid(&self) -> Option<Uuid> {
        None
    }

    fn assign_identity(&mut self, now: DateTime<Utc>) {
        if self.guid.is_nil() {
            self.guid = Uuid::new_v4();
        }
        self.created_utc = now;
        self.last_update_utc = now;
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_update_utc = now;
    }

    fn validate(&self) -> Result<(), GraphStoreError> {
        require_non_empty(EntityType::Tenant, "name", &self.name)
    }

    fn bind_insert(&self) -> Result<Vec<Value>, GraphStoreError> {
        Ok(vec![
            uuid_text(self.guid),
            Value::Text(self.name.clone()),
            bool_bind(self.active),
            Value::Text(ts_text(&self.created_utc)),
            Value::Text(ts_text(&self.last_update_utc)),
        ])
    }

    fn update_columns() -> &'static [&'static str] {
        &["name", "active", "last_update_utc"]
    }

    fn bind_update(&self) -> Result<Vec<Value>, GraphStoreError> {
        Ok(vec![
            Value::Text(self.name.clone()),
            bool_bind(self.active),
            Value::Text(ts_text(&self.last_update_utc)),
        ])
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Tenant {
            guid: get_uuid(row, 0)?,
            name: row.get(1)?,
            active: row.get(2)?,
            created_utc: get_ts(row, 3)?,
            last_update_utc: get_ts(row, 4)?,
        })
    }
}

impl Entity for User {
    fn descriptor() -> &'static EntityDescriptor {
        &descriptor::USERS
    }

    fn guid(&self) -> Uuid {
        self.guid
    }

    fn tenant_guid(&self) -> Option<Uuid> {
        Some(self.tenant_guid)
    }

    fn assign_identity(&mut self, now: DateTime<Utc>) {
        if self.guid.is_nil() {
            self.guid = Uuid::new_v4();
        }
        self.created_utc = now;
        self.last_update_utc = now;
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_update_utc = now;
    }

    fn validate(&self) -> Result<(), GraphStoreError> {
        require_tenant(EntityType::User, self.tenant_guid)?;
        require_non_empty(EntityType::User, "email", &self.email)?;
        require_non_empty(EntityType::User, "password", &self.password)
    }

    fn bind_insert(&self) -> Result<Vec<Value>, GraphStoreError> {
        Ok(vec![
            uuid_text(self.guid),
            uuid_text(self.tenant_guid),
            Value::Text(self.email.clone()),
            Value::Text(self.password.clone()),
            bool_bind(self.active),
            Value::Text(ts_text(&self.created_utc)),
            Value::Text(ts_text(&self.last_update_utc)),
        ])
    }

    fn update_columns() -> &'static [&'static str] {
        &["email", "password", "active", "last_update_utc"]
    }

    fn bind_update(&self) -> Result<Vec<Value>, GraphStoreError> {
        Ok(vec![
            Value::Text(self.email.clone()),
            Value::Text(self.password.clone()),
            bool_bind(self.active),
            Value::Text(ts_text(&self.last_update_utc)),
        ])
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(User {
            guid: get_uuid(row, 0)?,
            tenant_guid: get_uuid(row, 1)?,
            email: row.get(2)?,
            password: row.get(3)?,
            active: row.get(4)?,
            created_utc: get_ts(row, 5)?,
            last_update_utc: get_ts(row, 6)?,
        })
    }

    fn check_references(&self, conn: &Connection) -> Result<(), GraphStoreError> {
        if !row_exists(conn, "tenants", self.tenant_guid, None)? {
            return Err(GraphStoreError::not_found(
                EntityType::Tenant,
                self.tenant_guid.to_string(),
            ));
        }
        Ok(())
    }
}

impl Entity for Credential {
    fn descriptor() -> &'static EntityDescriptor {
        &descriptor::CREDENTIALS
    }

    fn guid(&self) -> Uuid {
        self.guid
    }

    fn tenant_guid(&self) -> Option<Uuid> {
        Some(self.tenant_guid)
    }

    fn assign_identity(&mut self, now: DateTime<Utc>) {
        if self.guid.is_nil() {
            self.guid = Uuid::new_v4();
        }
        self.created_utc = now;
        self.last_update_utc = now;
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_update_utc = now;
    }

    fn validate(&self) -> Result<(), GraphStoreError> {
        require_tenant(EntityType::Credential, self.tenant_guid)?;
        if self.user_guid.is_nil() {
            return Err(GraphStoreError::validation(
                EntityType::Credential,
                "user guid must be set",
            ));
        }
        require_non_empty(EntityType::Credential, "bearer token", &self.bearer_token)
    }

    fn bind_insert(&self) -> Result<Vec<Value>, GraphStoreError> {
        Ok(vec![
            uuid_text(self.guid),
            uuid_text(self.tenant_guid),
            uuid_text(self.user_guid),
            Value::Text(self.bearer_token.clone()),
            bool_bind(self.active),
            Value::Text(ts_text(&self.created_utc)),
            Value::Text(ts_text(&self.last_update_utc)),
        ])
    }

    fn update_columns() -> &'static [&'static str] {
        &["bearer_token", "active", "last_update_utc"]
    }

    fn bind_update(&self) -> Result<Vec<Value>, GraphStoreError> {
        Ok(vec![
            Value::Text(self.bearer_token.clone()),
            bool_bind(self.active),
            Value::Text(ts_text(&self.last_update_utc)),
        ])
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Credential {
            guid: get_uuid(row, 0)?,
            tenant_guid: get_uuid(row, 1)?,
            user_guid: get_uuid(row, 2)?,
            bearer_token: row.get(3)?,
            active: row.get(4)?,
            created_utc: get_ts(row, 5)?,
            last_update_utc: get_ts(row, 6)?,
        })
    }

    fn check_references(&self, conn: &Connection) -> Result<(), GraphStoreError> {
        check_scoped_reference(
            conn,
            EntityType::Credential,
            "users",
            EntityType::User,
            self.user_guid,
            self.tenant_guid,
        )
    }
}

impl Entity for Graph {
    fn descriptor() -> &'static EntityDescriptor {
        &descriptor::GRAPHS
    }

    fn guid(&self) -> Uuid {
        self.guid
    }

    fn tenant_guid(&self) -> Option<Uuid> {
        Some(self.tenant_guid)
    }

    fn assign_identity(&mut self, now: DateTime<Utc>) {
        if self.guid.is_nil() {
            self.guid = Uuid::new_v4();
        }
        self.created_utc = now;
        self.last_update_utc = now;
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_update_utc = now;
    }

    fn validate(&self) -> Result<(), GraphStoreError> {
        require_tenant(EntityType::Graph, self.tenant_guid)?;
        require_non_empty(EntityType::Graph, "name", &self.name)?;
        if let Some(config) = &self.vector_index {
            require_non_empty(EntityType::Graph, "index type", &config.index_type)?;
            if config.dimensionality <= 0 {
                return Err(GraphStoreError::validation(
                    EntityType::Graph,
                    "index dimensionality must be positive",
                ));
            }
        }
        validate_attached_sets(EntityType::Graph, &self.labels, &self.tags, &self.vectors)
    }

    fn bind_insert(&self) -> Result<Vec<Value>, GraphStoreError> {
        let config = self.vector_index.as_ref();
        Ok(vec![
            uuid_text(self.guid),
            uuid_text(self.tenant_guid),
            Value::Text(self.name.clone()),
            json_value(&self.data, EntityType::Graph)?,
            config.map_or(Value::Null, |c| Value::Text(c.index_type.clone())),
            config
                .and_then(|c| c.index_file.clone())
                .map_or(Value::Null, Value::Text),
            config.map_or(Value::Null, |c| Value::Integer(c.dimensionality)),
            config.and_then(|c| c.m).map_or(Value::Null, Value::Integer),
            config
                .and_then(|c| c.ef_construction)
                .map_or(Value::Null, Value::Integer),
            config.and_then(|c| c.ef).map_or(Value::Null, Value::Integer),
            Value::Text(ts_text(&self.created_utc)),
            Value::Text(ts_text(&self.last_update_utc)),
        ])
    }

    fn update_columns() -> &'static [&'static str] {
        &[
            "name",
            "data",
            "index_type",
            "index_file",
            "index_dimensionality",
            "index_m",
            "index_ef_construction",
            "index_ef",
            "last_update_utc",
        ]
    }

    fn bind_update(&self) -> Result<Vec<Value>, GraphStoreError> {
        let config = self.vector_index.as_ref();
        Ok(vec![
            Value::Text(self.name.clone()),
            json_value(&self.data, EntityType::Graph)?,
            config.map_or(Value::Null, |c| Value::Text(c.index_type.clone())),
            config
                .and_then(|c| c.index_file.clone())
                .map_or(Value::Null, Value::Text),
            config.map_or(Value::Null, |c| Value::Integer(c.dimensionality)),
            config.and_then(|c| c.m).map_or(Value::Null, Value::Integer),
            config
                .and_then(|c| c.ef_construction)
                .map_or(Value::Null, Value::Integer),
            config.and_then(|c| c.ef).map_or(Value::Null, Value::Integer),
            Value::Text(ts_text(&self.last_update_utc)),
        ])
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let index_type: Option<String> = row.get(4)?;
        let vector_index = match index_type {
            None => None,
            Some(index_type) => Some(VectorIndexConfig {
                index_type,
                index_file: row.get(5)?,
                dimensionality: row.get::<_, Option<i64>>(6)?.unwrap_or_default(),
                m: row.get(7)?,
                ef_construction: row.get(8)?,
                ef: row.get(9)?,
            }),
        };
        Ok(Graph {
            guid: get_uuid(row, 0)?,
            tenant_guid: get_uuid(row, 1)?,
            name: row.get(2)?,
            data: get_json(row, 3)?,
            vector_index,
            labels: Vec::new(),
            tags: Vec::new(),
            vectors: Vec::new(),
            created_utc: get_ts(row, 10)?,
            last_update_utc: get_ts(row, 11)?,
        })
    }

    fn check_references(&self, conn: &Connection) -> Result<(), GraphStoreError> {
        if !row_exists(conn, "tenants", self.tenant_guid, None)? {
            return Err(GraphStoreError::not_found(
                EntityType::Tenant,
                self.tenant_guid.to_string(),
            ));
        }
        Ok(())
    }

    fn attachment_scope(&self) -> Option<(Uuid, Attachment)> {
        Some((self.guid, Attachment::Graph))
    }

    fn attached_sets(&self) -> Option<(&[String], &[TagPair], &[Embedding])> {
        Some((&self.labels, &self.tags, &self.vectors))
    }

    fn set_attached(&mut self, labels: Vec<String>, tags: Vec<TagPair>, vectors: Vec<Embedding>) {
        self.labels = labels;
        self.tags = tags;
        self.vectors = vectors;
    }
}

impl Entity for Node {
    fn descriptor() -> &'static EntityDescriptor {
        &descriptor::NODES
    }

    fn guid(&self) -> Uuid {
        self.guid
    }

    fn tenant_guid(&self) -> Option<Uuid> {
        Some(self.tenant_guid)
    }

    fn assign_identity(&mut self, now: DateTime<Utc>) {
        if self.guid.is_nil() {
            self.guid = Uuid::new_v4();
        }
        self.created_utc = now;
        self.last_update_utc = now;
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_update_utc = now;
    }

    fn validate(&self) -> Result<(), GraphStoreError> {
        require_tenant(EntityType::Node, self.tenant_guid)?;
        if self.graph_guid.is_nil() {
            return Err(GraphStoreError::validation(
                EntityType::Node,
                "graph guid must be set",
            ));
        }
        require_non_empty(EntityType::Node, "name", &self.name)?;
        validate_attached_sets(EntityType::Node, &self.labels, &self.tags, &self.vectors)
    }

    fn bind_insert(&self) -> Result<Vec<Value>, GraphStoreError> {
        Ok(vec![
            uuid_text(self.guid),
            uuid_text(self.tenant_guid),
            uuid_text(self.graph_guid),
            Value::Text(self.name.clone()),
            json_value(&self.data, EntityType::Node)?,
            Value::Text(ts_text(&self.created_utc)),
            Value::Text(ts_text(&self.last_update_utc)),
        ])
    }

    fn update_columns() -> &'static [&'static str] {
        &["name", "data", "last_update_utc"]
    }

    fn bind_update(&self) -> Result<Vec<Value>, GraphStoreError> {
        Ok(vec![
            Value::Text(self.name.clone()),
            json_value(&self.data, EntityType::Node)?,
            Value::Text(ts_text(&self.last_update_utc)),
        ])
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Node {
            guid: get_uuid(row, 0)?,
            tenant_guid: get_uuid(row, 1)?,
            graph_guid: get_uuid(row, 2)?,
            name: row.get(3)?,
            data: get_json(row, 4)?,
            labels: Vec::new(),
            tags: Vec::new(),
            vectors: Vec::new(),
            created_utc: get_ts(row, 5)?,
            last_update_utc: get_ts(row, 6)?,
        })
    }

    fn check_references(&self, conn: &Connection) -> Result<(), GraphStoreError> {
        check_scoped_reference(
            conn,
            EntityType::Node,
            "graphs",
            EntityType::Graph,
            self.graph_guid,
            self.tenant_guid,
        )
    }

    fn attachment_scope(&self) -> Option<(Uuid, Attachment)> {
        Some((self.graph_guid, Attachment::Node(self.guid)))
    }

    fn attached_sets(&self) -> Option<(&[String], &[TagPair], &[Embedding])> {
        Some((&self.labels, &self.tags, &self.vectors))
    }

    fn set_attached(&mut self, labels: Vec<String>, tags: Vec<TagPair>, vectors: Vec<Embedding>) {
        self.labels = labels;
        self.tags = tags;
        self.vectors = vectors;
    }
}

impl Entity for Edge {
    fn descriptor() -> &'static EntityDescriptor {
        &descriptor::EDGES
    }

    fn guid(&self) -> Uuid {
        self.guid
    }

    fn tenant_guid(&self) -> Option<Uuid> {
        Some(self.tenant_guid)
    }

    fn assign_identity(&mut self, now: DateTime<Utc>) {
        if self.guid.is_nil() {
            self.guid = Uuid::new_v4();
        }
        self.created_utc = now;
        self.last_update_utc = now;
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_update_utc = now;
    }

    fn validate(&self) -> Result<(), GraphStoreError> {
        require_tenant(EntityType::Edge, self.tenant_guid)?;
        if self.graph_guid.is_nil() {
            return Err(GraphStoreError::validation(
                EntityType::Edge,
                "graph guid must be set",
            ));
        }
        if self.from_guid.is_nil() || self.to_guid.is_nil() {
            return Err(GraphStoreError::validation(
                EntityType::Edge,
                "edge endpoints must be set",
            ));
        }
        validate_attached_sets(EntityType::Edge, &self.labels, &self.tags, &self.vectors)
    }

    fn bind_insert(&self) -> Result<Vec<Value>, GraphStoreError> {
        Ok(vec![
            uuid_text(self.guid),
            uuid_text(self.tenant_guid),
            uuid_text(self.graph_guid),
            uuid_text(self.from_guid),
            uuid_text(self.to_guid),
            Value::Real(self.cost),
            json_value(&self.data, EntityType::Edge)?,
            Value::Text(ts_text(&self.created_utc)),
            Value::Text(ts_text(&self.last_update_utc)),
        ])
    }

    fn update_columns() -> &'static [&'static str] {
        &["cost", "data", "last_update_utc"]
    }

    fn bind_update(&self) -> Result<Vec<Value>, GraphStoreError> {
        Ok(vec![
            Value::Real(self.cost),
            json_value(&self.data, EntityType::Edge)?,
            Value::Text(ts_text(&self.last_update_utc)),
        ])
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Edge {
            guid: get_uuid(row, 0)?,
            tenant_guid: get_uuid(row, 1)?,
            graph_guid: get_uuid(row, 2)?,
            from_guid: get_uuid(row, 3)?,
            to_guid: get_uuid(row, 4)?,
            cost: row.get(5)?,
            data: get_json(row, 6)?,
            labels: Vec::new(),
            tags: Vec::new(),
            vectors: Vec::new(),
            created_utc: get_ts(row, 7)?,
            last_update_utc: get_ts(row, 8)?,
        })
    }

    fn check_references(&self, conn: &Connection) -> Result<(), GraphStoreError> {
        check_scoped_reference(
            conn,
            EntityType::Edge,
            "graphs",
            EntityType::Graph,
            self.graph_guid,
            self.tenant_guid,
        )?;
        check_graph_member(
            conn,
            EntityType::Edge,
            "nodes",
            EntityType::Node,
            self.from_guid,
            self.tenant_guid,
            self.graph_guid,
        )?;
        check_graph_member(
            conn,
            EntityType::Edge,
            "nodes",
            EntityType::Node,
            self.to_guid,
            self.tenant_guid,
            self.graph_guid,
        )
    }

    fn attachment_scope(&self) -> Option<(Uuid, Attachment)> {
        Some((self.graph_guid, Attachment::Edge(self.guid)))
    }

    fn attached_sets(&self) -> Option<(&[String], &[TagPair], &[Embedding])> {
        Some((&self.labels, &self.tags, &self.vectors))
    }

    fn set_attached(&mut self, labels: Vec<String>, tags: Vec<TagPair>, vectors: Vec<Embedding>) {
        self.labels = labels;
        self.tags = tags;
        self.vectors = vectors;
    }
}

fn check_attachment(
    conn: &Connection,
    entity: EntityType,
    tenant: Uuid,
    graph: Uuid,
    attachment: &Attachment,
) -> Result<(), GraphStoreError> {
    check_scoped_reference(conn, entity, "graphs", EntityType::Graph, graph, tenant)?;
    match attachment {
        Attachment::Graph => Ok(()),
        Attachment::Node(guid) => check_graph_member(
            conn,
            entity,
            "nodes",
            EntityType::Node,
            *guid,
            tenant,
            graph,
        ),
        Attachment::Edge(guid) => check_graph_member(
            conn,
            entity,
            "edges",
            EntityType::Edge,
            *guid,
            tenant,
            graph,
        ),
    }
}

impl Entity for Label {
    fn descriptor() -> &'static EntityDescriptor {
        &descriptor::LABELS
    }

    fn guid(&self) -> Uuid {
        self.guid
    }

    fn tenant_guid(&self) -> Option<Uuid> {
        Some(self.tenant_guid)
    }

    fn assign_identity(&mut self, now: DateTime<Utc>) {
        if self.guid.is_nil() {
            self.guid = Uuid::new_v4();
        }
        self.created_utc = now;
        self.last_update_utc = now;
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_update_utc = now;
    }

    fn validate(&self) -> Result<(), GraphStoreError> {
        require_tenant(EntityType::Label, self.tenant_guid)?;
        if self.graph_guid.is_nil() {
            return Err(GraphStoreError::validation(
                EntityType::Label,
                "graph guid must be set",
            ));
        }
        require_non_empty(EntityType::Label, "label", &self.value)
    }

    fn bind_insert(&self) -> Result<Vec<Value>, GraphStoreError> {
        let (node, edge) = attachment_binds(&self.attachment);
        Ok(vec![
            uuid_text(self.guid),
            uuid_text(self.tenant_guid),
            uuid_text(self.graph_guid),
            node,
            edge,
            Value::Text(self.value.clone()),
            Value::Text(ts_text(&self.created_utc)),
            Value::Text(ts_text(&self.last_update_utc)),
        ])
    }

    fn update_columns() -> &'static [&'static str] {
        &["label", "last_update_utc"]
    }

    fn bind_update(&self) -> Result<Vec<Value>, GraphStoreError> {
        Ok(vec![
            Value::Text(self.value.clone()),
            Value::Text(ts_text(&self.last_update_utc)),
        ])
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Label {
            guid: get_uuid(row, 0)?,
            tenant_guid: get_uuid(row, 1)?,
            graph_guid: get_uuid(row, 2)?,
            attachment: get_attachment(row, 3, 4)?,
            value: row.get(5)?,
            created_utc: get_ts(row, 6)?,
            last_update_utc: get_ts(row, 7)?,
        })
    }

    fn check_references(&self, conn: &Connection) -> Result<(), GraphStoreError> {
        check_attachment(
            conn,
            EntityType::Label,
            self.tenant_guid,
            self.graph_guid,
            &self.attachment,
        )
    }
}

impl Entity for Tag {
    fn descriptor() -> &'static EntityDescriptor {
        &descriptor::TAGS
    }

    fn guid(&self) -> Uuid {
        self.guid
    }

    fn tenant_guid(&self) -> Option<Uuid> {
        Some(self.tenant_guid)
    }

    fn assign_identity(&mut self, now: DateTime<Utc>) {
        if self.guid.is_nil() {
            self.guid = Uuid::new_v4();
        }
        self.created_utc = now;
        self.last_update_utc = now;
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_update_utc = now;
    }

    fn validate(&self) -> Result<(), GraphStoreError> {
        require_tenant(EntityType::Tag, self.tenant_guid)?;
        if self.graph_guid.is_nil() {
            return Err(GraphStoreError::validation(
                EntityType::Tag,
                "graph guid must be set",
            ));
        }
        require_non_empty(EntityType::Tag, "key", &self.key)
    }

    fn bind_insert(&self) -> Result<Vec<Value>, GraphStoreError> {
        let (node, edge) = attachment_binds(&self.attachment);
        Ok(vec![
            uuid_text(self.guid),
            uuid_text(self.tenant_guid),
            uuid_text(self.graph_guid),
            node,
            edge,
            Value::Text(self.key.clone()),
            self.value.clone().map_or(Value::Null, Value::Text),
            Value::Text(ts_text(&self.created_utc)),
            Value::Text(ts_text(&self.last_update_utc)),
        ])
    }

    fn update_columns() -> &'static [&'static str] {
        &["tag_key", "tag_value", "last_update_utc"]
    }

    fn bind_update(&self) -> Result<Vec<Value>, GraphStoreError> {
        Ok(vec![
            Value::Text(self.key.clone()),
            self.value.clone().map_or(Value::Null, Value::Text),
            Value::Text(ts_text(&self.last_update_utc)),
        ])
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Tag {
            guid: get_uuid(row, 0)?,
            tenant_guid: get_uuid(row, 1)?,
            graph_guid: get_uuid(row, 2)?,
            attachment: get_attachment(row, 3, 4)?,
            key: row.get(5)?,
            value: row.get(6)?,
            created_utc: get_ts(row, 7)?,
            last_update_utc: get_ts(row, 8)?,
        })
    }

    fn check_references(&self, conn: &Connection) -> Result<(), GraphStoreError> {
        check_attachment(
            conn,
            EntityType::Tag,
            self.tenant_guid,
            self.graph_guid,
            &self.attachment,
        )
    }
}

impl Entity for Vector {
    fn descriptor() -> &'static EntityDescriptor {
        &descriptor::VECTORS
    }

    fn guid(&self) -> Uuid {
        self.guid
    }

    fn tenant_guid(&self) -> Option<Uuid> {
        Some(self.tenant_guid)
    }

    fn assign_identity(&mut self, now: DateTime<Utc>) {
        if self.guid.is_nil() {
            self.guid = Uuid::new_v4();
        }
        self.created_utc = now;
        self.last_update_utc = now;
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_update_utc = now;
    }

    fn validate(&self) -> Result<(), GraphStoreError> {
        require_tenant(EntityType::Vector, self.tenant_guid)?;
        if self.graph_guid.is_nil() {
            return Err(GraphStoreError::validation(
                EntityType::Vector,
                "graph guid must be set",
            ));
        }
        let embedding = Embedding {
            model: self.model.clone(),
            dimensionality: self.dimensionality,
            content: self.content.clone(),
            vector: self.embedding.clone(),
        };
        validate_embedding(EntityType::Vector, &embedding)
    }

    fn bind_insert(&self) -> Result<Vec<Value>, GraphStoreError> {
        let (node, edge) = attachment_binds(&self.attachment);
        Ok(vec![
            uuid_text(self.guid),
            uuid_text(self.tenant_guid),
            uuid_text(self.graph_guid),
            node,
            edge,
            Value::Text(self.model.clone()),
            Value::Integer(self.dimensionality),
            Value::Text(self.content.clone()),
            embedding_text(&self.embedding, EntityType::Vector)?,
            Value::Text(ts_text(&self.created_utc)),
            Value::Text(ts_text(&self.last_update_utc)),
        ])
    }

    fn update_columns() -> &'static [&'static str] {
        &[
            "model",
            "dimensionality",
            "content",
            "embedding",
            "last_update_utc",
        ]
    }

    fn bind_update(&self) -> Result<Vec<Value>, GraphStoreError> {
        Ok(vec![
            Value::Text(self.model.clone()),
            Value::Integer(self.dimensionality),
            Value::Text(self.content.clone()),
            embedding_text(&self.embedding, EntityType::Vector)?,
            Value::Text(ts_text(&self.last_update_utc)),
        ])
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Vector {
            guid: get_uuid(row, 0)?,
            tenant_guid: get_uuid(row, 1)?,
            graph_guid: get_uuid(row, 2)?,
            attachment: get_attachment(row, 3, 4)?,
            model: row.get(5)?,
            dimensionality: row.get(6)?,
            content: row.get(7)?,
            embedding: get_embedding(row, 8)?,
            created_utc: get_ts(row, 9)?,
            last_update_utc: get_ts(row, 10)?,
        })
    }

    fn check_references(&self, conn: &Connection) -> Result<(), GraphStoreError> {
        check_attachment(
            conn,
            EntityType::Vector,
            self.tenant_guid,
            self.graph_guid,
            &self.attachment,
        )
    }
}
