use std::path::Path;

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use uuid::Uuid;

use crate::builder::{self, SelectSpec, uuid_text};
use crate::cache::StatementCache;
use crate::cancel::CancelToken;
use crate::cascade::{self, DeleteTarget};
use crate::descriptor::Ordering;
use crate::errors::{GraphStoreError, map_sqlite};
use crate::filter::Expr;
use crate::model::{
    Attachment, Embedding, EntityType, Label, StoreStatistics, Tag, TagPair, Vector,
};
use crate::page::{self, EnumerationRequest, EnumerationResult};
use crate::record::{Entity, guid_in_use, row_exists};
use crate::schema::ensure_schema;

/// Filtered listing over one entity type: scope, label/tag conjunction,
/// field expression, ordering, and offset paging.
#[derive(Debug, Clone, Default)]
pub struct ReadQuery {
    pub tenant_guid: Option<Uuid>,
    pub graph_guid: Option<Uuid>,
    pub node_guid: Option<Uuid>,
    pub edge_guid: Option<Uuid>,
    pub labels: Vec<String>,
    pub tags: Vec<TagPair>,
    pub expr: Option<Expr>,
    pub ordering: Ordering,
    pub max_results: Option<u64>,
    pub skip: Option<u64>,
}

impl ReadQuery {
    pub fn tenant(tenant: Uuid) -> Self {
        Self {
            tenant_guid: Some(tenant),
            ..Self::default()
        }
    }

    pub fn graph(tenant: Uuid, graph: Uuid) -> Self {
        Self {
            tenant_guid: Some(tenant),
            graph_guid: Some(graph),
            ..Self::default()
        }
    }
}

/// Multi-tenant property-graph store over a single SQLite connection.
/// Every multi-statement operation runs inside one transaction; callers see
/// either the whole effect or none of it.
pub struct GraphStore {
    conn: Connection,
    cache: StatementCache,
}

impl GraphStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GraphStoreError> {
        let conn = Connection::open(path).map_err(|e| GraphStoreError::store(e.to_string()))?;
        ensure_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, GraphStoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| GraphStoreError::store(e.to_string()))?;
        ensure_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            cache: StatementCache::new(),
        }
    }

    /// Persists an entity and its attached label/tag/vector sets as one
    /// atomic batch, returning the freshly stored row.
    pub fn create<E: Entity>(
        &self,
        entity: &E,
        cancel: &CancelToken,
    ) -> Result<E, GraphStoreError> {
        cancel.ensure_active()?;
        let descriptor = E::descriptor();
        let mut entity = entity.clone();
        entity.assign_identity(Utc::now());
        entity.validate()?;

        let txn = self
            .conn
            .unchecked_transaction()
            .map_err(|e| GraphStoreError::store(e.to_string()))?;
        entity.check_references(&txn)?;
        if guid_in_use(&txn, entity.guid())? {
            return Err(GraphStoreError::conflict(
                descriptor.entity,
                format!("guid {} already exists", entity.guid()),
            ));
        }
        insert_row(&txn, &entity)?;
        write_attachments(&txn, &entity)?;
        let stored = read_in_txn::<E>(&txn, entity.tenant_guid(), entity.guid())?;
        cancel.ensure_active()?;
        txn.commit()
            .map_err(|e| GraphStoreError::store(e.to_string()))?;
        Ok(stored)
    }

    /// Reads one entity by guid under the tenant scope. A guid that resolves
    /// under a different tenant is a cross-tenant reference, not a miss.
    pub fn read<E: Entity>(
        &self,
        tenant: Option<Uuid>,
        guid: Uuid,
    ) -> Result<E, GraphStoreError> {
        read_in_txn::<E>(&self.conn, tenant, guid)
    }

    pub fn read_by_guids<E: Entity>(
        &self,
        tenant: Option<Uuid>,
        guids: &[Uuid],
    ) -> Result<Vec<E>, GraphStoreError> {
        let mut spec = SelectSpec::scoped(E::descriptor(), tenant);
        spec.guids = Some(guids);
        spec.ordering = Ordering::GuidAscending;
        let mut rows = select_rows::<E>(&self.conn, &spec)?;
        for row in &mut rows {
            hydrate(&self.conn, row)?;
        }
        Ok(rows)
    }

    pub fn read_many<E: Entity>(&self, query: &ReadQuery) -> Result<Vec<E>, GraphStoreError> {
        let mut spec = SelectSpec::scoped(E::descriptor(), query.tenant_guid);
        spec.graph = query.graph_guid;
        spec.node = query.node_guid;
        spec.edge = query.edge_guid;
        spec.labels = &query.labels;
        spec.tags = &query.tags;
        spec.expr = query.expr.as_ref();
        spec.ordering = query.ordering;
        spec.max_results = query.max_results;
        spec.skip = query.skip;
        let mut rows = select_rows::<E>(&self.conn, &spec)?;
        for row in &mut rows {
            hydrate(&self.conn, row)?;
        }
        Ok(rows)
    }

    pub fn exists<E: Entity>(
        &self,
        tenant: Option<Uuid>,
        guid: Uuid,
    ) -> Result<bool, GraphStoreError> {
        let descriptor = E::descriptor();
        if descriptor.tenant_column.is_some() && tenant.is_none() {
            return Err(GraphStoreError::validation(
                descriptor.entity,
                "existence check requires a tenant scope",
            ));
        }
        row_exists(&self.conn, descriptor.table, guid, tenant)
    }

    pub fn enumerate<E: Entity>(
        &self,
        request: &EnumerationRequest,
    ) -> Result<EnumerationResult<E>, GraphStoreError> {
        let mut result = page::enumerate::<E>(&self.conn, &self.cache, request)?;
        for row in &mut result.objects {
            hydrate(&self.conn, row)?;
        }
        Ok(result)
    }

    /// Rewrites the entity's mutable fields and fully replaces its attached
    /// label/tag/vector sets. No diffing: the supplied sets win.
    pub fn update<E: Entity>(
        &self,
        entity: &E,
        cancel: &CancelToken,
    ) -> Result<E, GraphStoreError> {
        cancel.ensure_active()?;
        let descriptor = E::descriptor();
        let mut entity = entity.clone();
        entity.validate()?;
        entity.touch(Utc::now());

        let txn = self
            .conn
            .unchecked_transaction()
            .map_err(|e| GraphStoreError::store(e.to_string()))?;
        require_scoped_row(&txn, descriptor.entity, descriptor.table, entity.guid(), entity.tenant_guid())?;
        let sql = builder::build_update(descriptor, E::update_columns());
        let mut params = entity.bind_update()?;
        params.push(uuid_text(entity.guid()));
        if descriptor.tenant_column.is_some() {
            let tenant = entity.tenant_guid().ok_or_else(|| {
                GraphStoreError::validation(descriptor.entity, "update requires a tenant scope")
            })?;
            params.push(uuid_text(tenant));
        }
        txn.execute(&sql, params_from_iter(params))
            .map_err(|e| map_sqlite(descriptor.entity, e))?;
        if let Some((graph, attachment)) = entity.attachment_scope() {
            let tenant = entity.tenant_guid().ok_or_else(|| {
                GraphStoreError::store("attachment-bearing entity is missing its tenant")
            })?;
            clear_attachments(&txn, tenant, graph, &attachment)?;
            write_attachments(&txn, &entity)?;
        }
        let stored = read_in_txn::<E>(&txn, entity.tenant_guid(), entity.guid())?;
        cancel.ensure_active()?;
        txn.commit()
            .map_err(|e| GraphStoreError::store(e.to_string()))?;
        Ok(stored)
    }

    /// Deletes a target and everything depending on it, leaves first, as one
    /// atomic unit. Any failure rolls the whole cascade back.
    pub fn delete(
        &self,
        tenant: Uuid,
        target: DeleteTarget,
        cancel: &CancelToken,
    ) -> Result<(), GraphStoreError> {
        cancel.ensure_active()?;
        let entity = target.entity();
        if let DeleteTarget::Tenant(guid) = &target {
            if *guid != tenant {
                return Err(GraphStoreError::validation(
                    EntityType::Tenant,
                    "tenant scope must match the tenant being deleted",
                ));
            }
        }
        if tenant.is_nil() {
            return Err(GraphStoreError::validation(entity, "tenant guid must be set"));
        }
        let scope = match target {
            DeleteTarget::Tenant(_) => None,
            _ => Some(tenant),
        };
        for guid in target.primary_guids() {
            require_scoped_row(&self.conn, entity, target.table(), guid, scope)?;
        }
        let plan = cascade::plan(tenant, &target)?;
        let txn = self
            .conn
            .unchecked_transaction()
            .map_err(|e| GraphStoreError::store(e.to_string()))?;
        for (sql, params) in &plan.statements {
            txn.execute(sql, params_from_iter(params.iter().cloned()))
                .map_err(|e| GraphStoreError::store(e.to_string()))?;
        }
        cascade::verify_integrity(&txn, tenant, entity)?;
        cancel.ensure_active()?;
        txn.commit()
            .map_err(|e| GraphStoreError::store(e.to_string()))?;
        Ok(())
    }

    /// Row counts under a tenant, optionally narrowed to one graph.
    pub fn statistics(
        &self,
        tenant: Uuid,
        graph: Option<Uuid>,
    ) -> Result<StoreStatistics, GraphStoreError> {
        if tenant.is_nil() {
            return Err(GraphStoreError::validation(
                EntityType::Tenant,
                "statistics require a tenant scope",
            ));
        }
        Ok(StoreStatistics {
            graphs: self.count_scoped("graphs", "guid", tenant, graph)?,
            nodes: self.count_scoped("nodes", "graph_guid", tenant, graph)?,
            edges: self.count_scoped("edges", "graph_guid", tenant, graph)?,
            labels: self.count_scoped("labels", "graph_guid", tenant, graph)?,
            tags: self.count_scoped("tags", "graph_guid", tenant, graph)?,
            vectors: self.count_scoped("vectors", "graph_guid", tenant, graph)?,
        })
    }

    fn count_scoped(
        &self,
        table: &str,
        graph_column: &str,
        tenant: Uuid,
        graph: Option<Uuid>,
    ) -> Result<i64, GraphStoreError> {
        match graph {
            Some(graph) => self
                .conn
                .query_row(
                    &format!(
                        "SELECT COUNT(*) FROM {table} WHERE tenant_guid = ?1 AND {graph_column} = ?2"
                    ),
                    rusqlite::params![tenant.to_string(), graph.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| GraphStoreError::store(e.to_string())),
            None => self
                .conn
                .query_row(
                    &format!("SELECT COUNT(*) FROM {table} WHERE tenant_guid = ?1"),
                    rusqlite::params![tenant.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| GraphStoreError::store(e.to_string())),
        }
    }
}

fn insert_row<E: Entity>(conn: &Connection, entity: &E) -> Result<(), GraphStoreError> {
    let descriptor = E::descriptor();
    let sql = builder::build_insert(descriptor);
    conn.execute(&sql, params_from_iter(entity.bind_insert()?))
        .map_err(|e| map_sqlite(descriptor.entity, e))?;
    Ok(())
}

fn select_rows<E: Entity>(
    conn: &Connection,
    spec: &SelectSpec<'_>,
) -> Result<Vec<E>, GraphStoreError> {
    let (sql, params) = builder::build_select(spec)?;
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| GraphStoreError::store(e.to_string()))?;
    let rows = stmt
        .query_map(params_from_iter(params), |row| E::from_row(row))
        .map_err(|e| GraphStoreError::store(e.to_string()))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| GraphStoreError::store(e.to_string()))?);
    }
    Ok(out)
}

fn read_in_txn<E: Entity>(
    conn: &Connection,
    tenant: Option<Uuid>,
    guid: Uuid,
) -> Result<E, GraphStoreError> {
    let descriptor = E::descriptor();
    let mut spec = SelectSpec::scoped(descriptor, tenant);
    let guids = [guid];
    spec.guids = Some(&guids);
    spec.ordering = Ordering::GuidAscending;
    let mut rows = select_rows::<E>(conn, &spec)?;
    match rows.pop() {
        Some(mut row) => {
            hydrate(conn, &mut row)?;
            Ok(row)
        }
        None => {
            if descriptor.tenant_column.is_some() && row_exists(conn, descriptor.table, guid, None)?
            {
                return Err(GraphStoreError::validation(
                    descriptor.entity,
                    format!("{} {guid} belongs to another tenant", descriptor.entity),
                ));
            }
            Err(GraphStoreError::not_found(descriptor.entity, guid.to_string()))
        }
    }
}

fn require_scoped_row(
    conn: &Connection,
    entity: EntityType,
    table: &str,
    guid: Uuid,
    tenant: Option<Uuid>,
) -> Result<(), GraphStoreError> {
    if row_exists(conn, table, guid, tenant)? {
        return Ok(());
    }
    if tenant.is_some() && row_exists(conn, table, guid, None)? {
        return Err(GraphStoreError::validation(
            entity,
            format!("{entity} {guid} belongs to another tenant"),
        ));
    }
    Err(GraphStoreError::not_found(entity, guid.to_string()))
}

fn attachment_condition(attachment: &Attachment) -> (&'static str, Option<Value>) {
    match attachment {
        Attachment::Graph => ("node_guid IS NULL AND edge_guid IS NULL", None),
        Attachment::Node(guid) => ("node_guid = ?3", Some(uuid_text(*guid))),
        Attachment::Edge(guid) => ("edge_guid = ?3", Some(uuid_text(*guid))),
    }
}

fn clear_attachments(
    conn: &Connection,
    tenant: Uuid,
    graph: Uuid,
    attachment: &Attachment,
) -> Result<(), GraphStoreError> {
    let (condition, extra) = attachment_condition(attachment);
    for table in ["labels", "tags", "vectors"] {
        let sql = format!(
            "DELETE FROM {table} WHERE tenant_guid = ?1 AND graph_guid = ?2 AND {condition}"
        );
        let mut params = vec![uuid_text(tenant), uuid_text(graph)];
        params.extend(extra.clone());
        conn.execute(&sql, params_from_iter(params))
            .map_err(|e| GraphStoreError::store(e.to_string()))?;
    }
    Ok(())
}

fn write_attachments<E: Entity>(conn: &Connection, entity: &E) -> Result<(), GraphStoreError> {
    let Some((graph, attachment)) = entity.attachment_scope() else {
        return Ok(());
    };
    let Some((labels, tags, vectors)) = entity.attached_sets() else {
        return Ok(());
    };
    let tenant = entity.tenant_guid().ok_or_else(|| {
        GraphStoreError::store("attachment-bearing entity is missing its tenant")
    })?;
    let now = Utc::now();
    for value in labels {
        let row = Label {
            guid: Uuid::new_v4(),
            tenant_guid: tenant,
            graph_guid: graph,
            attachment,
            value: value.clone(),
            created_utc: now,
            last_update_utc: now,
        };
        insert_row(conn, &row)?;
    }
    for pair in tags {
        let row = Tag {
            guid: Uuid::new_v4(),
            tenant_guid: tenant,
            graph_guid: graph,
            attachment,
            key: pair.key.clone(),
            value: pair.value.clone(),
            created_utc: now,
            last_update_utc: now,
        };
        insert_row(conn, &row)?;
    }
    for embedding in vectors {
        let row = Vector {
            guid: Uuid::new_v4(),
            tenant_guid: tenant,
            graph_guid: graph,
            attachment,
            model: embedding.model.clone(),
            dimensionality: embedding.dimensionality,
            content: embedding.content.clone(),
            embedding: embedding.vector.clone(),
            created_utc: now,
            last_update_utc: now,
        };
        insert_row(conn, &row)?;
    }
    Ok(())
}

/// Loads the attached label/tag/vector sets for a graph, node, or edge.
fn hydrate<E: Entity>(conn: &Connection, entity: &mut E) -> Result<(), GraphStoreError> {
    let Some((graph, attachment)) = entity.attachment_scope() else {
        return Ok(());
    };
    let tenant = entity.tenant_guid().ok_or_else(|| {
        GraphStoreError::store("attachment-bearing entity is missing its tenant")
    })?;
    let (condition, extra) = attachment_condition(&attachment);
    let base_params = |extra: &Option<Value>| {
        let mut params = vec![uuid_text(tenant), uuid_text(graph)];
        params.extend(extra.clone());
        params
    };

    let labels = collect_texts(
        conn,
        &format!(
            "SELECT label FROM labels WHERE tenant_guid = ?1 AND graph_guid = ?2 AND {condition} \
             ORDER BY label, guid"
        ),
        base_params(&extra),
    )?;

    let mut tags = Vec::new();
    {
        let sql = format!(
            "SELECT tag_key, tag_value FROM tags WHERE tenant_guid = ?1 AND graph_guid = ?2 \
             AND {condition} ORDER BY tag_key, guid"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| GraphStoreError::store(e.to_string()))?;
        let rows = stmt
            .query_map(params_from_iter(base_params(&extra)), |row| {
                Ok(TagPair {
                    key: row.get(0)?,
                    value: row.get(1)?,
                })
            })
            .map_err(|e| GraphStoreError::store(e.to_string()))?;
        for row in rows {
            tags.push(row.map_err(|e| GraphStoreError::store(e.to_string()))?);
        }
    }

    let mut vectors = Vec::new();
    {
        let sql = format!(
            "SELECT model, dimensionality, content, embedding FROM vectors \
             WHERE tenant_guid = ?1 AND graph_guid = ?2 AND {condition} \
             ORDER BY created_utc, guid"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| GraphStoreError::store(e.to_string()))?;
        let rows = stmt
            .query_map(params_from_iter(base_params(&extra)), |row| {
                let encoded: String = row.get(3)?;
                let vector: Vec<f32> = serde_json::from_str(&encoded).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        3,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(Embedding {
                    model: row.get(0)?,
                    dimensionality: row.get(1)?,
                    content: row.get(2)?,
                    vector,
                })
            })
            .map_err(|e| GraphStoreError::store(e.to_string()))?;
        for row in rows {
            vectors.push(row.map_err(|e| GraphStoreError::store(e.to_string()))?);
        }
    }

    entity.set_attached(labels, tags, vectors);
    Ok(())
}

fn collect_texts(
    conn: &Connection,
    sql: &str,
    params: Vec<Value>,
) -> Result<Vec<String>, GraphStoreError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| GraphStoreError::store(e.to_string()))?;
    let rows = stmt
        .query_map(params_from_iter(params), |row| row.get(0))
        .map_err(|e| GraphStoreError::store(e.to_string()))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| GraphStoreError::store(e.to_string()))?);
    }
    Ok(out)
}
