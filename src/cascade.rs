use ahash::AHashSet;
use rusqlite::Connection;
use rusqlite::types::Value;
use uuid::Uuid;

use crate::builder::{placeholders, uuid_text};
use crate::errors::GraphStoreError;
use crate::model::EntityType;

const META_TABLES: &[&str] = &["labels", "tags", "vectors"];

/// What a delete operation targets. Dependent rows are always removed with
/// the target; bare row deletes exist only for the leaf metadata entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    Tenant(Uuid),
    User(Uuid),
    Credential(Uuid),
    Graph(Uuid),
    Nodes(Vec<Uuid>),
    Edges(Vec<Uuid>),
    Labels(Vec<Uuid>),
    Tags(Vec<Uuid>),
    Vectors(Vec<Uuid>),
}

impl DeleteTarget {
    pub(crate) fn entity(&self) -> EntityType {
        match self {
            DeleteTarget::Tenant(_) => EntityType::Tenant,
            DeleteTarget::User(_) => EntityType::User,
            DeleteTarget::Credential(_) => EntityType::Credential,
            DeleteTarget::Graph(_) => EntityType::Graph,
            DeleteTarget::Nodes(_) => EntityType::Node,
            DeleteTarget::Edges(_) => EntityType::Edge,
            DeleteTarget::Labels(_) => EntityType::Label,
            DeleteTarget::Tags(_) => EntityType::Tag,
            DeleteTarget::Vectors(_) => EntityType::Vector,
        }
    }

    /// The guids of the rows the caller named, deduplicated and sorted so a
    /// batch produces the same plan in any input permutation.
    pub(crate) fn primary_guids(&self) -> Vec<Uuid> {
        match self {
            DeleteTarget::Tenant(guid)
            | DeleteTarget::User(guid)
            | DeleteTarget::Credential(guid)
            | DeleteTarget::Graph(guid) => vec![*guid],
            DeleteTarget::Nodes(guids)
            | DeleteTarget::Edges(guids)
            | DeleteTarget::Labels(guids)
            | DeleteTarget::Tags(guids)
            | DeleteTarget::Vectors(guids) => {
                let set: AHashSet<Uuid> = guids.iter().copied().collect();
                let mut unique: Vec<Uuid> = set.into_iter().collect();
                unique.sort();
                unique
            }
        }
    }

    pub(crate) fn table(&self) -> &'static str {
        match self {
            DeleteTarget::Tenant(_) => "tenants",
            DeleteTarget::User(_) => "users",
            DeleteTarget::Credential(_) => "credentials",
            DeleteTarget::Graph(_) => "graphs",
            DeleteTarget::Nodes(_) => "nodes",
            DeleteTarget::Edges(_) => "edges",
            DeleteTarget::Labels(_) => "labels",
            DeleteTarget::Tags(_) => "tags",
            DeleteTarget::Vectors(_) => "vectors",
        }
    }
}

/// Ordered, parameterized statements that remove a target and everything
/// depending on it, leaves first. Executed as one transaction by the store.
#[derive(Debug, Default)]
pub(crate) struct DeletePlan {
    pub statements: Vec<(String, Vec<Value>)>,
}

impl DeletePlan {
    fn push(&mut self, sql: String, params: Vec<Value>) {
        self.statements.push((sql, params));
    }
}

pub(crate) fn plan(tenant: Uuid, target: &DeleteTarget) -> Result<DeletePlan, GraphStoreError> {
    let guids = target.primary_guids();
    if guids.is_empty() {
        return Err(GraphStoreError::validation(
            target.entity(),
            "delete requires at least one guid",
        ));
    }
    let mut plan = DeletePlan::default();
    match target {
        DeleteTarget::Tenant(guid) => plan_tenant(&mut plan, *guid),
        DeleteTarget::User(guid) => plan_user(&mut plan, tenant, *guid),
        DeleteTarget::Credential(guid) => {
            plan.push(
                "DELETE FROM credentials WHERE tenant_guid = ? AND guid = ?".to_string(),
                vec![uuid_text(tenant), uuid_text(*guid)],
            );
        }
        DeleteTarget::Graph(guid) => plan_graph(&mut plan, tenant, *guid),
        DeleteTarget::Nodes(_) => plan_nodes(&mut plan, tenant, &guids),
        DeleteTarget::Edges(_) => plan_edges(&mut plan, tenant, &guids),
        DeleteTarget::Labels(_) | DeleteTarget::Tags(_) | DeleteTarget::Vectors(_) => {
            plan.push(
                format!(
                    "DELETE FROM {} WHERE tenant_guid = ? AND guid IN ({})",
                    target.table(),
                    placeholders(guids.len()),
                ),
                guid_params(tenant, &guids),
            );
        }
    }
    Ok(plan)
}

fn guid_params(tenant: Uuid, guids: &[Uuid]) -> Vec<Value> {
    let mut params = Vec::with_capacity(guids.len() + 1);
    params.push(uuid_text(tenant));
    params.extend(guids.iter().map(|g| uuid_text(*g)));
    params
}

fn plan_tenant(plan: &mut DeletePlan, tenant: Uuid) {
    for table in [
        "vectors",
        "tags",
        "labels",
        "edges",
        "nodes",
        "graphs",
        "credentials",
        "users",
    ] {
        plan.push(
            format!("DELETE FROM {table} WHERE tenant_guid = ?"),
            vec![uuid_text(tenant)],
        );
    }
    plan.push(
        "DELETE FROM tenants WHERE guid = ?".to_string(),
        vec![uuid_text(tenant)],
    );
}

fn plan_user(plan: &mut DeletePlan, tenant: Uuid, user: Uuid) {
    plan.push(
        "DELETE FROM credentials WHERE tenant_guid = ? AND user_guid = ?".to_string(),
        vec![uuid_text(tenant), uuid_text(user)],
    );
    plan.push(
        "DELETE FROM users WHERE tenant_guid = ? AND guid = ?".to_string(),
        vec![uuid_text(tenant), uuid_text(user)],
    );
}

fn plan_graph(plan: &mut DeletePlan, tenant: Uuid, graph: Uuid) {
    // graph_guid covers graph-, node-, and edge-attached metadata alike.
    for table in META_TABLES {
        plan.push(
            format!("DELETE FROM {table} WHERE tenant_guid = ? AND graph_guid = ?"),
            vec![uuid_text(tenant), uuid_text(graph)],
        );
    }
    for table in ["edges", "nodes"] {
        plan.push(
            format!("DELETE FROM {table} WHERE tenant_guid = ? AND graph_guid = ?"),
            vec![uuid_text(tenant), uuid_text(graph)],
        );
    }
    plan.push(
        "DELETE FROM graphs WHERE tenant_guid = ? AND guid = ?".to_string(),
        vec![uuid_text(tenant), uuid_text(graph)],
    );
}

fn plan_nodes(plan: &mut DeletePlan, tenant: Uuid, nodes: &[Uuid]) {
    let marks = placeholders(nodes.len());
    // Metadata of every edge incident to the set goes first, then the edges,
    // then the nodes' own metadata, then the node rows.
    for table in META_TABLES {
        plan.push(
            format!(
                "DELETE FROM {table} WHERE tenant_guid = ?1 AND edge_guid IN (\
                 SELECT guid FROM edges WHERE tenant_guid = ?1 \
                 AND (from_guid IN ({marks}) OR to_guid IN ({marks})))"
            ),
            incident_params(tenant, nodes),
        );
    }
    plan.push(
        format!(
            "DELETE FROM edges WHERE tenant_guid = ?1 \
             AND (from_guid IN ({marks}) OR to_guid IN ({marks}))"
        ),
        incident_params(tenant, nodes),
    );
    for table in META_TABLES {
        plan.push(
            format!("DELETE FROM {table} WHERE tenant_guid = ? AND node_guid IN ({marks})"),
            guid_params(tenant, nodes),
        );
    }
    plan.push(
        format!("DELETE FROM nodes WHERE tenant_guid = ? AND guid IN ({marks})"),
        guid_params(tenant, nodes),
    );
}

fn plan_edges(plan: &mut DeletePlan, tenant: Uuid, edges: &[Uuid]) {
    let marks = placeholders(edges.len());
    for table in META_TABLES {
        plan.push(
            format!("DELETE FROM {table} WHERE tenant_guid = ? AND edge_guid IN ({marks})"),
            guid_params(tenant, edges),
        );
    }
    plan.push(
        format!("DELETE FROM edges WHERE tenant_guid = ? AND guid IN ({marks})"),
        guid_params(tenant, edges),
    );
}

fn incident_params(tenant: Uuid, nodes: &[Uuid]) -> Vec<Value> {
    // ?1 is the tenant; the node set is bound twice, once per endpoint column.
    let mut params = Vec::with_capacity(nodes.len() * 2 + 1);
    params.push(uuid_text(tenant));
    params.extend(nodes.iter().map(|g| uuid_text(*g)));
    params.extend(nodes.iter().map(|g| uuid_text(*g)));
    params
}

/// Counts dangling references left under a tenant: edges naming missing
/// nodes, and metadata rows naming missing nodes or edges. A cascade that
/// leaves any behind is rolled back.
pub(crate) fn verify_integrity(
    conn: &Connection,
    tenant: Uuid,
    entity: EntityType,
) -> Result<(), GraphStoreError> {
    let mut dangling: i64 = count_dangling(
        conn,
        tenant,
        "SELECT COUNT(*) FROM edges e \
         LEFT JOIN nodes src ON src.guid = e.from_guid \
         LEFT JOIN nodes dst ON dst.guid = e.to_guid \
         WHERE e.tenant_guid = ?1 AND (src.guid IS NULL OR dst.guid IS NULL)",
    )?;
    for table in META_TABLES {
        dangling += count_dangling(
            conn,
            tenant,
            &format!(
                "SELECT COUNT(*) FROM {table} m \
                 LEFT JOIN nodes n ON n.guid = m.node_guid \
                 LEFT JOIN edges e ON e.guid = m.edge_guid \
                 WHERE m.tenant_guid = ?1 AND (\
                 (m.node_guid IS NOT NULL AND n.guid IS NULL) OR \
                 (m.edge_guid IS NOT NULL AND e.guid IS NULL))"
            ),
        )?;
    }
    if dangling > 0 {
        return Err(GraphStoreError::integrity(
            entity,
            format!("cascade would leave {dangling} dangling references under tenant {tenant}"),
        ));
    }
    Ok(())
}

fn count_dangling(conn: &Connection, tenant: Uuid, sql: &str) -> Result<i64, GraphStoreError> {
    conn.query_row(sql, rusqlite::params![tenant.to_string()], |row| row.get(0))
        .map_err(|e| GraphStoreError::store(e.to_string()))
}
