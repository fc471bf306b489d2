use rusqlite::types::Value;
use uuid::Uuid;

use crate::descriptor::{EntityDescriptor, Ordering};
use crate::errors::GraphStoreError;
use crate::filter::{self, Expr};
use crate::model::TagPair;
use crate::predicates;

pub(crate) const ALIAS: &str = "t";

/// Keyset resumption point: the sort-column value and guid of the last row
/// of the previous page. Guid orderings carry no sort value.
#[derive(Debug, Clone)]
pub(crate) struct Marker {
    pub sort_value: Option<Value>,
    pub guid: Uuid,
}

/// Everything a SELECT or COUNT over one entity table is assembled from.
#[derive(Debug)]
pub(crate) struct SelectSpec<'a> {
    pub descriptor: &'static EntityDescriptor,
    pub tenant: Option<Uuid>,
    pub graph: Option<Uuid>,
    pub node: Option<Uuid>,
    pub edge: Option<Uuid>,
    pub guids: Option<&'a [Uuid]>,
    pub labels: &'a [String],
    pub tags: &'a [TagPair],
    pub expr: Option<&'a Expr>,
    pub ordering: Ordering,
    pub marker: Option<&'a Marker>,
    pub max_results: Option<u64>,
    pub skip: Option<u64>,
}

impl<'a> SelectSpec<'a> {
    pub fn scoped(descriptor: &'static EntityDescriptor, tenant: Option<Uuid>) -> Self {
        Self {
            descriptor,
            tenant,
            graph: None,
            node: None,
            edge: None,
            guids: None,
            labels: &[],
            tags: &[],
            expr: None,
            ordering: Ordering::default(),
            marker: None,
            max_results: None,
            skip: None,
        }
    }
}

pub(crate) fn uuid_text(guid: Uuid) -> Value {
    Value::Text(guid.to_string())
}

pub(crate) fn placeholders(count: usize) -> String {
    let mut out = String::with_capacity(count * 3);
    for idx in 0..count {
        if idx > 0 {
            out.push_str(", ");
        }
        out.push('?');
    }
    out
}

pub(crate) fn build_select(spec: &SelectSpec<'_>) -> Result<(String, Vec<Value>), GraphStoreError> {
    spec.descriptor.require_ordering(spec.ordering)?;
    let (clauses, mut params) = where_clauses(spec)?;
    let columns = spec
        .descriptor
        .columns
        .iter()
        .map(|c| format!("{ALIAS}.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!("SELECT {columns} FROM {} {ALIAS}", spec.descriptor.table);
    append_where(&mut sql, &clauses);
    sql.push_str(" ORDER BY ");
    sql.push_str(&order_clause(spec.ordering, spec.descriptor)?);
    match (spec.max_results, spec.skip) {
        (Some(limit), Some(skip)) => {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(Value::Integer(limit as i64));
            params.push(Value::Integer(skip as i64));
        }
        (Some(limit), None) => {
            sql.push_str(" LIMIT ?");
            params.push(Value::Integer(limit as i64));
        }
        (None, Some(skip)) => {
            // SQLite requires LIMIT to carry OFFSET; -1 means unbounded.
            sql.push_str(" LIMIT -1 OFFSET ?");
            params.push(Value::Integer(skip as i64));
        }
        (None, None) => {}
    }
    Ok((sql, params))
}

pub(crate) fn build_count(spec: &SelectSpec<'_>) -> Result<(String, Vec<Value>), GraphStoreError> {
    let (clauses, params) = where_clauses(spec)?;
    let mut sql = format!("SELECT COUNT(*) FROM {} {ALIAS}", spec.descriptor.table);
    append_where(&mut sql, &clauses);
    Ok((sql, params))
}

pub(crate) fn build_insert(descriptor: &EntityDescriptor) -> String {
    format!(
        "INSERT INTO {}({}) VALUES({})",
        descriptor.table,
        descriptor.columns.join(", "),
        placeholders(descriptor.columns.len()),
    )
}

/// UPDATE of the given mutable columns, keyed by guid and tenant scope. The
/// caller appends the guid (and tenant guid where scoped) to the parameters.
pub(crate) fn build_update(descriptor: &EntityDescriptor, columns: &[&str]) -> String {
    let assignments = columns
        .iter()
        .map(|c| format!("{c} = ?"))
        .collect::<Vec<_>>()
        .join(", ");
    match descriptor.tenant_column {
        Some(tenant_col) => format!(
            "UPDATE {} SET {assignments} WHERE guid = ? AND {tenant_col} = ?",
            descriptor.table,
        ),
        None => format!("UPDATE {} SET {assignments} WHERE guid = ?", descriptor.table),
    }
}

fn append_where(sql: &mut String, clauses: &[String]) {
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
}

fn where_clauses(spec: &SelectSpec<'_>) -> Result<(Vec<String>, Vec<Value>), GraphStoreError> {
    let descriptor = spec.descriptor;
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    match (descriptor.tenant_column, spec.tenant) {
        (Some(column), Some(tenant)) => {
            clauses.push(format!("{ALIAS}.{column} = ?"));
            params.push(uuid_text(tenant));
        }
        (Some(_), None) => {
            return Err(GraphStoreError::validation(
                descriptor.entity,
                "query requires a tenant scope",
            ));
        }
        (None, _) => {}
    }
    for (column, value) in [
        (descriptor.graph_column, spec.graph),
        (descriptor.node_column, spec.node),
        (descriptor.edge_column, spec.edge),
    ] {
        if let Some(guid) = value {
            let column = column.ok_or_else(|| {
                GraphStoreError::unsupported(
                    descriptor.entity,
                    "requested scope column is not defined for this entity",
                )
            })?;
            clauses.push(format!("{ALIAS}.{column} = ?"));
            params.push(uuid_text(guid));
        }
    }
    if let Some(guids) = spec.guids {
        if guids.is_empty() {
            return Err(GraphStoreError::validation(
                descriptor.entity,
                "batch read requires at least one guid",
            ));
        }
        clauses.push(format!("{ALIAS}.guid IN ({})", placeholders(guids.len())));
        params.extend(guids.iter().map(|g| uuid_text(*g)));
    }

    let (meta_fragments, meta_params) =
        predicates::compose(descriptor, ALIAS, spec.labels, spec.tags)?;
    clauses.extend(meta_fragments);
    params.extend(meta_params);

    let (expr_sql, expr_params) = filter::compile(spec.expr, ALIAS, descriptor)?;
    if !expr_sql.is_empty() {
        clauses.push(expr_sql);
        params.extend(expr_params);
    }

    if let Some(marker) = spec.marker {
        let (marker_sql, marker_params) = marker_predicate(spec.ordering, descriptor, marker)?;
        clauses.push(marker_sql);
        params.extend(marker_params);
    }
    Ok((clauses, params))
}

/// Predicate selecting rows strictly past the marker in the active ordering.
/// Column orderings compare (sort column, guid) as a row value so equal sort
/// keys can neither duplicate nor skip rows across pages.
fn marker_predicate(
    ordering: Ordering,
    descriptor: &EntityDescriptor,
    marker: &Marker,
) -> Result<(String, Vec<Value>), GraphStoreError> {
    if !ordering.keyset_capable() {
        return Err(GraphStoreError::unsupported(
            descriptor.entity,
            format!("ordering {ordering:?} cannot resume from a continuation token"),
        ));
    }
    let symbol = if ordering.descending() { "<" } else { ">" };
    match ordering.sort_column(descriptor)? {
        None => Ok((
            format!("{ALIAS}.guid {symbol} ?"),
            vec![uuid_text(marker.guid)],
        )),
        Some(column) => {
            let sort_value = marker.sort_value.clone().ok_or_else(|| {
                GraphStoreError::store("continuation marker is missing its sort value")
            })?;
            Ok((
                format!("({ALIAS}.{column}, {ALIAS}.guid) {symbol} (?, ?)"),
                vec![sort_value, uuid_text(marker.guid)],
            ))
        }
    }
}

fn order_clause(
    ordering: Ordering,
    descriptor: &EntityDescriptor,
) -> Result<String, GraphStoreError> {
    let direction = if ordering.descending() { "DESC" } else { "ASC" };
    match ordering {
        Ordering::MostConnected | Ordering::LeastConnected => {
            Ok(format!("{} {direction}, {ALIAS}.guid ASC", incident_edge_count()))
        }
        _ => match ordering.sort_column(descriptor)? {
            None => Ok(format!("{ALIAS}.guid {direction}")),
            Some(column) => Ok(format!(
                "{ALIAS}.{column} {direction}, {ALIAS}.guid {direction}"
            )),
        },
    }
}

/// Derived connectivity aggregate for node ordering; not a stored column.
fn incident_edge_count() -> String {
    format!(
        "(SELECT COUNT(*) FROM edges conn WHERE conn.tenant_guid = {ALIAS}.tenant_guid \
         AND conn.graph_guid = {ALIAS}.graph_guid \
         AND (conn.from_guid = {ALIAS}.guid OR conn.to_guid = {ALIAS}.guid))"
    )
}
