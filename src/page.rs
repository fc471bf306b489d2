use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::builder::{self, Marker, SelectSpec};
use crate::cache::{StatementCache, StatementKey};
use crate::descriptor::Ordering;
use crate::errors::GraphStoreError;
use crate::record::Entity;

pub const DEFAULT_MAX_RESULTS: u64 = 100;

/// Keyset enumeration request. The continuation token is the guid of the
/// last row of the previous page, absent for the first page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumerationRequest {
    pub tenant_guid: Option<Uuid>,
    pub graph_guid: Option<Uuid>,
    pub max_results: u64,
    pub continuation_token: Option<Uuid>,
    pub ordering: Ordering,
}

impl Default for EnumerationRequest {
    fn default() -> Self {
        Self {
            tenant_guid: None,
            graph_guid: None,
            max_results: DEFAULT_MAX_RESULTS,
            continuation_token: None,
            ordering: Ordering::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumerationResult<T> {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub max_results: u64,
    pub total_records: u64,
    pub records_remaining: u64,
    pub end_of_results: bool,
    pub continuation_token: Option<Uuid>,
    pub objects: Vec<T>,
}

/// Runs one keyset page. Invariant, for a fixed scope and ordering with no
/// concurrent mutation: total_records is constant across pages and equals
/// records seen before this page + page length + records_remaining.
pub(crate) fn enumerate<E: Entity>(
    conn: &Connection,
    cache: &StatementCache,
    request: &EnumerationRequest,
) -> Result<EnumerationResult<E>, GraphStoreError> {
    let descriptor = E::descriptor();
    descriptor.require_ordering(request.ordering)?;
    if request.max_results == 0 {
        return Err(GraphStoreError::validation(
            descriptor.entity,
            "max results must be at least 1",
        ));
    }
    if request.continuation_token.is_some() && !request.ordering.keyset_capable() {
        return Err(GraphStoreError::unsupported(
            descriptor.entity,
            format!(
                "ordering {:?} cannot resume from a continuation token",
                request.ordering
            ),
        ));
    }

    let marker = match request.continuation_token {
        None => None,
        Some(token) => Some(resolve_marker::<E>(conn, request, token)?),
    };

    let mut spec = SelectSpec::scoped(descriptor, request.tenant_guid);
    spec.graph = request.graph_guid;
    spec.ordering = request.ordering;

    let total_records = run_count(conn, cache, &spec, request, false)?;
    spec.marker = marker.as_ref();
    let past_marker = if marker.is_some() {
        run_count(conn, cache, &spec, request, true)?
    } else {
        total_records
    };

    spec.max_results = Some(request.max_results);
    let objects = run_select::<E>(conn, cache, &spec, request)?;

    let records_remaining = past_marker.saturating_sub(objects.len() as u64);
    let end_of_results = records_remaining == 0;
    // Orderings that cannot resume never hand out a token they would refuse.
    let continuation_token = if end_of_results || !request.ordering.keyset_capable() {
        None
    } else {
        objects.last().map(Entity::guid)
    };
    Ok(EnumerationResult {
        success: true,
        timestamp: Utc::now(),
        max_results: request.max_results,
        total_records,
        records_remaining,
        end_of_results,
        continuation_token,
        objects,
    })
}

/// Looks up the marker row named by the token. A token whose row no longer
/// exists under the requested scope is a stale or foreign token.
fn resolve_marker<E: Entity>(
    conn: &Connection,
    request: &EnumerationRequest,
    token: Uuid,
) -> Result<Marker, GraphStoreError> {
    let descriptor = E::descriptor();
    let sort_column = request.ordering.sort_column(descriptor)?;
    let (sql, tenant_bound) = match (sort_column, descriptor.tenant_column) {
        (Some(column), Some(tenant_col)) => (
            format!(
                "SELECT {column} FROM {} WHERE guid = ?1 AND {tenant_col} = ?2",
                descriptor.table
            ),
            true,
        ),
        (Some(column), None) => (
            format!("SELECT {column} FROM {} WHERE guid = ?1", descriptor.table),
            false,
        ),
        (None, Some(tenant_col)) => (
            format!(
                "SELECT guid FROM {} WHERE guid = ?1 AND {tenant_col} = ?2",
                descriptor.table
            ),
            true,
        ),
        (None, None) => (
            format!("SELECT guid FROM {} WHERE guid = ?1", descriptor.table),
            false,
        ),
    };
    let tenant = if tenant_bound {
        let tenant = request.tenant_guid.ok_or_else(|| {
            GraphStoreError::validation(descriptor.entity, "enumeration requires a tenant scope")
        })?;
        Some(tenant.to_string())
    } else {
        None
    };
    let found: Option<rusqlite::types::Value> = match &tenant {
        Some(tenant) => conn
            .query_row(&sql, rusqlite::params![token.to_string(), tenant], |row| {
                row.get(0)
            })
            .optional(),
        None => conn
            .query_row(&sql, rusqlite::params![token.to_string()], |row| row.get(0))
            .optional(),
    }
    .map_err(|e| GraphStoreError::store(e.to_string()))?;
    let value = found.ok_or_else(|| {
        GraphStoreError::not_found(
            descriptor.entity,
            format!("continuation token {token} does not match a stored row"),
        )
    })?;
    Ok(Marker {
        sort_value: sort_column.map(|_| value),
        guid: token,
    })
}

fn statement_key(
    spec: &SelectSpec<'_>,
    request: &EnumerationRequest,
    with_marker: bool,
    count: bool,
) -> StatementKey {
    StatementKey {
        table: spec.descriptor.table,
        ordering: request.ordering,
        graph_scoped: request.graph_guid.is_some(),
        with_marker,
        count,
    }
}

/// Parameters for an enumeration statement, in the builder's clause order:
/// tenant scope, graph scope, marker values, then LIMIT when selecting.
fn scope_params(
    spec: &SelectSpec<'_>,
    limit: Option<u64>,
) -> Vec<rusqlite::types::Value> {
    let mut params = Vec::new();
    if spec.descriptor.tenant_column.is_some() {
        if let Some(tenant) = spec.tenant {
            params.push(rusqlite::types::Value::Text(tenant.to_string()));
        }
    }
    if let Some(graph) = spec.graph {
        params.push(rusqlite::types::Value::Text(graph.to_string()));
    }
    if let Some(marker) = spec.marker {
        if let Some(sort_value) = &marker.sort_value {
            params.push(sort_value.clone());
        }
        params.push(rusqlite::types::Value::Text(marker.guid.to_string()));
    }
    if let Some(limit) = limit {
        params.push(rusqlite::types::Value::Integer(limit as i64));
    }
    params
}

fn cached_sql(
    cache: &StatementCache,
    key: StatementKey,
    build: impl FnOnce() -> Result<String, GraphStoreError>,
) -> Result<String, GraphStoreError> {
    if let Some(sql) = cache.get(&key) {
        return Ok(sql);
    }
    let sql = build()?;
    cache.insert(key, sql.clone());
    Ok(sql)
}

fn run_count(
    conn: &Connection,
    cache: &StatementCache,
    spec: &SelectSpec<'_>,
    request: &EnumerationRequest,
    with_marker: bool,
) -> Result<u64, GraphStoreError> {
    let key = statement_key(spec, request, with_marker, true);
    let sql = cached_sql(cache, key, || Ok(builder::build_count(spec)?.0))?;
    let params = scope_params(spec, None);
    let count: i64 = conn
        .query_row(&sql, params_from_iter(params), |row| row.get(0))
        .map_err(|e| GraphStoreError::store(e.to_string()))?;
    Ok(count.max(0) as u64)
}

fn run_select<E: Entity>(
    conn: &Connection,
    cache: &StatementCache,
    spec: &SelectSpec<'_>,
    request: &EnumerationRequest,
) -> Result<Vec<E>, GraphStoreError> {
    let key = statement_key(spec, request, spec.marker.is_some(), false);
    let sql = cached_sql(cache, key, || Ok(builder::build_select(spec)?.0))?;
    let params = scope_params(spec, spec.max_results);
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| GraphStoreError::store(e.to_string()))?;
    let rows = stmt
        .query_map(params_from_iter(params), |row| E::from_row(row))
        .map_err(|e| GraphStoreError::store(e.to_string()))?;
    let mut objects = Vec::new();
    for row in rows {
        objects.push(row.map_err(|e| GraphStoreError::store(e.to_string()))?);
    }
    Ok(objects)
}
