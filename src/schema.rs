use rusqlite::Connection;

use crate::errors::GraphStoreError;

pub fn ensure_schema(conn: &Connection) -> Result<(), GraphStoreError> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS tenants (
            guid            TEXT PRIMARY KEY,
            name            TEXT NOT NULL,
            active          INTEGER NOT NULL DEFAULT 1,
            created_utc     TEXT NOT NULL,
            last_update_utc TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS users (
            guid            TEXT PRIMARY KEY,
            tenant_guid     TEXT NOT NULL,
            email           TEXT NOT NULL,
            password        TEXT NOT NULL,
            active          INTEGER NOT NULL DEFAULT 1,
            created_utc     TEXT NOT NULL,
            last_update_utc TEXT NOT NULL,
            UNIQUE (tenant_guid, email)
        );
        CREATE TABLE IF NOT EXISTS credentials (
            guid            TEXT PRIMARY KEY,
            tenant_guid     TEXT NOT NULL,
            user_guid       TEXT NOT NULL,
            bearer_token    TEXT NOT NULL UNIQUE,
            active          INTEGER NOT NULL DEFAULT 1,
            created_utc     TEXT NOT NULL,
            last_update_utc TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS graphs (
            guid                  TEXT PRIMARY KEY,
            tenant_guid           TEXT NOT NULL,
            name                  TEXT NOT NULL,
            data                  TEXT NOT NULL,
            index_type            TEXT,
            index_file            TEXT,
            index_dimensionality  INTEGER,
            index_m               INTEGER,
            index_ef_construction INTEGER,
            index_ef              INTEGER,
            created_utc           TEXT NOT NULL,
            last_update_utc       TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS nodes (
            guid            TEXT PRIMARY KEY,
            tenant_guid     TEXT NOT NULL,
            graph_guid      TEXT NOT NULL,
            name            TEXT NOT NULL,
            data            TEXT NOT NULL,
            created_utc     TEXT NOT NULL,
            last_update_utc TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS edges (
            guid            TEXT PRIMARY KEY,
            tenant_guid     TEXT NOT NULL,
            graph_guid      TEXT NOT NULL,
            from_guid       TEXT NOT NULL,
            to_guid         TEXT NOT NULL,
            cost            REAL NOT NULL DEFAULT 0,
            data            TEXT NOT NULL,
            created_utc     TEXT NOT NULL,
            last_update_utc TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS labels (
            guid            TEXT PRIMARY KEY,
            tenant_guid     TEXT NOT NULL,
            graph_guid      TEXT NOT NULL,
            node_guid       TEXT,
            edge_guid       TEXT,
            label           TEXT NOT NULL,
            created_utc     TEXT NOT NULL,
            last_update_utc TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS tags (
            guid            TEXT PRIMARY KEY,
            tenant_guid     TEXT NOT NULL,
            graph_guid      TEXT NOT NULL,
            node_guid       TEXT,
            edge_guid       TEXT,
            tag_key         TEXT NOT NULL,
            tag_value       TEXT,
            created_utc     TEXT NOT NULL,
            last_update_utc TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS vectors (
            guid            TEXT PRIMARY KEY,
            tenant_guid     TEXT NOT NULL,
            graph_guid      TEXT NOT NULL,
            node_guid       TEXT,
            edge_guid       TEXT,
            model           TEXT NOT NULL,
            dimensionality  INTEGER NOT NULL,
            content         TEXT NOT NULL,
            embedding       TEXT NOT NULL,
            created_utc     TEXT NOT NULL,
            last_update_utc TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_tenant ON users(tenant_guid);
        CREATE INDEX IF NOT EXISTS idx_credentials_tenant ON credentials(tenant_guid);
        CREATE INDEX IF NOT EXISTS idx_credentials_user ON credentials(user_guid);
        CREATE INDEX IF NOT EXISTS idx_graphs_tenant ON graphs(tenant_guid);
        CREATE INDEX IF NOT EXISTS idx_nodes_tenant_graph ON nodes(tenant_guid, graph_guid);
        CREATE INDEX IF NOT EXISTS idx_edges_tenant_graph ON edges(tenant_guid, graph_guid);
        CREATE INDEX IF NOT EXISTS idx_edges_from ON edges(from_guid);
        CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(to_guid);
        CREATE INDEX IF NOT EXISTS idx_labels_scope ON labels(tenant_guid, graph_guid, label);
        CREATE INDEX IF NOT EXISTS idx_labels_node ON labels(node_guid);
        CREATE INDEX IF NOT EXISTS idx_labels_edge ON labels(edge_guid);
        CREATE INDEX IF NOT EXISTS idx_tags_scope ON tags(tenant_guid, graph_guid, tag_key, tag_value);
        CREATE INDEX IF NOT EXISTS idx_tags_node ON tags(node_guid);
        CREATE INDEX IF NOT EXISTS idx_tags_edge ON tags(edge_guid);
        CREATE INDEX IF NOT EXISTS idx_vectors_scope ON vectors(tenant_guid, graph_guid);
        CREATE INDEX IF NOT EXISTS idx_vectors_node ON vectors(node_guid);
        CREATE INDEX IF NOT EXISTS idx_vectors_edge ON vectors(edge_guid);
        "#,
    )
    .map_err(|e| GraphStoreError::store(e.to_string()))?;
    Ok(())
}
