use rusqlite::types::Value;

use crate::descriptor::{EntityDescriptor, MetaTarget};
use crate::errors::GraphStoreError;
use crate::model::TagPair;

/// Compiles requested labels and tags into correlated EXISTS predicates, one
/// per requested label and one per requested tag, all ANDed by the caller.
/// The correlated form composes with LIMIT/OFFSET and keyset markers without
/// GROUP BY wrapping. Empty inputs contribute nothing.
pub(crate) fn compose(
    descriptor: &EntityDescriptor,
    alias: &str,
    labels: &[String],
    tags: &[TagPair],
) -> Result<(Vec<String>, Vec<Value>), GraphStoreError> {
    if labels.is_empty() && tags.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }
    let target = descriptor.meta_target.ok_or_else(|| {
        GraphStoreError::unsupported(
            descriptor.entity,
            "label and tag filters apply only to graphs, nodes, and edges",
        )
    })?;

    let mut fragments = Vec::with_capacity(labels.len() + tags.len());
    let mut params = Vec::new();
    for label in labels {
        if label.trim().is_empty() {
            return Err(GraphStoreError::validation(
                descriptor.entity,
                "requested label must not be empty",
            ));
        }
        fragments.push(format!(
            "EXISTS (SELECT 1 FROM labels lbl WHERE {} AND lbl.label = ?)",
            correlation("lbl", alias, target),
        ));
        params.push(Value::Text(label.clone()));
    }
    for tag in tags {
        if tag.key.trim().is_empty() {
            return Err(GraphStoreError::validation(
                descriptor.entity,
                "requested tag key must not be empty",
            ));
        }
        match &tag.value {
            // Absent value: any row with the key qualifies.
            None => {
                fragments.push(format!(
                    "EXISTS (SELECT 1 FROM tags tg WHERE {} AND tg.tag_key = ?)",
                    correlation("tg", alias, target),
                ));
                params.push(Value::Text(tag.key.clone()));
            }
            Some(value) => {
                fragments.push(format!(
                    "EXISTS (SELECT 1 FROM tags tg WHERE {} AND tg.tag_key = ? AND tg.tag_value = ?)",
                    correlation("tg", alias, target),
                ));
                params.push(Value::Text(tag.key.clone()));
                params.push(Value::Text(value.clone()));
            }
        }
    }
    Ok((fragments, params))
}

fn correlation(meta: &str, alias: &str, target: MetaTarget) -> String {
    match target {
        MetaTarget::Graph => format!(
            "{meta}.tenant_guid = {alias}.tenant_guid AND {meta}.graph_guid = {alias}.guid \
             AND {meta}.node_guid IS NULL AND {meta}.edge_guid IS NULL"
        ),
        MetaTarget::Node => format!(
            "{meta}.tenant_guid = {alias}.tenant_guid AND {meta}.graph_guid = {alias}.graph_guid \
             AND {meta}.node_guid = {alias}.guid"
        ),
        MetaTarget::Edge => format!(
            "{meta}.tenant_guid = {alias}.tenant_guid AND {meta}.graph_guid = {alias}.graph_guid \
             AND {meta}.edge_guid = {alias}.guid"
        ),
    }
}
