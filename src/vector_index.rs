use std::fs;
use std::path::Path;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::GraphStoreError;
use crate::store::{GraphStore, ReadQuery};

/// External approximate-nearest-neighbor collaborator, keyed by vector guid.
/// The store's only obligation toward an implementation is feeding it
/// consistent (guid, embedding) pairs; the index algorithm itself lives
/// outside this crate.
pub trait VectorIndex {
    fn add(&mut self, guid: Uuid, vector: &[f32]) -> Result<(), GraphStoreError>;
    fn remove(&mut self, guid: Uuid) -> Result<(), GraphStoreError>;

    fn update(&mut self, guid: Uuid, vector: &[f32]) -> Result<(), GraphStoreError> {
        self.remove(guid)?;
        self.add(guid, vector)
    }

    fn add_batch(&mut self, entries: &[(Uuid, Vec<f32>)]) -> Result<(), GraphStoreError> {
        for (guid, vector) in entries {
            self.add(*guid, vector)?;
        }
        Ok(())
    }

    fn remove_batch(&mut self, guids: &[Uuid]) -> Result<(), GraphStoreError> {
        for guid in guids {
            self.remove(*guid)?;
        }
        Ok(())
    }

    /// Top-k nearest vectors to the query, best first. `breadth` is the
    /// optional search-width hint (ef) an ANN engine may honor.
    fn search(
        &self,
        query: &[f32],
        k: usize,
        breadth: Option<usize>,
    ) -> Result<Vec<(Uuid, f32)>, GraphStoreError>;

    fn persist(&self, path: &Path) -> Result<(), GraphStoreError>;
    fn load(&mut self, path: &Path) -> Result<(), GraphStoreError>;
}

/// Exact-scan index used in tests and as a fallback for small graphs.
#[derive(Debug, Default)]
pub struct BruteForceIndex {
    entries: AHashMap<Uuid, Vec<f32>>,
}

#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    entries: Vec<(Uuid, Vec<f32>)>,
}

impl BruteForceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl VectorIndex for BruteForceIndex {
    fn add(&mut self, guid: Uuid, vector: &[f32]) -> Result<(), GraphStoreError> {
        self.entries.insert(guid, vector.to_vec());
        Ok(())
    }

    fn remove(&mut self, guid: Uuid) -> Result<(), GraphStoreError> {
        self.entries.remove(&guid);
        Ok(())
    }

    fn search(
        &self,
        query: &[f32],
        k: usize,
        _breadth: Option<usize>,
    ) -> Result<Vec<(Uuid, f32)>, GraphStoreError> {
        let mut scored: Vec<(Uuid, f32)> = self
            .entries
            .iter()
            .filter(|(_, v)| v.len() == query.len())
            .map(|(guid, v)| (*guid, cosine_similarity(query, v)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    fn persist(&self, path: &Path) -> Result<(), GraphStoreError> {
        let persisted = PersistedIndex {
            entries: self.entries.iter().map(|(g, v)| (*g, v.clone())).collect(),
        };
        let encoded = serde_json::to_string(&persisted)
            .map_err(|e| GraphStoreError::store(e.to_string()))?;
        fs::write(path, encoded).map_err(|e| GraphStoreError::store(e.to_string()))
    }

    fn load(&mut self, path: &Path) -> Result<(), GraphStoreError> {
        let encoded = fs::read_to_string(path).map_err(|e| GraphStoreError::store(e.to_string()))?;
        let persisted: PersistedIndex =
            serde_json::from_str(&encoded).map_err(|e| GraphStoreError::store(e.to_string()))?;
        self.entries = persisted.entries.into_iter().collect();
        Ok(())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 { 0.0 } else { dot / denom }
}

/// Feeds every vector row of a graph into the index, replacing entries with
/// the same guid. Used when rebuilding an index file from stored rows.
pub fn rebuild_vector_index<I: VectorIndex>(
    store: &GraphStore,
    tenant: Uuid,
    graph: Uuid,
    index: &mut I,
) -> Result<usize, GraphStoreError> {
    let rows: Vec<crate::model::Vector> = store.read_many(&ReadQuery::graph(tenant, graph))?;
    let entries: Vec<(Uuid, Vec<f32>)> = rows
        .into_iter()
        .map(|row| (row.guid, row.embedding))
        .collect();
    index.add_batch(&entries)?;
    Ok(entries.len())
}
