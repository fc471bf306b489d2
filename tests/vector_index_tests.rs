use chrono::Utc;
use serde_json::json;
use tenantgraph::{
    BruteForceIndex, CancelToken, Embedding, Graph, GraphStore, Node, Tenant, VectorIndex,
    rebuild_vector_index,
};
use uuid::Uuid;

#[test]
fn test_search_ranks_by_cosine_similarity() {
    let mut index = BruteForceIndex::new();
    let aligned = Uuid::new_v4();
    let orthogonal = Uuid::new_v4();
    let opposite = Uuid::new_v4();
    index.add(aligned, &[1.0, 0.0]).expect("add");
    index.add(orthogonal, &[0.0, 1.0]).expect("add");
    index.add(opposite, &[-1.0, 0.0]).expect("add");

    let results = index.search(&[1.0, 0.0], 3, None).expect("search");
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].0, aligned);
    assert!((results[0].1 - 1.0).abs() < 1e-6);
    assert_eq!(results[2].0, opposite);
    assert!((results[2].1 + 1.0).abs() < 1e-6);
}

#[test]
fn test_search_truncates_to_k_and_skips_mismatched_dimensions() {
    let mut index = BruteForceIndex::new();
    for i in 0..5 {
        index
            .add(Uuid::new_v4(), &[1.0, i as f32 / 10.0])
            .expect("add");
    }
    index.add(Uuid::new_v4(), &[1.0, 0.0, 0.0]).expect("add 3d");
    let results = index.search(&[1.0, 0.0], 2, None).expect("search");
    assert_eq!(results.len(), 2);
}

#[test]
fn test_update_replaces_existing_entry() {
    let mut index = BruteForceIndex::new();
    let guid = Uuid::new_v4();
    index.add(guid, &[1.0, 0.0]).expect("add");
    index.update(guid, &[0.0, 1.0]).expect("update");
    assert_eq!(index.len(), 1);
    let results = index.search(&[0.0, 1.0], 1, None).expect("search");
    assert_eq!(results[0].0, guid);
    assert!((results[0].1 - 1.0).abs() < 1e-6);
}

#[test]
fn test_remove_batch_empties_index() {
    let mut index = BruteForceIndex::new();
    let guids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    let entries: Vec<(Uuid, Vec<f32>)> =
        guids.iter().map(|g| (*g, vec![1.0, 2.0])).collect();
    index.add_batch(&entries).expect("add batch");
    assert_eq!(index.len(), 4);
    index.remove_batch(&guids).expect("remove batch");
    assert!(index.is_empty());
}

#[test]
fn test_persist_and_load_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("index.json");
    let mut index = BruteForceIndex::new();
    let guid = Uuid::new_v4();
    index.add(guid, &[0.5, 0.5, 0.7]).expect("add");
    index.persist(&path).expect("persist");

    let mut restored = BruteForceIndex::new();
    restored.load(&path).expect("load");
    assert_eq!(restored.len(), 1);
    let results = restored.search(&[0.5, 0.5, 0.7], 1, None).expect("search");
    assert_eq!(results[0].0, guid);
}

#[test]
fn test_rebuild_feeds_stored_vectors() {
    let store = GraphStore::open_in_memory().expect("store");
    let cancel = CancelToken::new();
    let tenant = store
        .create(
            &Tenant {
                guid: Uuid::nil(),
                name: "acme".to_string(),
                active: true,
                created_utc: Utc::now(),
                last_update_utc: Utc::now(),
            },
            &cancel,
        )
        .expect("tenant");
    let graph = store
        .create(
            &Graph {
                guid: Uuid::nil(),
                tenant_guid: tenant.guid,
                name: "main".to_string(),
                data: json!({}),
                vector_index: None,
                labels: Vec::new(),
                tags: Vec::new(),
                vectors: Vec::new(),
                created_utc: Utc::now(),
                last_update_utc: Utc::now(),
            },
            &cancel,
        )
        .expect("graph");
    for (name, vector) in [("east", vec![1.0, 0.0]), ("north", vec![0.0, 1.0])] {
        store
            .create(
                &Node {
                    guid: Uuid::nil(),
                    tenant_guid: tenant.guid,
                    graph_guid: graph.guid,
                    name: name.to_string(),
                    data: json!({}),
                    labels: Vec::new(),
                    tags: Vec::new(),
                    vectors: vec![Embedding {
                        model: "toy".to_string(),
                        dimensionality: 2,
                        content: name.to_string(),
                        vector,
                    }],
                    created_utc: Utc::now(),
                    last_update_utc: Utc::now(),
                },
                &cancel,
            )
            .expect("node");
    }

    let mut index = BruteForceIndex::new();
    let loaded = rebuild_vector_index(&store, tenant.guid, graph.guid, &mut index)
        .expect("rebuild");
    assert_eq!(loaded, 2);
    assert_eq!(index.len(), 2);

    let results = index.search(&[0.9, 0.1], 1, None).expect("search");
    assert_eq!(results.len(), 1);
    // Best match is the vector row carrying the eastward embedding.
    let rows: Vec<tenantgraph::Vector> = store
        .read_many(&tenantgraph::ReadQuery::graph(tenant.guid, graph.guid))
        .expect("vector rows");
    let east = rows.iter().find(|v| v.content == "east").expect("east row");
    assert_eq!(results[0].0, east.guid);
}

#[test]
fn test_rebuild_of_empty_graph_is_a_no_op() {
    let store = GraphStore::open_in_memory().expect("store");
    let cancel = CancelToken::new();
    let tenant = store
        .create(
            &Tenant {
                guid: Uuid::nil(),
                name: "acme".to_string(),
                active: true,
                created_utc: Utc::now(),
                last_update_utc: Utc::now(),
            },
            &cancel,
        )
        .expect("tenant");
    let graph = store
        .create(
            &Graph {
                guid: Uuid::nil(),
                tenant_guid: tenant.guid,
                name: "empty".to_string(),
                data: json!({}),
                vector_index: None,
                labels: Vec::new(),
                tags: Vec::new(),
                vectors: Vec::new(),
                created_utc: Utc::now(),
                last_update_utc: Utc::now(),
            },
            &cancel,
        )
        .expect("graph");
    let mut index = BruteForceIndex::new();
    let loaded =
        rebuild_vector_index(&store, tenant.guid, graph.guid, &mut index).expect("rebuild");
    assert_eq!(loaded, 0);
    assert!(index.is_empty());
}
