use std::collections::HashSet;

use chrono::Utc;
use serde_json::json;
use tenantgraph::{
    CancelToken, EnumerationRequest, Graph, GraphStore, GraphStoreError, Node, Ordering, ReadQuery,
    Tenant,
};
use uuid::Uuid;

fn prepared(node_count: usize) -> (GraphStore, Uuid, Uuid, Vec<Uuid>) {
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
    let mut guids = Vec::with_capacity(node_count);
    for i in 0..node_count {
        let node = store
            .create(
                &Node {
                    guid: Uuid::nil(),
                    tenant_guid: tenant.guid,
                    graph_guid: graph.guid,
                    name: format!("node-{i:03}"),
                    data: json!({ "i": i }),
                    labels: Vec::new(),
                    tags: Vec::new(),
                    vectors: Vec::new(),
                    created_utc: Utc::now(),
                    last_update_utc: Utc::now(),
                },
                &cancel,
            )
            .expect("node");
        guids.push(node.guid);
    }
    (store, tenant.guid, graph.guid, guids)
}

#[test]
fn test_offset_pages_cover_every_row_exactly_once() {
    let (store, tenant, graph, inserted) = prepared(23);
    let page_size = 5u64;
    let mut seen = HashSet::new();
    let mut pages = 0usize;
    let mut skip = 0u64;
    loop {
        let mut query = ReadQuery::graph(tenant, graph);
        query.ordering = Ordering::NameAscending;
        query.max_results = Some(page_size);
        query.skip = Some(skip);
        let page: Vec<Node> = store.read_many(&query).expect("page");
        if page.is_empty() {
            break;
        }
        pages += 1;
        assert!(page.len() as u64 <= page_size);
        for node in &page {
            assert!(seen.insert(node.guid), "row served twice: {}", node.guid);
        }
        skip += page_size;
    }
    assert_eq!(pages, 5); // ceil(23 / 5)
    assert_eq!(seen, inserted.into_iter().collect::<HashSet<_>>());
}

#[test]
fn test_keyset_enumeration_invariants_hold_across_pages() {
    let (store, tenant, graph, inserted) = prepared(17);
    let page_size = 4u64;
    let mut request = EnumerationRequest {
        tenant_guid: Some(tenant),
        graph_guid: Some(graph),
        max_results: page_size,
        continuation_token: None,
        ordering: Ordering::NameAscending,
    };

    let mut seen = HashSet::new();
    let mut served = 0u64;
    let mut pages = 0usize;
    loop {
        let result = store.enumerate::<Node>(&request).expect("page");
        pages += 1;
        assert!(result.success);
        assert_eq!(result.total_records, 17);
        served += result.objects.len() as u64;
        assert_eq!(result.records_remaining, 17 - served);
        for node in &result.objects {
            assert!(seen.insert(node.guid), "row served twice: {}", node.guid);
        }
        if result.end_of_results {
            assert!(result.continuation_token.is_none());
            break;
        }
        let token = result
            .continuation_token
            .expect("non-final page carries a token");
        assert_eq!(token, result.objects.last().expect("rows").guid);
        request.continuation_token = Some(token);
    }
    assert_eq!(pages, 5); // ceil(17 / 4)
    assert_eq!(seen, inserted.into_iter().collect::<HashSet<_>>());
}

#[test]
fn test_keyset_pages_are_ordered_and_tie_safe() {
    let (store, tenant, graph, _) = prepared(0);
    let cancel = CancelToken::new();
    // Identical names force the guid tiebreak to carry the ordering.
    for _ in 0..9 {
        store
            .create(
                &Node {
                    guid: Uuid::nil(),
                    tenant_guid: tenant,
                    graph_guid: graph,
                    name: "same".to_string(),
                    data: json!({}),
                    labels: Vec::new(),
                    tags: Vec::new(),
                    vectors: Vec::new(),
                    created_utc: Utc::now(),
                    last_update_utc: Utc::now(),
                },
                &cancel,
            )
            .expect("node");
    }
    let mut request = EnumerationRequest {
        tenant_guid: Some(tenant),
        graph_guid: Some(graph),
        max_results: 2,
        continuation_token: None,
        ordering: Ordering::NameAscending,
    };
    let mut collected: Vec<Uuid> = Vec::new();
    loop {
        let result = store.enumerate::<Node>(&request).expect("page");
        collected.extend(result.objects.iter().map(|n| n.guid));
        match result.continuation_token {
            Some(token) => request.continuation_token = Some(token),
            None => break,
        }
    }
    assert_eq!(collected.len(), 9);
    let mut sorted = collected.clone();
    sorted.sort();
    assert_eq!(collected, sorted, "guid tiebreak must order equal names");
}

fn insert_node(store: &GraphStore, tenant: Uuid, graph: Uuid, name: &str) -> Uuid {
    store
        .create(
            &Node {
                guid: Uuid::nil(),
                tenant_guid: tenant,
                graph_guid: graph,
                name: name.to_string(),
                data: json!({}),
                labels: Vec::new(),
                tags: Vec::new(),
                vectors: Vec::new(),
                created_utc: Utc::now(),
                last_update_utc: Utc::now(),
            },
            &CancelToken::new(),
        )
        .expect("node")
        .guid
}

#[test]
fn test_rows_inserted_mid_enumeration_follow_marker_position() {
    let (store, tenant, graph, _) = prepared(0);
    for i in 0..10 {
        insert_node(&store, tenant, graph, &format!("m-{i:02}"));
    }
    let mut request = EnumerationRequest {
        tenant_guid: Some(tenant),
        graph_guid: Some(graph),
        max_results: 4,
        continuation_token: None,
        ordering: Ordering::NameAscending,
    };
    let first = store.enumerate::<Node>(&request).expect("first page");
    assert_eq!(first.objects.len(), 4);
    let first_guids: HashSet<Uuid> = first.objects.iter().map(|n| n.guid).collect();
    let token = first.continuation_token.expect("token");

    // Writers land one row before the marker and one after it.
    let early = insert_node(&store, tenant, graph, "a-early");
    let late = insert_node(&store, tenant, graph, "z-late");

    request.continuation_token = Some(token);
    let mut rest: Vec<Uuid> = Vec::new();
    loop {
        let page = store.enumerate::<Node>(&request).expect("page");
        rest.extend(page.objects.iter().map(|n| n.guid));
        match page.continuation_token {
            Some(token) => request.continuation_token = Some(token),
            None => break,
        }
    }

    // Already-served rows are never repeated.
    assert!(rest.iter().all(|guid| !first_guids.contains(guid)));
    // The row sorting before the marker stays invisible; the one after shows up.
    assert!(!rest.contains(&early));
    assert!(rest.contains(&late));
    // Nothing that was past the marker at token time got lost: m-04..m-09
    // plus the late insert, each exactly once.
    assert_eq!(rest.len(), 7);
    let unique: HashSet<Uuid> = rest.iter().copied().collect();
    assert_eq!(unique.len(), rest.len());
}

#[test]
fn test_descending_ordering_reverses_pages() {
    let (store, tenant, graph, _) = prepared(6);
    let request = EnumerationRequest {
        tenant_guid: Some(tenant),
        graph_guid: Some(graph),
        max_results: 10,
        continuation_token: None,
        ordering: Ordering::NameDescending,
    };
    let result = store.enumerate::<Node>(&request).expect("page");
    let names: Vec<&str> = result.objects.iter().map(|n| n.name.as_str()).collect();
    let mut reversed = names.clone();
    reversed.sort();
    reversed.reverse();
    assert_eq!(names, reversed);
}

#[test]
fn test_connectivity_ordering_serves_first_page_only() {
    let (store, tenant, graph, guids) = prepared(3);
    let mut request = EnumerationRequest {
        tenant_guid: Some(tenant),
        graph_guid: Some(graph),
        max_results: 2,
        continuation_token: None,
        ordering: Ordering::MostConnected,
    };
    let first = store.enumerate::<Node>(&request).expect("first page");
    assert_eq!(first.objects.len(), 2);
    assert!(!first.end_of_results);
    assert_eq!(first.records_remaining, 1);
    // A non-resumable ordering never hands out a token.
    assert!(first.continuation_token.is_none());

    request.continuation_token = Some(guids[0]);
    let err = store
        .enumerate::<Node>(&request)
        .expect_err("token resume under connectivity ordering");
    assert!(matches!(err, GraphStoreError::Unsupported { .. }));
}

#[test]
fn test_unsupported_ordering_for_entity_rejected() {
    let (store, tenant, graph, _) = prepared(1);
    let request = EnumerationRequest {
        tenant_guid: Some(tenant),
        graph_guid: Some(graph),
        max_results: 5,
        continuation_token: None,
        ordering: Ordering::CostAscending,
    };
    let err = store
        .enumerate::<Node>(&request)
        .expect_err("cost ordering on nodes");
    assert!(matches!(err, GraphStoreError::Unsupported { .. }));
}

#[test]
fn test_stale_token_reports_not_found() {
    let (store, tenant, graph, _) = prepared(3);
    let request = EnumerationRequest {
        tenant_guid: Some(tenant),
        graph_guid: Some(graph),
        max_results: 2,
        continuation_token: Some(Uuid::new_v4()),
        ordering: Ordering::NameAscending,
    };
    let err = store
        .enumerate::<Node>(&request)
        .expect_err("unknown token");
    assert!(matches!(err, GraphStoreError::NotFound { .. }));
}

#[test]
fn test_zero_page_size_rejected() {
    let (store, tenant, graph, _) = prepared(1);
    let request = EnumerationRequest {
        tenant_guid: Some(tenant),
        graph_guid: Some(graph),
        max_results: 0,
        continuation_token: None,
        ordering: Ordering::NameAscending,
    };
    let err = store.enumerate::<Node>(&request).expect_err("zero page");
    assert!(matches!(err, GraphStoreError::Validation { .. }));
}

#[test]
fn test_empty_scope_yields_empty_final_page() {
    let (store, tenant, graph, _) = prepared(0);
    let request = EnumerationRequest {
        tenant_guid: Some(tenant),
        graph_guid: Some(graph),
        max_results: 10,
        continuation_token: None,
        ordering: Ordering::default(),
    };
    let result = store.enumerate::<Node>(&request).expect("page");
    assert!(result.objects.is_empty());
    assert_eq!(result.total_records, 0);
    assert_eq!(result.records_remaining, 0);
    assert!(result.end_of_results);
    assert!(result.continuation_token.is_none());
}
