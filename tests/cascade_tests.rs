use chrono::Utc;
use serde_json::json;
use tenantgraph::{
    Attachment, CancelToken, Credential, DeleteTarget, Edge, Graph, GraphStore, GraphStoreError,
    Label, Node, ReadQuery, Tag, TagPair, Tenant, User, Vector,
};
use uuid::Uuid;

struct Fixture {
    store: GraphStore,
    tenant: Uuid,
    graph: Uuid,
    a: Uuid,
    b: Uuid,
    c: Uuid,
}

fn tenant_row(name: &str) -> Tenant {
    Tenant {
        guid: Uuid::nil(),
        name: name.to_string(),
        active: true,
        created_utc: Utc::now(),
        last_update_utc: Utc::now(),
    }
}

fn graph_row(tenant: Uuid, name: &str) -> Graph {
    Graph {
        guid: Uuid::nil(),
        tenant_guid: tenant,
        name: name.to_string(),
        data: json!({}),
        vector_index: None,
        labels: Vec::new(),
        tags: Vec::new(),
        vectors: Vec::new(),
        created_utc: Utc::now(),
        last_update_utc: Utc::now(),
    }
}

fn node_row(tenant: Uuid, graph: Uuid, name: &str) -> Node {
    Node {
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
    }
}

fn edge_row(tenant: Uuid, graph: Uuid, from: Uuid, to: Uuid, cost: f64) -> Edge {
    Edge {
        guid: Uuid::nil(),
        tenant_guid: tenant,
        graph_guid: graph,
        from_guid: from,
        to_guid: to,
        cost,
        data: json!({}),
        labels: Vec::new(),
        tags: Vec::new(),
        vectors: Vec::new(),
        created_utc: Utc::now(),
        last_update_utc: Utc::now(),
    }
}

/// Tenant with one graph, nodes A, B, C, edges A->B (cost 1) and B->C
/// (cost 2), and the label "person" on A.
fn fixture() -> Fixture {
    let store = GraphStore::open_in_memory().expect("store");
    let cancel = CancelToken::new();
    let tenant = store.create(&tenant_row("acme"), &cancel).expect("tenant");
    let graph = store
        .create(&graph_row(tenant.guid, "people"), &cancel)
        .expect("graph");
    let mut a = node_row(tenant.guid, graph.guid, "A");
    a.labels.push("person".to_string());
    let a = store.create(&a, &cancel).expect("node A");
    let b = store
        .create(&node_row(tenant.guid, graph.guid, "B"), &cancel)
        .expect("node B");
    let c = store
        .create(&node_row(tenant.guid, graph.guid, "C"), &cancel)
        .expect("node C");
    store
        .create(&edge_row(tenant.guid, graph.guid, a.guid, b.guid, 1.0), &cancel)
        .expect("edge A->B");
    store
        .create(&edge_row(tenant.guid, graph.guid, b.guid, c.guid, 2.0), &cancel)
        .expect("edge B->C");
    Fixture {
        store,
        tenant: tenant.guid,
        graph: graph.guid,
        a: a.guid,
        b: b.guid,
        c: c.guid,
    }
}

#[test]
fn test_label_filter_selects_only_labeled_node() {
    let fx = fixture();
    let mut query = ReadQuery::graph(fx.tenant, fx.graph);
    query.labels.push("person".to_string());
    let found: Vec<Node> = fx.store.read_many(&query).expect("labeled nodes");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].guid, fx.a);
}

#[test]
fn test_node_delete_removes_incident_edges_and_metadata() {
    let fx = fixture();
    let cancel = CancelToken::new();

    // B carries a tag so its metadata removal is observable.
    let mut b: Node = fx.store.read(Some(fx.tenant), fx.b).expect("read B");
    b.tags.push(TagPair::new("team", Some("core".to_string())));
    fx.store.update(&b, &cancel).expect("tag B");

    fx.store
        .delete(fx.tenant, DeleteTarget::Nodes(vec![fx.b]), &cancel)
        .expect("delete B");

    let nodes: Vec<Node> = fx
        .store
        .read_many(&ReadQuery::graph(fx.tenant, fx.graph))
        .expect("nodes");
    let mut remaining: Vec<Uuid> = nodes.iter().map(|n| n.guid).collect();
    remaining.sort();
    let mut expected = vec![fx.a, fx.c];
    expected.sort();
    assert_eq!(remaining, expected);

    // Both edges touched B, so none survive.
    let edges: Vec<Edge> = fx
        .store
        .read_many(&ReadQuery::graph(fx.tenant, fx.graph))
        .expect("edges");
    assert!(edges.is_empty());

    // No tag row names B anymore.
    let tags: Vec<Tag> = fx
        .store
        .read_many(&ReadQuery::graph(fx.tenant, fx.graph))
        .expect("tags");
    assert!(tags.iter().all(|t| t.attachment.node_guid() != Some(fx.b)));

    let stats = fx.store.statistics(fx.tenant, Some(fx.graph)).expect("stats");
    assert_eq!(stats.nodes, 2);
    assert_eq!(stats.edges, 0);
    assert_eq!(stats.tags, 0);
    assert_eq!(stats.labels, 1);
}

#[test]
fn test_batch_node_delete_is_permutation_independent() {
    let fx1 = fixture();
    let fx2 = fixture();
    let cancel = CancelToken::new();
    fx1.store
        .delete(fx1.tenant, DeleteTarget::Nodes(vec![fx1.b, fx1.a, fx1.b]), &cancel)
        .expect("delete batch");
    fx2.store
        .delete(fx2.tenant, DeleteTarget::Nodes(vec![fx2.a, fx2.b]), &cancel)
        .expect("delete batch");
    for fx in [&fx1, &fx2] {
        let stats = fx.store.statistics(fx.tenant, Some(fx.graph)).expect("stats");
        assert_eq!(stats.nodes, 1);
        assert_eq!(stats.edges, 0);
        assert_eq!(stats.labels, 0);
    }
    let survivors: Vec<Node> = fx1
        .store
        .read_many(&ReadQuery::graph(fx1.tenant, fx1.graph))
        .expect("nodes");
    assert_eq!(survivors[0].guid, fx1.c);
}

#[test]
fn test_graph_delete_removes_everything_under_it() {
    let fx = fixture();
    let cancel = CancelToken::new();
    let other = fx
        .store
        .create(&graph_row(fx.tenant, "untouched"), &cancel)
        .expect("other graph");
    let keeper = fx
        .store
        .create(&node_row(fx.tenant, other.guid, "keeper"), &cancel)
        .expect("keeper");

    fx.store
        .delete(fx.tenant, DeleteTarget::Graph(fx.graph), &cancel)
        .expect("delete graph");

    assert!(!fx.store.exists::<Graph>(Some(fx.tenant), fx.graph).expect("exists"));
    for guid in [fx.a, fx.b, fx.c] {
        assert!(!fx.store.exists::<Node>(Some(fx.tenant), guid).expect("exists"));
    }
    let stats = fx.store.statistics(fx.tenant, Some(fx.graph)).expect("stats");
    assert_eq!(stats.nodes, 0);
    assert_eq!(stats.edges, 0);
    assert_eq!(stats.labels, 0);

    // The sibling graph is untouched.
    assert!(fx.store.exists::<Node>(Some(fx.tenant), keeper.guid).expect("exists"));
}

#[test]
fn test_edge_delete_leaves_endpoints() {
    let fx = fixture();
    let cancel = CancelToken::new();
    let edges: Vec<Edge> = fx
        .store
        .read_many(&ReadQuery::graph(fx.tenant, fx.graph))
        .expect("edges");
    let ab = edges.iter().find(|e| e.cost == 1.0).expect("A->B");
    fx.store
        .delete(fx.tenant, DeleteTarget::Edges(vec![ab.guid]), &cancel)
        .expect("delete edge");
    let stats = fx.store.statistics(fx.tenant, Some(fx.graph)).expect("stats");
    assert_eq!(stats.edges, 1);
    assert_eq!(stats.nodes, 3);
}

#[test]
fn test_tenant_delete_clears_all_tables() {
    let fx = fixture();
    let cancel = CancelToken::new();
    let user = fx
        .store
        .create(
            &User {
                guid: Uuid::nil(),
                tenant_guid: fx.tenant,
                email: "ops@acme.test".to_string(),
                password: "hunter2".to_string(),
                active: true,
                created_utc: Utc::now(),
                last_update_utc: Utc::now(),
            },
            &cancel,
        )
        .expect("user");
    fx.store
        .create(
            &Credential {
                guid: Uuid::nil(),
                tenant_guid: fx.tenant,
                user_guid: user.guid,
                bearer_token: "token-1".to_string(),
                active: true,
                created_utc: Utc::now(),
                last_update_utc: Utc::now(),
            },
            &cancel,
        )
        .expect("credential");

    fx.store
        .delete(fx.tenant, DeleteTarget::Tenant(fx.tenant), &cancel)
        .expect("delete tenant");

    assert!(!fx.store.exists::<Tenant>(None, fx.tenant).expect("exists"));
    assert!(!fx.store.exists::<User>(Some(fx.tenant), user.guid).expect("exists"));
    let nodes: Vec<Node> = fx
        .store
        .read_many(&ReadQuery::tenant(fx.tenant))
        .expect("nodes");
    assert!(nodes.is_empty());
    let labels: Vec<Label> = fx
        .store
        .read_many(&ReadQuery::tenant(fx.tenant))
        .expect("labels");
    assert!(labels.is_empty());
}

#[test]
fn test_tenant_target_must_match_scope() {
    let fx = fixture();
    let cancel = CancelToken::new();
    let err = fx
        .store
        .delete(fx.tenant, DeleteTarget::Tenant(Uuid::new_v4()), &cancel)
        .expect_err("mismatched tenant target");
    assert!(matches!(err, GraphStoreError::Validation { .. }));
}

#[test]
fn test_user_delete_removes_credentials() {
    let store = GraphStore::open_in_memory().expect("store");
    let cancel = CancelToken::new();
    let tenant = store.create(&tenant_row("acme"), &cancel).expect("tenant");
    let user = store
        .create(
            &User {
                guid: Uuid::nil(),
                tenant_guid: tenant.guid,
                email: "dev@acme.test".to_string(),
                password: "hunter2".to_string(),
                active: true,
                created_utc: Utc::now(),
                last_update_utc: Utc::now(),
            },
            &cancel,
        )
        .expect("user");
    let credential = store
        .create(
            &Credential {
                guid: Uuid::nil(),
                tenant_guid: tenant.guid,
                user_guid: user.guid,
                bearer_token: "token-2".to_string(),
                active: true,
                created_utc: Utc::now(),
                last_update_utc: Utc::now(),
            },
            &cancel,
        )
        .expect("credential");

    store
        .delete(tenant.guid, DeleteTarget::User(user.guid), &cancel)
        .expect("delete user");
    assert!(!store.exists::<User>(Some(tenant.guid), user.guid).expect("exists"));
    assert!(
        !store
            .exists::<Credential>(Some(tenant.guid), credential.guid)
            .expect("exists")
    );
}

#[test]
fn test_metadata_row_delete_is_shallow() {
    let fx = fixture();
    let cancel = CancelToken::new();
    let labels: Vec<Label> = fx
        .store
        .read_many(&ReadQuery::graph(fx.tenant, fx.graph))
        .expect("labels");
    assert_eq!(labels.len(), 1);
    assert_eq!(labels[0].attachment, Attachment::Node(fx.a));
    fx.store
        .delete(fx.tenant, DeleteTarget::Labels(vec![labels[0].guid]), &cancel)
        .expect("delete label");
    // The node the label sat on survives.
    assert!(fx.store.exists::<Node>(Some(fx.tenant), fx.a).expect("exists"));
    let stats = fx.store.statistics(fx.tenant, Some(fx.graph)).expect("stats");
    assert_eq!(stats.labels, 0);
    assert_eq!(stats.nodes, 3);
}

#[test]
fn test_delete_unknown_row_reports_not_found() {
    let fx = fixture();
    let cancel = CancelToken::new();
    let err = fx
        .store
        .delete(fx.tenant, DeleteTarget::Nodes(vec![Uuid::new_v4()]), &cancel)
        .expect_err("unknown node");
    assert!(matches!(err, GraphStoreError::NotFound { .. }));
    // Nothing was removed.
    let stats = fx.store.statistics(fx.tenant, Some(fx.graph)).expect("stats");
    assert_eq!(stats.nodes, 3);
    assert_eq!(stats.edges, 2);
}

#[test]
fn test_empty_batch_rejected() {
    let fx = fixture();
    let cancel = CancelToken::new();
    let err = fx
        .store
        .delete(fx.tenant, DeleteTarget::Nodes(Vec::new()), &cancel)
        .expect_err("empty batch");
    assert!(matches!(err, GraphStoreError::Validation { .. }));
}

#[test]
fn test_vector_row_delete_is_shallow() {
    let fx = fixture();
    let cancel = CancelToken::new();
    let mut c: Node = fx.store.read(Some(fx.tenant), fx.c).expect("read C");
    c.vectors.push(tenantgraph::Embedding {
        model: "test-embed".to_string(),
        dimensionality: 3,
        content: "C".to_string(),
        vector: vec![0.1, 0.2, 0.3],
    });
    fx.store.update(&c, &cancel).expect("vector on C");
    let vectors: Vec<Vector> = fx
        .store
        .read_many(&ReadQuery::graph(fx.tenant, fx.graph))
        .expect("vectors");
    assert_eq!(vectors.len(), 1);
    fx.store
        .delete(fx.tenant, DeleteTarget::Vectors(vec![vectors[0].guid]), &cancel)
        .expect("delete vector");
    assert!(fx.store.exists::<Node>(Some(fx.tenant), fx.c).expect("exists"));
    let stats = fx.store.statistics(fx.tenant, Some(fx.graph)).expect("stats");
    assert_eq!(stats.vectors, 0);
}
