//! End-to-end scenarios against the public library surface.

use std::fs;
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::tempdir;

use clientcore_lib::api::{dispatch, ApiRequest, Method};
use clientcore_lib::entity::EntityKind;
use clientcore_lib::error::CrmError;
use clientcore_lib::pipeline::PipelineBoard;
use clientcore_lib::repository::Repository;
use clientcore_lib::services::dashboard::{load_dashboard, DashboardWatcher};
use clientcore_lib::services::proposals;
use clientcore_lib::state::{AppState, Config, StorageBackend};
use clientcore_lib::store::{Collection, FileStore, SqliteStore, Storage};
use clientcore_lib::types::{Client, Proposal, ProposalStatus};

#[test]
fn revenue_totals_across_clients() {
    let storage = Storage::in_memory();
    let repo = Repository::<Client>::new(&storage);
    repo.create(json!({"name": "Acme", "totalRevenue": 1000}))
        .expect("create acme");
    repo.create(json!({"name": "Beta", "totalRevenue": 2000}))
        .expect("create beta");

    let stats = load_dashboard(&storage, 4);
    assert_eq!(stats.total_revenue, 3000.0);
    assert_eq!(stats.total_clients, 2);
    assert_eq!(load_dashboard(&storage, 4), stats);
}

#[test]
fn proposal_moves_from_lead_to_approved() {
    let storage = Storage::in_memory();
    let created = Repository::<Proposal>::new(&storage)
        .create(json!({"title": "Warehouse fit-out", "client": "Acme", "totalValue": 12000}))
        .expect("create");
    assert_eq!(created.status, ProposalStatus::Lead);
    assert!(!created.signed);

    proposals::change_status(&storage, &created.id, ProposalStatus::Approved).expect("approve");

    let board = proposals::board(&storage, None);
    assert!(board.lead.is_empty());
    let approved = &board.approved[0];
    assert_eq!(approved.id, created.id);
    assert!(approved.signed);
    assert!(approved.signed_at.is_some());
}

#[test]
fn generic_update_to_approved_also_signs() {
    let storage = Storage::in_memory();
    let repo = Repository::<Proposal>::new(&storage);
    let created = repo
        .create(json!({"title": "Office move", "client": "Beta"}))
        .expect("create");
    let updated = repo
        .update(&created.id, json!({"status": "approved"}))
        .expect("update")
        .expect("present");
    assert!(updated.signed);
    assert!(updated.signed_at.is_some());
}

#[test]
fn search_narrows_board_to_one_proposal() {
    let storage = Storage::in_memory();
    let repo = Repository::<Proposal>::new(&storage);
    repo.create(json!({"title": "Roof", "client": "Northwind"}))
        .expect("create");
    let wanted = repo
        .create(json!({"title": "Deck", "client": "Contoso Ltd", "status": "hold"}))
        .expect("create");
    repo.create(json!({"title": "Fence", "client": "Fabrikam"}))
        .expect("create");

    let board = proposals::board(&storage, Some("CONTOSO"));
    assert_eq!(board.total(), 1);
    assert_eq!(board.hold[0].id, wanted.id);
}

#[test]
fn rejected_proposals_leave_the_board() {
    let storage = Storage::in_memory();
    let repo = Repository::<Proposal>::new(&storage);
    let statuses = ["lead", "rejected", "bidding", "lead", "approved"];
    for (i, status) in statuses.iter().enumerate() {
        repo.create(json!({"title": format!("Job {}", i), "client": "Acme", "status": status}))
            .expect("create");
    }
    let all = repo.list();
    let board = PipelineBoard::build(&all);
    assert_eq!(board.total(), 4);
    assert_eq!(board.lead.len(), 2);
    assert_eq!(board.lead[0].title, "Job 0");
    assert_eq!(board.lead[1].title, "Job 3");
    assert!(board.column(ProposalStatus::Rejected).is_none());
}

#[test]
fn unknown_id_update_changes_nothing() {
    let storage = Storage::in_memory();
    let repo = Repository::<Client>::new(&storage);
    let acme = repo.create(json!({"name": "Acme"})).expect("create");
    let before = repo.list();

    assert!(repo
        .update("does-not-exist", json!({"name": "Ghost"}))
        .expect("update")
        .is_none());
    assert_eq!(repo.list(), before);

    let err = proposals::change_status(&storage, "missing", ProposalStatus::Hold)
        .expect_err("not found");
    assert!(matches!(err, CrmError::NotFound { entity: EntityKind::Proposal, .. }));
    assert_eq!(repo.get(&acme.id).map(|c| c.name), Some("Acme".to_string()));
}

#[test]
fn corrupt_file_collection_loads_empty_and_partial_keeps_good_records() {
    let dir = tempdir().expect("tempdir");
    let storage = Storage::new(Arc::new(FileStore::open(dir.path()).expect("open")));

    fs::write(dir.path().join("clientcore_clients.json"), "{ not json").expect("write");
    assert!(Repository::<Client>::new(&storage).list().is_empty());

    fs::write(
        dir.path().join("clientcore_clients.json"),
        r#"[{"id": "1", "name": "Acme"}, {"id": "2", "totalRevenue": {"oops": true}}, {"id": "3", "name": "Beta"}]"#,
    )
    .expect("write");
    let names: Vec<String> = Repository::<Client>::new(&storage)
        .list()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["Acme", "Beta"]);
}

#[test]
fn sqlite_store_survives_reopen() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("clientcore.db");
    let id = {
        let storage = Storage::new(Arc::new(SqliteStore::open_at(path.clone()).expect("open")));
        Repository::<Client>::new(&storage)
            .create(json!({"name": "Persisted Co"}))
            .expect("create")
            .id
    };
    let storage = Storage::new(Arc::new(SqliteStore::open_at(path).expect("reopen")));
    let client = Repository::<Client>::new(&storage).get(&id).expect("present");
    assert_eq!(client.name, "Persisted Co");
}

#[test]
fn watcher_follows_client_writes_only() {
    let storage = Storage::in_memory();
    let mut watcher = DashboardWatcher::new(&storage, 4);

    clientcore_lib::services::profile::update_notifications(&storage, json!({"sms": true}))
        .expect("prefs");
    assert!(!watcher.refresh());

    Repository::<Client>::new(&storage)
        .create(json!({"name": "Acme", "totalRevenue": 500}))
        .expect("create");
    assert!(watcher.refresh());
    assert_eq!(watcher.current().total_revenue, 500.0);
}

#[test]
fn rest_flow_over_file_backend() {
    let dir = tempdir().expect("tempdir");
    let state = AppState::from_config(Config {
        storage: StorageBackend::File,
        data_dir: Some(dir.path().to_string_lossy().into_owned()),
        seed_defaults: true,
        ..Config::default()
    })
    .expect("state");

    let list = dispatch(&state, &ApiRequest::new(Method::Get, "/api/tasks?status=Pending"));
    assert_eq!(list.status, 200);
    assert_eq!(list.body["pagination"]["total"], 1);
    assert_eq!(list.body["data"][0]["title"], "API Integration");

    let created = dispatch(
        &state,
        &ApiRequest::new(Method::Post, "/api/clients")
            .with_body(json!({"name": "Gamma", "email": "Team@Gamma.test", "totalRevenue": 5000})),
    );
    assert_eq!(created.status, 201);
    assert_eq!(created.body["data"]["email"], "team@gamma.test");

    let overview = dispatch(&state, &ApiRequest::new(Method::Get, "/api/clients/stats/overview"));
    assert_eq!(overview.body["data"]["overview"]["totalClients"], 3);
    assert_eq!(overview.body["data"]["overview"]["totalRevenue"], 105000.0);

    let stored: Vec<Value> = serde_json::from_str(
        &fs::read_to_string(dir.path().join("collections").join("clientcore_clients.json"))
            .expect("read"),
    )
    .expect("parse");
    assert_eq!(stored.len(), 3);
    assert!(state.storage.contains(Collection::Employees).expect("contains"));
}
