// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Repository synchronization against a mock HTTP server.

use std::sync::Arc;
use std::time::Duration;

use hangar_core::RepositoryState;
use hangar_plugin::PluginRepository;
use hangar_plugin::repository::build_client;
use hangar_test_utils::{catalog_json, remote_manifest};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve(server: &MockServer, body: String) {
    Mock::given(method("GET"))
        .and(path("/pluginmaster.json"))
        .and(header("accept", "application/json"))
        .and(header("cache-control", "no-cache"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn main_repo(server: &MockServer) -> PluginRepository {
    let url = format!("{}/pluginmaster.json", server.uri());
    PluginRepository::new(build_client().unwrap(), url.clone(), &url, true)
}

#[tokio::test]
async fn manifest_without_internal_name_is_dropped_from_a_successful_batch() {
    let server = MockServer::start().await;
    let nameless = json!({ "Name": "Nameless", "AssemblyVersion": "1.0", "ApiLevel": 12 });
    serve(
        &server,
        catalog_json(&[remote_manifest("Beta", "1.0", 12), nameless]),
    )
    .await;

    let repo = main_repo(&server);
    repo.reload().await;

    assert_eq!(repo.state(), RepositoryState::Success);
    let manifests = repo.manifests();
    assert_eq!(manifests.len(), 1);
    assert_eq!(manifests[0].internal_name, "Beta");
}

#[tokio::test]
async fn manifests_are_sorted_and_stamped() {
    let server = MockServer::start().await;
    serve(
        &server,
        catalog_json(&[
            remote_manifest("Zulu", "1.0", 12),
            remote_manifest("Alpha", "1.0", 12),
            remote_manifest("Mike", "1.0", 12),
        ]),
    )
    .await;

    let repo = main_repo(&server);
    repo.reload().await;

    let names: Vec<_> = repo.manifests().iter().map(|m| m.name.clone()).collect();
    assert_eq!(names, vec!["Alpha", "Mike", "Zulu"]);
    assert!(
        repo.manifests()
            .iter()
            .all(|m| m.source_url() == Some(repo.url()) && !m.is_third_party())
    );
}

#[tokio::test]
async fn main_repository_clears_hidden_flags() {
    let server = MockServer::start().await;
    let mut hidden = remote_manifest("Hidden", "1.0", 12);
    hidden["IsHide"] = json!(true);
    serve(&server, catalog_json(&[hidden])).await;

    let repo = main_repo(&server);
    repo.reload().await;
    assert!(!repo.manifests()[0].is_hide);

    // The normalization survives a second reload.
    repo.reload().await;
    assert!(!repo.manifests()[0].is_hide);
}

#[tokio::test]
async fn camel_case_documents_are_accepted() {
    let server = MockServer::start().await;
    let body = json!([{
        "internalName": "camel",
        "name": "Camel",
        "assemblyVersion": "2.1",
        "apiLevel": 12,
        "someFutureField": {"nested": true}
    }])
    .to_string();
    serve(&server, body).await;

    let repo = main_repo(&server);
    repo.reload().await;
    assert_eq!(repo.state(), RepositoryState::Success);
    let manifest = repo.find("camel").unwrap();
    assert_eq!(manifest.effective_version(false).to_string(), "2.1.0.0");
    assert!(manifest.testing_assembly_version.is_none());
}

#[tokio::test]
async fn empty_list_is_a_success() {
    let server = MockServer::start().await;
    serve(&server, "[]".into()).await;

    let repo = main_repo(&server);
    repo.reload().await;
    assert_eq!(repo.state(), RepositoryState::Success);
    assert!(repo.manifests().is_empty());
}

#[tokio::test]
async fn malformed_and_null_documents_fail() {
    for body in ["{not json", "null", "{\"InternalName\": \"x\"}"] {
        let server = MockServer::start().await;
        serve(&server, body.into()).await;

        let repo = main_repo(&server);
        repo.reload().await;
        assert_eq!(repo.state(), RepositoryState::Fail, "body: {body}");
        assert!(repo.manifests().is_empty());
    }
}

#[tokio::test]
async fn server_errors_fail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let repo = main_repo(&server);
    repo.reload().await;
    assert_eq!(repo.state(), RepositoryState::Fail);
}

#[tokio::test]
async fn slow_servers_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("[]")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let repo = main_repo(&server).with_timeout(Duration::from_millis(100));
    repo.reload().await;
    assert_eq!(repo.state(), RepositoryState::Fail);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn readers_see_whole_lists_only() {
    let server = MockServer::start().await;
    serve(
        &server,
        catalog_json(&[
            remote_manifest("Alpha", "1.0", 12),
            remote_manifest("Bravo", "1.0", 12),
        ]),
    )
    .await;

    let repo = Arc::new(main_repo(&server));
    repo.reload().await;
    let before = repo.manifests();

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(catalog_json(&[remote_manifest("Charlie", "1.0", 12)]))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let reloading = Arc::clone(&repo);
    let pending = tokio::spawn(async move { reloading.reload().await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Mid-reload the visible list is empty, never partial.
    assert_eq!(repo.state(), RepositoryState::InProgress);
    assert!(repo.manifests().is_empty());
    // A snapshot taken earlier is untouched.
    let names: Vec<_> = before.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Bravo"]);

    pending.await.unwrap();
    let after: Vec<_> = repo.manifests().iter().map(|m| m.name.clone()).collect();
    assert_eq!(after, vec!["Charlie"]);
}

#[tokio::test]
async fn third_party_repositories_keep_hidden_manifests() {
    let server = MockServer::start().await;
    let mut hidden = remote_manifest("Hidden", "1.0", 12);
    hidden["IsHide"] = json!(true);
    serve(&server, catalog_json(&[hidden])).await;

    let url = format!("{}/pluginmaster.json", server.uri());
    let repo = PluginRepository::new(build_client().unwrap(), url, "https://main.test/", true);
    repo.reload().await;

    assert!(repo.is_third_party());
    let manifest = repo.find("Hidden").unwrap();
    assert!(manifest.is_hide);
    assert!(manifest.is_third_party());
}
