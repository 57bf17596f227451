use std::time::Duration;

use mosaic_core::{address, GlobalScope, Value};
use mosaic_federation::{
    EntryImporter, Environment, ImportError, LoadError, Loader, LoaderConfig, RemoteDescriptor,
    RemoteRegistry, RetryPolicy, ShareScope,
};
use mosaic_http::{HttpImporter, JsonEntryEvaluator};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings_manifest() -> serde_json::Value {
    serde_json::json!({
        "scope": "settings_app",
        "shared": { "ui": "^18.0.0" },
        "modules": {
            "./SettingsPage": { "title": "Settings", "sections": ["profile", "billing"] }
        }
    })
}

fn registry(server: &MockServer) -> RemoteRegistry {
    let entry = Url::parse(&format!("{}/settings/remoteEntry.json", server.uri())).unwrap();
    RemoteRegistry::new([RemoteDescriptor::new(
        "settings",
        entry,
        "settings_app",
        "./SettingsPage",
    )])
}

fn page_with_ui() -> GlobalScope {
    let page = GlobalScope::new();
    ShareScope::ensure(&page)
        .unwrap()
        .provide("ui", "18.2.0", "host", ());
    page
}

#[tokio::test]
async fn loads_a_manifest_remote_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/settings/remoteEntry.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(settings_manifest()))
        .expect(1)
        .mount(&server)
        .await;

    let page = page_with_ui();
    let importer = HttpImporter::new(JsonEntryEvaluator).unwrap();
    let loader = Loader::new(
        registry(&server),
        importer,
        LoaderConfig::for_environment(Environment::Development),
        &page,
    )
    .unwrap();

    let component = loader.load_component("settings").await.unwrap();
    let page_value = component.as_value().unwrap();
    assert_eq!(
        page_value.get(&address!("title")),
        Some(&Value::from("Settings"))
    );

    // Cached: the second load does not hit the server again.
    loader.load_component("settings").await.unwrap();
    assert!(loader.store().remote_state("settings").unwrap().loaded);
}

#[tokio::test]
async fn server_errors_are_retried_then_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/settings/remoteEntry.json"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let importer = HttpImporter::new(JsonEntryEvaluator).unwrap();
    let loader = Loader::new(
        registry(&server),
        importer,
        LoaderConfig::for_environment(Environment::Production)
            .with_retry(RetryPolicy::new(3, Duration::from_millis(5))),
        &page_with_ui(),
    )
    .unwrap();

    let error = loader.load_component("settings").await.unwrap_err();
    assert!(matches!(
        error,
        LoadError::Import {
            source: ImportError::Status { status: 503, .. },
            ..
        }
    ));
    let status = loader.store().remote_state("settings").unwrap();
    assert_eq!(status.error, Some(error.to_string()));
    assert!(!status.loading);
}

#[tokio::test]
async fn unmet_shared_requirement_fails_init() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/settings/remoteEntry.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(settings_manifest()))
        .mount(&server)
        .await;

    let importer = HttpImporter::new(JsonEntryEvaluator).unwrap();
    let loader = Loader::new(
        registry(&server),
        importer,
        LoaderConfig::for_environment(Environment::Production).with_retry(RetryPolicy::never()),
        &GlobalScope::new(),
    )
    .unwrap();

    let error = loader.load_component("settings").await.unwrap_err();
    assert!(matches!(error, LoadError::Container { .. }));
    assert!(error.to_string().contains("ui"));
}

#[tokio::test]
async fn manifest_without_modules_is_an_initialization_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/settings/remoteEntry.json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "scope": "settings_app" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let importer = HttpImporter::new(JsonEntryEvaluator).unwrap();
    let loader = Loader::new(
        registry(&server),
        importer,
        LoaderConfig::for_environment(Environment::Production),
        &page_with_ui(),
    )
    .unwrap();

    assert!(matches!(
        loader.load_component("settings").await,
        Err(LoadError::RemoteInitializationFailed { .. })
    ));
}

#[tokio::test]
async fn slow_entries_time_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/settings/remoteEntry.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(settings_manifest())
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let importer =
        HttpImporter::with_timeout(JsonEntryEvaluator, Duration::from_millis(50)).unwrap();
    let loader = Loader::new(
        registry(&server),
        importer,
        LoaderConfig::for_environment(Environment::Production).with_retry(RetryPolicy::never()),
        &page_with_ui(),
    )
    .unwrap();

    assert_eq!(
        loader.load_component("settings").await.unwrap_err(),
        LoadError::RemoteLoadTimeout {
            name: "settings".into()
        }
    );
}

#[tokio::test]
async fn prefetched_entry_is_not_fetched_again() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/settings/remoteEntry.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(settings_manifest()))
        .expect(1)
        .mount(&server)
        .await;

    let importer = HttpImporter::new(JsonEntryEvaluator).unwrap();
    let url = Url::parse(&format!("{}/settings/remoteEntry.json", server.uri())).unwrap();

    importer.prefetch(&url).await.unwrap();
    importer.prefetch(&url).await.unwrap();
    assert!(importer.is_prefetched(&url));

    let entry = importer.import(&url).await.unwrap();
    assert!(entry.module.get("get").is_some());
    assert!(!importer.is_prefetched(&url));
}

#[tokio::test]
async fn loader_prefetch_feeds_the_next_load() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/settings/remoteEntry.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(settings_manifest()))
        .expect(1)
        .mount(&server)
        .await;

    let importer = HttpImporter::new(JsonEntryEvaluator).unwrap();
    let loader = Loader::new(
        registry(&server),
        importer,
        LoaderConfig::for_environment(Environment::Development),
        &page_with_ui(),
    )
    .unwrap();

    loader.prefetch("settings").await.unwrap();
    assert!(loader.store().remote_state("settings").is_none());

    loader.load_component("settings").await.unwrap();
}

fn entry_with_nonce(server: &MockServer, nonce: &str) -> Url {
    Url::parse(&format!("{}/settings/remoteEntry.json?t={nonce}", server.uri())).unwrap()
}

#[tokio::test]
async fn one_prefetched_entry_per_remote() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/settings/remoteEntry.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(settings_manifest()))
        .expect(2)
        .mount(&server)
        .await;

    let importer = HttpImporter::new(JsonEntryEvaluator).unwrap();
    let old = entry_with_nonce(&server, "old");
    let new = entry_with_nonce(&server, "new");

    importer.prefetch(&old).await.unwrap();
    importer.prefetch(&new).await.unwrap();
    assert!(!importer.is_prefetched(&old));
    assert!(importer.is_prefetched(&new));

    importer.import(&new).await.unwrap();
    assert!(!importer.is_prefetched(&new));
}

#[tokio::test]
async fn prefetch_under_an_old_nonce_is_not_served() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/settings/remoteEntry.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(settings_manifest()))
        .expect(2)
        .mount(&server)
        .await;

    let importer = HttpImporter::new(JsonEntryEvaluator).unwrap();
    let old = entry_with_nonce(&server, "old");
    let new = entry_with_nonce(&server, "new");

    importer.prefetch(&old).await.unwrap();
    importer.import(&new).await.unwrap();
    assert!(!importer.is_prefetched(&old));
    assert!(!importer.is_prefetched(&new));
}
