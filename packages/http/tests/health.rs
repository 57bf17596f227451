use std::sync::{Arc, Mutex};
use std::time::Duration;

use mosaic_federation::{RemoteDescriptor, RemoteRegistry};
use mosaic_http::{HealthMonitor, HealthProbe, HealthStatus};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn remote(name: &str, url: &str) -> RemoteDescriptor {
    RemoteDescriptor::new(name, Url::parse(url).unwrap(), format!("{name}_app"), "./Page")
}

#[tokio::test]
async fn probe_reports_up_and_down() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/up/remoteEntry.js"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/broken/remoteEntry.js"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/slow/remoteEntry.js"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let registry = RemoteRegistry::new([
        remote("up", &format!("{}/up/remoteEntry.js", server.uri())),
        remote("broken", &format!("{}/broken/remoteEntry.js", server.uri())),
        remote("slow", &format!("{}/slow/remoteEntry.js", server.uri())),
    ]);
    let probe = HealthProbe::new(Duration::from_millis(100)).unwrap();

    let results = probe.probe_all(&registry).await;
    let by_name = |name: &str| {
        results
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.status.clone())
            .unwrap()
    };

    assert!(matches!(by_name("up"), HealthStatus::Up { code: 200, .. }));
    assert_eq!(
        by_name("broken"),
        HealthStatus::Down {
            reason: "HTTP 500".into()
        }
    );
    assert_eq!(
        by_name("slow"),
        HealthStatus::Down {
            reason: "no response within 100ms".into()
        }
    );
}

#[tokio::test]
async fn unreachable_remote_is_down() {
    let probe = HealthProbe::new(Duration::from_millis(500)).unwrap();
    // Port 9 (discard) is essentially never listening on loopback.
    let health = probe
        .probe(&remote("gone", "http://127.0.0.1:9/remoteEntry.js"))
        .await;
    assert!(!health.status.is_up());
}

#[tokio::test]
async fn monitor_reports_first_result_then_stops() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/users/remoteEntry.js"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let registry = RemoteRegistry::new([remote(
        "users",
        &format!("{}/users/remoteEntry.js", server.uri()),
    )]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    let handle = HealthMonitor::new(
        HealthProbe::new(Duration::from_millis(200)).unwrap(),
        registry,
        Duration::from_millis(20),
    )
    .spawn(move |health| sink.lock().unwrap().push(health.clone()));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(handle.is_running());
    handle.stop().await;

    // Several rounds ran, but only the first one was a change.
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].name, "users");
    assert!(seen[0].status.is_up());
}

#[tokio::test]
async fn zero_interval_is_raised_to_the_minimum() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/users/remoteEntry.js"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let registry = RemoteRegistry::new([remote(
        "users",
        &format!("{}/users/remoteEntry.js", server.uri()),
    )]);
    let monitor = HealthMonitor::new(
        HealthProbe::new(Duration::from_millis(200)).unwrap(),
        registry,
        Duration::ZERO,
    );
    assert_eq!(monitor.interval(), HealthMonitor::MIN_INTERVAL);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let handle = monitor.spawn(move |health| sink.lock().unwrap().push(health.clone()));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(handle.is_running());
    handle.stop().await;
    assert_eq!(seen.lock().unwrap().len(), 1);
}
