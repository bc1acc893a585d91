#![allow(clippy::unwrap_used)]

use dbrouter_types::{
    ProviderRole, ProviderStatus, RouterConfig, RouterError, RouterEvent, RouterEventType, Row,
};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::provider::mock::MockProvider;
use crate::router::DbRouter;

struct Fixture {
    router: Arc<DbRouter>,
    m: Arc<MockProvider>,
    s: Arc<MockProvider>,
}

/// Master `m` (50ms round trip) and slave `s` (10ms round trip).
async fn fixture(config: RouterConfig) -> Fixture {
    let m = MockProvider::new("m");
    let s = MockProvider::new("s");
    m.set_delay(Duration::from_millis(50));
    s.set_delay(Duration::from_millis(10));

    let router = DbRouter::builder(config).master(m.clone()).slave(s.clone(), 1).build().unwrap();
    router.init().await.unwrap();
    Fixture { router, m, s }
}

fn row(value: serde_json::Value) -> Row {
    value.as_object().cloned().unwrap()
}

fn record_events(router: &DbRouter) -> Arc<Mutex<Vec<RouterEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    router.add_event_listener(move |event: &RouterEvent| sink.lock().push(event.clone()));
    events
}

#[tokio::test(start_paused = true)]
async fn test_init_registers_single_master() {
    let f = fixture(RouterConfig::default()).await;

    let status = f.router.status();
    assert!(status.initialized);
    assert_eq!(status.master.as_deref(), Some("m"));
    assert_eq!(status.providers.len(), 2);
    assert_eq!(status.providers["s"].role, ProviderRole::Slave);
    assert_eq!(status.providers["s"].status, ProviderStatus::Healthy);
    assert_eq!(status.sync_queue.total, 0);
    assert_eq!(f.router.replication().slave_names(), vec!["s"]);
    assert!(f.router.monitor().is_running());
}

#[tokio::test(start_paused = true)]
async fn test_init_is_idempotent_and_concurrent_safe() {
    let m = MockProvider::new("m");
    let router = DbRouter::builder(RouterConfig::default()).master(m.clone()).build().unwrap();
    assert!(!router.is_initialized());

    let (a, b, c) = tokio::join!(router.init(), router.init(), router.init());
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    router.init().await.unwrap();

    assert_eq!(router.registry().len(), 1);
    assert_eq!(m.ping_count(), 1);
}

#[tokio::test]
async fn test_query_initializes_lazily() {
    let config = RouterConfig { enable_health_check: false, ..Default::default() };
    let m = MockProvider::new("m");
    let router = DbRouter::builder(config).master(m.clone()).build().unwrap();

    router.query("SELECT 1", &[]).await.unwrap();
    assert!(router.is_initialized());
    assert_eq!(m.statements(), vec!["SELECT 1"]);
}

#[tokio::test(start_paused = true)]
async fn test_reads_prefer_fastest_healthy_provider() {
    let f = fixture(RouterConfig::default()).await;

    f.router.query("SELECT * FROM posts", &[]).await.unwrap();

    assert_eq!(f.s.statements(), vec!["SELECT * FROM posts"]);
    assert_eq!(f.m.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sticky_read_after_write() {
    let f = fixture(RouterConfig::default()).await;

    f.router.execute("INSERT INTO posts (title) VALUES ($1)", &[json!("Hello")]).await.unwrap();
    f.router.query("SELECT * FROM posts WHERE title = $1", &[json!("Hello")]).await.unwrap();

    assert_eq!(
        f.m.statements(),
        vec!["INSERT INTO posts (title) VALUES ($1)", "SELECT * FROM posts WHERE title = $1"]
    );

    tokio::time::sleep(Duration::from_millis(5_100)).await;
    f.router.query("SELECT count(*) FROM posts", &[]).await.unwrap();

    assert_eq!(f.m.call_count(), 2);
    assert_eq!(f.s.statements().last().map(String::as_str), Some("SELECT count(*) FROM posts"));
}

#[tokio::test(start_paused = true)]
async fn test_sticky_window_ignored_when_master_unhealthy() {
    let config = RouterConfig { sticky_read_ms: 60_000, ..Default::default() };
    let f = fixture(config).await;
    f.router.execute("UPDATE posts SET views = views + 1", &[]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    f.m.set_failing(true);
    f.router.registry().get("m").unwrap().set_status(ProviderStatus::Unhealthy);

    f.router.query("SELECT 1", &[]).await.unwrap();
    assert_eq!(f.s.statements().last().map(String::as_str), Some("SELECT 1"));
}

#[tokio::test(start_paused = true)]
async fn test_write_replicates_to_slave() {
    let f = fixture(RouterConfig::default()).await;
    let events = record_events(&f.router);

    let sql = "INSERT INTO comments (post_id, body) VALUES ($1, $2)";
    f.router.execute(sql, &[json!(7), json!("Nice")]).await.unwrap();

    assert_eq!(f.m.statements(), vec![sql]);
    assert!(f.router.last_write_at().is_some());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(f.s.statements(), vec![sql]);
    assert_eq!(f.s.last_params(), Some(vec![json!(7), json!("Nice")]));

    let events = events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, RouterEventType::SyncSuccess);
    assert_eq!(events[0].provider, "s");
}

#[tokio::test(start_paused = true)]
async fn test_write_without_sync_stays_on_master() {
    let config = RouterConfig { enable_sync: false, ..Default::default() };
    let f = fixture(config).await;

    f.router.execute("DELETE FROM posts WHERE id = $1", &[json!(3)]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(f.s.call_count(), 0);
    assert!(!f.router.replication().is_running());
}

#[tokio::test]
async fn test_write_rejected_when_sole_master_unhealthy() {
    let m = MockProvider::new("m");
    m.set_failing(true);
    let router = DbRouter::builder(RouterConfig::default()).master(m.clone()).build().unwrap();

    router.init().await.unwrap();
    router.check_health().await;
    let status = router.check_health().await;
    assert_eq!(status.providers["m"].status, ProviderStatus::Unhealthy);

    let err = router.execute("INSERT INTO posts DEFAULT VALUES", &[]).await.unwrap_err();
    assert_eq!(err, RouterError::MasterUnhealthy { provider: "m".to_string() });
    assert_eq!(m.call_count(), 0);
    assert!(router.last_write_at().is_none());
}

#[tokio::test]
async fn test_no_providers_available() {
    let router = DbRouter::builder(RouterConfig::default()).build().unwrap();

    let read = router.query("SELECT 1", &[]).await.unwrap_err();
    let write = router.execute("DELETE FROM posts", &[]).await.unwrap_err();
    assert_eq!(read, RouterError::NoProvidersAvailable);
    assert_eq!(write, RouterError::NoProvidersAvailable);
}

#[tokio::test]
async fn test_reads_fall_back_to_master_when_nothing_healthy() {
    let config = RouterConfig { enable_health_check: false, ..Default::default() };
    let m = MockProvider::new("m");
    let s = MockProvider::new("s");
    let router = DbRouter::builder(config).master(m.clone()).slave(s.clone(), 1).build().unwrap();

    router.query("SELECT 1", &[]).await.unwrap();

    assert_eq!(m.call_count(), 1);
    assert_eq!(s.call_count(), 0);
    assert_eq!(router.status().providers["m"].status, ProviderStatus::Unknown);
}

#[tokio::test(start_paused = true)]
async fn test_failed_read_retries_once_on_other_provider() {
    let f = fixture(RouterConfig::default()).await;
    f.m.set_rows(vec![row(json!({"id": 1, "title": "from master"}))]);
    f.s.set_failing(true);

    let result = f.router.query("SELECT id, title FROM posts", &[]).await.unwrap();

    assert_eq!(result.rows[0]["title"], "from master");
    assert_eq!(f.s.call_count(), 1);
    assert_eq!(f.m.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_read_error_propagates_after_fallback_fails() {
    let f = fixture(RouterConfig::default()).await;
    f.m.set_failing(true);
    f.s.set_failing(true);

    let err = f.router.query("SELECT 1", &[]).await.unwrap_err();

    assert!(matches!(err, RouterError::Provider(ref e) if e.provider() == "m"));
    assert_eq!(f.s.call_count() + f.m.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failover_redirects_writes_and_resyncs_targets() {
    let f = fixture(RouterConfig::default()).await;
    let events = record_events(&f.router);
    f.m.set_failing(true);

    for _ in 0..3 {
        f.router.check_health().await;
    }

    let status = f.router.status();
    assert_eq!(status.master.as_deref(), Some("s"));
    assert!(f.router.replication().slave_names().is_empty());

    let failover: Vec<_> = events
        .lock()
        .iter()
        .filter(|e| e.event_type == RouterEventType::RouterFailover)
        .cloned()
        .collect();
    assert_eq!(failover.len(), 1);
    assert_eq!(failover[0].details.as_ref().unwrap()["previousMaster"], "m");

    f.router.execute("INSERT INTO posts (title) VALUES ('after failover')", &[]).await.unwrap();
    assert_eq!(f.s.statements(), vec!["INSERT INTO posts (title) VALUES ('after failover')"]);
}

#[tokio::test(start_paused = true)]
async fn test_recovered_slave_becomes_replication_target() {
    let config = RouterConfig::default();
    let m = MockProvider::new("m");
    let s = MockProvider::new("s");
    s.set_failing(true);
    let router =
        DbRouter::builder(config).master(m.clone()).slave(s.clone(), 1).build().unwrap();
    router.init().await.unwrap();
    assert!(router.replication().slave_names().is_empty());

    s.set_failing(false);
    router.check_health().await;
    assert_eq!(router.replication().slave_names(), vec!["s"]);
}

#[derive(Debug, Deserialize, PartialEq)]
struct Post {
    id: i64,
    title: String,
}

#[tokio::test]
async fn test_typed_helpers() {
    let config = RouterConfig { enable_health_check: false, ..Default::default() };
    let m = MockProvider::new("m");
    m.set_rows(vec![
        row(json!({"id": 1, "title": "Hello"})),
        row(json!({"id": 2, "title": "World"})),
    ]);
    let router = DbRouter::builder(config).master(m.clone()).build().unwrap();

    let posts: Vec<Post> = router.query_as("SELECT id, title FROM posts", &[]).await.unwrap();
    assert_eq!(posts.len(), 2);

    let first: Option<Post> =
        router.query_one_as("SELECT id, title FROM posts", &[]).await.unwrap();
    assert_eq!(first, Some(Post { id: 1, title: "Hello".to_string() }));

    let inserted: Option<Post> = router
        .execute_one_as("INSERT INTO posts (title) VALUES ($1) RETURNING id, title", &[json!("x")])
        .await
        .unwrap();
    assert_eq!(inserted.map(|p| p.id), Some(1));

    m.set_rows(Vec::new());
    assert_eq!(router.query_one("SELECT 1 WHERE false", &[]).await.unwrap(), None);
    assert_eq!(router.execute_one("DELETE FROM posts", &[]).await.unwrap(), None);

    m.set_rows(vec![row(json!({"id": "not a number", "title": "x"}))]);
    let err = router.query_as::<Post>("SELECT id, title FROM posts", &[]).await.unwrap_err();
    assert!(matches!(err, RouterError::Deserialize { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_process_sync_queue_drains_failed_replication() {
    let f = fixture(RouterConfig::default()).await;
    f.s.set_failing(true);

    f.router.execute("UPDATE posts SET title = 'x'", &[]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(f.router.status().sync_queue.pending, 1);

    f.s.set_failing(false);
    f.router.process_sync_queue().await.unwrap();
    assert_eq!(f.router.status().sync_queue.synced, 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_disconnects_and_resets() {
    let f = fixture(RouterConfig::default()).await;
    f.router.execute("INSERT INTO posts DEFAULT VALUES", &[]).await.unwrap();

    f.router.shutdown().await;

    assert!(f.m.is_disconnected());
    assert!(f.s.is_disconnected());
    assert!(!f.router.is_initialized());
    assert!(!f.router.monitor().is_running());
    assert!(!f.router.replication().is_running());

    let status = f.router.status();
    assert!(status.providers.is_empty());
    assert!(status.master.is_none());
    assert!(status.last_write_at.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_is_terminal() {
    let f = fixture(RouterConfig::default()).await;
    f.router.shutdown().await;
    let pings = f.m.ping_count();

    let err = f.router.query("SELECT 1", &[]).await.unwrap_err();
    assert_eq!(err, RouterError::ShutDown);
    let err = f.router.execute("DELETE FROM posts", &[]).await.unwrap_err();
    assert_eq!(err, RouterError::ShutDown);
    assert!(matches!(f.router.init().await, Err(RouterError::ShutDown)));
    assert!(matches!(f.router.process_sync_queue().await, Err(RouterError::ShutDown)));

    let status = f.router.check_health().await;
    assert!(!status.initialized);
    assert!(status.providers.is_empty());
    assert!(f.router.is_shut_down());
    assert_eq!(f.m.ping_count(), pings);
    assert_eq!(f.m.statements(), Vec::<String>::new());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_in_flight_replication() {
    let f = fixture(RouterConfig::default()).await;
    let events = record_events(&f.router);

    let sql = "INSERT INTO posts DEFAULT VALUES";
    f.router.execute(sql, &[]).await.unwrap();
    f.router.shutdown().await;

    assert_eq!(f.s.statements(), vec![sql]);
    assert!(f.s.is_disconnected());
    let events = events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, RouterEventType::SyncSuccess);
    assert_eq!(events[0].provider, "s");
}

#[tokio::test]
async fn test_builder_defaults_master_to_lowest_priority() {
    let config = RouterConfig { enable_health_check: false, ..Default::default() };
    let router = DbRouter::builder(config)
        .slave(MockProvider::new("a"), 5)
        .slave(MockProvider::new("b"), 2)
        .build()
        .unwrap();

    router.init().await.unwrap();
    assert_eq!(router.status().master.as_deref(), Some("b"));
    let original = router.registry().original_master().map(|p| p.name().to_string());
    assert_eq!(original.as_deref(), Some("b"));
}

#[test]
fn test_builder_rejects_invalid_config() {
    let mut config = RouterConfig::default();
    config.replication.max_retries = 0;
    let err = DbRouter::builder(config).build().err();
    assert!(matches!(err, Some(RouterError::Config(_))));
}

#[tokio::test]
async fn test_two_masters_registered_as_one() {
    let config = RouterConfig { enable_health_check: false, ..Default::default() };
    let router = DbRouter::builder(config)
        .master(MockProvider::new("a"))
        .master(MockProvider::new("b"))
        .build()
        .unwrap();
    router.init().await.unwrap();

    let masters = router.registry().all().iter().filter(|p| p.is_master()).count();
    assert_eq!(masters, 1);
}
