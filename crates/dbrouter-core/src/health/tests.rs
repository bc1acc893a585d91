use dbrouter_types::{HealthConfig, ProviderRole, ProviderStatus, RouterEvent, RouterEventType};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::health::HealthMonitor;
use crate::provider::mock::MockProvider;
use crate::provider::ManagedProvider;

fn add(
    monitor: &HealthMonitor,
    name: &str,
    role: ProviderRole,
    priority: i32,
) -> Arc<MockProvider> {
    let mock = MockProvider::new(name);
    monitor.register_provider(Arc::new(ManagedProvider::new(mock.clone(), role, priority)));
    mock
}

fn record_events(monitor: &HealthMonitor) -> Arc<Mutex<Vec<RouterEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    monitor.subscribe(Arc::new(move |event: &RouterEvent| sink.lock().push(event.clone())));
    events
}

fn master_name(monitor: &HealthMonitor) -> Option<String> {
    monitor.master().map(|p| p.name().to_string())
}

fn status_of(monitor: &HealthMonitor, name: &str) -> Option<ProviderStatus> {
    monitor.registry().get(name).map(|p| p.status())
}

fn master_count(monitor: &HealthMonitor) -> usize {
    monitor.registry().all().iter().filter(|p| p.is_master()).count()
}

#[tokio::test]
async fn test_first_successful_ping_marks_healthy() {
    let monitor = HealthMonitor::new(HealthConfig::default());
    add(&monitor, "primary", ProviderRole::Master, 0);
    let events = record_events(&monitor);

    assert_eq!(status_of(&monitor, "primary"), Some(ProviderStatus::Unknown));
    monitor.check_all().await;

    assert_eq!(status_of(&monitor, "primary"), Some(ProviderStatus::Healthy));
    let events = events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, RouterEventType::ProviderHealthy);

    let snapshot = monitor.status_snapshot();
    assert!(snapshot["primary"].last_check_at.is_some());
}

#[tokio::test]
async fn test_unhealthy_after_failure_threshold() {
    let monitor = HealthMonitor::new(HealthConfig::default());
    let primary = add(&monitor, "primary", ProviderRole::Master, 0);
    primary.set_failing(true);

    monitor.check_all().await;
    monitor.check_all().await;
    assert_eq!(status_of(&monitor, "primary"), Some(ProviderStatus::Unknown));

    monitor.check_all().await;
    assert_eq!(status_of(&monitor, "primary"), Some(ProviderStatus::Unhealthy));
    assert_eq!(primary.ping_count(), 3);
}

#[tokio::test]
async fn test_failover_promotes_healthy_slave() {
    let monitor = HealthMonitor::new(HealthConfig::default());
    let m = add(&monitor, "m", ProviderRole::Master, 0);
    add(&monitor, "s", ProviderRole::Slave, 1);
    monitor.check_all().await;
    monitor.check_all().await;

    m.set_failing(true);
    let events = record_events(&monitor);
    for _ in 0..3 {
        assert_eq!(master_name(&monitor).as_deref(), Some("m"));
        monitor.check_all().await;
    }

    assert_eq!(master_name(&monitor).as_deref(), Some("s"));
    assert_eq!(monitor.registry().get("m").map(|p| p.role()), Some(ProviderRole::Slave));
    assert_eq!(master_count(&monitor), 1);

    let events = events.lock();
    let kinds: Vec<_> = events.iter().map(|e| (e.event_type, e.provider.as_str())).collect();
    assert_eq!(
        kinds,
        vec![
            (RouterEventType::ProviderUnhealthy, "m"),
            (RouterEventType::ProviderDemoted, "m"),
            (RouterEventType::ProviderPromoted, "s"),
            (RouterEventType::RouterFailover, "s"),
        ]
    );
    let failover = &events[3];
    assert_eq!(failover.details.as_ref().map(|d| d["previousMaster"].clone()), Some("m".into()));
}

#[tokio::test]
async fn test_no_failover_without_healthy_slave() {
    let monitor = HealthMonitor::new(HealthConfig::default());
    let m = add(&monitor, "m", ProviderRole::Master, 0);
    let s = add(&monitor, "s", ProviderRole::Slave, 1);
    m.set_failing(true);
    s.set_failing(true);

    for _ in 0..4 {
        monitor.check_all().await;
    }

    assert_eq!(master_name(&monitor).as_deref(), Some("m"));
    assert_eq!(status_of(&monitor, "m"), Some(ProviderStatus::Unhealthy));
}

#[tokio::test]
async fn test_failover_prefers_lowest_priority_slave() {
    let monitor = HealthMonitor::new(HealthConfig::default());
    let m = add(&monitor, "m", ProviderRole::Master, 0);
    add(&monitor, "far", ProviderRole::Slave, 5);
    add(&monitor, "near", ProviderRole::Slave, 2);
    m.set_failing(true);

    for _ in 0..3 {
        monitor.check_all().await;
    }
    assert_eq!(master_name(&monitor).as_deref(), Some("near"));
}

#[tokio::test]
async fn test_original_master_repromoted_after_recovery() {
    let monitor = HealthMonitor::new(HealthConfig::default());
    let m = add(&monitor, "m", ProviderRole::Master, 0);
    add(&monitor, "s", ProviderRole::Slave, 1);
    monitor.check_all().await;

    m.set_failing(true);
    for _ in 0..3 {
        monitor.check_all().await;
    }
    assert_eq!(master_name(&monitor).as_deref(), Some("s"));

    m.set_failing(false);
    let events = record_events(&monitor);

    // One success is below the recovery threshold.
    monitor.check_all().await;
    assert_eq!(status_of(&monitor, "m"), Some(ProviderStatus::Unhealthy));
    assert_eq!(master_name(&monitor).as_deref(), Some("s"));

    monitor.check_all().await;
    assert_eq!(status_of(&monitor, "m"), Some(ProviderStatus::Healthy));
    assert_eq!(master_name(&monitor).as_deref(), Some("m"));
    assert_eq!(master_count(&monitor), 1);

    let kinds: Vec<_> =
        events.lock().iter().map(|e| (e.event_type, e.provider.clone())).collect();
    assert_eq!(
        kinds,
        vec![
            (RouterEventType::ProviderHealthy, "m".to_string()),
            (RouterEventType::ProviderDemoted, "s".to_string()),
            (RouterEventType::ProviderPromoted, "m".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_ping_timeout_counts_as_failure() {
    let config = HealthConfig { ping_timeout_ms: 50, ..Default::default() };
    let monitor = HealthMonitor::new(config);
    let slow = add(&monitor, "slow", ProviderRole::Master, 0);
    let fast = add(&monitor, "fast", ProviderRole::Slave, 1);
    slow.set_delay(Duration::from_secs(10));
    fast.set_delay(Duration::from_millis(5));

    monitor.check_all().await;

    let slow_provider = monitor.registry().get("slow").map(|p| p.failure_count());
    assert_eq!(slow_provider, Some(1));
    assert_eq!(status_of(&monitor, "fast"), Some(ProviderStatus::Healthy));
    assert_eq!(status_of(&monitor, "slow"), Some(ProviderStatus::Unknown));

    monitor.check_all().await;
    monitor.check_all().await;
    assert_eq!(status_of(&monitor, "slow"), Some(ProviderStatus::Unhealthy));
    assert_eq!(master_name(&monitor).as_deref(), Some("fast"));
}

#[tokio::test]
async fn test_removing_master_promotes_replacement() {
    let monitor = HealthMonitor::new(HealthConfig::default());
    add(&monitor, "m", ProviderRole::Master, 0);
    add(&monitor, "s1", ProviderRole::Slave, 1);
    add(&monitor, "s2", ProviderRole::Slave, 2);
    monitor.check_all().await;
    let events = record_events(&monitor);

    let removed = monitor.remove_provider("m");
    assert!(removed.is_some());
    assert_eq!(master_name(&monitor).as_deref(), Some("s1"));
    assert_eq!(master_count(&monitor), 1);
    assert_eq!(events.lock()[0].event_type, RouterEventType::ProviderPromoted);

    assert!(monitor.remove_provider("missing").is_none());
}

#[tokio::test]
async fn test_healthy_views() {
    let monitor = HealthMonitor::new(HealthConfig::default());
    add(&monitor, "m", ProviderRole::Master, 0);
    add(&monitor, "s2", ProviderRole::Slave, 2);
    let down = add(&monitor, "s1", ProviderRole::Slave, 1);
    down.set_failing(true);

    monitor.check_all().await;

    let slaves: Vec<_> = monitor.healthy_slaves().iter().map(|p| p.name().to_string()).collect();
    assert_eq!(slaves, vec!["s2"]);
    assert_eq!(monitor.healthy_by_latency().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_start_and_stop_poll_task() {
    let config = HealthConfig { check_interval_ms: 100, ..Default::default() };
    let monitor = HealthMonitor::new(config);
    let primary = add(&monitor, "primary", ProviderRole::Master, 0);

    assert!(!monitor.is_running());
    monitor.start();
    monitor.start();
    assert!(monitor.is_running());

    tokio::time::sleep(Duration::from_millis(250)).await;
    let pings = primary.ping_count();
    assert!(pings >= 2, "expected periodic pings, got {pings}");

    monitor.stop().await;
    assert!(!monitor.is_running());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(primary.ping_count(), pings);
}
