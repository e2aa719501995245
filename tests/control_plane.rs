//! End-to-end tests for the assembled control plane.

use std::sync::Arc;
use std::time::Duration;

use continuity_plane::availability::NodeMetrics;
use continuity_plane::config::loader::parse_config;
use continuity_plane::health::HealthStatus;
use continuity_plane::probe::{ReportedReplicator, TcpProbe};
use continuity_plane::redundancy::InstanceRole;
use continuity_plane::region::RegionStatus;
use continuity_plane::{ControlEvent, ControlPlane};

mod common;

use common::ScriptedProbe;

const CONFIG: &str = r#"
[health]
interval_secs = 5

[[health.dependencies]]
name = "db"
target = "db:5432"

[redundancy]
heartbeat_interval_secs = 5

[[redundancy.pools]]
name = "cache"
mode = "hot_standby"
primary = "cache-a:6379"
secondary = "cache-b:6379"

[availability]
check_interval_secs = 5
algorithm = "round_robin"

[[availability.nodes]]
id = "api-1"
service = "api"
host = "10.0.0.1"
port = 8080
primary = true

[[availability.nodes]]
id = "api-2"
service = "api"
host = "10.0.0.2"
port = 8080

[regions]
heartbeat_interval_secs = 5

[[regions.regions]]
id = "us-east"
endpoint = "us-east:443"
primary = true

[[regions.regions]]
id = "us-west"
endpoint = "us-west:443"
"#;

fn drain(rx: &mut tokio::sync::broadcast::Receiver<ControlEvent>) -> Vec<ControlEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn test_control_plane_rides_out_failures() {
    let config = parse_config(CONFIG).unwrap();
    let probe = Arc::new(ScriptedProbe::new());
    let replicator = Arc::new(ReportedReplicator::new());
    replicator.report_lag("us-east", "us-west", Duration::from_millis(100));
    replicator.report_lag("cache-a:6379", "cache-b:6379", Duration::from_millis(5));

    let mut plane = ControlPlane::build(config, probe.clone(), replicator);
    let mut rx = plane.subscribe();
    plane.start().await;
    assert!(plane.is_running());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        plane.health().service_health("db").unwrap().status,
        HealthStatus::Healthy
    );
    assert_eq!(plane.redundancy().active_role("cache").unwrap(), InstanceRole::Primary);
    assert_eq!(plane.regions().primary_region().unwrap().id, "us-east");

    probe.set_down("cache-a:6379");
    probe.set_down("us-east:443");
    plane
        .availability()
        .update_metrics(
            "api",
            "api-1",
            NodeMetrics {
                cpu_usage: 97.0,
                memory_usage: 96.0,
                current_connections: 10,
                latency_ms: 20.0,
            },
        )
        .unwrap();

    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(plane.redundancy().active_role("cache").unwrap(), InstanceRole::Secondary);
    assert_eq!(
        plane.availability().service_status("api").unwrap().primary.as_deref(),
        Some("api-2")
    );
    let west = plane.regions().region_status("us-west").unwrap();
    assert!(west.is_primary);
    assert_eq!(west.status, RegionStatus::Active);
    assert_eq!(plane.regions().regions().iter().filter(|r| r.is_primary).count(), 1);

    plane.stop().await;
    assert!(!plane.is_running());

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, ControlEvent::PoolFailover { pool, manual: false, .. } if pool == "cache")));
    assert!(events.iter().any(|e| matches!(
        e,
        ControlEvent::NodeFailover { to_node: Some(to), success: true, .. } if to == "api-2"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        ControlEvent::RegionFailoverCompleted { to, rto_met: true, .. } if to == "us-west"
    )));
}

#[tokio::test(start_paused = true)]
async fn test_stop_closes_pool_connections() {
    let config = parse_config(CONFIG).unwrap();
    let mut plane = ControlPlane::build(
        config,
        Arc::new(ScriptedProbe::new()),
        Arc::new(ReportedReplicator::new()),
    );
    plane.start().await;
    assert!(plane.redundancy().get_connection("cache").unwrap().is_some());

    plane.stop().await;
    assert!(plane.redundancy().get_connection("cache").unwrap().is_none());

    // A stopped plane stays stopped.
    plane.start().await;
    assert!(!plane.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_disabled_managers_exit_immediately() {
    let mut config = parse_config(CONFIG).unwrap();
    config.health.enabled = false;
    config.availability.enabled = false;
    config.regions.enabled = false;
    config.redundancy.enabled = false;

    let probe = Arc::new(ScriptedProbe::new());
    let mut plane = ControlPlane::build(config, probe, Arc::new(ReportedReplicator::new()));
    plane.start().await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    // Registered but never probed.
    let db = plane.health().service_health("db").unwrap();
    assert_eq!(db.status, HealthStatus::Unknown);
    assert_eq!(db.total_checks, 0);

    plane.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_plane_without_replication_skips_sync() {
    let config = parse_config(CONFIG).unwrap();
    let mut plane = ControlPlane::without_replication(config, Arc::new(ScriptedProbe::new()));
    assert!(!plane.config().redundancy.sync_enabled);
    assert!(!plane.config().regions.sync_enabled);

    let mut rx = plane.subscribe();
    plane.start().await;
    tokio::time::sleep(Duration::from_secs(300)).await;

    assert!(plane.redundancy().sync_history("cache").unwrap().is_empty());
    assert!(plane.regions().sync_reports(10).is_empty());
    // Heartbeats still run.
    assert!(plane.regions().region_status("us-west").unwrap().last_heartbeat.is_some());
    plane.stop().await;

    let events = drain(&mut rx);
    assert!(!events
        .iter()
        .any(|e| matches!(e, ControlEvent::SyncDegraded { .. })));
}

#[tokio::test]
async fn test_tcp_probe_drives_dependency_health() {
    let (addr, server) = common::start_tcp_listener().await;
    let config = parse_config(&format!(
        r#"
[health]
interval_secs = 1
probe_timeout_ms = 500

[[health.dependencies]]
name = "local"
target = "{}"
"#,
        addr
    ))
    .unwrap();

    let plane = ControlPlane::build(
        config,
        Arc::new(TcpProbe::new()),
        Arc::new(ReportedReplicator::new()),
    );
    plane.health().run_cycle().await;
    let local = plane.health().service_health("local").unwrap();
    assert_eq!(local.status, HealthStatus::Healthy);
    assert!(local.latency_ms.is_some());

    server.abort();
    let _ = server.await;
    plane.health().run_cycle().await;
    let local = plane.health().service_health("local").unwrap();
    assert_eq!(local.status, HealthStatus::Degraded);
    assert_eq!(local.consecutive_failures, 1);
}
