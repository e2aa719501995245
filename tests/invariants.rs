//! Invariants that must hold across long, randomized runs.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use continuity_plane::availability::{HighAvailabilityManager, NodeMetrics, NodeStatus, ServiceNode};
use continuity_plane::config::{AvailabilityConfig, HealthMonitorConfig, RedundancyConfig, RegionConfig};
use continuity_plane::health::{HealthMonitor, HealthStatus};
use continuity_plane::load_balancer::LoadBalancingAlgorithm;
use continuity_plane::probe::ReportedReplicator;
use continuity_plane::redundancy::{InstanceRole, RedundancyManager, RedundancyMode};
use continuity_plane::region::{MultiRegionEngine, Region, RegionHeartbeat};
use continuity_plane::EventBus;

mod common;

use common::ScriptedProbe;

#[tokio::test]
async fn test_health_status_follows_failure_count() {
    let probe = Arc::new(ScriptedProbe::new());
    let monitor = HealthMonitor::new(HealthMonitorConfig::default(), probe.clone(), EventBus::default());
    monitor.register("db", "db:5432");
    probe.set_down("db:5432");

    for failures in 1..=12u32 {
        monitor.run_cycle().await;
        let db = monitor.service_health("db").unwrap();
        assert_eq!(db.consecutive_failures, failures);
        let expected = match failures {
            0..=2 => HealthStatus::Degraded,
            3..=9 => HealthStatus::Unhealthy,
            _ => HealthStatus::Offline,
        };
        assert_eq!(db.status, expected, "after {} failures", failures);
    }

    // A single fast success recovers fully.
    probe.set_up("db:5432");
    monitor.run_cycle().await;
    let db = monitor.service_health("db").unwrap();
    assert_eq!(db.status, HealthStatus::Healthy);
    assert_eq!(db.consecutive_failures, 0);
}

#[tokio::test]
async fn test_slow_success_is_degraded() {
    let probe = Arc::new(ScriptedProbe::new());
    probe.set_latency(Duration::from_millis(1500));
    let monitor = HealthMonitor::new(HealthMonitorConfig::default(), probe, EventBus::default());
    monitor.register("search", "search:9200");

    monitor.run_cycle().await;
    assert_eq!(
        monitor.service_health("search").unwrap().status,
        HealthStatus::Degraded
    );
}

#[tokio::test(start_paused = true)]
async fn test_pool_only_serves_available_instances() {
    let probe = Arc::new(ScriptedProbe::new());
    let config = RedundancyConfig {
        auto_failback: true,
        ..RedundancyConfig::default()
    };
    let manager = RedundancyManager::new(
        config,
        probe.clone(),
        Arc::new(ReportedReplicator::new()),
        EventBus::default(),
    );
    manager.create_pool("db", RedundancyMode::HotStandby, "db-a:5432", Some("db-b:5432".into()));
    manager.connect_all().await;

    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        for target in ["db-a:5432", "db-b:5432"] {
            if rng.gen_bool(0.3) {
                probe.set_down(target);
            } else {
                probe.set_up(target);
            }
        }
        manager.heartbeat_cycle().await;

        let status = manager.pool_status("db").unwrap();
        assert!(matches!(
            status.active_role,
            InstanceRole::Primary | InstanceRole::Secondary
        ));
        if let Some(active) = manager.get_connection("db").unwrap() {
            assert!(active.is_available());
            assert_eq!(active.id, status.active_instance_id);
        }
    }
}

#[test]
fn test_selection_never_returns_unserving_node() {
    let manager = HighAvailabilityManager::new(AvailabilityConfig::default(), EventBus::default());
    for i in 0..5 {
        let mut node = ServiceNode::new(format!("n{}", i), "api", "10.0.0.1", 8000 + i);
        if i == 0 {
            node = node.primary();
        }
        manager.register_node(node);
    }

    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..200 {
        let target = format!("n{}", rng.gen_range(0..5));
        let readings = NodeMetrics {
            cpu_usage: rng.gen_range(0.0..100.0),
            memory_usage: rng.gen_range(0.0..100.0),
            current_connections: rng.gen_range(0..1000),
            latency_ms: rng.gen_range(0.0..800.0),
        };
        manager.update_metrics("api", &target, readings).unwrap();
        manager.check_all();
        if rng.gen_bool(0.05) {
            manager.set_maintenance("api", &target, rng.gen_bool(0.5)).unwrap();
        }

        if let Some(node) = manager.get_healthy_node("api").unwrap() {
            assert!(matches!(node.status, NodeStatus::Healthy | NodeStatus::Degraded));
        }
        let status = manager.service_status("api").unwrap();
        assert!(status.nodes.iter().filter(|n| n.is_primary).count() <= 1);
    }
}

#[test]
fn test_weighted_selection_tracks_weights() {
    let config = AvailabilityConfig {
        algorithm: LoadBalancingAlgorithm::WeightedRoundRobin,
        ..AvailabilityConfig::default()
    };
    let manager = HighAvailabilityManager::new(config, EventBus::default());
    manager.register_node(ServiceNode::new("heavy", "api", "10.0.0.1", 8080).with_weight(7));
    manager.register_node(ServiceNode::new("light", "api", "10.0.0.2", 8080).with_weight(3));

    let draws = 10_000;
    let heavy = (0..draws)
        .filter(|_| manager.get_healthy_node("api").unwrap().unwrap().id == "heavy")
        .count();
    let share = heavy as f64 / draws as f64;
    assert!((0.67..=0.73).contains(&share), "heavy share {}", share);
}

#[tokio::test(start_paused = true)]
async fn test_region_readiness_bounded_and_single_primary() {
    let replicator = Arc::new(ReportedReplicator::new());
    let engine = Arc::new(MultiRegionEngine::new(
        RegionConfig::default(),
        Arc::new(ScriptedProbe::new()),
        replicator.clone(),
        EventBus::default(),
    ));
    engine.register_region(Region::new("us-east", "us-east:443", true));
    engine.register_region(Region::new("us-west", "us-west:443", false));
    engine.register_region(Region::new("eu-central", "eu-central:443", false));

    let mut rng = StdRng::seed_from_u64(3);
    for round in 0..30 {
        let primary = engine.primary_region().unwrap().id;
        let standby = ["us-east", "us-west", "eu-central"]
            .into_iter()
            .find(|id| *id != primary)
            .unwrap();

        let heartbeat = if rng.gen_bool(0.7) {
            RegionHeartbeat::success(standby, 12.0)
        } else {
            RegionHeartbeat::failure(standby, "timeout")
        };
        engine.record_heartbeat(heartbeat).await.unwrap();
        engine
            .record_heartbeat(RegionHeartbeat::success(primary.as_str(), 8.0))
            .await
            .unwrap();

        replicator.report_lag(&primary, standby, Duration::from_millis(rng.gen_range(0..20_000)));
        engine.check_sync_status(&primary, standby).await.unwrap();

        let readiness = engine.failover_readiness();
        assert!((0.0..=1.0).contains(&readiness.score));

        if round % 10 == 9 {
            let target = engine
                .regions()
                .into_iter()
                .find(|r| !r.is_primary && r.status.can_take_over())
                .map(|r| r.id);
            if let Some(target) = target {
                let outcome = engine.execute_failover(&primary, &target, true).await.unwrap();
                assert_eq!(outcome.to, target);
            }
        }

        assert_eq!(engine.regions().iter().filter(|r| r.is_primary).count(), 1);
    }
}
