//! End-to-end tuning passes: cgroup tree plus ECS endpoint.

use std::time::{Duration, Instant};

use hyper::StatusCode;
use tokio_util::sync::CancellationToken;

use cgroup_runtime::config::TuningConfig;
use cgroup_runtime::runtime::{MemoryCeiling, RuntimeControl};
use cgroup_runtime::tuning::CpuSource;
use cgroup_runtime::{CgroupRuntime, State, TuningReport};

use crate::helpers::{container_json, CgroupTree, FakeRuntime, MockEcs, Reply};

const TASK_JSON: &str = r#"{"TaskARN":"arn","Limits":{"CPU":4096},"Containers":[]}"#;

fn component(
    tree: &CgroupTree,
    mock: Option<&MockEcs>,
    config: TuningConfig,
) -> CgroupRuntime<FakeRuntime> {
    CgroupRuntime::with_parts(
        config,
        tree.reader(),
        mock.map(MockEcs::uri),
        FakeRuntime::new(32),
    )
}

fn config(ratio: f64) -> TuningConfig {
    TuningConfig {
        memory_ratio: ratio,
        metadata_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_quota_wins_over_metadata() {
    let tree = CgroupTree::new("100000 8000\n", "134217728\n");
    let mock = MockEcs::start(
        Reply::json(container_json("app", 1024.0)),
        Reply::json(TASK_JSON),
    )
    .await;
    let component = component(&tree, Some(&mock), config(0.9));

    let report = component.start(&CancellationToken::new()).await.unwrap();

    let (parallelism, source) = report.parallelism.unwrap();
    assert_eq!(parallelism.value, 12);
    assert_eq!(source, CpuSource::CgroupQuota);
    assert_eq!(report.memory_ceiling.unwrap().value, 120795955);
    assert_eq!(mock.container_hits(), 0);
}

#[tokio::test]
async fn test_unlimited_quota_uses_container_units() {
    let tree = CgroupTree::new("max 100000\n", "max\n");
    let mock = MockEcs::start(
        Reply::json(container_json("app", 2048.0)),
        Reply::json(TASK_JSON),
    )
    .await;
    let component = component(&tree, Some(&mock), config(0.9));

    let report = component.start(&CancellationToken::new()).await.unwrap();

    let (parallelism, source) = report.parallelism.unwrap();
    assert_eq!(parallelism.value, 2);
    assert_eq!(parallelism.previous, 32);
    assert_eq!(source, CpuSource::EcsContainer);
    assert!(report.memory_ceiling.is_none());
    assert_eq!(
        component.applier().runtime().memory_ceiling(),
        MemoryCeiling::NoLimit
    );
}

#[tokio::test]
async fn test_unlimited_quota_uses_task_units() {
    let tree = CgroupTree::new("max 100000\n", "max\n");
    let mock = MockEcs::start(
        Reply::json(r#"{"DockerId":"app","Name":"app"}"#),
        Reply::json(TASK_JSON),
    )
    .await;
    let component = component(&tree, Some(&mock), config(0.9));

    let report = component.start(&CancellationToken::new()).await.unwrap();

    let (parallelism, source) = report.parallelism.unwrap();
    assert_eq!(parallelism.value, 4);
    assert_eq!(source, CpuSource::EcsTask);
}

#[tokio::test]
async fn test_vcpu_count_is_not_units() {
    // "CPU": 2 is two units, not two vCPUs
    let tree = CgroupTree::new("max 100000\n", "max\n");
    let mock = MockEcs::start(
        Reply::json(container_json("app", 2.0)),
        Reply::json(TASK_JSON),
    )
    .await;
    let component = component(&tree, Some(&mock), config(0.9));

    let report = component.start(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.parallelism.unwrap().0.value, 1);
}

#[tokio::test]
async fn test_metadata_failure_leaves_parallelism() {
    let tree = CgroupTree::new("max 100000\n", "134217728\n");
    let mock = MockEcs::start(
        Reply::status(StatusCode::INTERNAL_SERVER_ERROR),
        Reply::json(TASK_JSON),
    )
    .await;
    let component = component(&tree, Some(&mock), config(0.5));

    let report = component.start(&CancellationToken::new()).await.unwrap();

    assert_eq!(component.state(), State::Started);
    assert!(report.parallelism.is_none());
    assert_eq!(component.applier().runtime().parallelism(), 32);
    // Memory is tuned regardless
    assert_eq!(report.memory_ceiling.unwrap().value, 67108864);
}

#[tokio::test]
async fn test_not_on_ecs() {
    let tree = CgroupTree::new("max 100000\n", "134217728\n");
    let component = component(&tree, None, config(0.1));

    let report = component.start(&CancellationToken::new()).await.unwrap();

    assert!(report.parallelism.is_none());
    assert_eq!(report.memory_ceiling.unwrap().value, 13421772);
}

#[tokio::test]
async fn test_cancelled_start_still_tunes_memory() {
    let tree = CgroupTree::new("max 100000\n", "1048576\n");
    let mock = MockEcs::start(
        Reply::json(container_json("app", 2048.0)).delayed(Duration::from_secs(5)),
        Reply::json(TASK_JSON),
    )
    .await;
    let component = component(&tree, Some(&mock), config(0.5));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let report = component.start(&cancel).await.unwrap();

    assert!(report.parallelism.is_none());
    assert_eq!(report.memory_ceiling.unwrap().value, 524288);
}

#[tokio::test]
async fn test_shutdown_keeps_applied_values() {
    let tree = CgroupTree::new("max 100000\n", "max\n");
    let mock = MockEcs::start(
        Reply::json(container_json("app", 3072.0)),
        Reply::json(TASK_JSON),
    )
    .await;
    let component = component(&tree, Some(&mock), config(0.9));

    component.start(&CancellationToken::new()).await.unwrap();
    component.shutdown().await.unwrap();

    assert_eq!(component.state(), State::Stopped);
    assert_eq!(component.applier().runtime().parallelism(), 3);
    assert!(component.reevaluate().await.is_err());
}

#[tokio::test]
async fn test_shutdown_during_startup_pass() {
    let tree = CgroupTree::new("max 100000\n", "134217728\n");
    let mock = MockEcs::start(
        Reply::json(container_json("app", 2048.0)).delayed(Duration::from_millis(800)),
        Reply::json(TASK_JSON),
    )
    .await;
    let component = component(&tree, Some(&mock), config(0.5));

    let cancel = CancellationToken::new();
    let started = Instant::now();
    let (report, stopped_at) = tokio::join!(component.start(&cancel), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        component.shutdown().await.unwrap();
        started.elapsed()
    });

    // The metadata request was aborted rather than awaited
    assert!(stopped_at < Duration::from_millis(700));
    assert_eq!(report.unwrap(), TuningReport::default());
    assert_eq!(component.state(), State::Stopped);

    let runtime = component.applier().runtime();
    assert_eq!(runtime.parallelism(), 32);
    assert_eq!(runtime.memory_ceiling(), MemoryCeiling::NoLimit);
}

#[tokio::test]
async fn test_reevaluation_follows_limit_changes() {
    let tree = CgroupTree::new("200000 100000\n", "4096\n");
    let component = component(
        &tree,
        None,
        TuningConfig {
            memory_ratio: 0.5,
            reevaluate_interval: Some(Duration::from_millis(20)),
            ..Default::default()
        },
    );

    component.start(&CancellationToken::new()).await.unwrap();
    assert!(component.spawn_reevaluation());

    tree.write("cpu.max", "400000 100000\n");
    tree.write("memory.max", "8192\n");

    let runtime = component.applier().runtime();
    for _ in 0..100 {
        if runtime.parallelism() == 4 && runtime.memory_ceiling() == MemoryCeiling::Bytes(4096) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(runtime.parallelism(), 4);
    assert_eq!(runtime.memory_ceiling(), MemoryCeiling::Bytes(4096));

    component.shutdown().await.unwrap();
}
