// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use canis_fabric_core::application::scheduler::{Scheduler, SchedulerError, SchedulerHandler};
use canis_fabric_core::domain::agent::{Agent, AgentStatus};
use canis_fabric_core::domain::repository::AgentRepository;
use canis_fabric_core::domain::resource::{DeletedObject, ResourceEventHandler};
use canis_fabric_core::domain::runtime::{
    Executor, RuntimeContext, RuntimeError, RuntimeEvent, RuntimeStatus, Watcher,
};
use canis_fabric_core::infrastructure::repositories::InMemoryAgentRepository;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Executor that replays a fixed script of `(delay, status)` on every watch.
struct ScriptedExecutor {
    script: Vec<(Duration, RuntimeStatus)>,
    launched: Mutex<Vec<String>>,
    stopped: Mutex<Vec<String>>,
    watches: Mutex<Vec<CancellationToken>>,
}

impl ScriptedExecutor {
    fn new(script: Vec<(Duration, RuntimeStatus)>) -> Arc<Self> {
        Arc::new(Self {
            script,
            launched: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
            watches: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn launch_agent(&self, agent_id: &str) -> Result<String, RuntimeError> {
        let mut launched = self.launched.lock();
        let pid = format!("{agent_id}-{}", launched.len() + 1);
        launched.push(pid.clone());
        Ok(pid)
    }

    async fn shutdown_agent(&self, pid: &str) -> Result<(), RuntimeError> {
        self.stopped.lock().push(pid.to_string());
        Ok(())
    }

    async fn status(&self, pid: &str) -> Result<RuntimeContext, RuntimeError> {
        Ok(RuntimeContext::new(pid, RuntimeStatus::Running))
    }

    async fn watch(&self, pid: &str) -> Result<Watcher, RuntimeError> {
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        self.watches.lock().push(cancel.clone());

        let script = self.script.clone();
        let pid = pid.to_string();
        let token = cancel.clone();
        tokio::spawn(async move {
            for (delay, status) in script {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                let event = RuntimeEvent {
                    runtime_context: RuntimeContext::new(pid.clone(), status),
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            // Hold the channel open until stopped
            token.cancelled().await;
        });

        Ok(Watcher::new(rx, cancel))
    }
}

async fn setup(
    script: Vec<(Duration, RuntimeStatus)>,
) -> (Arc<Scheduler>, Arc<InMemoryAgentRepository>, Arc<ScriptedExecutor>) {
    let store = Arc::new(InMemoryAgentRepository::new());
    store.save(&Agent::new("a1", "issuer")).await.unwrap();
    let executor = ScriptedExecutor::new(script);
    let scheduler = Arc::new(Scheduler::new(store.clone(), executor.clone()));
    (scheduler, store, executor)
}

#[tokio::test(start_paused = true)]
async fn test_launch_reaches_running() {
    let (scheduler, store, _) = setup(vec![
        (Duration::from_secs(1), RuntimeStatus::Starting),
        (Duration::from_secs(4), RuntimeStatus::Running),
    ])
    .await;

    let started = Instant::now();
    let outcome = scheduler.launch_and_wait("a1").await.unwrap();

    assert_eq!(outcome.status, AgentStatus::Running);
    assert!(!outcome.timed_out);
    assert!(started.elapsed() <= Duration::from_secs(10));

    let agent = store.find_by_id("a1").await.unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Running);
    assert!(!agent.pid.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_launch_times_out_with_last_status() {
    let (scheduler, store, executor) =
        setup(vec![(Duration::from_secs(1), RuntimeStatus::Starting)]).await;

    let started = Instant::now();
    let outcome = scheduler.launch_and_wait("a1").await.unwrap();

    assert!(outcome.timed_out);
    assert_eq!(outcome.status, AgentStatus::Starting);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(60) && elapsed < Duration::from_secs(61));
    assert!(executor.watches.lock().iter().all(|w| w.is_cancelled()));

    let agent = store.find_by_id("a1").await.unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Starting);
}

#[tokio::test(start_paused = true)]
async fn test_launch_window_is_configurable() {
    let (_, store, executor) = setup(Vec::new()).await;
    let scheduler = Scheduler::new(store, executor).with_launch_timeout(Duration::from_secs(5));

    let started = Instant::now();
    let outcome = scheduler.launch_and_wait("a1").await.unwrap();
    assert!(outcome.timed_out);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_launch_error_is_recorded_and_returned() {
    let (scheduler, store, _) =
        setup(vec![(Duration::from_secs(2), RuntimeStatus::Error)]).await;

    let err = scheduler.launch_and_wait("a1").await.unwrap_err();
    assert!(matches!(err, SchedulerError::AgentFailed { .. }));

    let agent = store.find_by_id("a1").await.unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Error);
}

#[tokio::test(start_paused = true)]
async fn test_launch_completed_is_terminated() {
    let (scheduler, _, _) =
        setup(vec![(Duration::from_secs(2), RuntimeStatus::Completed)]).await;

    let outcome = scheduler.launch_and_wait("a1").await.unwrap();
    assert_eq!(outcome.status, AgentStatus::Terminated);
}

#[tokio::test]
async fn test_delete_of_agent_not_running_fails() {
    let (scheduler, _, executor) = setup(Vec::new()).await;
    let handler = SchedulerHandler::new(scheduler);

    let err = handler
        .on_delete(&DeletedObject::Known(Agent::new("a1", "issuer")))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("is not currently running"));
    assert!(executor.stopped.lock().is_empty());
}

#[tokio::test]
async fn test_pid_set_on_launch_and_cleared_on_shutdown() {
    let (scheduler, store, executor) = setup(Vec::new()).await;

    let launched = scheduler.launch_agent("a1").await.unwrap();
    let agent = store.find_by_id("a1").await.unwrap().unwrap();
    assert_eq!(agent.pid, launched.pid);

    // A second launch must not produce a second pid
    assert!(matches!(
        scheduler.launch_agent("a1").await,
        Err(SchedulerError::AlreadyRunning { .. })
    ));
    assert_eq!(executor.launched.lock().len(), 1);

    scheduler.shutdown_agent("a1", None).await.unwrap();
    let agent = store.find_by_id("a1").await.unwrap().unwrap();
    assert!(agent.pid.is_empty());
    assert_eq!(agent.status, AgentStatus::Terminated);
    assert_eq!(*executor.stopped.lock(), vec![launched.pid]);

    assert!(matches!(
        scheduler.shutdown_agent("a1", None).await,
        Err(SchedulerError::NotRunning(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_handler_add_launches_and_settles_in_background() {
    let (scheduler, store, executor) =
        setup(vec![(Duration::from_secs(3), RuntimeStatus::Running)]).await;
    let handler = SchedulerHandler::new(scheduler);
    let agent = Agent::new("a1", "issuer");

    handler.on_add(&agent).await.unwrap();
    assert!(handler.is_launching("a1"));

    // Replayed add while the launch is in flight
    handler.on_add(&agent).await.unwrap();
    assert_eq!(executor.launched.lock().len(), 1);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!handler.is_launching("a1"));
    let stored = store.find_by_id("a1").await.unwrap().unwrap();
    assert_eq!(stored.status, AgentStatus::Running);

    // Relist after settling: the agent already has a pid
    handler.on_add(&stored).await.unwrap();
    assert_eq!(executor.launched.lock().len(), 1);
}

#[tokio::test]
async fn test_handler_delete_uses_final_state_for_removed_agent() {
    let store = Arc::new(InMemoryAgentRepository::new());
    let executor = ScriptedExecutor::new(Vec::new());
    let handler = SchedulerHandler::new(Arc::new(Scheduler::new(store, executor.clone())));

    let mut last = Agent::new("a1", "issuer");
    last.mark_launched("a1-7");
    handler.on_delete(&DeletedObject::Known(last)).await.unwrap();

    assert_eq!(*executor.stopped.lock(), vec!["a1-7".to_string()]);
}

/// Executor whose launch answers after `launch_delay` (never when `None`)
/// and whose watch never answers.
struct StallingExecutor {
    launch_delay: Option<Duration>,
    launches: AtomicUsize,
}

impl StallingExecutor {
    fn new(launch_delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            launch_delay,
            launches: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Executor for StallingExecutor {
    async fn launch_agent(&self, agent_id: &str) -> Result<String, RuntimeError> {
        match self.launch_delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => std::future::pending::<()>().await,
        }
        let n = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("{agent_id}-{n}"))
    }

    async fn shutdown_agent(&self, _pid: &str) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn status(&self, pid: &str) -> Result<RuntimeContext, RuntimeError> {
        Ok(RuntimeContext::new(pid, RuntimeStatus::Running))
    }

    async fn watch(&self, _pid: &str) -> Result<Watcher, RuntimeError> {
        std::future::pending().await
    }
}

async fn stalling_setup(
    launch_delay: Option<Duration>,
) -> (Arc<Scheduler>, Arc<InMemoryAgentRepository>, Arc<StallingExecutor>) {
    let store = Arc::new(InMemoryAgentRepository::new());
    store.save(&Agent::new("a1", "issuer")).await.unwrap();
    let executor = StallingExecutor::new(launch_delay);
    let scheduler = Arc::new(Scheduler::new(store.clone(), executor.clone()));
    (scheduler, store, executor)
}

#[tokio::test(start_paused = true)]
async fn test_launch_returns_within_window_when_watch_hangs() {
    let (scheduler, store, _) = stalling_setup(Some(Duration::ZERO)).await;

    let started = Instant::now();
    let outcome = tokio::time::timeout(Duration::from_secs(120), scheduler.launch_and_wait("a1"))
        .await
        .expect("launch exceeded its window")
        .unwrap();

    assert!(outcome.timed_out);
    assert_eq!(outcome.status, AgentStatus::Starting);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(60) && elapsed < Duration::from_secs(61));

    let agent = store.find_by_id("a1").await.unwrap().unwrap();
    assert!(!agent.pid.is_empty());
    assert_eq!(agent.status, AgentStatus::Starting);
}

#[tokio::test(start_paused = true)]
async fn test_launch_returns_within_window_when_executor_launch_hangs() {
    let (scheduler, store, _) = stalling_setup(None).await;

    let started = Instant::now();
    let outcome = tokio::time::timeout(Duration::from_secs(120), scheduler.launch_and_wait("a1"))
        .await
        .expect("launch exceeded its window")
        .unwrap();

    assert!(outcome.timed_out);
    assert_eq!(outcome.status, AgentStatus::Starting);
    assert!(started.elapsed() < Duration::from_secs(61));
    assert!(store.find_by_id("a1").await.unwrap().unwrap().pid.is_empty());

    // The id is free again once the window has passed
    assert!(matches!(
        scheduler.launch_agent("a1").await,
        Err(SchedulerError::LaunchTimeout(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_launches_start_one_instance() {
    let (scheduler, store, executor) = stalling_setup(Some(Duration::from_millis(10))).await;

    let (first, second) = tokio::join!(scheduler.launch_agent("a1"), scheduler.launch_agent("a1"));

    let (winner, loser) = match (first, second) {
        (Ok(launched), Err(e)) | (Err(e), Ok(launched)) => (launched, e),
        other => panic!("expected exactly one launch, got {other:?}"),
    };
    assert!(matches!(loser, SchedulerError::LaunchInProgress(_)));
    assert_eq!(executor.launches.load(Ordering::SeqCst), 1);

    let agent = store.find_by_id("a1").await.unwrap().unwrap();
    assert_eq!(agent.pid, winner.pid);

    assert!(matches!(
        scheduler.launch_agent("a1").await,
        Err(SchedulerError::AlreadyRunning { .. })
    ));
    assert_eq!(executor.launches.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_handler_add_registers_agent_unknown_to_local_store() {
    let store = Arc::new(InMemoryAgentRepository::new());
    let executor = ScriptedExecutor::new(vec![(Duration::from_secs(1), RuntimeStatus::Running)]);
    let handler = SchedulerHandler::new(Arc::new(Scheduler::new(store.clone(), executor.clone())));

    handler.on_add(&Agent::new("a9", "holder")).await.unwrap();
    assert_eq!(executor.launched.lock().len(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let stored = store.find_by_id("a9").await.unwrap().unwrap();
    assert_eq!(stored.name, "holder");
    assert_eq!(stored.status, AgentStatus::Running);
    assert!(!stored.pid.is_empty());
}
