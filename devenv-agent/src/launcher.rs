//! Agent launch and readiness polling.
//!
//! A launch submits the agent's startup script to the machine and then polls
//! the agent's health endpoint with a constant delay until it answers 200 or
//! the start budget is spent. Transport errors during a poll only mean "not
//! ready yet". Cancellation stops the launch at the next suspension point.

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::descriptor::{AgentDescriptor, MachineHandle};
use crate::error::{AgentError, Result};
use crate::exec::{HealthPinger, MachineExecutor};
use crate::ping::create_ping_request;
use crate::state::{Cancellation, LaunchState};

const HTTP_OK: u16 = 200;

#[derive(Clone)]
pub struct AgentLauncher {
    executor: Arc<dyn MachineExecutor>,
    pinger: Arc<dyn HealthPinger>,
}

impl AgentLauncher {
    pub fn new(executor: Arc<dyn MachineExecutor>, pinger: Arc<dyn HealthPinger>) -> Self {
        Self { executor, pinger }
    }

    /// Launch `agent` in `machine` and wait until it is ready.
    pub async fn launch(
        &self,
        agent: &AgentDescriptor,
        machine: &MachineHandle,
        cancellation: &Cancellation,
    ) -> Result<()> {
        let (state, _) = watch::channel(LaunchState::NotStarted);
        self.launch_observed(agent, machine, cancellation, &state)
            .await
    }

    /// Like [`AgentLauncher::launch`], publishing every transition on `state`.
    pub async fn launch_observed(
        &self,
        agent: &AgentDescriptor,
        machine: &MachineHandle,
        cancellation: &Cancellation,
        state: &watch::Sender<LaunchState>,
    ) -> Result<()> {
        let result = self.run(agent, machine, cancellation, state).await;
        let terminal = match &result {
            Ok(()) => LaunchState::Ready,
            Err(AgentError::TimedOut { .. }) => LaunchState::TimedOut,
            Err(_) => LaunchState::LaunchFailed,
        };
        state.send_replace(terminal);

        match &result {
            Ok(()) => info!(agent = %agent.id, machine = %machine.name, "agent is ready"),
            Err(e) => warn!(agent = %agent.id, machine = %machine.name, "agent launch ended: {e}"),
        }
        result
    }

    async fn run(
        &self,
        agent: &AgentDescriptor,
        machine: &MachineHandle,
        cancellation: &Cancellation,
        state: &watch::Sender<LaunchState>,
    ) -> Result<()> {
        agent.validate()?;
        let request = create_ping_request(agent, machine)
            .map_err(|e| AgentError::launch_failed(&agent.id, e))?;
        let interrupted = || AgentError::Interrupted {
            agent: agent.id.clone(),
        };

        state.send_replace(LaunchState::Starting);
        let script = agent.startup_script();
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Err(interrupted()),
            submitted = self.executor.exec(machine, &script) => {
                submitted.map_err(|e| AgentError::launch_failed(&agent.id, e))?;
            }
        }

        state.send_replace(LaunchState::Polling);
        let max_duration = agent.max_start_duration();
        let poll_delay = agent.poll_delay();
        let start = Instant::now();
        let deadline = start + max_duration;
        let mut attempt = 0u32;

        while start.elapsed() < max_duration {
            attempt += 1;
            let outcome = tokio::select! {
                biased;
                _ = cancellation.cancelled() => return Err(interrupted()),
                _ = sleep_until(deadline) => {
                    debug!(agent = %agent.id, attempt, "health check still pending at deadline");
                    break;
                }
                outcome = self.pinger.ping(&request) => outcome,
            };

            match outcome {
                Ok(HTTP_OK) => {
                    debug!(agent = %agent.id, attempt, elapsed_ms = start.elapsed().as_millis() as u64, "health check passed");
                    return Ok(());
                }
                Ok(status) => debug!(agent = %agent.id, attempt, status, "agent not ready"),
                Err(e) => debug!(agent = %agent.id, attempt, "health check failed: {e:#}"),
            }

            tokio::select! {
                biased;
                _ = cancellation.cancelled() => return Err(interrupted()),
                _ = sleep(poll_delay) => {}
            }
        }

        Err(AgentError::TimedOut {
            agent: agent.id.clone(),
            message: agent.timeout_message(),
        })
    }

    /// Run a launch on its own task.
    pub fn spawn(&self, agent: AgentDescriptor, machine: MachineHandle) -> LaunchHandle {
        self.spawn_with(agent, machine, Cancellation::new())
    }

    /// Like [`AgentLauncher::spawn`], stopping when `cancellation` fires.
    pub fn spawn_with(
        &self,
        agent: AgentDescriptor,
        machine: MachineHandle,
        cancellation: Cancellation,
    ) -> LaunchHandle {
        let (tx, rx) = watch::channel(LaunchState::NotStarted);
        let launcher = self.clone();
        let token = cancellation.clone();
        let agent_id = agent.id.clone();

        let task = tokio::spawn(async move {
            launcher
                .launch_observed(&agent, &machine, &token, &tx)
                .await
        });

        LaunchHandle {
            agent: agent_id,
            state: rx,
            cancellation,
            task,
        }
    }

    /// Launch every (agent, machine) pair concurrently. Outcomes are keyed by
    /// machine name and agent id, in input order.
    pub async fn launch_all(
        &self,
        launches: Vec<(AgentDescriptor, MachineHandle)>,
        cancellation: &Cancellation,
    ) -> IndexMap<(String, String), Result<()>> {
        let handles: Vec<_> = launches
            .into_iter()
            .map(|(agent, machine)| {
                let key = (machine.name.clone(), agent.id.clone());
                (key, self.spawn_with(agent, machine, cancellation.clone()))
            })
            .collect();

        let mut outcomes = IndexMap::new();
        for (key, handle) in handles {
            outcomes.insert(key, handle.wait().await);
        }
        outcomes
    }
}

/// A launch running on its own task.
pub struct LaunchHandle {
    agent: String,
    state: watch::Receiver<LaunchState>,
    cancellation: Cancellation,
    task: JoinHandle<Result<()>>,
}

impl LaunchHandle {
    pub fn state(&self) -> LaunchState {
        *self.state.borrow()
    }

    /// Receiver for following state transitions.
    pub fn subscribe(&self) -> watch::Receiver<LaunchState> {
        self.state.clone()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub async fn wait(self) -> Result<()> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(AgentError::launch_failed(&self.agent, e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::ping::PingRequest;

    #[derive(Default)]
    struct RecordingExecutor {
        scripts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait::async_trait]
    impl MachineExecutor for RecordingExecutor {
        async fn exec(&self, machine: &MachineHandle, script: &str) -> anyhow::Result<()> {
            self.scripts
                .lock()
                .unwrap()
                .push((machine.container.clone(), script.to_string()));
            Ok(())
        }
    }

    struct FailingExecutor;

    #[async_trait::async_trait]
    impl MachineExecutor for FailingExecutor {
        async fn exec(&self, _machine: &MachineHandle, _script: &str) -> anyhow::Result<()> {
            anyhow::bail!("container is gone")
        }
    }

    /// Answers 200 from the given attempt on; earlier attempts alternate
    /// between a 503 and a transport error.
    struct ReadyAfter {
        attempts: AtomicU32,
        ready_on: Option<u32>,
    }

    impl ReadyAfter {
        fn attempt(ready_on: u32) -> Self {
            Self {
                attempts: AtomicU32::new(0),
                ready_on: Some(ready_on),
            }
        }

        fn never() -> Self {
            Self {
                attempts: AtomicU32::new(0),
                ready_on: None,
            }
        }
    }

    #[async_trait::async_trait]
    impl HealthPinger for ReadyAfter {
        async fn ping(&self, _request: &PingRequest) -> anyhow::Result<u16> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            match self.ready_on {
                Some(ready_on) if attempt >= ready_on => Ok(200),
                _ if attempt % 2 == 0 => anyhow::bail!("connection refused"),
                _ => Ok(503),
            }
        }
    }

    fn agent(max_ms: u64, poll_ms: u64) -> AgentDescriptor {
        let mut agent = AgentDescriptor::new("ws-agent", "/agent/start.sh", "wsagent");
        agent.script = "export AGENT_HOME=/agent".into();
        agent.max_start_duration_ms = Some(max_ms);
        agent.poll_delay_ms = Some(poll_ms);
        agent.timeout_message = Some("Workspace agent is not responding".into());
        agent
    }

    fn machine() -> MachineHandle {
        MachineHandle::new("machine-1", "dev", "dev-container")
            .with_server("wsagent", "http://localhost:4401/api")
    }

    #[tokio::test]
    async fn test_ready_on_third_attempt() {
        let executor = Arc::new(RecordingExecutor::default());
        let pinger = Arc::new(ReadyAfter::attempt(3));
        let launcher = AgentLauncher::new(executor.clone(), pinger.clone());

        let started = std::time::Instant::now();
        launcher
            .launch(&agent(5_000, 10), &machine(), &Cancellation::new())
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(20), "elapsed {elapsed:?}");
        assert!(elapsed <= Duration::from_millis(5_000), "elapsed {elapsed:?}");
        assert_eq!(pinger.attempts.load(Ordering::SeqCst), 3);

        let scripts = executor.scripts.lock().unwrap();
        assert_eq!(
            scripts.as_slice(),
            &[(
                "dev-container".to_string(),
                "export AGENT_HOME=/agent\n/agent/start.sh".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_times_out_no_earlier_than_budget() {
        let launcher = AgentLauncher::new(
            Arc::new(RecordingExecutor::default()),
            Arc::new(ReadyAfter::never()),
        );
        let (state, observer) = watch::channel(LaunchState::NotStarted);

        let started = std::time::Instant::now();
        let err = launcher
            .launch_observed(&agent(150, 20), &machine(), &Cancellation::new(), &state)
            .await
            .unwrap_err();

        assert!(started.elapsed() >= Duration::from_millis(150));
        match err {
            AgentError::TimedOut { message, .. } => {
                assert_eq!(message, "Workspace agent is not responding")
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(*observer.borrow(), LaunchState::TimedOut);
    }

    struct HangingPinger;

    #[async_trait::async_trait]
    impl HealthPinger for HangingPinger {
        async fn ping(&self, _request: &PingRequest) -> anyhow::Result<u16> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_unanswered_health_check_is_bounded_by_budget() {
        let launcher = AgentLauncher::new(
            Arc::new(RecordingExecutor::default()),
            Arc::new(HangingPinger),
        );
        let (state, observer) = watch::channel(LaunchState::NotStarted);

        let started = std::time::Instant::now();
        let result = tokio::time::timeout(
            Duration::from_secs(2),
            launcher.launch_observed(&agent(100, 10), &machine(), &Cancellation::new(), &state),
        )
        .await
        .expect("launch should stop once its start budget is spent");

        assert!(started.elapsed() >= Duration::from_millis(100));
        assert!(matches!(result, Err(AgentError::TimedOut { .. })));
        assert_eq!(*observer.borrow(), LaunchState::TimedOut);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_polling() {
        let launcher = AgentLauncher::new(
            Arc::new(RecordingExecutor::default()),
            Arc::new(ReadyAfter::never()),
        );
        let handle = launcher.spawn(agent(60_000, 1_000), machine());
        let mut states = handle.subscribe();

        states
            .wait_for(|state| *state == LaunchState::Polling)
            .await
            .unwrap();
        handle.cancel();

        let started = std::time::Instant::now();
        let result = tokio::time::timeout(Duration::from_secs(2), async {
            let mut states = handle.subscribe();
            states.wait_for(|state| state.is_terminal()).await.map(|s| *s)
        })
        .await
        .expect("cancellation should stop the launch promptly")
        .unwrap();
        assert!(started.elapsed() < Duration::from_millis(1_000));
        assert_eq!(result, LaunchState::LaunchFailed);

        assert!(matches!(
            handle.wait().await,
            Err(AgentError::Interrupted { .. })
        ));
    }

    #[tokio::test]
    async fn test_exec_and_request_failures_are_launch_failures() {
        let launcher = AgentLauncher::new(Arc::new(FailingExecutor), Arc::new(ReadyAfter::attempt(1)));
        let err = launcher
            .launch(&agent(1_000, 10), &machine(), &Cancellation::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::LaunchFailed { .. }));

        let launcher = AgentLauncher::new(
            Arc::new(RecordingExecutor::default()),
            Arc::new(ReadyAfter::attempt(1)),
        );
        let no_server = MachineHandle::new("machine-1", "dev", "dev-container");
        let (state, observer) = watch::channel(LaunchState::NotStarted);
        let err = launcher
            .launch_observed(&agent(1_000, 10), &no_server, &Cancellation::new(), &state)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::LaunchFailed { .. }));
        assert_eq!(*observer.borrow(), LaunchState::LaunchFailed);
    }
}
