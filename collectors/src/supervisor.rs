use eyre::{
    eyre,
    Report,
    Result,
};
use futures::FutureExt as _;
use mcc_config::Domain;
use mcc_services::ClientError;
use std::{
    future::Future,
    panic::AssertUnwindSafe,
    pin::Pin,
    time::Duration,
};
use tokio::{
    sync::watch,
    task::JoinHandle,
};
use tokio_util::sync::{
    CancellationToken,
    DropGuard,
};

/// One domain's collection routine: gather from clients, publish to the hub.
///
/// Expected remote failures should resolve to empty payloads inside
/// `collect`. Whatever still escapes is logged by the [`Supervisor`] and the
/// cycle is skipped.
pub trait Collector: Send + Sync + 'static {
    fn domain(&self) -> Domain;

    fn collect(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Adapts a closure into a [`Collector`].
pub struct FnCollector<F> {
    domain: Domain,
    collect: F,
}

pub fn collector_fn<F, Fut>(domain: Domain, collect: F) -> FnCollector<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    FnCollector { domain, collect }
}

impl<F, Fut> Collector for FnCollector<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn domain(&self) -> Domain {
        self.domain
    }

    fn collect(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin((self.collect)())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum SupervisorState {
    Idle,
    Running,
    Sleeping,
    Stopped,
}

/// Result of one collection cycle as seen by the loop.
#[derive(Debug)]
pub enum CycleOutcome {
    Completed,
    Failed(Report),
    Cancelled,
}

/// Runs one collector forever at a fixed interval.
///
/// Failed cycles are logged and the schedule continues. Cancellation, either
/// through [`Supervisor::stop`], the parent token, or dropping the supervisor,
/// ends the loop at the next suspension point.
#[derive(Debug)]
pub struct Supervisor {
    domain: Domain,
    cancel: CancellationToken,
    state: watch::Receiver<SupervisorState>,
    state_tx: Option<watch::Sender<SupervisorState>>,
    task: Option<JoinHandle<()>>,
    _guard: DropGuard,
}

impl Supervisor {
    pub fn new(domain: Domain, parent: &CancellationToken) -> Self {
        let cancel = parent.child_token();
        let (state_tx, state) = watch::channel(SupervisorState::Idle);
        Self {
            domain,
            _guard: cancel.clone().drop_guard(),
            cancel,
            state,
            state_tx: Some(state_tx),
            task: None,
        }
    }

    /// Spawns the collection loop. A second call is ignored.
    pub fn start<C: Collector>(&mut self, collector: C, interval: Duration) {
        let Some(state_tx) = self.state_tx.take() else {
            warn!(domain = %self.domain, "Supervisor already started");
            return;
        };
        state_tx.send_replace(SupervisorState::Running);
        self.task = Some(tokio::spawn(run_loop(collector, interval, self.cancel.clone(), state_tx)));
        debug!(domain = %self.domain, ?interval, "Supervisor started");
    }

    pub fn spawn<C: Collector>(collector: C, interval: Duration, parent: &CancellationToken) -> Self {
        let mut supervisor = Self::new(collector.domain(), parent);
        supervisor.start(collector, interval);
        supervisor
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn state(&self) -> SupervisorState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SupervisorState> {
        self.state.clone()
    }

    /// Cancels the loop and waits until it has stopped.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(state_tx) = self.state_tx.take() {
            state_tx.send_replace(SupervisorState::Stopped);
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                error!(domain = %self.domain, "Supervisor task failed: {err}");
            }
        }
    }
}

async fn run_loop<C: Collector>(
    collector: C,
    interval: Duration,
    cancel: CancellationToken,
    state: watch::Sender<SupervisorState>,
) {
    let domain = collector.domain();
    loop {
        state.send_replace(SupervisorState::Running);
        match run_cycle(&collector, &cancel).await {
            CycleOutcome::Completed => trace!(%domain, "Collection cycle completed"),
            CycleOutcome::Failed(err) => error!(%domain, "Collection cycle failed: {err:?}"),
            CycleOutcome::Cancelled => break,
        }

        state.send_replace(SupervisorState::Sleeping);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    state.send_replace(SupervisorState::Stopped);
    debug!(%domain, "Supervisor stopped");
}

/// Runs `collect` once, racing it against cancellation. Panics count as
/// failures. A client cancellation inside the error only ends the cycle as
/// cancelled when `cancel` itself has fired.
pub async fn run_cycle<C: Collector + ?Sized>(collector: &C, cancel: &CancellationToken) -> CycleOutcome {
    let cycle = AssertUnwindSafe(collector.collect()).catch_unwind();
    tokio::select! {
        biased;
        _ = cancel.cancelled() => CycleOutcome::Cancelled,
        result = cycle => match result {
            Ok(Ok(())) => CycleOutcome::Completed,
            Ok(Err(err)) if cancel.is_cancelled() && is_cancellation(&err) => CycleOutcome::Cancelled,
            Ok(Err(err)) => CycleOutcome::Failed(err),
            Err(panic) => CycleOutcome::Failed(eyre!("Collector panicked: {}", panic_message(&*panic))),
        }
    }
}

fn is_cancellation(err: &Report) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<ClientError>().is_some_and(ClientError::is_cancelled))
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{
            AtomicUsize,
            Ordering,
        },
        Arc,
    };

    fn counting(calls: Arc<AtomicUsize>, fail_on: Option<usize>) -> impl Collector {
        collector_fn(Domain::Health, move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if Some(n) == fail_on {
                    eyre::bail!("cycle {n} blew up");
                }
                Ok(())
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn failed_cycle_does_not_stop_the_schedule() {
        let calls = Arc::new(AtomicUsize::new(0));
        let supervisor = Supervisor::spawn(
            counting(calls.clone(), Some(2)),
            Duration::from_secs(5),
            &CancellationToken::new(),
        );

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_ne!(supervisor.state(), SupervisorState::Stopped);

        supervisor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_further_cycles() {
        let calls = Arc::new(AtomicUsize::new(0));
        let supervisor = Supervisor::spawn(counting(calls.clone(), None), Duration::from_secs(1), &CancellationToken::new());
        let state = supervisor.subscribe_state();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        let seen = calls.load(Ordering::SeqCst);
        assert_eq!(seen, 3);

        supervisor.stop().await;
        assert_eq!(*state.borrow(), SupervisorState::Stopped);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_an_in_flight_cycle() {
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let collector = collector_fn(Domain::Downloads, {
            let started = started.clone();
            let finished = finished.clone();
            move || {
                let started = started.clone();
                let finished = finished.clone();
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }
        });
        let supervisor = Supervisor::spawn(collector, Duration::from_secs(1), &CancellationToken::new());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);

        supervisor.stop().await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cancellation_stops_the_loop() {
        let parent = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let supervisor = Supervisor::spawn(counting(calls.clone(), None), Duration::from_secs(1), &parent);
        let mut state = supervisor.subscribe_state();

        parent.cancel();
        state.wait_for(|s| *s == SupervisorState::Stopped).await.unwrap();
        assert_eq!(supervisor.domain(), Domain::Health);
    }

    #[tokio::test(start_paused = true)]
    async fn client_cancellation_without_stop_keeps_the_schedule() {
        let calls = Arc::new(AtomicUsize::new(0));
        let collector = collector_fn(Domain::Calendar, {
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    let err = ClientError::Cancelled {
                        service: mcc_config::ServiceName::Radarr,
                    };
                    Err::<(), _>(Report::new(err))
                }
            }
        });
        let supervisor = Supervisor::spawn(collector, Duration::from_secs(1), &CancellationToken::new());

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_ne!(supervisor.state(), SupervisorState::Stopped);
        supervisor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn state_subscription_taken_before_start_sees_updates() {
        let mut supervisor = Supervisor::new(Domain::Transcoding, &CancellationToken::new());
        let mut state = supervisor.subscribe_state();
        assert_eq!(*state.borrow(), SupervisorState::Idle);

        supervisor.start(counting(Arc::new(AtomicUsize::new(0)), None), Duration::from_secs(1));
        state.wait_for(|s| *s != SupervisorState::Idle).await.unwrap();

        supervisor.stop().await;
        assert_eq!(*state.borrow(), SupervisorState::Stopped);
    }

    #[tokio::test]
    async fn stopping_an_unstarted_supervisor_reports_stopped() {
        let supervisor = Supervisor::new(Domain::Streaming, &CancellationToken::new());
        let state = supervisor.subscribe_state();
        supervisor.stop().await;
        assert_eq!(*state.borrow(), SupervisorState::Stopped);
    }

    #[tokio::test]
    async fn panics_and_client_cancellation_are_classified() {
        let cancel = CancellationToken::new();

        let panicking = collector_fn(Domain::Calendar, || async {
            if true {
                panic!("boom");
            }
            Ok(())
        });
        match run_cycle(&panicking, &cancel).await {
            CycleOutcome::Failed(err) => assert!(err.to_string().contains("boom"), "{err}"),
            other => panic!("unexpected outcome {other:?}"),
        }

        let cancelled = collector_fn(Domain::Calendar, || async {
            let err = ClientError::Cancelled {
                service: mcc_config::ServiceName::Sonarr,
            };
            Err::<(), _>(Report::new(err).wrap_err("calendar poll"))
        });
        assert!(matches!(run_cycle(&cancelled, &cancel).await, CycleOutcome::Failed(_)));

        cancel.cancel();
        assert!(matches!(run_cycle(&cancelled, &cancel).await, CycleOutcome::Cancelled));
    }

    #[test]
    fn new_supervisor_is_idle() {
        let supervisor = Supervisor::new(Domain::Streaming, &CancellationToken::new());
        assert_eq!(supervisor.state(), SupervisorState::Idle);
    }
}
