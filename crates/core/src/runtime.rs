//! Pipeline runtime: wires the store, broker, gate and switch together
//! and owns the consumer loops.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::broker::MemoryBroker;
use crate::config::OrchestratorConfig;
use crate::control::PipelineController;
use crate::deposit::DepositStore;
use crate::gate::AdmissionGate;
use crate::jobs::{JobRegistry, JobSequencer};
use crate::notify::{EventHandle, Notifier};
use crate::ops::OperationRouter;
use crate::pipeline::{PipelineState, PipelineSwitch};
use crate::worker::{DispatchOutcome, JobDispatcher};

/// A fully wired pipeline instance.
///
/// Consumers are spawned by [`PipelineRuntime::start`] and run until the
/// switch reaches `Stopped`. While the switch is `Quieted` the operation
/// and job loops park without consuming; only the control loop keeps
/// reading, so an UNQUIET can still arrive.
pub struct PipelineRuntime {
    router: Arc<OperationRouter>,
    dispatcher: Arc<JobDispatcher>,
    controller: Arc<PipelineController>,
    switch: Arc<PipelineSwitch>,
    broker: MemoryBroker,
    config: OrchestratorConfig,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PipelineRuntime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn DepositStore>,
        broker: MemoryBroker,
        registry: Arc<JobRegistry>,
        sequencer: Arc<dyn JobSequencer>,
        notifier: Arc<dyn Notifier>,
        events: EventHandle,
        config: OrchestratorConfig,
    ) -> Self {
        let gate = Arc::new(AdmissionGate::new(config.max_concurrent_deposits));
        let switch = Arc::new(PipelineSwitch::new());
        let router = Arc::new(OperationRouter::new(
            Arc::clone(&store),
            Arc::clone(&gate),
            Arc::new(broker.clone()),
            sequencer,
            notifier,
            events,
            Duration::from_secs(config.cleanup_delay_secs),
        ));
        let dispatcher = Arc::new(JobDispatcher::new(
            Arc::clone(&store),
            gate,
            Arc::new(broker.clone()),
            registry,
            Arc::clone(&switch),
        ));
        let controller = Arc::new(PipelineController::new(
            store,
            Arc::clone(&router),
            Arc::clone(&switch),
        ));
        Self {
            router,
            dispatcher,
            controller,
            switch,
            broker,
            config,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn router(&self) -> Arc<OperationRouter> {
        Arc::clone(&self.router)
    }

    pub fn controller(&self) -> Arc<PipelineController> {
        Arc::clone(&self.controller)
    }

    pub fn switch(&self) -> Arc<PipelineSwitch> {
        Arc::clone(&self.switch)
    }

    pub fn broker(&self) -> MemoryBroker {
        self.broker.clone()
    }

    /// Spawns the consumer loops and opens the pipeline for consumption.
    pub async fn start(&self) {
        let mut tasks = self.tasks.lock().await;
        tasks.push(self.spawn_operation_loop());
        for worker in 0..self.config.job_workers.max(1) {
            tasks.push(self.spawn_job_loop(worker));
        }
        tasks.push(self.spawn_control_loop());
        self.switch.set_active();
        // Anything queued before a restart gets admitted right away.
        self.router.admit_queued(&self.config.system_username).await;
        info!(workers = self.config.job_workers, "pipeline started");
    }

    /// Stops consumption and waits for the loops to drain.
    pub async fn shutdown(&self) {
        if let Err(err) = self.switch.stop() {
            warn!("pipeline stop rejected: {err}");
        }
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            if let Err(err) = task.await {
                warn!("pipeline task ended abnormally: {err}");
            }
        }
        info!("pipeline stopped");
    }

    fn spawn_operation_loop(&self) -> JoinHandle<()> {
        let router = Arc::clone(&self.router);
        let switch = Arc::clone(&self.switch);
        let broker = self.broker.clone();
        tokio::spawn(async move {
            let mut state_rx = switch.subscribe();
            loop {
                if !switch.wait_consuming().await {
                    break;
                }
                tokio::select! {
                    msg = broker.recv_operation() => router.handle_operation(msg).await,
                    _ = state_rx.changed() => {}
                }
            }
        })
    }

    fn spawn_job_loop(&self, worker: usize) -> JoinHandle<()> {
        let dispatcher = Arc::clone(&self.dispatcher);
        let switch = Arc::clone(&self.switch);
        let broker = self.broker.clone();
        let backoff = Duration::from_millis(self.config.redeliver_backoff_ms);
        tokio::spawn(async move {
            let mut state_rx = switch.subscribe();
            loop {
                if !switch.wait_consuming().await {
                    break;
                }
                tokio::select! {
                    msg = broker.recv_job() => {
                        if let DispatchOutcome::Backpressure(msg) = dispatcher.dispatch(msg).await {
                            broker.requeue_job(msg);
                            tokio::time::sleep(backoff).await;
                        }
                    }
                    _ = state_rx.changed() => {}
                }
            }
            info!(worker, "job worker stopped");
        })
    }

    fn spawn_control_loop(&self) -> JoinHandle<()> {
        let controller = Arc::clone(&self.controller);
        let broker = self.broker.clone();
        let switch = Arc::clone(&self.switch);
        tokio::spawn(async move {
            // Control messages keep flowing even while quieted, so only a
            // stop ends this loop.
            let mut state_rx = switch.subscribe();
            loop {
                tokio::select! {
                    msg = broker.recv_control() => {
                        if !controller.handle_control(msg).await {
                            break;
                        }
                    }
                    _ = state_rx.changed() => {
                        if switch.state() == PipelineState::Stopped {
                            break;
                        }
                    }
                }
            }
        })
    }
}
