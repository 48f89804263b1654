use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;

use crate::metrics::SEQUENCED_TASK_FAILED_TOTAL;
use crate::utils::util::str_to_u64;
use crate::Result;
use crate::SequencerConfig;
use crate::TaskError;

/// A task bound to the logical key that serializes it
struct SequencedTask {
    key: String,
    fut: BoxFuture<'static, Result<()>>,
}

/// Per-key ordered task queue over a fixed set of lanes.
///
/// Each lane is a single-consumer queue drained by one worker: tasks sharing
/// a key are routed to the same lane by a stable hash and run strictly in
/// submission order, while tasks on different keys run in parallel across
/// lanes. A failing task is caught at the worker, logged with its key, and
/// dropped; the next natural change event re-converges state.
pub struct KeyedSequencer {
    lanes: Vec<mpsc::Sender<SequencedTask>>,
    shutdown: CancellationToken,
}

impl KeyedSequencer {
    /// Spawn one worker per lane; must run inside a tokio runtime.
    pub fn new(config: &SequencerConfig) -> Self {
        let shutdown = CancellationToken::new();
        let mut lanes = Vec::with_capacity(config.lanes);
        for lane in 0..config.lanes {
            let (tx, rx) = mpsc::channel(config.lane_buffer_size);
            lanes.push(tx);
            tokio::spawn(Self::run_lane(lane, rx, shutdown.clone()));
        }
        Self { lanes, shutdown }
    }

    /// Route `fut` to the lane owning `key`.
    ///
    /// Fails when the lane's queue is full or the sequencer has shut down;
    /// the task is dropped in both cases and never requeued.
    pub fn submit(
        &self,
        key: &str,
        fut: BoxFuture<'static, Result<()>>,
    ) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(TaskError::ShutDown.into());
        }
        let lane = (str_to_u64(key) % self.lanes.len() as u64) as usize;
        let task = SequencedTask {
            key: key.to_string(),
            fut,
        };
        self.lanes[lane].try_send(task).map_err(|e| match e {
            mpsc::error::TrySendError::Full(task) => TaskError::Overloaded { lane, key: task.key }.into(),
            mpsc::error::TrySendError::Closed(_) => TaskError::ShutDown.into(),
        })
    }

    async fn run_lane(
        lane: usize,
        mut rx: mpsc::Receiver<SequencedTask>,
        shutdown: CancellationToken,
    ) {
        debug!(lane, "sequencer lane started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                task = rx.recv() => match task {
                    Some(task) => {
                        // the await here is what serializes same-key tasks
                        if let Err(e) = task.fut.await {
                            SEQUENCED_TASK_FAILED_TOTAL.inc();
                            error!(lane, key = %task.key, error = %e, "sequenced task failed, dropped");
                        }
                    }
                    None => break,
                },
            }
        }
        debug!(lane, "sequencer lane stopped");
    }

    /// Stop all lanes; queued tasks that have not started are dropped.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn lanes(&self) -> usize {
        self.lanes.len()
    }
}
