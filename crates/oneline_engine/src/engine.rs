use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use oneline_logging::oneline_debug;
use tokio_util::sync::CancellationToken;

use crate::pipeline::{Pipeline, ProgressSink};
use crate::types::{EngineEvent, JobId, JobProgress, Stage};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

enum EngineCommand {
    Submit { job_id: JobId, url: String },
    CancelAll,
}

/// Runs pipeline jobs on a background runtime and reports back over a channel.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(pipeline: Arc<Pipeline>) -> Result<Self, EngineError> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;

        thread::spawn(move || {
            let mut jobs_root = CancellationToken::new();
            while let Ok(command) = cmd_rx.recv() {
                match command {
                    EngineCommand::Submit { job_id, url } => {
                        let pipeline = pipeline.clone();
                        let event_tx = event_tx.clone();
                        let token = jobs_root.child_token();
                        runtime.spawn(async move {
                            run_job(&pipeline, job_id, url, &token, event_tx).await;
                        });
                    }
                    EngineCommand::CancelAll => {
                        oneline_debug!("Cancelling in-flight jobs");
                        jobs_root.cancel();
                        jobs_root = CancellationToken::new();
                    }
                }
            }
            // Every handle is gone; in-flight jobs have nobody to report to.
            jobs_root.cancel();
            runtime.shutdown_timeout(Duration::from_secs(1));
        });

        Ok(Self { cmd_tx, event_rx })
    }

    pub fn submit(&self, job_id: JobId, url: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::Submit {
            job_id,
            url: url.into(),
        });
    }

    /// Blocks until the next event; `None` once the engine thread is gone.
    pub fn recv(&self) -> Option<EngineEvent> {
        self.event_rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Cancels every job submitted so far. Later submissions are unaffected.
    pub fn cancel_all(&self) {
        let _ = self.cmd_tx.send(EngineCommand::CancelAll);
    }
}

struct JobSink {
    job_id: JobId,
    tx: mpsc::Sender<EngineEvent>,
}

impl ProgressSink for JobSink {
    fn stage(&self, stage: Stage) {
        let _ = self.tx.send(EngineEvent::Progress(JobProgress {
            job_id: self.job_id,
            stage,
        }));
    }
}

async fn run_job(
    pipeline: &Pipeline,
    job_id: JobId,
    url: String,
    token: &CancellationToken,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    oneline_debug!("Job {} started", job_id);
    let sink = JobSink {
        job_id,
        tx: event_tx.clone(),
    };
    let result = pipeline.run_with(&url, token, &sink).await;
    let _ = event_tx.send(EngineEvent::JobCompleted { job_id, result });
}
