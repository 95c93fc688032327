//! Run lifecycle: start, cancel, completion detection and the
//! post-processing chain.

use crate::error::RunError;
use crate::models::{RunEvent, RunId, RunStatus, Stage};
use crate::orchestrator::handle::RunHandle;
use crate::orchestrator::observer::RunObserver;
use crate::orchestrator::pipeline::{run_pipeline, PipelineOptions};
use crate::orchestrator::process::{Launcher, SimProcess};
use crate::settings::RunConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// Drives at most one simulator run at a time.
pub struct RunOrchestrator {
    launcher: Arc<dyn Launcher>,
    observer: Arc<dyn RunObserver>,
    options: Arc<PipelineOptions>,
    /// Simulator config file name, relative to the working directory.
    config_file: PathBuf,
    next_id: u64,
    current: Option<RunHandle>,
}

impl RunOrchestrator {
    pub fn new(
        launcher: Arc<dyn Launcher>,
        observer: Arc<dyn RunObserver>,
        options: PipelineOptions,
        config_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            launcher,
            observer,
            options: Arc::new(options),
            config_file: config_file.into(),
            next_id: 0,
            current: None,
        }
    }

    /// Status of the most recent run, `Idle` if none was started.
    pub fn state(&self) -> RunStatus {
        self.current
            .as_ref()
            .map(RunHandle::status)
            .unwrap_or(RunStatus::Idle)
    }

    /// Write `config`, spawn the simulator and return its handle.
    ///
    /// Returns immediately; exit and post-processing are handled by a
    /// background task. Must be called from within a tokio runtime.
    pub fn start(&mut self, config: &RunConfig) -> Result<RunHandle, RunError> {
        if let Some(active) = self.current.as_ref().filter(|h| !h.is_finished()) {
            return Err(RunError::AlreadyRunning {
                active: active.id(),
            });
        }

        let config_path = self.options.resolve(&self.config_file);
        config
            .write_simulator_config(&config_path)
            .map_err(|e| RunError::ConfigPersist {
                path: config_path.clone(),
                message: format!("{:#}", e),
            })?;

        self.next_id += 1;
        let id = RunId(self.next_id);

        let process = match self.launcher.launch(&self.options.working_dir) {
            Ok(p) => p,
            Err(source) => {
                let program = self.launcher.describe();
                error!("[{}] Failed to spawn `{}`: {}", id, program, source);
                let handle = RunHandle::failed(id);
                self.observer.notify(RunEvent::StageFailed {
                    run: id,
                    stage: Stage::Simulation,
                    message: source.to_string(),
                });
                self.observer.notify(RunEvent::StateChanged {
                    run: id,
                    status: RunStatus::Failed,
                    exit_code: None,
                });
                self.observer.notify(RunEvent::Finished { run: id });
                self.current = Some(handle);
                return Err(RunError::SpawnFailure { program, source });
            }
        };

        let (kill_tx, kill_rx) = oneshot::channel();
        let handle = RunHandle::running(id, process.id(), kill_tx);
        info!("[{}] Simulator started (pid {:?})", id, handle.pid());
        self.observer.notify(RunEvent::StateChanged {
            run: id,
            status: RunStatus::Running,
            exit_code: None,
        });

        let search_dir = match &config.output_dir {
            Some(dir) => self.options.resolve(dir),
            None => self.options.working_dir.clone(),
        };
        tokio::spawn(supervise(
            handle.clone(),
            process,
            kill_rx,
            Arc::clone(&self.observer),
            Arc::clone(&self.options),
            search_dir,
        ));

        self.current = Some(handle.clone());
        Ok(handle)
    }

    /// Cancel `handle`. Does nothing if it already reached a terminal state.
    pub fn cancel(&self, handle: &RunHandle) {
        if handle.request_cancel(self.observer.as_ref()) {
            info!("[{}] Cancel requested", handle.id());
        }
    }
}

async fn supervise(
    handle: RunHandle,
    mut process: Box<dyn SimProcess>,
    mut kill_rx: oneshot::Receiver<()>,
    observer: Arc<dyn RunObserver>,
    options: Arc<PipelineOptions>,
    search_dir: PathBuf,
) {
    let run = handle.id();
    let exited = tokio::select! {
        result = process.wait() => Some(result),
        _ = &mut kill_rx => None,
    };

    match exited {
        None => {
            if let Err(e) = process.terminate().await {
                warn!("[{}] Failed to terminate simulator: {}", run, e);
            }
            info!("[{}] Simulator terminated", run);
        }
        Some(Ok(code)) => {
            if code.is_some_and(|c| c != 0) {
                warn!("[{}] Simulator exited with code {:?}", run, code);
            }
            if handle.settle(RunStatus::Completed, code, observer.as_ref()) {
                info!("[{}] Simulator completed", run);
                run_pipeline(run, observer.as_ref(), &options, &search_dir).await;
            }
        }
        Some(Err(e)) => {
            error!("[{}] Lost track of simulator: {}", run, e);
            handle.settle(RunStatus::Failed, None, observer.as_ref());
        }
    }

    handle.mark_finished();
    observer.notify(RunEvent::Finished { run });
}
