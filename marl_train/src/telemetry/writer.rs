//! Background telemetry writer.
//!
//! The controller hands completed-episode summaries to a dedicated thread
//! through a bounded channel. A full queue applies backpressure rather than
//! dropping records. Write failures are logged on the writer thread and
//! collected for the controller to report; they never stop training.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use super::{TelemetryError, TelemetryFiles};
use crate::accumulator::EpisodeSummary;
use crate::config::ExperimentPaths;

/// Messages accepted by the writer thread.
#[derive(Debug)]
pub enum TelemetryCommand {
    /// Append one completed episode at scalar step `x`.
    Episode {
        /// Normalized per-episode values.
        summary: EpisodeSummary,
        /// Scalar x-axis value.
        x: usize,
    },
    /// Flush every file, then acknowledge.
    Flush(Sender<Result<(), TelemetryError>>),
    /// Flush and exit.
    Shutdown,
}

/// Handle to the telemetry thread.
pub struct TelemetryWriter {
    tx: Sender<TelemetryCommand>,
    failures: Arc<Mutex<Vec<TelemetryError>>>,
    thread: Option<JoinHandle<()>>,
}

impl TelemetryWriter {
    /// Open the telemetry files and start the writer thread.
    ///
    /// Opening happens on the caller's thread so a bad path is reported
    /// immediately.
    pub fn spawn(paths: &ExperimentPaths, n_agents: usize, queue: usize) -> Result<Self, TelemetryError> {
        let files = TelemetryFiles::open(paths, n_agents)?;
        let (tx, rx) = crossbeam_channel::bounded(queue.max(1));
        let failures = Arc::new(Mutex::new(Vec::new()));

        let thread_failures = Arc::clone(&failures);
        let thread = std::thread::Builder::new()
            .name("telemetry-writer".to_string())
            .spawn(move || run(files, rx, thread_failures))
            .map_err(TelemetryError::Spawn)?;

        Ok(Self {
            tx,
            failures,
            thread: Some(thread),
        })
    }

    /// Queue one completed episode.
    pub fn record_episode(&self, summary: EpisodeSummary, x: usize) -> Result<(), TelemetryError> {
        self.tx
            .send(TelemetryCommand::Episode { summary, x })
            .map_err(|_| TelemetryError::Disconnected)
    }

    /// Block until everything queued so far is on disk.
    pub fn flush(&self) -> Result<(), TelemetryError> {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        self.tx
            .send(TelemetryCommand::Flush(ack_tx))
            .map_err(|_| TelemetryError::Disconnected)?;
        ack_rx.recv().map_err(|_| TelemetryError::Disconnected)?
    }

    /// Drain the write failures observed since the last call.
    pub fn take_failures(&self) -> Vec<TelemetryError> {
        std::mem::take(&mut *self.failures.lock())
    }
}

impl Drop for TelemetryWriter {
    fn drop(&mut self) {
        let _ = self.tx.send(TelemetryCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("telemetry writer thread panicked");
            }
        }
    }
}

fn run(mut files: TelemetryFiles, rx: Receiver<TelemetryCommand>, failures: Arc<Mutex<Vec<TelemetryError>>>) {
    while let Ok(command) = rx.recv() {
        match command {
            TelemetryCommand::Episode { summary, x } => {
                if let Err(e) = files.write_episode(&summary, x) {
                    log::warn!("telemetry write failed: {}", e);
                    failures.lock().push(e);
                }
            }
            TelemetryCommand::Flush(ack) => {
                let _ = ack.send(files.flush());
            }
            TelemetryCommand::Shutdown => break,
        }
    }

    if let Err(e) = files.flush() {
        log::warn!("telemetry flush on shutdown failed: {}", e);
        failures.lock().push(e);
    }
}
