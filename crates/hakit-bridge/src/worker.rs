//! Poll worker thread.
//!
//! One OS thread per driver instance. The thread owns the device for its
//! whole life and runs a plain loop:
//!
//! ```text
//! Running ──(Read)──► Busy ──(response queued)──► Running
//!    │                  │
//!    │                  └─(response queue closed)──► Terminated
//!    └─(Close / request queue closed)──────────────► Terminated
//! ```
//!
//! A failed read never stops the loop; it becomes an invalid response.

use crate::queue::{RequestReceiver, ResponseSender};
use crate::traits::DeviceOperation;
use hakit_core::constants::WORKER_THREAD_PREFIX;
use hakit_core::{Command, Error, Response, Result};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

/// Why a poll worker returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// A `Close` command was received.
    Closed,

    /// The event loop dropped the request queue without sending `Close`.
    RequestQueueClosed,

    /// A response could not be delivered because the event loop dropped the
    /// response queue.
    ResponseQueueClosed,
}

impl WorkerExit {
    /// Whether the worker stopped because it was asked to.
    pub fn is_clean(&self) -> bool {
        matches!(self, WorkerExit::Closed)
    }
}

/// Loop state of a poll worker.
pub struct PollWorker<D> {
    name: String,
    device: D,
    requests: RequestReceiver,
    responses: ResponseSender,
}

impl<D: DeviceOperation> PollWorker<D> {
    pub fn new(
        name: impl Into<String>,
        device: D,
        requests: RequestReceiver,
        responses: ResponseSender,
    ) -> Self {
        Self {
            name: name.into(),
            device,
            requests,
            responses,
        }
    }

    /// Start the loop on a dedicated thread named `hakit-<name>`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Spawn` if the OS refuses to create the thread. The
    /// device and both queue halves are dropped in that case.
    pub fn spawn(self) -> Result<JoinHandle<WorkerExit>> {
        thread::Builder::new()
            .name(format!("{WORKER_THREAD_PREFIX}{}", self.name))
            .spawn(move || self.run())
            .map_err(Error::Spawn)
    }

    /// Run the loop on the calling thread until it terminates.
    ///
    /// The device is dropped on return, releasing its bus handle.
    pub fn run(mut self) -> WorkerExit {
        info!(driver = %self.name, family = self.device.family(), "Poll worker started");

        let exit = loop {
            let Some(command) = self.requests.recv() else {
                debug!(driver = %self.name, "Request queue closed");
                break WorkerExit::RequestQueueClosed;
            };

            match command {
                Command::Read(request) => {
                    trace!(driver = %self.name, channel = %request.channel, force = request.force, "Read");

                    let response = match self.device.read(request.channel) {
                        Ok(value) => Response::valid(request, value),
                        Err(e) => {
                            warn!(
                                driver = %self.name,
                                channel = %request.channel,
                                error = %e,
                                "Read failed"
                            );
                            Response::invalid(request)
                        }
                    };

                    if let Err(response) = self.responses.send(response) {
                        error!(
                            driver = %self.name,
                            channel = %response.channel,
                            "Cannot deliver response, response queue closed"
                        );
                        break WorkerExit::ResponseQueueClosed;
                    }
                }
                Command::Write { setting, value } => {
                    trace!(driver = %self.name, setting, value, "Write");
                    if let Err(e) = self.device.write(setting, value) {
                        warn!(driver = %self.name, setting, value, error = %e, "Write failed");
                    }
                }
                Command::Close => break WorkerExit::Closed,
            }
        };

        info!(driver = %self.name, exit = ?exit, "Poll worker terminated");
        exit
    }
}
