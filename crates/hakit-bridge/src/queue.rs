//! Bounded request and response queues.
//!
//! Both queues are single-producer, single-consumer tokio channels. The
//! halves differ in how they block:
//!
//! | Half               | Side       | Full / empty behaviour                      |
//! |--------------------|------------|---------------------------------------------|
//! | [`RequestSender`]  | event loop | never blocks, full is `Error::QueueFull`    |
//! | [`RequestReceiver`]| worker     | blocks the thread until a command arrives   |
//! | [`ResponseSender`] | worker     | blocks the thread while full (back-pressure)|
//! | [`ResponseReceiver`]| event loop| async readiness, non-blocking drain         |
//!
//! The worker halves must only be used from a plain OS thread, never from
//! inside a runtime.

use hakit_core::{Command, Error, QueueKind, Response, Result};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::warn;

/// Create the request queue with room for `capacity` commands.
pub fn request_queue(capacity: usize) -> (RequestSender, RequestReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (RequestSender { tx, capacity }, RequestReceiver { rx })
}

/// Create the response queue with room for `capacity` responses.
pub fn response_queue(capacity: usize) -> (ResponseSender, ResponseReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (ResponseSender { tx, capacity }, ResponseReceiver { rx })
}

/// Event-loop half of the request queue.
#[derive(Debug)]
pub struct RequestSender {
    tx: mpsc::Sender<Command>,
    capacity: usize,
}

impl RequestSender {
    /// Enqueue a command without blocking.
    ///
    /// # Errors
    ///
    /// - `Error::QueueFull` if `capacity` commands are already waiting.
    /// - `Error::WorkerTerminated` if the worker dropped its half.
    pub fn send(&self, command: Command) -> Result<()> {
        self.tx.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => Error::QueueFull {
                queue: QueueKind::Request,
                capacity: self.capacity,
            },
            TrySendError::Closed(_) => Error::WorkerTerminated,
        })
    }

    /// Whether the worker is still holding the other half.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Worker half of the request queue.
#[derive(Debug)]
pub struct RequestReceiver {
    rx: mpsc::Receiver<Command>,
}

impl RequestReceiver {
    /// Block the calling thread until the next command.
    ///
    /// Returns `None` once the event loop dropped its half and the queue is
    /// empty.
    pub fn recv(&mut self) -> Option<Command> {
        self.rx.blocking_recv()
    }
}

/// Worker half of the response queue.
#[derive(Debug)]
pub struct ResponseSender {
    tx: mpsc::Sender<Response>,
    capacity: usize,
}

impl ResponseSender {
    /// Enqueue a response, blocking the thread while the queue is full.
    ///
    /// A full queue is logged before blocking so a slow event loop shows up
    /// in the logs instead of as a silent stall.
    ///
    /// # Errors
    ///
    /// Gives the response back if the event loop dropped its half.
    pub fn send(&self, response: Response) -> std::result::Result<(), Response> {
        match self.tx.try_send(response) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(response)) => {
                warn!(
                    capacity = self.capacity,
                    channel = %response.channel,
                    "Response queue full, waiting for the event loop"
                );
                self.tx.blocking_send(response).map_err(|e| e.0)
            }
            Err(TrySendError::Closed(response)) => Err(response),
        }
    }
}

/// Event-loop half of the response queue.
#[derive(Debug)]
pub struct ResponseReceiver {
    rx: mpsc::Receiver<Response>,
}

impl ResponseReceiver {
    /// Wait until a response is available.
    ///
    /// Returns `None` once the worker exited and every response it produced
    /// has been received.
    pub async fn recv(&mut self) -> Option<Response> {
        self.rx.recv().await
    }

    /// Take one response if one is ready.
    ///
    /// # Errors
    ///
    /// Returns `Error::WorkerTerminated` when the queue is empty and the
    /// worker is gone.
    pub fn try_recv(&mut self) -> Result<Option<Response>> {
        match self.rx.try_recv() {
            Ok(response) => Ok(Some(response)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Error::WorkerTerminated),
        }
    }

    /// Refuse further responses and wake a worker blocked on a full queue.
    ///
    /// Responses already queued can still be received.
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// Number of responses waiting.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
