//! Request lifecycle: one submission at a time, streamed into an observable snapshot.
//!
//! The coordinator is the only writer of [`Snapshot`]. Front ends call
//! [`RequestCoordinator::subscribe`] and redraw whenever the receiver changes;
//! every transition and every appended fragment is published before the next
//! read is issued.

use futures_util::StreamExt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::accumulator::StreamAccumulator;
use crate::config::Config;
use crate::decoder::Utf8Decoder;
use crate::error::SubmitError;
use crate::payload::RequestPayload;
use crate::state::{Failure, FailureKind, Snapshot, StreamState};
use crate::transport::{HttpTransport, Transport};

#[derive(Clone)]
pub struct RequestCoordinator {
    transport: Arc<dyn Transport>,
    snapshot: Arc<watch::Sender<Snapshot>>,
    /// Cancellation handle of the in-flight cycle, tagged with its cycle number.
    active: Arc<Mutex<Option<(u64, CancellationToken)>>>,
    timeout: Option<Duration>,
    strict_utf8: bool,
}

impl RequestCoordinator {
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self::with_transport(Arc::new(transport))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        let (snapshot, _) = watch::channel(Snapshot::default());
        Self {
            transport,
            snapshot: Arc::new(snapshot),
            active: Arc::new(Mutex::new(None)),
            timeout: None,
            strict_utf8: false,
        }
    }

    /// HTTP coordinator for the configured endpoint.
    pub fn from_config(config: &Config) -> Self {
        let mut coordinator = Self::new(HttpTransport::new(&config.endpoint))
            .with_strict_utf8(config.strict_utf8);
        coordinator.timeout = config.timeout();
        coordinator
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_strict_utf8(mut self, strict: bool) -> Self {
        self.strict_utf8 = strict;
        self
    }

    /// Receiver that is marked changed after every transition and append.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    pub fn state(&self) -> StreamState {
        self.snapshot.borrow().state.clone()
    }

    /// Start a new cycle.
    ///
    /// Before returning, the state is `Sending`, the output buffer is empty and
    /// observers have been notified. The request itself runs on a spawned task,
    /// so this must be called from within a tokio runtime. Rejected while a
    /// previous submission is still sending or streaming.
    pub fn submit(&self, payload: RequestPayload) -> Result<Submission, SubmitError> {
        let mut cycle = 0;
        let accepted = self.snapshot.send_if_modified(|snapshot| {
            if snapshot.state.is_in_flight() {
                return false;
            }
            snapshot.cycle += 1;
            snapshot.state = StreamState::Sending;
            snapshot.output.clear();
            cycle = snapshot.cycle;
            true
        });

        if !accepted {
            tracing::warn!("submission rejected: a request is already in flight");
            return Err(SubmitError::Busy);
        }

        tracing::info!(cycle, model = %payload.model, "sending chat request");

        let token = CancellationToken::new();
        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = Some((cycle, token.clone()));

        let this = self.clone();
        let task_token = token.clone();
        let handle = tokio::spawn(async move { this.drive(cycle, payload, task_token).await });

        Ok(Submission {
            cycle,
            token,
            handle,
            coordinator: self.clone(),
        })
    }

    /// Submit and wait for the cycle to settle or fail.
    pub async fn run(&self, payload: RequestPayload) -> Result<Snapshot, SubmitError> {
        Ok(self.submit(payload)?.wait().await)
    }

    /// Abort the in-flight submission, if any. Returns whether one was cancelled.
    pub fn cancel(&self) -> bool {
        let active = self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        match active {
            Some((cycle, _)) => self.cancel_cycle(cycle),
            None => false,
        }
    }

    fn cancel_cycle(&self, cycle: u64) -> bool {
        let cancelled = self.fail(cycle, Failure::cancelled());
        if let Some((active_cycle, token)) = self.take_active(cycle) {
            tracing::debug!(cycle = active_cycle, "releasing cancelled stream");
            token.cancel();
        }
        cancelled
    }

    async fn drive(self, cycle: u64, payload: RequestPayload, token: CancellationToken) -> Snapshot {
        // Dropping the cycle future on cancel or timeout drops the body stream,
        // which releases the connection.
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(Failure::cancelled()),
            result = self.with_deadline(self.run_cycle(cycle, &payload)) => result,
        };

        match result {
            Ok(()) => {
                if self.update(cycle, |snapshot| snapshot.state = StreamState::Settled) {
                    tracing::info!(cycle, "response settled");
                }
            }
            Err(failure) => {
                if self.fail(cycle, failure.clone()) {
                    tracing::warn!(cycle, kind = ?failure.kind, "request failed: {}", failure.message);
                }
            }
        }

        self.take_active(cycle);
        self.snapshot()
    }

    async fn with_deadline<F>(&self, cycle: F) -> Result<(), Failure>
    where
        F: Future<Output = Result<(), Failure>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cycle)
                .await
                .unwrap_or_else(|_| Err(Failure::timed_out(limit))),
            None => cycle.await,
        }
    }

    async fn run_cycle(&self, cycle: u64, payload: &RequestPayload) -> Result<(), Failure> {
        let body = self
            .transport
            .send(payload)
            .await
            .map_err(|err| Failure::new(FailureKind::Transport, err.to_string()))?;

        if !self.update(cycle, |snapshot| snapshot.state = StreamState::Streaming) {
            return Ok(());
        }
        tracing::info!(cycle, "streaming response");

        let decoder = if self.strict_utf8 {
            Utf8Decoder::strict()
        } else {
            Utf8Decoder::new()
        };
        let mut fragments = StreamAccumulator::with_decoder(decoder).consume(body);

        while let Some(fragment) = fragments.next().await {
            let text = fragment.map_err(|err| Failure::new(FailureKind::Stream, err.to_string()))?;
            tracing::debug!(cycle, chars = text.chars().count(), "appending fragment");

            // A cancelled or superseded cycle stops reading at once.
            if !self.update(cycle, |snapshot| snapshot.output.push_str(&text)) {
                return Ok(());
            }
        }

        Ok(())
    }

    /// Apply `change` only while `cycle` is current and still in flight.
    /// Returns whether the snapshot was written (and observers notified).
    fn update(&self, cycle: u64, change: impl FnOnce(&mut Snapshot)) -> bool {
        self.snapshot.send_if_modified(|snapshot| {
            if snapshot.cycle != cycle || !snapshot.state.is_in_flight() {
                return false;
            }
            change(snapshot);
            true
        })
    }

    /// Transport failures replace the buffer with the error text; later
    /// failures keep the partial output that already arrived.
    fn fail(&self, cycle: u64, failure: Failure) -> bool {
        self.update(cycle, |snapshot| {
            if failure.kind == FailureKind::Transport {
                snapshot.output = failure.to_string();
            }
            snapshot.state = StreamState::Failed(failure);
        })
    }

    fn take_active(&self, cycle: u64) -> Option<(u64, CancellationToken)> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        match active.as_ref() {
            Some((active_cycle, _)) if *active_cycle == cycle => active.take(),
            _ => None,
        }
    }
}

/// Handle to one accepted submission.
pub struct Submission {
    cycle: u64,
    token: CancellationToken,
    handle: JoinHandle<Snapshot>,
    coordinator: RequestCoordinator,
}

impl Submission {
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Stop the cycle: state becomes `Failed(Cancelled)` immediately, partial
    /// output is kept and nothing more is appended.
    pub fn cancel(&self) {
        self.coordinator.cancel_cycle(self.cycle);
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the cycle to end and return the final snapshot.
    pub async fn wait(self) -> Snapshot {
        match self.handle.await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::error!(cycle = self.cycle, "request task aborted: {}", err);
                self.coordinator
                    .fail(self.cycle, Failure::new(FailureKind::Stream, err.to_string()));
                self.coordinator.snapshot()
            }
        }
    }
}
