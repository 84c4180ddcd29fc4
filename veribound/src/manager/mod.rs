//! Class model manager
//!
//! The host-facing facade: callers register class models, ask for
//! verified results (blocking or async), and evict classes that
//! disappeared from their project. Verification itself happens in a
//! worker reached over the framed channel transport; a background
//! single-flight dispatcher drains the pending queue, so registration
//! and lookup never wait on the solver.

mod context;
mod dispatch;

use std::collections::{HashMap, HashSet};
use std::os::unix::net::UnixStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};

use crate::error::{Result, VeriboundError};
use crate::model::ClassModel;
use crate::transport::process::WorkerProcess;
use crate::transport::wire::{self, ReplyOutcome, RequestBatch, VerifyReply, VerifyRequest};
use crate::transport::{
    self, Channel, PendingChannels, TransportError, DEFAULT_CAPACITY,
};
use crate::verifier::VerificationResult;
use crate::worker::{self, ServeOptions};

use context::{CompletionSlot, VerificationContext};
use dispatch::SingleFlight;

/// When the dispatcher picks up queued work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Every enqueue kicks the dispatcher
    Auto,
    /// Work waits until an explicit [`ClassModelManager::start`]
    Manual,
}

/// Where verification requests are executed
#[derive(Debug, Clone)]
pub enum WorkerBackend {
    /// Separate worker process, relaunched on demand
    Process,
    /// Worker loop on a thread inside this process; no solver isolation,
    /// used by tools and tests that cannot spawn
    InProcess,
    /// Arbitrary function playing the worker role over raw channels
    #[doc(hidden)]
    Thread(fn(Channel, Channel)),
}

#[derive(Debug, Clone)]
pub struct ManagerOptions {
    pub start_mode: StartMode,
    pub backend: WorkerBackend,
    /// Verification depth handed to the worker per request
    pub max_depth: usize,
    /// Verification wall-clock budget per request
    pub max_duration: Duration,
    pub capacity: usize,
    /// How long a caller waits for its verified result
    pub request_timeout: Duration,
    /// Worker exits after this long without requests
    pub idle_timeout: Duration,
    pub handshake_timeout: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            start_mode: StartMode::Auto,
            backend: WorkerBackend::Process,
            max_depth: 4,
            max_duration: Duration::from_secs(30),
            capacity: DEFAULT_CAPACITY,
            request_timeout: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

struct WorkerLink {
    requests: Channel,
    replies: Channel,
    process: Option<WorkerProcess>,
}

struct ManagerInner {
    options: ManagerOptions,
    context: Mutex<VerificationContext>,
    link: Mutex<Option<WorkerLink>>,
}

/// Thread-safe registry of class models with on-demand verification
pub struct ClassModelManager {
    inner: Arc<ManagerInner>,
    flight: SingleFlight,
}

impl ClassModelManager {
    pub fn new(options: ManagerOptions) -> Self {
        let inner = Arc::new(ManagerInner {
            options,
            context: Mutex::new(VerificationContext::default()),
            link: Mutex::new(None),
        });
        let dispatch_inner = Arc::clone(&inner);
        let flight = SingleFlight::spawn("veribound-dispatch", move || {
            dispatch_inner.dispatch_pending();
        });
        Self { inner, flight }
    }

    /// Register or replace a class model. Requests already queued keep
    /// the snapshot they were enqueued with.
    pub fn update_class_model(&self, model: ClassModel) -> Result<()> {
        if model.name().trim().is_empty() {
            return Err(VeriboundError::InvalidClassName(model.name().to_string()));
        }
        self.inner
            .context
            .lock()
            .expect("context lock")
            .update_model(model);
        Ok(())
    }

    /// Names of every registered class, sorted
    pub fn class_names(&self) -> Vec<String> {
        self.inner
            .context
            .lock()
            .expect("context lock")
            .class_names()
    }

    /// Evict classes absent from `present`; returns the evicted names.
    pub fn remove_missing_classes(&self, present: &[String]) -> Vec<String> {
        self.inner
            .context
            .lock()
            .expect("context lock")
            .remove_missing(present)
    }

    /// Verify a registered class and block for the result.
    pub fn verified_model(&self, class_name: &str) -> Result<VerificationResult> {
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        self.enqueue(class_name, CompletionSlot::Blocking(tx))?;
        match rx.recv_timeout(self.inner.options.request_timeout) {
            Ok(outcome) => outcome,
            Err(_) => Err(VeriboundError::RequestTimeout),
        }
    }

    /// Verify a registered class without blocking the async runtime.
    pub async fn verified_model_async(&self, class_name: &str) -> Result<VerificationResult> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.enqueue(class_name, CompletionSlot::Async(tx))?;
        match tokio::time::timeout(self.inner.options.request_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(VeriboundError::Closed),
            Err(_) => Err(VeriboundError::RequestTimeout),
        }
    }

    /// Kick the dispatcher. In [`StartMode::Auto`] every enqueue does
    /// this already; in manual mode queued work waits for it.
    pub fn start(&self) {
        self.flight.start();
    }

    /// Stop the dispatcher, fail outstanding requests, drop the worker
    /// link. Idempotent; also runs on drop.
    pub fn close(&self) {
        self.flight.close();
        let leftovers = self
            .inner
            .context
            .lock()
            .expect("context lock")
            .take_pending();
        for pending in leftovers {
            pending.slot.complete(Err(VeriboundError::Closed));
        }
        *self.inner.link.lock().expect("link lock") = None;
    }

    fn enqueue(&self, class_name: &str, slot: CompletionSlot) -> Result<u64> {
        let id = self
            .inner
            .context
            .lock()
            .expect("context lock")
            .enqueue(class_name, slot)?;
        if self.inner.options.start_mode == StartMode::Auto {
            self.flight.start();
        }
        Ok(id)
    }
}

impl Drop for ClassModelManager {
    fn drop(&mut self) {
        self.close();
    }
}

impl ManagerInner {
    /// One dispatcher run: snapshot the queue, exchange it with the
    /// worker as a single batch, deliver every outcome. A transport
    /// failure poisons the link and fails the whole batch; it is never
    /// reported as a verification result.
    fn dispatch_pending(&self) {
        let pending = self.context.lock().expect("context lock").take_pending();
        if pending.is_empty() {
            return;
        }
        debug!("dispatching {} request(s)", pending.len());

        let batch = RequestBatch {
            requests: pending
                .iter()
                .map(|p| VerifyRequest {
                    id: p.request_id,
                    model: p.model.clone(),
                    max_depth: self.options.max_depth,
                    max_duration_ms: self.options.max_duration.as_millis() as u64,
                })
                .collect(),
        };

        match self.exchange(&batch) {
            Ok(mut outcomes) => {
                for pending in pending {
                    let outcome = outcomes
                        .remove(&pending.request_id)
                        .unwrap_or(Err(VeriboundError::Closed));
                    pending.slot.complete(outcome);
                }
            }
            Err(e) => {
                warn!("worker exchange failed, dropping link: {e}");
                *self.link.lock().expect("link lock") = None;
                let message = e.to_string();
                for pending in pending {
                    pending
                        .slot
                        .complete(Err(VeriboundError::Worker(message.clone())));
                }
            }
        }
    }

    /// Send the batch and collect one reply per request, matching by
    /// request id rather than arrival order.
    fn exchange(
        &self,
        batch: &RequestBatch,
    ) -> std::result::Result<HashMap<u64, Result<VerificationResult>>, TransportError> {
        let mut link_guard = self.link.lock().expect("link lock");
        self.ensure_link(&mut link_guard)?;
        let link = link_guard.as_mut().expect("link ensured");

        link.requests.send(&wire::encode(batch)?)?;

        let expected = batch.requests.len();
        let window = self
            .options
            .max_duration
            .saturating_mul(expected as u32)
            .saturating_add(Duration::from_secs(5));
        link.replies.set_read_timeout(Some(window))?;

        let wanted: HashSet<u64> = batch.requests.iter().map(|r| r.id).collect();
        let mut outcomes = HashMap::new();
        while outcomes.len() < expected {
            let frame = link.replies.recv()?;
            let reply: VerifyReply = wire::decode(&frame)?;
            if !wanted.contains(&reply.id) {
                warn!("dropping unsolicited reply {}", reply.id);
                continue;
            }
            let outcome = match reply.outcome {
                ReplyOutcome::Result(result) => Ok(result),
                ReplyOutcome::Failed(message) => Err(VeriboundError::Worker(message)),
            };
            outcomes.insert(reply.id, outcome);
        }
        Ok(outcomes)
    }

    /// Reuse the live link or establish a new one. A worker that exited
    /// (idle timeout, crash) is replaced transparently.
    fn ensure_link(
        &self,
        link: &mut Option<WorkerLink>,
    ) -> std::result::Result<(), TransportError> {
        if let Some(existing) = link {
            let alive = match &mut existing.process {
                Some(process) => process.is_alive(),
                None => true,
            };
            if alive {
                return Ok(());
            }
            debug!("worker exited, relinking");
            *link = None;
        }

        let capacity = self.options.capacity;
        let new_link = match &self.options.backend {
            WorkerBackend::Process => {
                let session = transport::session_id();
                let pending = PendingChannels::bind(&session, capacity)?;
                let process =
                    WorkerProcess::launch(&session, self.options.idle_timeout, capacity)?;
                let (requests, replies) = pending.accept(self.options.handshake_timeout)?;
                WorkerLink {
                    requests,
                    replies,
                    process: Some(process),
                }
            }
            WorkerBackend::InProcess => {
                let idle_timeout = self.options.idle_timeout;
                let (requests, replies) =
                    spawn_worker_thread(capacity, move |mut req, mut resp| {
                        let options = ServeOptions {
                            capacity,
                            idle_timeout,
                            ..ServeOptions::default()
                        };
                        if let Err(e) = worker::serve(&mut req, &mut resp, &options) {
                            warn!("in-process worker failed: {e}");
                        }
                    })?;
                WorkerLink {
                    requests,
                    replies,
                    process: None,
                }
            }
            WorkerBackend::Thread(role) => {
                let role = *role;
                let (requests, replies) = spawn_worker_thread(capacity, role)?;
                WorkerLink {
                    requests,
                    replies,
                    process: None,
                }
            }
        };
        *link = Some(new_link);
        Ok(())
    }
}

/// Wire two socket pairs to a worker role running on a fresh thread,
/// returning the host ends.
fn spawn_worker_thread<F>(
    capacity: usize,
    role: F,
) -> std::result::Result<(Channel, Channel), TransportError>
where
    F: FnOnce(Channel, Channel) + Send + 'static,
{
    let (host_req, worker_req) = UnixStream::pair()?;
    let (host_resp, worker_resp) = UnixStream::pair()?;
    std::thread::Builder::new()
        .name("veribound-worker".to_string())
        .spawn(move || {
            role(
                Channel::from_stream(worker_req, capacity),
                Channel::from_stream(worker_resp, capacity),
            );
        })
        .map_err(TransportError::Io)?;
    Ok((
        Channel::from_stream(host_req, capacity),
        Channel::from_stream(host_resp, capacity),
    ))
}
