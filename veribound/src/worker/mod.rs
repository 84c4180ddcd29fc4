//! Worker-side request loop
//!
//! The worker drains request batches from its channel, verifies each
//! model, and writes one reply frame per request. It exits cleanly when
//! the host closes the channel or when no request arrives within the
//! idle timeout; the host relaunches it on demand.

use std::time::Duration;

use log::{debug, info, warn};

use crate::transport::wire::{decode, encode, ReplyOutcome, RequestBatch, VerifyReply, VerifyRequest};
use crate::transport::{connect_pair, Channel, TransportError, DEFAULT_CAPACITY};
use crate::verifier::Verifier;

#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub capacity: usize,
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            idle_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Entry point of the `serve` subcommand: connect to the session's
/// channels and run the request loop until shutdown.
pub fn serve_session(session: &str, options: &ServeOptions) -> Result<(), TransportError> {
    let (mut requests, mut replies) = connect_pair(session, options.capacity, options.connect_timeout)?;
    info!("worker serving session {session}");
    serve(&mut requests, &mut replies, options)
}

/// Request loop over already-connected channels.
///
/// Malformed frames are logged and skipped; the loop only ends on a
/// closed channel, the idle timeout, or an unrecoverable IO error.
pub fn serve(
    requests: &mut Channel,
    replies: &mut Channel,
    options: &ServeOptions,
) -> Result<(), TransportError> {
    requests.set_read_timeout(Some(options.idle_timeout))?;
    loop {
        let frame = match requests.recv() {
            Ok(frame) => frame,
            Err(TransportError::Closed) => {
                debug!("host closed the request channel");
                return Ok(());
            }
            Err(TransportError::Io(e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                info!("idle for {:?}, exiting", options.idle_timeout);
                return Ok(());
            }
            Err(e) if !e.is_fatal() => {
                warn!("dropping malformed frame: {e}");
                continue;
            }
            Err(e) => return Err(e),
        };

        let batch: RequestBatch = match decode(&frame) {
            Ok(batch) => batch,
            Err(e) => {
                warn!("dropping undecodable batch: {e}");
                continue;
            }
        };

        for request in batch.requests {
            let reply = run_request(request);
            replies.send(&encode(&reply)?)?;
        }
    }
}

fn run_request(request: VerifyRequest) -> VerifyReply {
    debug!(
        "verifying {} (request {}, depth {}, budget {}ms)",
        request.model.name(),
        request.id,
        request.max_depth,
        request.max_duration_ms
    );
    let verifier = Verifier::new()
        .with_max_depth(request.max_depth)
        .with_max_duration(Duration::from_millis(request.max_duration_ms));
    let outcome = match verifier.verify(&request.model) {
        Ok(result) => ReplyOutcome::Result(result),
        Err(e) => ReplyOutcome::Failed(e.to_string()),
    };
    VerifyReply {
        id: request.id,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClassModelBuilder;
    use crate::verifier::VerificationResult;
    use std::os::unix::net::UnixStream;

    fn spawn_worker(options: ServeOptions) -> (Channel, Channel, std::thread::JoinHandle<Result<(), TransportError>>) {
        let (host_req, worker_req) = UnixStream::pair().unwrap();
        let (host_resp, worker_resp) = UnixStream::pair().unwrap();
        let capacity = options.capacity;
        let handle = std::thread::spawn(move || {
            let mut requests = Channel::from_stream(worker_req, capacity);
            let mut replies = Channel::from_stream(worker_resp, capacity);
            serve(&mut requests, &mut replies, &options)
        });
        (
            Channel::from_stream(host_req, capacity),
            Channel::from_stream(host_resp, capacity),
            handle,
        )
    }

    fn trivial_batch(id: u64) -> RequestBatch {
        // No contracts, so verification succeeds without a solver.
        let model = ClassModelBuilder::new("Trivial").unwrap().build();
        RequestBatch {
            requests: vec![VerifyRequest {
                id,
                model,
                max_depth: 1,
                max_duration_ms: 1000,
            }],
        }
    }

    #[test]
    fn test_serve_replies_per_request() {
        let (mut req, mut resp, handle) = spawn_worker(ServeOptions::default());

        req.send(&encode(&trivial_batch(1)).unwrap()).unwrap();
        let reply: VerifyReply = decode(&resp.recv().unwrap()).unwrap();
        assert_eq!(reply.id, 1);
        assert!(matches!(
            reply.outcome,
            ReplyOutcome::Result(VerificationResult::Success)
        ));

        drop(req);
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn test_serve_skips_malformed_frames() {
        let (mut req, mut resp, handle) = spawn_worker(ServeOptions::default());

        // Header-only packet, then garbage, then a valid batch: only the
        // valid batch produces a reply.
        req.send(b"").unwrap();
        req.send(b"not json").unwrap();
        req.send(&encode(&trivial_batch(2)).unwrap()).unwrap();

        let reply: VerifyReply = decode(&resp.recv().unwrap()).unwrap();
        assert_eq!(reply.id, 2);

        drop(req);
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn test_serve_exits_on_idle_timeout() {
        let options = ServeOptions {
            idle_timeout: Duration::from_millis(50),
            ..ServeOptions::default()
        };
        let (_req, _resp, handle) = spawn_worker(options);
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn test_serve_exits_when_host_closes() {
        let (req, _resp, handle) = spawn_worker(ServeOptions::default());
        drop(req);
        assert!(handle.join().unwrap().is_ok());
    }
}
