//! Framed channel transport
//!
//! Host and worker exchange length-prefixed frames over a pair of
//! unidirectional Unix-domain sockets, one per direction. Every frame is
//! a 4-byte little-endian payload length followed by the payload. A
//! header announcing zero bytes is a malformed packet: the reader reports
//! it as a deterministic decode failure instead of waiting for data that
//! will never arrive.

pub mod process;
pub mod wire;

use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::debug;
use thiserror::Error;

/// Default bound on a single frame's payload
pub const DEFAULT_CAPACITY: usize = 4 * 1024 * 1024;

const HEADER_LEN: usize = 4;
const CONNECT_RETRY: Duration = Duration::from_millis(10);

/// Channel-level failures
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("channel IO: {0}")]
    Io(#[from] std::io::Error),

    /// A header-only packet announcing a zero-length payload
    #[error("malformed frame: zero-length payload")]
    EmptyFrame,

    #[error("frame of {len} bytes exceeds channel capacity {capacity}")]
    Oversized { len: usize, capacity: usize },

    #[error("codec error: {0}")]
    Codec(String),

    #[error("channel closed by peer")]
    Closed,

    #[error("worker launch failed: {0}")]
    Launch(String),

    #[error("timed out waiting for the worker to connect")]
    HandshakeTimeout,
}

impl TransportError {
    /// Failures that poison the link and force a worker relaunch, as
    /// opposed to per-frame decode problems.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::EmptyFrame | Self::Codec(_) | Self::Oversized { .. })
    }
}

/// Direction of a unidirectional channel, from the host's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    Request,
    Response,
}

impl ChannelRole {
    fn suffix(self) -> &'static str {
        match self {
            ChannelRole::Request => "req",
            ChannelRole::Response => "resp",
        }
    }
}

/// Session identifier unique across processes and across calls within
/// one process.
pub fn session_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let stamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{}-{stamp:x}-{seq}", std::process::id())
}

/// Filesystem rendezvous point for one direction of a session
pub fn socket_path(session: &str, role: ChannelRole) -> PathBuf {
    std::env::temp_dir().join(format!("veribound-{session}-{}.sock", role.suffix()))
}

/// Write one frame: length header, then payload.
///
/// An empty payload is representable on the wire; the receiving side
/// rejects it, so sending one models a misbehaving peer.
pub fn write_frame<W: Write>(
    writer: &mut W,
    payload: &[u8],
    capacity: usize,
) -> Result<(), TransportError> {
    if payload.len() > capacity {
        return Err(TransportError::Oversized {
            len: payload.len(),
            capacity,
        });
    }
    let header = (payload.len() as u32).to_le_bytes();
    writer.write_all(&header)?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame, validating the announced length before trusting it.
pub fn read_frame<R: Read>(reader: &mut R, capacity: usize) -> Result<Vec<u8>, TransportError> {
    let mut header = [0u8; HEADER_LEN];
    read_exact_or_closed(reader, &mut header)?;
    let len = u32::from_le_bytes(header) as usize;
    if len == 0 {
        return Err(TransportError::EmptyFrame);
    }
    if len > capacity {
        return Err(TransportError::Oversized { len, capacity });
    }
    let mut payload = vec![0u8; len];
    read_exact_or_closed(reader, &mut payload)?;
    Ok(payload)
}

fn read_exact_or_closed<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), TransportError> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TransportError::Closed
        } else {
            TransportError::Io(e)
        }
    })
}

/// One direction of the host/worker link
#[derive(Debug)]
pub struct Channel {
    stream: UnixStream,
    capacity: usize,
}

impl Channel {
    pub fn from_stream(stream: UnixStream, capacity: usize) -> Self {
        Self { stream, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        write_frame(&mut self.stream, payload, self.capacity)
    }

    pub fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        read_frame(&mut self.stream, self.capacity)
    }

    /// A `None` timeout blocks indefinitely. Reads past the deadline fail
    /// with `WouldBlock`/`TimedOut` IO errors.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.stream.set_read_timeout(timeout)?;
        Ok(())
    }
}

/// Bound but not yet accepted host side of a session.
///
/// The host binds both listeners before launching the worker so the
/// rendezvous paths exist by the time the worker starts connecting.
#[derive(Debug)]
pub struct PendingChannels {
    request: UnixListener,
    response: UnixListener,
    request_path: PathBuf,
    response_path: PathBuf,
    capacity: usize,
}

impl PendingChannels {
    pub fn bind(session: &str, capacity: usize) -> Result<Self, TransportError> {
        let request_path = socket_path(session, ChannelRole::Request);
        let response_path = socket_path(session, ChannelRole::Response);
        // Stale sockets from a crashed previous session block bind.
        let _ = std::fs::remove_file(&request_path);
        let _ = std::fs::remove_file(&response_path);
        let request = UnixListener::bind(&request_path)?;
        let response = UnixListener::bind(&response_path)?;
        request.set_nonblocking(true)?;
        response.set_nonblocking(true)?;
        Ok(Self {
            request,
            response,
            request_path,
            response_path,
            capacity,
        })
    }

    /// Wait for the worker to connect both directions.
    pub fn accept(self, timeout: Duration) -> Result<(Channel, Channel), TransportError> {
        let deadline = Instant::now() + timeout;
        let request = accept_until(&self.request, deadline)?;
        let response = accept_until(&self.response, deadline)?;
        request.set_nonblocking(false)?;
        response.set_nonblocking(false)?;
        debug!("worker connected on {:?}", self.request_path);
        Ok((
            Channel::from_stream(request, self.capacity),
            Channel::from_stream(response, self.capacity),
        ))
    }
}

impl Drop for PendingChannels {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.request_path);
        let _ = std::fs::remove_file(&self.response_path);
    }
}

fn accept_until(listener: &UnixListener, deadline: Instant) -> Result<UnixStream, TransportError> {
    loop {
        match listener.accept() {
            Ok((stream, _)) => return Ok(stream),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(TransportError::HandshakeTimeout);
                }
                std::thread::sleep(CONNECT_RETRY);
            }
            Err(e) => return Err(TransportError::Io(e)),
        }
    }
}

/// Worker side: connect both directions, retrying while the host is
/// still binding.
pub fn connect_pair(
    session: &str,
    capacity: usize,
    timeout: Duration,
) -> Result<(Channel, Channel), TransportError> {
    let deadline = Instant::now() + timeout;
    let request = connect_until(&socket_path(session, ChannelRole::Request), deadline)?;
    let response = connect_until(&socket_path(session, ChannelRole::Response), deadline)?;
    Ok((
        Channel::from_stream(request, capacity),
        Channel::from_stream(response, capacity),
    ))
}

fn connect_until(path: &PathBuf, deadline: Instant) -> Result<UnixStream, TransportError> {
    loop {
        match UnixStream::connect(path) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                if Instant::now() >= deadline {
                    return Err(TransportError::HandshakeTimeout);
                }
                debug!("waiting for {path:?}: {e}");
                std::thread::sleep(CONNECT_RETRY);
            }
        }
    }
}
