//! Datagram channel to the UI peer process.
//!
//! Lifecycle:
//!
//! ```text
//!   Closed ──bind()──▶ Bound ──start_peer()──▶ PeerStarting ──▶ Active
//!     ▲                                                           │
//!     └─────────────────────────── close() ◀──────────────────────┘
//! ```
//!
//! Two Unix datagram sockets, one per direction.  The service binds
//! `service_socket` and receives filter commands there; snapshots go to the
//! peer's `ui_socket`.  One JSON message per datagram.
//!
//! Everything here is non-blocking except the bounded wait for the peer
//! socket in `start_peer`.  Outbound sends are fire-and-forget: a missing or
//! slow peer never surfaces as an error to the caller.
use keywheel_proto::config::IpcConfig;
use keywheel_proto::protocol::{FilterCommand, Quit, Snapshot};
use std::io;
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixDatagram;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Largest inbound datagram we accept.  Commands are a few dozen bytes.
const RECV_BUFFER_BYTES: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("socket I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("channel is closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    Bound,
    PeerStarting,
    Active,
}

// ── injectable collaborators ──────────────────────────────────────────────────

/// Time source for the peer-startup wait.
pub trait Clock {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Starts the UI peer.
pub trait PeerLauncher {
    fn launch(&mut self) -> io::Result<()>;
}

/// Runs the UI as a detached child process with stdio disconnected.
pub struct CommandLauncher {
    program: PathBuf,
    args: Vec<String>,
    child: Option<Child>,
}

impl CommandLauncher {
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self {
            program,
            args,
            child: None,
        }
    }
}

impl PeerLauncher for CommandLauncher {
    fn launch(&mut self) -> io::Result<()> {
        info!("ipc: launching UI peer {:?}", self.program);
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        self.child = Some(child);
        Ok(())
    }
}

impl Drop for CommandLauncher {
    fn drop(&mut self) {
        // Reap the peer if it already exited; otherwise leave it running.
        if let Some(child) = self.child.as_mut() {
            let _ = child.try_wait();
        }
    }
}

/// For a peer that is started by someone else.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLauncher;

impl PeerLauncher for NoLauncher {
    fn launch(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ── channel ───────────────────────────────────────────────────────────────────

pub struct IpcChannel {
    socket: Option<UnixDatagram>,
    inbound_path: PathBuf,
    peer_path: PathBuf,
    startup_attempts: u32,
    startup_interval: Duration,
    state: ChannelState,
    recv_buf: Vec<u8>,
}

impl IpcChannel {
    /// Remove any stale socket file, bind the inbound endpoint and size its
    /// send buffer.
    pub fn bind(config: &IpcConfig) -> Result<Self, IpcError> {
        let inbound_path = config.service_socket.clone();
        let _ = std::fs::remove_file(&inbound_path);

        let socket = UnixDatagram::bind(&inbound_path)?;
        socket.set_nonblocking(true)?;
        if let Err(e) = set_send_buffer(&socket, config.send_buffer_bytes) {
            warn!(
                "ipc: could not set send buffer to {} bytes: {}",
                config.send_buffer_bytes, e
            );
        }
        info!("ipc: bound {:?}", inbound_path);

        Ok(Self {
            socket: Some(socket),
            inbound_path,
            peer_path: config.ui_socket.clone(),
            startup_attempts: config.startup_attempts,
            startup_interval: config.startup_interval(),
            state: ChannelState::Bound,
            recv_buf: vec![0u8; RECV_BUFFER_BYTES],
        })
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Launch the peer and wait for its socket to appear.  Neither a launch
    /// failure nor a timeout is fatal: the channel goes `Active` regardless
    /// and sends fail quietly until the peer shows up.
    pub fn start_peer(&mut self, launcher: &mut dyn PeerLauncher, clock: &dyn Clock) {
        if self.state != ChannelState::Bound {
            warn!("ipc: start_peer called in state {:?}", self.state);
            return;
        }
        self.state = ChannelState::PeerStarting;

        if let Err(e) = launcher.launch() {
            warn!("ipc: failed to launch UI peer: {}", e);
        }

        if self.wait_for_peer(clock) {
            info!("ipc: UI peer listening at {:?}", self.peer_path);
        } else {
            warn!(
                "ipc: UI peer socket {:?} did not appear after {} attempts",
                self.peer_path, self.startup_attempts
            );
        }
        self.state = ChannelState::Active;
    }

    fn wait_for_peer(&self, clock: &dyn Clock) -> bool {
        for _ in 0..self.startup_attempts {
            if self.peer_path.exists() {
                return true;
            }
            clock.sleep(self.startup_interval);
        }
        self.peer_path.exists()
    }

    fn send_raw(&self, bytes: &[u8]) -> Result<(), IpcError> {
        let socket = self.socket.as_ref().ok_or(IpcError::Closed)?;
        socket.send_to(bytes, &self.peer_path)?;
        Ok(())
    }

    /// The one place send errors are dropped.
    fn send_best_effort(&self, encoded: serde_json::Result<Vec<u8>>, what: &str) {
        let result = encoded
            .map_err(IpcError::from)
            .and_then(|bytes| self.send_raw(&bytes));
        if let Err(e) = result {
            debug!("ipc: {} not delivered: {}", what, e);
        }
    }

    pub fn send_snapshot(&self, snapshot: &Snapshot) {
        self.send_best_effort(snapshot.encode(), "snapshot");
    }

    /// Read at most one pending command.  Returns `None` when nothing is
    /// waiting or the datagram does not decode.
    pub fn poll_command(&mut self) -> Option<FilterCommand> {
        let socket = self.socket.as_ref()?;
        match socket.recv(&mut self.recv_buf) {
            Ok(n) => match FilterCommand::decode(&self.recv_buf[..n]) {
                Ok(cmd) => {
                    debug!("ipc: received {:?}", cmd);
                    Some(cmd)
                }
                Err(e) => {
                    warn!("ipc: dropping malformed command ({} bytes): {}", n, e);
                    None
                }
            },
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => None,
            Err(e) => {
                warn!("ipc: receive failed: {}", e);
                None
            }
        }
    }

    /// Tell the peer to quit and release the inbound endpoint.  Idempotent.
    pub fn close(&mut self) {
        if self.state == ChannelState::Closed {
            return;
        }
        self.send_best_effort(Quit::encode(), "quit");
        self.socket = None;
        let _ = std::fs::remove_file(&self.inbound_path);
        self.state = ChannelState::Closed;
        info!("ipc: closed {:?}", self.inbound_path);
    }
}

impl Drop for IpcChannel {
    fn drop(&mut self) {
        self.close();
    }
}

fn set_send_buffer(socket: &UnixDatagram, bytes: usize) -> io::Result<()> {
    let size = libc::c_int::try_from(bytes).unwrap_or(libc::c_int::MAX);
    // SAFETY: the fd belongs to `socket` for the duration of the call and
    // the option value points at a live c_int.
    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_SNDBUF,
            &size as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(test)]
fn send_buffer(socket: &UnixDatagram) -> io::Result<usize> {
    let mut size: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
    // SAFETY: as above; `len` matches the buffer behind `size`.
    let rc = unsafe {
        libc::getsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_SNDBUF,
            &mut size as *mut libc::c_int as *mut libc::c_void,
            &mut len,
        )
    };
    if rc == 0 {
        Ok(size as usize)
    } else {
        Err(io::Error::last_os_error())
    }
}
