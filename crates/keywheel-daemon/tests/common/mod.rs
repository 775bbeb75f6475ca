#![allow(dead_code)]

use keywheel_daemon::catalog::DirectorySource;
use keywheel_daemon::ipc::{Clock, NoLauncher};
use keywheel_daemon::track::{RawTags, TagReader};
use keywheel_daemon::BrowserService;
use keywheel_proto::config::Config;
use keywheel_proto::protocol::{Snapshot, UiMessage};
use std::cell::Cell;
use std::collections::HashMap;
use std::io;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Default)]
pub struct MapTags(pub HashMap<PathBuf, RawTags>);

impl TagReader for MapTags {
    fn read_tags(&self, path: &Path) -> RawTags {
        self.0.get(path).cloned().unwrap_or_default()
    }
}

/// Clock that never blocks and counts how often it was asked to.
#[derive(Default)]
pub struct CountingClock {
    pub sleeps: Cell<u32>,
}

impl Clock for CountingClock {
    fn sleep(&self, _duration: Duration) {
        self.sleeps.set(self.sleeps.get() + 1);
    }
}

pub fn tags(title: &str, bpm: Option<f64>, key: &str) -> RawTags {
    RawTags {
        artist: Some("Various".into()),
        title: Some(title.into()),
        duration_secs: Some(300.0),
        bpm,
        initial_key: Some(key.into()),
        genre: Some("House".into()),
    }
}

/// A library directory, a config pointing into a temp dir, and the tags the
/// fake reader hands out.
pub struct Fixture {
    pub dir: TempDir,
    pub config: Config,
    pub tags: MapTags,
}

impl Fixture {
    /// Files are created as `lib/NN.mp3` in the order given, so the catalog
    /// follows that order.
    pub fn new(tracks: &[RawTags]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("lib");
        std::fs::create_dir_all(&lib).unwrap();

        let mut map = HashMap::new();
        for (i, t) in tracks.iter().enumerate() {
            let path = lib.join(format!("{:02}.mp3", i));
            std::fs::write(&path, b"").unwrap();
            map.insert(path, t.clone());
        }

        let mut config = Config::default();
        config.library.base_dir = lib;
        config.ipc.service_socket = dir.path().join("src.socket");
        config.ipc.ui_socket = dir.path().join("ui.socket");
        config.ipc.startup_interval_ms = 1;

        Self {
            dir,
            config,
            tags: MapTags(map),
        }
    }

    pub fn track_path(&self, i: usize) -> PathBuf {
        self.config.library.base_dir.join(format!("{:02}.mp3", i))
    }

    /// Bind the UI end.  Reads time out so a missing datagram fails the
    /// test instead of hanging it.
    pub fn peer(&self) -> Peer {
        let socket = UnixDatagram::bind(&self.config.ipc.ui_socket).unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        Peer {
            socket,
            service_socket: self.config.ipc.service_socket.clone(),
        }
    }

    pub fn start(self, clock: &dyn Clock) -> (BrowserService<DirectorySource>, TempDir) {
        let source = DirectorySource::open(&self.config.library, None).unwrap();
        let service =
            BrowserService::new(source, Box::new(self.tags), &self.config, &mut NoLauncher, clock)
                .unwrap();
        (service, self.dir)
    }
}

pub struct Peer {
    socket: UnixDatagram,
    service_socket: PathBuf,
}

impl Peer {
    pub fn recv(&self) -> UiMessage {
        let mut buf = vec![0u8; 512 * 1024];
        let n = self.socket.recv(&mut buf).unwrap();
        UiMessage::decode(&buf[..n]).unwrap()
    }

    pub fn recv_snapshot(&self) -> Snapshot {
        match self.recv() {
            UiMessage::Snapshot(s) => s,
            other => panic!("expected a snapshot, got {:?}", other),
        }
    }

    /// Number of datagrams already queued, draining them.
    pub fn drain(&self) -> usize {
        self.socket.set_nonblocking(true).unwrap();
        let mut buf = vec![0u8; 512 * 1024];
        let mut count = 0;
        loop {
            match self.socket.recv(&mut buf) {
                Ok(_) => count += 1,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => panic!("peer recv failed: {}", e),
            }
        }
        self.socket.set_nonblocking(false).unwrap();
        count
    }

    pub fn send(&self, json: &[u8]) {
        self.socket.send_to(json, &self.service_socket).unwrap();
    }
}

/// Title column of every row.
pub fn titles(snapshot: &Snapshot) -> Vec<String> {
    snapshot
        .rows
        .iter()
        .map(|row| row[1].as_text().unwrap_or_default().to_string())
        .collect()
}
