use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use p2p_config::{RESPONSE_TIMEOUT, SERVER_STARTUP_DELAY};
use p2p_core::entities::{FileMetadata, PeerIdentity};

use crate::control::ControlPlane;
use crate::discovery::DiscoveryTable;
use crate::store::ChunkStore;
use crate::transfer::StreamTransport;
use crate::LOGGER;

/// One peer identity with its chunk store, discovery table and both server
/// planes wired together.
#[derive(Clone)]
pub struct Peer {
    root: PathBuf,
    identity: Arc<PeerIdentity>,
    store: Arc<ChunkStore>,
    discovery: Arc<DiscoveryTable>,
    control: Arc<ControlPlane>,
    transfer: Arc<StreamTransport>,
}

impl Peer {
    /// Binds both sockets and indexes the chunks already on disk. Failing to
    /// bind is fatal; the caller exits.
    pub fn bind(root: &Path, identity: PeerIdentity) -> io::Result<Self> {
        let identity = Arc::new(identity);
        let discovery = Arc::new(DiscoveryTable::new());
        let store = Arc::new(ChunkStore::new(root, identity.id, Arc::clone(&discovery)));
        store.scan_local()?;

        let transfer = Arc::new(StreamTransport::bind(&identity, Arc::clone(&store))?);
        let control = Arc::new(ControlPlane::bind(
            Arc::clone(&identity),
            Arc::clone(&store),
            Arc::clone(&discovery),
            Arc::clone(&transfer),
        )?);

        Ok(Self {
            root: root.to_path_buf(),
            identity,
            store,
            discovery,
            control,
            transfer,
        })
    }

    /// Starts both servers, waits for the neighbor peers to come up, runs
    /// one search per requested file, then parks on the server threads. The
    /// servers run until the process is terminated; chunks requested by the
    /// searches keep arriving and assembling long after the search threads
    /// have finished emitting.
    pub fn start(&self, file_names: &[String]) {
        let transfer = Arc::clone(&self.transfer);
        let transfer_thread = thread::spawn(move || transfer.run());
        let control = Arc::clone(&self.control);
        let control_thread = thread::spawn(move || control.run());

        thread::sleep(SERVER_STARTUP_DELAY);

        let mut searches = Vec::new();
        for file_name in file_names {
            let peer = self.clone();
            let file_name = file_name.clone();
            searches.push(thread::spawn(move || peer.search(&file_name)));
        }
        for search in searches {
            let _ = search.join();
        }

        let _ = transfer_thread.join();
        let _ = control_thread.join();
    }

    /// One file's search lifecycle: load metadata (abandoning the file if
    /// the sidecar is unusable), open the response window, and try assembly
    /// first in case every chunk is already local. Otherwise flood the
    /// neighbors, collect responses until the window times out, and ask the
    /// planned providers to push.
    pub fn search(&self, file_name: &str) {
        let metadata = match FileMetadata::load(&self.root, file_name) {
            Ok(metadata) => metadata,
            Err(e) => {
                LOGGER.error(format!("abandoning search for '{file_name}': {e}"));
                return;
            }
        };
        let file = metadata.file_name;

        self.store.set_total(&file, metadata.total_chunks);
        self.discovery.init(&file, metadata.total_chunks as usize);
        self.discovery.open_window(&file);

        match self.store.assemble(&file) {
            Ok(true) => {
                LOGGER.info(format!(
                    "peer {} already holds every chunk of '{file}'",
                    self.identity.id
                ));
                return;
            }
            Ok(false) => {}
            Err(e) => LOGGER.error(format!("assembly check for '{file}' failed: {e}")),
        }

        self.control.send_discovery(
            &file,
            metadata.total_chunks,
            metadata.initial_ttl,
            &self.identity.control_endpoint(),
        );

        thread::sleep(RESPONSE_TIMEOUT);
        self.discovery.close_window(&file);
        LOGGER.info(format!("response window closed for '{file}'"));

        self.control.send_requests(&file);
    }
}

#[cfg(test)]
mod func_tests {
    use std::fs;
    use std::net::UdpSocket;
    use std::time::Duration;

    use p2p_core::entities::PeerEndpoint;

    use super::*;

    fn identity(id: u32, control_port: u16, neighbors: Vec<PeerEndpoint>) -> PeerIdentity {
        PeerIdentity {
            id,
            ip: String::from("127.0.0.1"),
            control_port,
            stream_port: control_port + 1000,
            rate: 2048,
            neighbors,
        }
    }

    #[test]
    fn test_search_assembles_locally_without_flooding() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("book.txt.p2p"), "book.txt\n3 2\n").unwrap();
        let dir = root.path().join("1");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("book.txt.ch0"), b"one ").unwrap();
        fs::write(dir.join("book.txt.ch1"), b"two ").unwrap();
        fs::write(dir.join("book.txt.ch2"), b"three").unwrap();

        let neighbor = UdpSocket::bind(("127.0.0.1", 9502)).unwrap();
        neighbor
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        let peer = Peer::bind(
            root.path(),
            identity(1, 9501, vec![PeerEndpoint::new("127.0.0.1", 9502)]),
        )
        .unwrap();
        peer.search("book.txt");

        assert_eq!(
            fs::read(root.path().join("1/book.txt")).unwrap(),
            b"one two three"
        );

        // a peer that already holds everything must not flood anyone
        let mut buf = [0u8; 64];
        assert!(neighbor.recv_from(&mut buf).is_err());
    }

    #[test]
    fn test_search_without_metadata_is_abandoned() {
        let root = tempfile::tempdir().unwrap();
        let peer = Peer::bind(root.path(), identity(1, 9503, Vec::new())).unwrap();

        peer.search("ghost.txt");

        assert!(!root.path().join("1/ghost.txt").exists());
        assert!(!peer.discovery.window_open("ghost.txt"));
    }

    /// Peers 1-2-3 in a line. Peer 3 holds both chunks of a two-chunk file;
    /// peer 1 starts the search. The flood crosses peer 2 with a decremented
    /// TTL, peer 3 responds to the origin, and once peer 1's response window
    /// closes it pulls both chunks from peer 3 and assembles the file.
    #[test]
    fn test_two_hop_flood_pulls_chunks_across_the_line() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("book.txt.p2p"), "book.txt\n2 2\n").unwrap();
        let holder_dir = root.path().join("3");
        fs::create_dir_all(&holder_dir).unwrap();
        fs::write(holder_dir.join("book.txt.ch0"), b"hello ").unwrap();
        fs::write(holder_dir.join("book.txt.ch1"), b"world").unwrap();

        let endpoint = |port| PeerEndpoint::new("127.0.0.1", port);
        let peers = [
            Peer::bind(root.path(), identity(1, 9601, vec![endpoint(9602)])).unwrap(),
            Peer::bind(root.path(), identity(2, 9602, vec![endpoint(9601), endpoint(9603)]))
                .unwrap(),
            Peer::bind(root.path(), identity(3, 9603, vec![endpoint(9602)])).unwrap(),
        ];

        for (index, peer) in peers.iter().enumerate() {
            let peer = peer.clone();
            let files = if index == 0 {
                vec![String::from("book.txt")]
            } else {
                Vec::new()
            };
            thread::spawn(move || peer.start(&files));
        }

        // startup delay + response window + paced pushes: allow plenty
        let assembled = root.path().join("1/book.txt");
        let expected: &[u8] = b"hello world";
        let deadline = std::time::Instant::now() + Duration::from_secs(40);
        while std::time::Instant::now() < deadline {
            if fs::read(&assembled).map(|data| data == expected).unwrap_or(false) {
                break;
            }
            thread::sleep(Duration::from_millis(250));
        }

        assert_eq!(fs::read(&assembled).unwrap(), expected);
        assert!(root.path().join("1/book.txt.ch0").exists());
        assert!(root.path().join("1/book.txt.ch1").exists());
    }
}
